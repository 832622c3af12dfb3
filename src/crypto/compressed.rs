//! CMS CompressedData with zlib (RFC 3274).

use std::io::{Read, Write};

use cms::compressed_data::CompressedData;
use cms::content_info::CmsVersion;
use cms::signed_data::EncapsulatedContentInfo;
use der::asn1::OctetString;
use der::Any;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use spki::AlgorithmIdentifierOwned;

use super::algorithm::oid;
use super::asn1::{unwrap_content_info, wrap_content_info};
use super::CryptoError;

/// Compress `content` into a DER CompressedData ContentInfo.
pub fn compress(content: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(content)
        .map_err(|e| CryptoError::Compression(e.to_string()))?;
    let deflated = encoder
        .finish()
        .map_err(|e| CryptoError::Compression(e.to_string()))?;

    let compressed = CompressedData {
        version: CmsVersion::V0,
        compression_alg: AlgorithmIdentifierOwned {
            oid: oid::ZLIB,
            parameters: None,
        },
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: oid::DATA,
            econtent: Some(Any::encode_from(&OctetString::new(deflated)?)?),
        },
    };
    wrap_content_info(oid::COMPRESSED_DATA, &compressed)
}

/// Inflate a DER CompressedData ContentInfo.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let compressed =
        unwrap_content_info(data, oid::COMPRESSED_DATA)?.decode_as::<CompressedData>()?;
    if compressed.compression_alg.oid != oid::ZLIB {
        return Err(CryptoError::UnsupportedAlgorithm(
            compressed.compression_alg.oid.to_string(),
        ));
    }
    let econtent = compressed
        .encap_content_info
        .econtent
        .ok_or_else(|| CryptoError::Compression("no encapsulated content".into()))?;
    let deflated = econtent.decode_as::<OctetString>()?;

    let mut inflated = Vec::new();
    ZlibDecoder::new(deflated.as_bytes())
        .read_to_end(&mut inflated)
        .map_err(|e| CryptoError::Compression(e.to_string()))?;
    Ok(inflated)
}

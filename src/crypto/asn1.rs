//! ASN.1 structures the `cms` crate does not provide.
//!
//! ```text
//! AuthEnvelopedData ::= SEQUENCE {                       -- RFC 5083
//!     version CMSVersion,
//!     originatorInfo [0] IMPLICIT OriginatorInfo OPTIONAL,
//!     recipientInfos RecipientInfos,
//!     authEncryptedContentInfo EncryptedContentInfo,
//!     authAttrs [1] IMPLICIT AuthAttributes OPTIONAL,
//!     mac MessageAuthenticationCode,
//!     unauthAttrs [2] IMPLICIT UnauthAttributes OPTIONAL }
//!
//! GCMParameters ::= SEQUENCE {                           -- RFC 5084
//!     aes-nonce OCTET STRING,
//!     aes-ICVlen AES-GCM-ICVlen DEFAULT 12 }
//!
//! RC2-CBC-Parameter ::= SEQUENCE {                       -- RFC 2268
//!     rc2ParameterVersion INTEGER OPTIONAL,
//!     iv OCTET STRING (SIZE(8)) }
//!
//! RSAES-OAEP-params ::= SEQUENCE {                       -- RFC 4055
//!     hashFunc [0] AlgorithmIdentifier DEFAULT sha1Identifier,
//!     maskGenFunc [1] AlgorithmIdentifier DEFAULT mgf1SHA1Identifier,
//!     pSourceFunc [2] AlgorithmIdentifier DEFAULT pSpecifiedEmptyIdentifier }
//! ```

use cms::content_info::{CmsVersion, ContentInfo};
use cms::enveloped_data::{EncryptedContentInfo, OriginatorInfo, RecipientInfos};
use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use der::{Any, Decode, Encode, EncodeValue, Sequence, Tagged};
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attributes;

use super::CryptoError;

/// Authenticated-enveloped-data content type (RFC 5083).
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct AuthEnvelopedData {
    pub version: CmsVersion,
    #[asn1(
        context_specific = "0",
        tag_mode = "IMPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub originator_info: Option<OriginatorInfo>,
    pub recip_infos: RecipientInfos,
    pub auth_encrypted_content: EncryptedContentInfo,
    #[asn1(
        context_specific = "1",
        tag_mode = "IMPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub auth_attrs: Option<Attributes>,
    pub mac: OctetString,
    #[asn1(
        context_specific = "2",
        tag_mode = "IMPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub unauth_attrs: Option<Attributes>,
}

/// Parameters of AES-GCM and AES-CCM content encryption.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AeadParameters {
    /// Nonce
    pub nonce: OctetString,
    /// Tag length in bytes; absent means 12
    pub icv_len: Option<u8>,
}

impl AeadParameters {
    /// Tag length with the DER default applied.
    pub fn tag_len(&self) -> usize {
        usize::from(self.icv_len.unwrap_or(12))
    }
}

/// Parameters of RSAES-OAEP key transport. Absent fields mean SHA-1.
#[derive(Clone, Debug, Default, Eq, PartialEq, Sequence)]
pub struct RsaOaepParams {
    /// Hash applied to the label
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub hash_algorithm: Option<AlgorithmIdentifierOwned>,
    /// Mask generation function, MGF1 with its own hash as parameter
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub mask_gen_algorithm: Option<AlgorithmIdentifierOwned>,
    /// Label source; only the empty label is used in CMS
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", optional = "true")]
    pub p_source_algorithm: Option<AlgorithmIdentifierOwned>,
}

/// Parameters of RC2-CBC content encryption.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Rc2CbcParameter {
    /// Encoded effective key length
    pub rc2_parameter_version: Option<u32>,
    /// Initialization vector
    pub iv: OctetString,
}

/// RC2 parameter version for 128 effective key bits.
pub const RC2_VERSION_128: u32 = 58;

impl Rc2CbcParameter {
    /// Effective key bits encoded by the parameter version.
    pub fn effective_key_bits(&self) -> usize {
        match self.rc2_parameter_version {
            Some(160) => 40,
            Some(120) => 64,
            Some(58) | None => 128,
            Some(v) if v >= 256 => v as usize,
            Some(_) => 32,
        }
    }
}

/// Encode `value` as a ContentInfo of `content_type`.
pub fn wrap_content_info<T>(content_type: ObjectIdentifier, value: &T) -> Result<Vec<u8>, CryptoError>
where
    T: Tagged + EncodeValue,
{
    let info = ContentInfo {
        content_type,
        content: Any::encode_from(value)?,
    };
    Ok(info.to_der()?)
}

/// Decode a ContentInfo and check its content type.
pub fn unwrap_content_info(
    der_bytes: &[u8],
    expected: ObjectIdentifier,
) -> Result<Any, CryptoError> {
    let info = ContentInfo::from_der(der_bytes)?;
    if info.content_type != expected {
        return Err(CryptoError::Der(der::Error::from(der::ErrorKind::OidUnknown {
            oid: info.content_type,
        })));
    }
    Ok(info.content)
}

/// Content type of an encoded ContentInfo.
pub fn content_type_of(der_bytes: &[u8]) -> Result<ObjectIdentifier, CryptoError> {
    Ok(ContentInfo::from_der(der_bytes)?.content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aead_parameters_default_tag_len() {
        let params = AeadParameters {
            nonce: OctetString::new(vec![0u8; 12]).unwrap(),
            icv_len: None,
        };
        assert_eq!(params.tag_len(), 12);

        let encoded = AeadParameters {
            icv_len: Some(16),
            ..params
        }
        .to_der()
        .unwrap();
        let decoded = AeadParameters::from_der(&encoded).unwrap();
        assert_eq!(decoded.tag_len(), 16);
    }

    #[test]
    fn test_rc2_effective_bits() {
        let iv = OctetString::new(vec![0u8; 8]).unwrap();
        let p = Rc2CbcParameter {
            rc2_parameter_version: Some(RC2_VERSION_128),
            iv: iv.clone(),
        };
        assert_eq!(p.effective_key_bits(), 128);
        let p = Rc2CbcParameter {
            rc2_parameter_version: Some(160),
            iv,
        };
        assert_eq!(p.effective_key_bits(), 40);
    }
}

//! CMS encryption (`application/pkcs7-mime; smime-type=enveloped-data`).
//!
//! CBC algorithms travel in EnvelopedData (RFC 5652). GCM and CCM travel
//! in AuthEnvelopedData (RFC 5083) with the tag in the `mac` field. The
//! content-encryption key is transported with RSA (PKCS#1 v1.5 on
//! encryption; PKCS#1 v1.5 or OAEP on decryption).

use aes_gcm::aead::{Aead, KeyInit, Nonce, Payload};
use aes_gcm::aead::consts::{U12, U16};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{
    BlockCipher, BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyIvInit,
};
use cms::cert::IssuerAndSerialNumber;
use cms::content_info::CmsVersion;
use cms::enveloped_data::{
    EncryptedContentInfo, EnvelopedData, KeyTransRecipientInfo, RecipientIdentifier,
    RecipientInfo, RecipientInfos,
};
use der::asn1::{OctetString, SetOfVec};
use der::{Any, Encode, Tagged};
use rand::RngCore;
use rsa::{Oaep, Pkcs1v15Encrypt};
use serde::{Deserialize, Serialize};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::pkix::SubjectKeyIdentifier;
use x509_cert::Certificate;
use zeroize::Zeroizing;

use super::algorithm::{oid, CipherMode, DigestAlgorithm, EncryptionAlgorithm};
use super::asn1::{
    content_type_of, unwrap_content_info, wrap_content_info, AeadParameters, AuthEnvelopedData,
    Rc2CbcParameter, RsaOaepParams, RC2_VERSION_128,
};
use super::certificate::{rsa_public_key, subject_key_id, KeyPair};
use super::CryptoError;

/// How the recipient certificate is referenced in the RecipientInfo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyReference {
    /// Issuer name and serial number
    #[default]
    IssuerSerial,
    /// Subject key identifier extension
    SubjectKeyIdentifier,
}

const AEAD_NONCE_LEN: usize = 12;
const AEAD_TAG_LEN: u8 = 16;

type Aes192Gcm = aes_gcm::AesGcm<aes::Aes192, U12>;
type Aes128Gcm12 = aes_gcm::AesGcm<aes::Aes128, U12, U12>;
type Aes192Gcm12 = aes_gcm::AesGcm<aes::Aes192, U12, U12>;
type Aes256Gcm12 = aes_gcm::AesGcm<aes::Aes256, U12, U12>;
type Aes128Ccm = ccm::Ccm<aes::Aes128, U16, U12>;
type Aes192Ccm = ccm::Ccm<aes::Aes192, U16, U12>;
type Aes256Ccm = ccm::Ccm<aes::Aes256, U16, U12>;
type Aes128Ccm12 = ccm::Ccm<aes::Aes128, U12, U12>;
type Aes192Ccm12 = ccm::Ccm<aes::Aes192, U12, U12>;
type Aes256Ccm12 = ccm::Ccm<aes::Aes256, U12, U12>;

fn random_bytes(len: usize) -> Zeroizing<Vec<u8>> {
    let mut buf = Zeroizing::new(vec![0u8; len]);
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

// ============================================================================
// Symmetric primitives
// ============================================================================

fn cbc_encrypt<C>(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    Ok(cbc::Encryptor::<C>::new_from_slices(key, iv)?.encrypt_padded_vec_mut::<Pkcs7>(data))
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    Ok(cbc::Decryptor::<C>::new_from_slices(key, iv)?.decrypt_padded_vec_mut::<Pkcs7>(data)?)
}

fn aead_seal<A: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = A::new_from_slice(key)?;
    let nonce = Nonce::<A>::from_exact_iter(nonce.iter().copied())
        .ok_or_else(|| CryptoError::Cipher("invalid nonce length".into()))?;
    Ok(cipher.encrypt(
        &nonce,
        Payload {
            msg: plaintext,
            aad: &[],
        },
    )?)
}

fn aead_open<A: Aead + KeyInit>(
    key: &[u8],
    nonce: &[u8],
    ciphertext_and_tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = A::new_from_slice(key)?;
    let nonce = Nonce::<A>::from_exact_iter(nonce.iter().copied())
        .ok_or_else(|| CryptoError::Cipher("unsupported nonce length".into()))?;
    Ok(cipher.decrypt(
        &nonce,
        Payload {
            msg: ciphertext_and_tag,
            aad,
        },
    )?)
}

fn encrypt_content(
    algorithm: EncryptionAlgorithm,
    key: &[u8],
    iv: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    use EncryptionAlgorithm as E;
    match algorithm {
        E::TripleDes => cbc_encrypt::<des::TdesEde3>(key, iv, data),
        E::Rc2 => cbc_encrypt::<rc2::Rc2>(key, iv, data),
        E::Aes128Cbc => cbc_encrypt::<aes::Aes128>(key, iv, data),
        E::Aes192Cbc => cbc_encrypt::<aes::Aes192>(key, iv, data),
        E::Aes256Cbc => cbc_encrypt::<aes::Aes256>(key, iv, data),
        E::Aes128Gcm => aead_seal::<aes_gcm::Aes128Gcm>(key, iv, data),
        E::Aes192Gcm => aead_seal::<Aes192Gcm>(key, iv, data),
        E::Aes256Gcm => aead_seal::<aes_gcm::Aes256Gcm>(key, iv, data),
        E::Aes128Ccm => aead_seal::<Aes128Ccm>(key, iv, data),
        E::Aes192Ccm => aead_seal::<Aes192Ccm>(key, iv, data),
        E::Aes256Ccm => aead_seal::<Aes256Ccm>(key, iv, data),
    }
}

fn decrypt_cbc(
    algorithm: EncryptionAlgorithm,
    params: Option<&Any>,
    key: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let params = params.ok_or_else(|| CryptoError::Cipher("missing IV parameter".into()))?;
    if algorithm == EncryptionAlgorithm::Rc2 {
        let (iv, bits) = match params.decode_as::<Rc2CbcParameter>() {
            Ok(p) => (p.iv.as_bytes().to_vec(), p.effective_key_bits()),
            Err(_) => (params.decode_as::<OctetString>()?.as_bytes().to_vec(), key.len() * 8),
        };
        let cipher = rc2::Rc2::new_with_eff_key_len(key, bits);
        return Ok(cbc::Decryptor::<rc2::Rc2>::inner_iv_slice_init(cipher, &iv)?
            .decrypt_padded_vec_mut::<Pkcs7>(data)?);
    }

    let iv = params.decode_as::<OctetString>()?;
    let iv = iv.as_bytes();
    use EncryptionAlgorithm as E;
    match algorithm {
        E::TripleDes => cbc_decrypt::<des::TdesEde3>(key, iv, data),
        E::Aes128Cbc => cbc_decrypt::<aes::Aes128>(key, iv, data),
        E::Aes192Cbc => cbc_decrypt::<aes::Aes192>(key, iv, data),
        E::Aes256Cbc => cbc_decrypt::<aes::Aes256>(key, iv, data),
        other => Err(CryptoError::UnsupportedAlgorithm(other.name().to_string())),
    }
}

fn decrypt_aead(
    algorithm: EncryptionAlgorithm,
    params: &AeadParameters,
    key: &[u8],
    ciphertext_and_tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let nonce = params.nonce.as_bytes();
    let ct = ciphertext_and_tag;
    use EncryptionAlgorithm as E;
    match (algorithm, params.tag_len()) {
        (E::Aes128Gcm, 16) => aead_open::<aes_gcm::Aes128Gcm>(key, nonce, ct, aad),
        (E::Aes192Gcm, 16) => aead_open::<Aes192Gcm>(key, nonce, ct, aad),
        (E::Aes256Gcm, 16) => aead_open::<aes_gcm::Aes256Gcm>(key, nonce, ct, aad),
        (E::Aes128Gcm, 12) => aead_open::<Aes128Gcm12>(key, nonce, ct, aad),
        (E::Aes192Gcm, 12) => aead_open::<Aes192Gcm12>(key, nonce, ct, aad),
        (E::Aes256Gcm, 12) => aead_open::<Aes256Gcm12>(key, nonce, ct, aad),
        (E::Aes128Ccm, 16) => aead_open::<Aes128Ccm>(key, nonce, ct, aad),
        (E::Aes192Ccm, 16) => aead_open::<Aes192Ccm>(key, nonce, ct, aad),
        (E::Aes256Ccm, 16) => aead_open::<Aes256Ccm>(key, nonce, ct, aad),
        (E::Aes128Ccm, 12) => aead_open::<Aes128Ccm12>(key, nonce, ct, aad),
        (E::Aes192Ccm, 12) => aead_open::<Aes192Ccm12>(key, nonce, ct, aad),
        (E::Aes256Ccm, 12) => aead_open::<Aes256Ccm12>(key, nonce, ct, aad),
        (alg, tag) => Err(CryptoError::UnsupportedAlgorithm(format!(
            "{alg} with {tag}-byte tag"
        ))),
    }
}

// ============================================================================
// Recipient handling
// ============================================================================

fn recipient_info(
    recipient: &Certificate,
    key_reference: KeyReference,
    cek: &[u8],
) -> Result<RecipientInfo, CryptoError> {
    let (version, rid) = match key_reference {
        KeyReference::IssuerSerial => (
            CmsVersion::V0,
            RecipientIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: recipient.tbs_certificate.issuer.clone(),
                serial_number: recipient.tbs_certificate.serial_number.clone(),
            }),
        ),
        KeyReference::SubjectKeyIdentifier => {
            let ski = subject_key_id(recipient).ok_or_else(|| {
                CryptoError::NoRecipient(
                    "recipient certificate has no subject key identifier".into(),
                )
            })?;
            (
                CmsVersion::V2,
                RecipientIdentifier::SubjectKeyIdentifier(SubjectKeyIdentifier(
                    OctetString::new(ski)?,
                )),
            )
        },
    };

    let public_key = rsa_public_key(recipient)?;
    let enc_key = public_key.encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, cek)?;

    Ok(RecipientInfo::Ktri(KeyTransRecipientInfo {
        version,
        rid,
        key_enc_alg: AlgorithmIdentifierOwned {
            oid: oid::RSA_ENCRYPTION,
            parameters: Some(Any::null()),
        },
        enc_key: OctetString::new(enc_key)?,
    }))
}

fn addresses(rid: &RecipientIdentifier, cert: &Certificate) -> bool {
    match rid {
        RecipientIdentifier::IssuerAndSerialNumber(ias) => {
            cert.tbs_certificate.issuer == ias.issuer
                && cert.tbs_certificate.serial_number == ias.serial_number
        },
        RecipientIdentifier::SubjectKeyIdentifier(ski) => {
            subject_key_id(cert).as_deref() == Some(ski.0.as_bytes())
        },
    }
}

fn digest_of(alg: Option<&AlgorithmIdentifierOwned>) -> Result<DigestAlgorithm, CryptoError> {
    match alg {
        None => Ok(DigestAlgorithm::Sha1),
        Some(alg) => DigestAlgorithm::from_oid(&alg.oid)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm(alg.oid.to_string())),
    }
}

/// OAEP padding named by RSAES-OAEP-params. Absent or NULL parameters mean
/// SHA-1 with MGF1-SHA-1.
fn oaep_padding(parameters: Option<&Any>) -> Result<Oaep, CryptoError> {
    let params = match parameters {
        Some(any) if any.tag() != der::Tag::Null => any.decode_as::<RsaOaepParams>()?,
        _ => RsaOaepParams::default(),
    };
    let hash = digest_of(params.hash_algorithm.as_ref())?;
    let mgf_hash = match &params.mask_gen_algorithm {
        None => DigestAlgorithm::Sha1,
        Some(mgf) if mgf.oid == oid::MGF1 => {
            let inner = mgf
                .parameters
                .as_ref()
                .map(|p| p.decode_as::<AlgorithmIdentifierOwned>())
                .transpose()?;
            digest_of(inner.as_ref())?
        },
        Some(mgf) => return Err(CryptoError::UnsupportedAlgorithm(mgf.oid.to_string())),
    };

    use DigestAlgorithm as D;
    let padding = match (hash, mgf_hash) {
        (D::Sha1, D::Sha1) => Oaep::new::<sha1::Sha1>(),
        (D::Sha224, D::Sha224) => Oaep::new::<sha2::Sha224>(),
        (D::Sha256, D::Sha256) => Oaep::new::<sha2::Sha256>(),
        (D::Sha384, D::Sha384) => Oaep::new::<sha2::Sha384>(),
        (D::Sha512, D::Sha512) => Oaep::new::<sha2::Sha512>(),
        (D::Sha256, D::Sha1) => Oaep::new_with_mgf_hash::<sha2::Sha256, sha1::Sha1>(),
        (D::Sha384, D::Sha1) => Oaep::new_with_mgf_hash::<sha2::Sha384, sha1::Sha1>(),
        (D::Sha512, D::Sha1) => Oaep::new_with_mgf_hash::<sha2::Sha512, sha1::Sha1>(),
        (hash, mgf_hash) => {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "RSAES-OAEP with {hash} and MGF1 {mgf_hash}"
            )))
        },
    };
    Ok(padding)
}

fn recover_cek(
    recip_infos: &RecipientInfos,
    key_pair: &KeyPair,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let ktri = recip_infos
        .0
        .iter()
        .find_map(|ri| match ri {
            RecipientInfo::Ktri(ktri) if addresses(&ktri.rid, &key_pair.certificate) => Some(ktri),
            _ => None,
        })
        .ok_or_else(|| {
            CryptoError::NoRecipient(format!(
                "no key transport recipient for {}",
                key_pair.certificate.tbs_certificate.subject
            ))
        })?;

    let key = key_pair.private_key.rsa()?;
    let enc_key = ktri.enc_key.as_bytes();
    let cek = if ktri.key_enc_alg.oid == oid::RSAES_OAEP {
        key.decrypt(oaep_padding(ktri.key_enc_alg.parameters.as_ref())?, enc_key)?
    } else {
        key.decrypt(Pkcs1v15Encrypt, enc_key)?
    };
    Ok(Zeroizing::new(cek))
}

fn algorithm_of(info: &EncryptedContentInfo) -> Result<EncryptionAlgorithm, CryptoError> {
    EncryptionAlgorithm::from_oid(&info.content_enc_alg.oid)
        .ok_or_else(|| CryptoError::UnsupportedAlgorithm(info.content_enc_alg.oid.to_string()))
}

// ============================================================================
// Public API
// ============================================================================

/// Encrypt `content` for `recipient`. Returns a DER ContentInfo.
pub fn encrypt(
    content: &[u8],
    recipient: &Certificate,
    algorithm: EncryptionAlgorithm,
    key_reference: KeyReference,
) -> Result<Vec<u8>, CryptoError> {
    let cek = random_bytes(algorithm.key_len());
    let recipient_info = recipient_info(recipient, key_reference, &cek)?;
    let ri_version = match key_reference {
        KeyReference::IssuerSerial => CmsVersion::V0,
        KeyReference::SubjectKeyIdentifier => CmsVersion::V2,
    };
    let recip_infos = RecipientInfos::from(SetOfVec::try_from(vec![recipient_info])?);

    match algorithm.mode() {
        CipherMode::Cbc => {
            let iv_len = if matches!(algorithm, EncryptionAlgorithm::TripleDes | EncryptionAlgorithm::Rc2) {
                8
            } else {
                16
            };
            let iv = random_bytes(iv_len);
            let parameters = if algorithm == EncryptionAlgorithm::Rc2 {
                Any::encode_from(&Rc2CbcParameter {
                    rc2_parameter_version: Some(RC2_VERSION_128),
                    iv: OctetString::new(iv.to_vec())?,
                })?
            } else {
                Any::encode_from(&OctetString::new(iv.to_vec())?)?
            };
            let ciphertext = encrypt_content(algorithm, &cek, &iv, content)?;

            let enveloped = EnvelopedData {
                version: ri_version,
                originator_info: None,
                recip_infos,
                encrypted_content: EncryptedContentInfo {
                    content_type: oid::DATA,
                    content_enc_alg: AlgorithmIdentifierOwned {
                        oid: algorithm.oid(),
                        parameters: Some(parameters),
                    },
                    encrypted_content: Some(OctetString::new(ciphertext)?),
                },
                unprotected_attrs: None,
            };
            wrap_content_info(oid::ENVELOPED_DATA, &enveloped)
        },
        CipherMode::Gcm | CipherMode::Ccm => {
            let nonce = random_bytes(AEAD_NONCE_LEN);
            let mut sealed = encrypt_content(algorithm, &cek, &nonce, content)?;
            let tag = sealed.split_off(sealed.len() - usize::from(AEAD_TAG_LEN));
            let parameters = AeadParameters {
                nonce: OctetString::new(nonce.to_vec())?,
                icv_len: Some(AEAD_TAG_LEN),
            };

            let auth_enveloped = AuthEnvelopedData {
                version: CmsVersion::V0,
                originator_info: None,
                recip_infos,
                auth_encrypted_content: EncryptedContentInfo {
                    content_type: oid::DATA,
                    content_enc_alg: AlgorithmIdentifierOwned {
                        oid: algorithm.oid(),
                        parameters: Some(Any::encode_from(&parameters)?),
                    },
                    encrypted_content: Some(OctetString::new(sealed)?),
                },
                auth_attrs: None,
                mac: OctetString::new(tag)?,
                unauth_attrs: None,
            };
            wrap_content_info(oid::AUTH_ENVELOPED_DATA, &auth_enveloped)
        },
    }
}

/// Decrypt an EnvelopedData or AuthEnvelopedData ContentInfo with
/// `key_pair`. Returns the plaintext and the algorithm that was used.
pub fn decrypt(
    data: &[u8],
    key_pair: &KeyPair,
) -> Result<(Vec<u8>, EncryptionAlgorithm), CryptoError> {
    let content_type = content_type_of(data)?;

    if content_type == oid::AUTH_ENVELOPED_DATA {
        let auth = unwrap_content_info(data, oid::AUTH_ENVELOPED_DATA)?
            .decode_as::<AuthEnvelopedData>()?;
        let info = &auth.auth_encrypted_content;
        let algorithm = algorithm_of(info)?;
        let params = info
            .content_enc_alg
            .parameters
            .as_ref()
            .ok_or_else(|| CryptoError::Cipher("missing AEAD parameters".into()))?
            .decode_as::<AeadParameters>()?;
        if params.tag_len() != auth.mac.as_bytes().len() {
            return Err(CryptoError::Cipher("tag length mismatch".into()));
        }

        let cek = recover_cek(&auth.recip_infos, key_pair)?;
        let mut sealed = info
            .encrypted_content
            .as_ref()
            .map(|c| c.as_bytes().to_vec())
            .unwrap_or_default();
        sealed.extend_from_slice(auth.mac.as_bytes());
        let aad = match &auth.auth_attrs {
            Some(attrs) => attrs.to_der()?,
            None => Vec::new(),
        };
        let plaintext = decrypt_aead(algorithm, &params, &cek, &sealed, &aad)?;
        return Ok((plaintext, algorithm));
    }

    let enveloped = unwrap_content_info(data, oid::ENVELOPED_DATA)?.decode_as::<EnvelopedData>()?;
    let info = &enveloped.encrypted_content;
    let algorithm = algorithm_of(info)?;
    if algorithm.is_authenticated() {
        return Err(CryptoError::UnsupportedAlgorithm(format!(
            "{algorithm} inside EnvelopedData"
        )));
    }
    let cek = recover_cek(&enveloped.recip_infos, key_pair)?;
    let ciphertext = info
        .encrypted_content
        .as_ref()
        .map(|c| c.as_bytes())
        .unwrap_or_default();
    let plaintext = decrypt_cbc(
        algorithm,
        info.content_enc_alg.parameters.as_ref(),
        &cek,
        ciphertext,
    )?;
    Ok((plaintext, algorithm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::certificate::{certificate_from_pem, PrivateKey};

    const RECEIVER_CRT: &str = include_str!("../../tests/fixtures/receiver.crt");
    const RECEIVER_KEY: &str = include_str!("../../tests/fixtures/receiver.key");
    const SENDER_CRT: &str = include_str!("../../tests/fixtures/sender.crt");
    const SENDER_KEY: &str = include_str!("../../tests/fixtures/sender.key");
    const NOSKI_CRT: &str = include_str!("../../tests/fixtures/noski.crt");

    fn receiver() -> KeyPair {
        KeyPair {
            certificate: certificate_from_pem(RECEIVER_CRT).unwrap(),
            private_key: PrivateKey::from_pkcs8_pem(RECEIVER_KEY).unwrap(),
        }
    }

    #[test]
    fn test_every_algorithm_decrypts() {
        let kp = receiver();
        let content = b"Content-Type: application/edi-x12\r\n\r\nISA*00*...~\r\n";
        for alg in EncryptionAlgorithm::ALL {
            let sealed = encrypt(content, &kp.certificate, alg, KeyReference::IssuerSerial).unwrap();
            let (plain, used) = decrypt(&sealed, &kp).unwrap();
            assert_eq!(plain, content, "{alg}");
            assert_eq!(used, alg);
        }
    }

    #[test]
    fn test_subject_key_identifier_reference() {
        let kp = receiver();
        let sealed = encrypt(
            b"data",
            &kp.certificate,
            EncryptionAlgorithm::Aes256Cbc,
            KeyReference::SubjectKeyIdentifier,
        )
        .unwrap();
        assert_eq!(decrypt(&sealed, &kp).unwrap().0, b"data");
    }

    #[test]
    fn test_subject_key_identifier_requires_extension() {
        let cert = certificate_from_pem(NOSKI_CRT).unwrap();
        let result = encrypt(
            b"data",
            &cert,
            EncryptionAlgorithm::Aes128Gcm,
            KeyReference::SubjectKeyIdentifier,
        );
        assert!(matches!(result, Err(CryptoError::NoRecipient(_))));
    }

    #[test]
    fn test_wrong_recipient() {
        let kp = receiver();
        let sealed = encrypt(b"data", &kp.certificate, EncryptionAlgorithm::Aes128Gcm, KeyReference::IssuerSerial)
            .unwrap();
        let other = KeyPair {
            certificate: certificate_from_pem(SENDER_CRT).unwrap(),
            private_key: PrivateKey::from_pkcs8_pem(SENDER_KEY).unwrap(),
        };
        assert!(matches!(decrypt(&sealed, &other), Err(CryptoError::NoRecipient(_))));
    }

    #[test]
    fn test_openssl_envelopes_decrypt() {
        let kp = receiver();
        let content = include_bytes!("../../tests/fixtures/content.txt");

        let cbc = include_bytes!("../../tests/fixtures/enc_cbc.der");
        let (plain, alg) = decrypt(cbc, &kp).unwrap();
        assert_eq!(plain, content);
        assert_eq!(alg, EncryptionAlgorithm::Aes128Cbc);

        let gcm = include_bytes!("../../tests/fixtures/enc_gcm.der");
        let (plain, alg) = decrypt(gcm, &kp).unwrap();
        assert_eq!(plain, content);
        assert_eq!(alg, EncryptionAlgorithm::Aes128Gcm);
    }

    #[test]
    fn test_openssl_oaep_sha256_envelope_decrypts() {
        let kp = receiver();
        let content = include_bytes!("../../tests/fixtures/content.txt");
        let sealed = include_bytes!("../../tests/fixtures/enc_oaep256.der");
        let (plain, alg) = decrypt(sealed, &kp).unwrap();
        assert_eq!(plain, content);
        assert_eq!(alg, EncryptionAlgorithm::Aes128Cbc);
    }

    #[test]
    fn test_oaep_parameters_select_digest() {
        assert!(oaep_padding(None).is_ok());
        assert!(oaep_padding(Some(&Any::null())).is_ok());

        let sha256 = AlgorithmIdentifierOwned {
            oid: DigestAlgorithm::Sha256.oid(),
            parameters: None,
        };
        let params = RsaOaepParams {
            hash_algorithm: Some(sha256.clone()),
            mask_gen_algorithm: Some(AlgorithmIdentifierOwned {
                oid: oid::MGF1,
                parameters: Some(Any::encode_from(&sha256).unwrap()),
            }),
            p_source_algorithm: None,
        };
        let any = Any::encode_from(&params).unwrap();
        assert!(oaep_padding(Some(&any)).is_ok());

        let md5 = RsaOaepParams {
            hash_algorithm: Some(AlgorithmIdentifierOwned {
                oid: DigestAlgorithm::Md5.oid(),
                parameters: None,
            }),
            ..Default::default()
        };
        let any = Any::encode_from(&md5).unwrap();
        assert!(matches!(
            oaep_padding(Some(&any)),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }
}

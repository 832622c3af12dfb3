//! Detached CMS SignedData (`application/pkcs7-signature`).
//!
//! Signing always writes the three signed attributes AS2 peers expect
//! (contentType, signingTime, messageDigest) and signs their DER encoding.
//! Verification accepts signatures with or without signed attributes.
//!
//! RSA PKCS#1 v1.5 and ECDSA (P-256, P-384) have a backend. DSA resolves in
//! the registry but reports [`CryptoError::UnsupportedAlgorithm`] here.

use std::time::SystemTime;

use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::CmsVersion;
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo, SignerInfos,
};
use der::asn1::{OctetString, SetOfVec, UtcTime};
use der::{Any, Encode};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rsa::Pkcs1v15Sign;
use spki::AlgorithmIdentifierOwned;
use x509_cert::attr::Attribute;
use x509_cert::Certificate;

use super::algorithm::{oid, DigestAlgorithm, KeyAlgorithm, SigningAlgorithm};
use super::asn1::{unwrap_content_info, wrap_content_info};
use super::certificate::{public_key, subject_key_id, CertificateManager, KeyPair, PrivateKey, PublicKey};
use super::CryptoError;

/// Result of a successful signature verification.
#[derive(Debug, Clone)]
pub struct VerifiedSignature {
    /// Digest algorithm the signer used
    pub digest: DigestAlgorithm,
    /// Signer certificate
    pub signer: Certificate,
    /// Whether the certificate travelled inside the signature
    pub certificate_embedded: bool,
}

/// PKCS#1 v1.5 signature scheme for a digest.
pub(crate) fn pkcs1v15(digest: DigestAlgorithm) -> Pkcs1v15Sign {
    match digest {
        DigestAlgorithm::Md5 => Pkcs1v15Sign::new::<md5::Md5>(),
        DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        DigestAlgorithm::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
    }
}

fn attribute(oid: const_oid::ObjectIdentifier, value: Any) -> Result<Attribute, CryptoError> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

/// ecdsa-with-SHA* identifiers carry no parameters (RFC 5758).
fn ecdsa_identifier(algorithm: SigningAlgorithm) -> Result<AlgorithmIdentifierOwned, CryptoError> {
    let oid = algorithm
        .oid()
        .ok_or_else(|| CryptoError::UnsupportedAlgorithm(algorithm.name()))?;
    Ok(AlgorithmIdentifierOwned { oid, parameters: None })
}

/// Key family a SignerInfo signature algorithm names.
fn signature_key_family(sig_oid: &const_oid::ObjectIdentifier) -> Result<KeyAlgorithm, CryptoError> {
    if *sig_oid == oid::RSA_ENCRYPTION {
        return Ok(KeyAlgorithm::Rsa);
    }
    if *sig_oid == oid::EC_PUBLIC_KEY {
        return Ok(KeyAlgorithm::Ecdsa);
    }
    match SigningAlgorithm::from_oid(sig_oid) {
        Some(alg) if alg.key != KeyAlgorithm::Dsa => Ok(alg.key),
        Some(alg) => Err(CryptoError::UnsupportedAlgorithm(alg.name())),
        None => Err(CryptoError::UnsupportedAlgorithm(sig_oid.to_string())),
    }
}

fn verify_raw(
    key: &PublicKey,
    family: KeyAlgorithm,
    digest: DigestAlgorithm,
    hashed: &[u8],
    signature: &[u8],
) -> Result<(), CryptoError> {
    let invalid = |e: &dyn std::fmt::Display| CryptoError::SignatureInvalid(e.to_string());
    match (family, key) {
        (KeyAlgorithm::Rsa, PublicKey::Rsa(key)) => {
            key.verify(pkcs1v15(digest), hashed, signature).map_err(|e| invalid(&e))
        },
        (KeyAlgorithm::Ecdsa, PublicKey::P256(key)) => {
            let sig = p256::ecdsa::Signature::from_der(signature).map_err(|e| invalid(&e))?;
            key.verify_prehash(hashed, &sig).map_err(|e| invalid(&e))
        },
        (KeyAlgorithm::Ecdsa, PublicKey::P384(key)) => {
            let sig = p384::ecdsa::Signature::from_der(signature).map_err(|e| invalid(&e))?;
            key.verify_prehash(hashed, &sig).map_err(|e| invalid(&e))
        },
        (family, key) => Err(CryptoError::SignatureInvalid(format!(
            "{family:?} signature from a {:?} certificate",
            key.key_algorithm()
        ))),
    }
}

/// Produce a detached signature over `content`, DER-encoded as ContentInfo.
pub fn sign_detached(
    content: &[u8],
    key_pair: &KeyPair,
    algorithm: SigningAlgorithm,
    include_certificate: bool,
) -> Result<Vec<u8>, CryptoError> {
    if algorithm.key != key_pair.private_key.key_algorithm() {
        return Err(CryptoError::UnsupportedAlgorithm(algorithm.name()));
    }
    let digest = algorithm.digest;
    let content_digest = digest.digest(content);

    let signing_time = UtcTime::from_system_time(SystemTime::now())?;
    let signed_attrs = SetOfVec::try_from(vec![
        attribute(oid::ATTR_CONTENT_TYPE, Any::encode_from(&oid::DATA)?)?,
        attribute(oid::ATTR_SIGNING_TIME, Any::encode_from(&signing_time)?)?,
        attribute(
            oid::ATTR_MESSAGE_DIGEST,
            Any::encode_from(&OctetString::new(content_digest)?)?,
        )?,
    ])?;

    let hashed = digest.digest(&signed_attrs.to_der()?);
    let (signature, signature_algorithm) = match &key_pair.private_key {
        PrivateKey::Rsa(key) => (
            key.sign(pkcs1v15(digest), &hashed)?,
            AlgorithmIdentifierOwned {
                oid: oid::RSA_ENCRYPTION,
                parameters: Some(Any::null()),
            },
        ),
        PrivateKey::P256(key) => {
            let sig: p256::ecdsa::Signature = key.sign_prehash(&hashed)?;
            (sig.to_der().as_bytes().to_vec(), ecdsa_identifier(algorithm)?)
        },
        PrivateKey::P384(key) => {
            let sig: p384::ecdsa::Signature = key.sign_prehash(&hashed)?;
            (sig.to_der().as_bytes().to_vec(), ecdsa_identifier(algorithm)?)
        },
    };

    let tbs = &key_pair.certificate.tbs_certificate;
    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: tbs.issuer.clone(),
            serial_number: tbs.serial_number.clone(),
        }),
        digest_alg: digest.algorithm_identifier(),
        signed_attrs: Some(signed_attrs),
        signature_algorithm,
        signature: OctetString::new(signature)?,
        unsigned_attrs: None,
    };

    let certificates = if include_certificate {
        Some(CertificateSet::from(SetOfVec::try_from(vec![CertificateChoices::Certificate(
            key_pair.certificate.clone(),
        )])?))
    } else {
        None
    };

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::try_from(vec![digest.algorithm_identifier()])?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: oid::DATA,
            econtent: None,
        },
        certificates,
        crls: None,
        signer_infos: SignerInfos::from(SetOfVec::try_from(vec![signer_info])?),
    };

    wrap_content_info(oid::SIGNED_DATA, &signed_data)
}

fn matches_sid(cert: &Certificate, sid: &SignerIdentifier) -> bool {
    match sid {
        SignerIdentifier::IssuerAndSerialNumber(ias) => {
            cert.tbs_certificate.issuer == ias.issuer
                && cert.tbs_certificate.serial_number == ias.serial_number
        },
        SignerIdentifier::SubjectKeyIdentifier(ski) => {
            subject_key_id(cert).as_deref() == Some(ski.0.as_bytes())
        },
    }
}

fn resolve_signer(
    signed_data: &SignedData,
    sid: &SignerIdentifier,
    certificates: &dyn CertificateManager,
) -> Result<(Certificate, bool), CryptoError> {
    let embedded = signed_data
        .certificates
        .iter()
        .flat_map(|set| set.0.iter())
        .find_map(|choice| match choice {
            CertificateChoices::Certificate(cert) if matches_sid(cert, sid) => Some(cert.clone()),
            _ => None,
        });
    if let Some(cert) = embedded {
        return Ok((cert, true));
    }

    let found = match sid {
        SignerIdentifier::IssuerAndSerialNumber(ias) => {
            certificates.find_by_issuer_serial(&ias.issuer, &ias.serial_number)
        },
        SignerIdentifier::SubjectKeyIdentifier(ski) => {
            certificates.find_by_subject_key_id(ski.0.as_bytes())
        },
    };
    found.map(|cert| (cert, false)).ok_or_else(|| {
        CryptoError::CertificateNotFound(match sid {
            SignerIdentifier::IssuerAndSerialNumber(ias) => format!(
                "issuer {} serial {}",
                ias.issuer, ias.serial_number
            ),
            SignerIdentifier::SubjectKeyIdentifier(_) => "subject key identifier".to_string(),
        })
    })
}

fn signed_message_digest(attrs: &SetOfVec<Attribute>) -> Result<Vec<u8>, CryptoError> {
    let attr = attrs
        .iter()
        .find(|a| a.oid == oid::ATTR_MESSAGE_DIGEST)
        .ok_or_else(|| CryptoError::SignatureInvalid("missing messageDigest attribute".into()))?;
    let value = attr
        .values
        .get(0)
        .ok_or_else(|| CryptoError::SignatureInvalid("empty messageDigest attribute".into()))?;
    Ok(value.decode_as::<OctetString>()?.as_bytes().to_vec())
}

/// Verify a detached signature over `content`.
///
/// The signer certificate is taken from the signature's certificate set
/// when present, otherwise looked up by issuer/serial or subject key
/// identifier. Trust is not evaluated here.
pub fn verify_detached(
    content: &[u8],
    signature: &[u8],
    certificates: &dyn CertificateManager,
) -> Result<VerifiedSignature, CryptoError> {
    let signed_data = unwrap_content_info(signature, oid::SIGNED_DATA)?.decode_as::<SignedData>()?;
    let signer_info = signed_data
        .signer_infos
        .0
        .get(0)
        .ok_or_else(|| CryptoError::SignatureInvalid("no signer info".into()))?;

    let digest = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid).ok_or_else(|| {
        CryptoError::UnsupportedAlgorithm(signer_info.digest_alg.oid.to_string())
    })?;

    let family = signature_key_family(&signer_info.signature_algorithm.oid)?;

    let (signer, certificate_embedded) = resolve_signer(&signed_data, &signer_info.sid, certificates)?;

    let signed_bytes = match &signer_info.signed_attrs {
        Some(attrs) => {
            if signed_message_digest(attrs)? != digest.digest(content) {
                return Err(CryptoError::DigestMismatch);
            }
            attrs.to_der()?
        },
        None => content.to_vec(),
    };

    verify_raw(
        &public_key(&signer)?,
        family,
        digest,
        &digest.digest(&signed_bytes),
        signer_info.signature.as_bytes(),
    )?;

    Ok(VerifiedSignature {
        digest,
        signer,
        certificate_embedded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::certificate::{certificate_from_pem, InMemoryCertificateManager, PrivateKey};

    const SENDER_CRT: &str = include_str!("../../tests/fixtures/sender.crt");
    const SENDER_KEY: &str = include_str!("../../tests/fixtures/sender.key");

    fn sender() -> KeyPair {
        KeyPair {
            certificate: certificate_from_pem(SENDER_CRT).unwrap(),
            private_key: PrivateKey::from_pkcs8_pem(SENDER_KEY).unwrap(),
        }
    }

    #[test]
    fn test_sign_and_verify_embedded_certificate() {
        let content = b"Content-Type: text/plain\r\n\r\nhello\r\n";
        let sig = sign_detached(content, &sender(), SigningAlgorithm::rsa(DigestAlgorithm::Sha256), true)
            .unwrap();

        let empty = InMemoryCertificateManager::new();
        let verified = verify_detached(content, &sig, &empty).unwrap();
        assert_eq!(verified.digest, DigestAlgorithm::Sha256);
        assert!(verified.certificate_embedded);
    }

    #[test]
    fn test_verify_resolves_certificate_from_store() {
        let content = b"payload";
        let sig = sign_detached(content, &sender(), SigningAlgorithm::rsa(DigestAlgorithm::Sha1), false)
            .unwrap();

        let empty = InMemoryCertificateManager::new();
        assert!(matches!(
            verify_detached(content, &sig, &empty),
            Err(CryptoError::CertificateNotFound(_))
        ));

        let mut store = InMemoryCertificateManager::new();
        store.add_certificate_pem("sender", SENDER_CRT).unwrap();
        let verified = verify_detached(content, &sig, &store).unwrap();
        assert_eq!(verified.digest, DigestAlgorithm::Sha1);
        assert!(!verified.certificate_embedded);
    }

    #[test]
    fn test_tampered_content_fails() {
        let sig = sign_detached(b"original", &sender(), SigningAlgorithm::rsa(DigestAlgorithm::Sha256), true)
            .unwrap();
        let store = InMemoryCertificateManager::new();
        assert!(matches!(
            verify_detached(b"tampered", &sig, &store),
            Err(CryptoError::DigestMismatch)
        ));
    }

    #[test]
    fn test_dsa_signing_unsupported() {
        let alg = SigningAlgorithm {
            digest: DigestAlgorithm::Sha256,
            key: KeyAlgorithm::Dsa,
        };
        assert!(matches!(
            sign_detached(b"x", &sender(), alg, true),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    fn ec_sender() -> KeyPair {
        KeyPair {
            certificate: certificate_from_pem(include_str!("../../tests/fixtures/ec_sender.crt")).unwrap(),
            private_key: PrivateKey::from_pkcs8_pem(include_str!("../../tests/fixtures/ec_sender.key")).unwrap(),
        }
    }

    #[test]
    fn test_ecdsa_sign_and_verify() {
        let alg = SigningAlgorithm {
            digest: DigestAlgorithm::Sha256,
            key: KeyAlgorithm::Ecdsa,
        };
        let content = b"Content-Type: text/plain\r\n\r\nhello\r\n";
        let sig = sign_detached(content, &ec_sender(), alg, true).unwrap();

        let store = InMemoryCertificateManager::new();
        let verified = verify_detached(content, &sig, &store).unwrap();
        assert_eq!(verified.digest, DigestAlgorithm::Sha256);
        assert!(verified.certificate_embedded);
        assert!(matches!(
            verify_detached(b"other", &sig, &store),
            Err(CryptoError::DigestMismatch)
        ));
    }

    #[test]
    fn test_algorithm_must_match_key() {
        let alg = SigningAlgorithm {
            digest: DigestAlgorithm::Sha256,
            key: KeyAlgorithm::Ecdsa,
        };
        assert!(matches!(
            sign_detached(b"x", &sender(), alg, true),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            sign_detached(b"x", &ec_sender(), SigningAlgorithm::rsa(DigestAlgorithm::Sha256), true),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_openssl_ecdsa_signature_verifies() {
        let content = include_bytes!("../../tests/fixtures/content.txt");
        let sig = include_bytes!("../../tests/fixtures/sig_ec.der");
        let store = InMemoryCertificateManager::new();
        let verified = verify_detached(content, sig, &store).unwrap();
        assert_eq!(verified.digest, DigestAlgorithm::Sha256);
        assert!(verified.certificate_embedded);
    }

    #[test]
    fn test_openssl_signature_verifies() {
        let content = include_bytes!("../../tests/fixtures/content.txt");
        let sig = include_bytes!("../../tests/fixtures/sig.der");
        let store = InMemoryCertificateManager::new();
        let verified = verify_detached(content, sig, &store).unwrap();
        assert_eq!(verified.digest, DigestAlgorithm::Sha256);
        assert!(verified.certificate_embedded);
    }
}

//! Algorithm registry.
//!
//! Bidirectional mapping between the algorithm names used in P-Modes and
//! MIME headers and the object identifiers used inside CMS structures.
//!
//! ## Naming styles
//!
//! Digest names circulate in three spellings:
//!
//! | Style   | SHA-256 spelled as | Where                               |
//! |---------|--------------------|-------------------------------------|
//! | RFC3851 | `sha256`           | `micalg`, `signed-receipt-micalg`   |
//! | RFC5751 | `sha-256`          | newer `micalg` values               |
//! | JCA     | `SHA-256`          | configuration, certificate metadata |
//!
//! All lookups are case-insensitive and accept every spelling.
//!
//! ## Table
//!
//! Only algorithms present in this table can be configured. Signatures
//! cover MD5 and the SHA family combined with RSA, DSA and ECDSA (where an
//! OID exists); encryption covers 3DES, RC2 and AES-{128,192,256} in CBC,
//! CCM and GCM modes.

use std::fmt;
use std::str::FromStr;

use const_oid::ObjectIdentifier;
use der::asn1::Any;
use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use spki::AlgorithmIdentifierOwned;

use super::CryptoError;

/// Object identifiers used by the S/MIME layer.
pub mod oid {
    use const_oid::ObjectIdentifier;

    // Digests
    /// md5 (1.2.840.113549.2.5)
    pub const MD5: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.2.5");
    /// id-sha1 (1.3.14.3.2.26)
    pub const SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
    /// id-sha224 (2.16.840.1.101.3.4.2.4)
    pub const SHA224: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.4");
    /// id-sha256 (2.16.840.1.101.3.4.2.1)
    pub const SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
    /// id-sha384 (2.16.840.1.101.3.4.2.2)
    pub const SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
    /// id-sha512 (2.16.840.1.101.3.4.2.3)
    pub const SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

    // RSA
    /// rsaEncryption (1.2.840.113549.1.1.1)
    pub const RSA_ENCRYPTION: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
    /// id-RSAES-OAEP (1.2.840.113549.1.1.7)
    pub const RSAES_OAEP: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.7");
    /// id-mgf1 (1.2.840.113549.1.1.8)
    pub const MGF1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.8");
    /// id-ecPublicKey
    pub const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
    /// id-dsa
    pub const DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");
    /// md5WithRSAEncryption
    pub const MD5_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.4");
    /// sha1WithRSAEncryption
    pub const SHA1_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
    /// sha224WithRSAEncryption
    pub const SHA224_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.14");
    /// sha256WithRSAEncryption
    pub const SHA256_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
    /// sha384WithRSAEncryption
    pub const SHA384_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
    /// sha512WithRSAEncryption
    pub const SHA512_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

    // DSA
    /// id-dsa-with-sha1
    pub const SHA1_WITH_DSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.3");
    /// id-dsa-with-sha224
    pub const SHA224_WITH_DSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.1");
    /// id-dsa-with-sha256
    pub const SHA256_WITH_DSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.2");
    /// id-dsa-with-sha384
    pub const SHA384_WITH_DSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.3");
    /// id-dsa-with-sha512
    pub const SHA512_WITH_DSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.3.4");

    // ECDSA
    /// ecdsa-with-SHA1
    pub const SHA1_WITH_ECDSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
    /// ecdsa-with-SHA224
    pub const SHA224_WITH_ECDSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.1");
    /// ecdsa-with-SHA256
    pub const SHA256_WITH_ECDSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
    /// ecdsa-with-SHA384
    pub const SHA384_WITH_ECDSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
    /// ecdsa-with-SHA512
    pub const SHA512_WITH_ECDSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

    // Content encryption
    /// des-ede3-cbc
    pub const DES_EDE3_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.3.7");
    /// rc2-cbc
    pub const RC2_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.3.2");
    /// aes128-CBC
    pub const AES128_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.2");
    /// aes192-CBC
    pub const AES192_CBC: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.22");
    /// aes256-CBC
    pub const AES256_CBC: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.42");
    /// aes128-GCM
    pub const AES128_GCM: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.6");
    /// aes192-GCM
    pub const AES192_GCM: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.26");
    /// aes256-GCM
    pub const AES256_GCM: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.46");
    /// aes128-CCM
    pub const AES128_CCM: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.7");
    /// aes192-CCM
    pub const AES192_CCM: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.27");
    /// aes256-CCM
    pub const AES256_CCM: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.1.47");

    // Compression
    /// id-alg-zlibCompress (RFC 3274)
    pub const ZLIB: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.3.8");

    // CMS content types
    /// id-data
    pub const DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
    /// id-signedData
    pub const SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
    /// id-envelopedData
    pub const ENVELOPED_DATA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.3");
    /// id-ct-compressedData
    pub const COMPRESSED_DATA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.9");
    /// id-ct-authEnvelopedData
    pub const AUTH_ENVELOPED_DATA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.23");

    // Signed attributes
    /// id-contentType
    pub const ATTR_CONTENT_TYPE: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
    /// id-messageDigest
    pub const ATTR_MESSAGE_DIGEST: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
    /// id-signingTime
    pub const ATTR_SIGNING_TIME: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
}

// ============================================================================
// Digest algorithms
// ============================================================================

/// Message digest algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// MD5 (legacy, still seen in old AS2 stacks)
    Md5,
    /// SHA-1
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// All digest algorithms, strongest last.
    pub const ALL: [DigestAlgorithm; 6] = [
        DigestAlgorithm::Md5,
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha224,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ];

    /// Object identifier.
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Md5 => oid::MD5,
            DigestAlgorithm::Sha1 => oid::SHA1,
            DigestAlgorithm::Sha224 => oid::SHA224,
            DigestAlgorithm::Sha256 => oid::SHA256,
            DigestAlgorithm::Sha384 => oid::SHA384,
            DigestAlgorithm::Sha512 => oid::SHA512,
        }
    }

    /// Look up by object identifier.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.oid() == *oid)
    }

    /// RFC3851 spelling (`sha256`).
    pub fn rfc3851_name(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha224 => "sha224",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    /// RFC5751 spelling (`sha-256`).
    pub fn rfc5751_name(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha1 => "sha-1",
            DigestAlgorithm::Sha224 => "sha-224",
            DigestAlgorithm::Sha256 => "sha-256",
            DigestAlgorithm::Sha384 => "sha-384",
            DigestAlgorithm::Sha512 => "sha-512",
        }
    }

    /// JCA spelling (`SHA-256`).
    pub fn jca_name(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha224 => "SHA-224",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Name in the requested MIC naming style.
    pub fn mic_name(self, style: MicAlgorithmStyle) -> &'static str {
        match style {
            MicAlgorithmStyle::Rfc3851 => self.rfc3851_name(),
            MicAlgorithmStyle::Rfc5751 => self.rfc5751_name(),
        }
    }

    /// Parse any spelling.
    pub fn from_name(name: &str) -> Option<Self> {
        let key = strip_digest_name(name);
        Self::ALL
            .into_iter()
            .find(|d| strip_digest_name(d.rfc3851_name()) == key)
    }

    /// Compute the digest of `data`.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Md5 => md5::Md5::digest(data).to_vec(),
            DigestAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
            DigestAlgorithm::Sha224 => sha2::Sha224::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => sha2::Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }

    /// AlgorithmIdentifier as written into CMS `digestAlgorithms`.
    pub fn algorithm_identifier(self) -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters: Some(Any::null()),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.jca_name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| CryptoError::UnsupportedAlgorithm(s.to_string()))
    }
}

/// Which digest spelling to emit in `micalg` and `Received-Content-MIC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MicAlgorithmStyle {
    /// `sha256`
    #[default]
    Rfc3851,
    /// `sha-256`
    Rfc5751,
}

impl MicAlgorithmStyle {
    /// Detect the style of a digest name. Names without a hyphenated
    /// variant (e.g. `md5`) report RFC3851.
    pub fn of(name: &str) -> Self {
        if name.trim().to_ascii_lowercase().starts_with("sha-") {
            MicAlgorithmStyle::Rfc5751
        } else {
            MicAlgorithmStyle::Rfc3851
        }
    }
}

// ============================================================================
// Signing algorithms
// ============================================================================

/// Public-key family of a signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSA PKCS#1 v1.5
    Rsa,
    /// DSA
    Dsa,
    /// ECDSA
    Ecdsa,
}

impl KeyAlgorithm {
    fn suffix(self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Dsa => "DSA",
            KeyAlgorithm::Ecdsa => "ECDSA",
        }
    }
}

/// Signature algorithm (digest + key family).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningAlgorithm {
    /// Digest used for the signed attributes and MIC.
    pub digest: DigestAlgorithm,
    /// Key family.
    pub key: KeyAlgorithm,
}

impl SigningAlgorithm {
    /// Construct an RSA signature algorithm.
    pub const fn rsa(digest: DigestAlgorithm) -> Self {
        Self {
            digest,
            key: KeyAlgorithm::Rsa,
        }
    }

    /// Object identifier, or `None` for combinations without one
    /// (MD5 with DSA/ECDSA).
    pub fn oid(self) -> Option<ObjectIdentifier> {
        use DigestAlgorithm as D;
        use KeyAlgorithm as K;
        let oid = match (self.key, self.digest) {
            (K::Rsa, D::Md5) => oid::MD5_WITH_RSA,
            (K::Rsa, D::Sha1) => oid::SHA1_WITH_RSA,
            (K::Rsa, D::Sha224) => oid::SHA224_WITH_RSA,
            (K::Rsa, D::Sha256) => oid::SHA256_WITH_RSA,
            (K::Rsa, D::Sha384) => oid::SHA384_WITH_RSA,
            (K::Rsa, D::Sha512) => oid::SHA512_WITH_RSA,
            (K::Dsa, D::Sha1) => oid::SHA1_WITH_DSA,
            (K::Dsa, D::Sha224) => oid::SHA224_WITH_DSA,
            (K::Dsa, D::Sha256) => oid::SHA256_WITH_DSA,
            (K::Dsa, D::Sha384) => oid::SHA384_WITH_DSA,
            (K::Dsa, D::Sha512) => oid::SHA512_WITH_DSA,
            (K::Ecdsa, D::Sha1) => oid::SHA1_WITH_ECDSA,
            (K::Ecdsa, D::Sha224) => oid::SHA224_WITH_ECDSA,
            (K::Ecdsa, D::Sha256) => oid::SHA256_WITH_ECDSA,
            (K::Ecdsa, D::Sha384) => oid::SHA384_WITH_ECDSA,
            (K::Ecdsa, D::Sha512) => oid::SHA512_WITH_ECDSA,
            (K::Dsa | K::Ecdsa, D::Md5) => return None,
        };
        Some(oid)
    }

    /// Canonical name, e.g. `SHA256withRSA`.
    pub fn name(self) -> String {
        let digest = self.digest.rfc3851_name().to_ascii_uppercase();
        format!("{digest}with{}", self.key.suffix())
    }

    /// Parse `SHA256withRSA`, `SHA-256withRSA`, `sha256WithRSAEncryption`, ...
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let (digest, key) = lower.split_once("with")?;
        let digest = DigestAlgorithm::from_name(digest)?;
        let key = match key.trim_end_matches("encryption") {
            "rsa" => KeyAlgorithm::Rsa,
            "dsa" => KeyAlgorithm::Dsa,
            "ecdsa" => KeyAlgorithm::Ecdsa,
            _ => return None,
        };
        let alg = Self { digest, key };
        alg.oid().map(|_| alg)
    }

    /// All combinations that have an object identifier.
    pub fn all() -> impl Iterator<Item = SigningAlgorithm> {
        [KeyAlgorithm::Rsa, KeyAlgorithm::Dsa, KeyAlgorithm::Ecdsa]
            .into_iter()
            .flat_map(|key| {
                DigestAlgorithm::ALL
                    .into_iter()
                    .map(move |digest| SigningAlgorithm { digest, key })
            })
            .filter(|alg| alg.oid().is_some())
    }

    /// Look up by object identifier.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::all().find(|alg| alg.oid().as_ref() == Some(oid))
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| CryptoError::UnsupportedAlgorithm(s.to_string()))
    }
}

// ============================================================================
// Content encryption algorithms
// ============================================================================

/// Content encryption algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    /// Triple DES (EDE3) in CBC mode
    TripleDes,
    /// RC2 in CBC mode, 128-bit effective key
    Rc2,
    /// AES-128-CBC
    Aes128Cbc,
    /// AES-192-CBC
    Aes192Cbc,
    /// AES-256-CBC
    Aes256Cbc,
    /// AES-128-CCM
    Aes128Ccm,
    /// AES-192-CCM
    Aes192Ccm,
    /// AES-256-CCM
    Aes256Ccm,
    /// AES-128-GCM
    #[default]
    Aes128Gcm,
    /// AES-192-GCM
    Aes192Gcm,
    /// AES-256-GCM
    Aes256Gcm,
}

/// Block mode family of an [`EncryptionAlgorithm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    /// Unauthenticated CBC, carried in EnvelopedData
    Cbc,
    /// Authenticated CCM, carried in AuthEnvelopedData
    Ccm,
    /// Authenticated GCM, carried in AuthEnvelopedData
    Gcm,
}

impl EncryptionAlgorithm {
    /// Every supported encryption algorithm.
    pub const ALL: [EncryptionAlgorithm; 11] = [
        EncryptionAlgorithm::TripleDes,
        EncryptionAlgorithm::Rc2,
        EncryptionAlgorithm::Aes128Cbc,
        EncryptionAlgorithm::Aes192Cbc,
        EncryptionAlgorithm::Aes256Cbc,
        EncryptionAlgorithm::Aes128Ccm,
        EncryptionAlgorithm::Aes192Ccm,
        EncryptionAlgorithm::Aes256Ccm,
        EncryptionAlgorithm::Aes128Gcm,
        EncryptionAlgorithm::Aes192Gcm,
        EncryptionAlgorithm::Aes256Gcm,
    ];

    /// Object identifier.
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            EncryptionAlgorithm::TripleDes => oid::DES_EDE3_CBC,
            EncryptionAlgorithm::Rc2 => oid::RC2_CBC,
            EncryptionAlgorithm::Aes128Cbc => oid::AES128_CBC,
            EncryptionAlgorithm::Aes192Cbc => oid::AES192_CBC,
            EncryptionAlgorithm::Aes256Cbc => oid::AES256_CBC,
            EncryptionAlgorithm::Aes128Ccm => oid::AES128_CCM,
            EncryptionAlgorithm::Aes192Ccm => oid::AES192_CCM,
            EncryptionAlgorithm::Aes256Ccm => oid::AES256_CCM,
            EncryptionAlgorithm::Aes128Gcm => oid::AES128_GCM,
            EncryptionAlgorithm::Aes192Gcm => oid::AES192_GCM,
            EncryptionAlgorithm::Aes256Gcm => oid::AES256_GCM,
        }
    }

    /// Look up by object identifier.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.oid() == *oid)
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            EncryptionAlgorithm::TripleDes => "3DES",
            EncryptionAlgorithm::Rc2 => "RC2",
            EncryptionAlgorithm::Aes128Cbc => "AES128_CBC",
            EncryptionAlgorithm::Aes192Cbc => "AES192_CBC",
            EncryptionAlgorithm::Aes256Cbc => "AES256_CBC",
            EncryptionAlgorithm::Aes128Ccm => "AES128_CCM",
            EncryptionAlgorithm::Aes192Ccm => "AES192_CCM",
            EncryptionAlgorithm::Aes256Ccm => "AES256_CCM",
            EncryptionAlgorithm::Aes128Gcm => "AES128_GCM",
            EncryptionAlgorithm::Aes192Gcm => "AES192_GCM",
            EncryptionAlgorithm::Aes256Gcm => "AES256_GCM",
        }
    }

    /// Parse a name; `-` and `_` are interchangeable and `AES128` alone
    /// means CBC. `DESede` and `DES_EDE3_CBC` alias 3DES.
    pub fn from_name(name: &str) -> Option<Self> {
        let key = name.trim().to_ascii_uppercase().replace('-', "_");
        let key = match key.as_str() {
            "DESEDE" | "DES_EDE3_CBC" | "TRIPLEDES" | "3DES_CBC" => "3DES",
            "RC2_CBC" => "RC2",
            "AES128" => "AES128_CBC",
            "AES192" => "AES192_CBC",
            "AES256" => "AES256_CBC",
            other => other,
        };
        Self::ALL.into_iter().find(|e| e.name() == key)
    }

    /// Symmetric key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            EncryptionAlgorithm::TripleDes => 24,
            EncryptionAlgorithm::Rc2 => 16,
            EncryptionAlgorithm::Aes128Cbc
            | EncryptionAlgorithm::Aes128Ccm
            | EncryptionAlgorithm::Aes128Gcm => 16,
            EncryptionAlgorithm::Aes192Cbc
            | EncryptionAlgorithm::Aes192Ccm
            | EncryptionAlgorithm::Aes192Gcm => 24,
            EncryptionAlgorithm::Aes256Cbc
            | EncryptionAlgorithm::Aes256Ccm
            | EncryptionAlgorithm::Aes256Gcm => 32,
        }
    }

    /// Block mode.
    pub fn mode(self) -> CipherMode {
        match self {
            EncryptionAlgorithm::TripleDes
            | EncryptionAlgorithm::Rc2
            | EncryptionAlgorithm::Aes128Cbc
            | EncryptionAlgorithm::Aes192Cbc
            | EncryptionAlgorithm::Aes256Cbc => CipherMode::Cbc,
            EncryptionAlgorithm::Aes128Ccm
            | EncryptionAlgorithm::Aes192Ccm
            | EncryptionAlgorithm::Aes256Ccm => CipherMode::Ccm,
            EncryptionAlgorithm::Aes128Gcm
            | EncryptionAlgorithm::Aes192Gcm
            | EncryptionAlgorithm::Aes256Gcm => CipherMode::Gcm,
        }
    }

    /// Whether the algorithm is authenticated (AuthEnvelopedData).
    pub fn is_authenticated(self) -> bool {
        self.mode() != CipherMode::Cbc
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EncryptionAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| CryptoError::UnsupportedAlgorithm(s.to_string()))
    }
}

// ============================================================================
// Registry functions
// ============================================================================

/// Name used for the compression algorithm.
pub const ZLIB: &str = "ZLIB";

/// Canonical name for an object identifier.
pub fn name_for_oid(oid: &ObjectIdentifier) -> Option<String> {
    if let Some(d) = DigestAlgorithm::from_oid(oid) {
        return Some(d.jca_name().to_string());
    }
    if let Some(s) = SigningAlgorithm::from_oid(oid) {
        return Some(s.name());
    }
    if let Some(e) = EncryptionAlgorithm::from_oid(oid) {
        return Some(e.name().to_string());
    }
    (*oid == oid::ZLIB).then(|| ZLIB.to_string())
}

/// Object identifier for a name in any accepted spelling.
pub fn oid_for_name(name: &str) -> Option<ObjectIdentifier> {
    if let Some(d) = DigestAlgorithm::from_name(name) {
        return Some(d.oid());
    }
    if let Some(s) = SigningAlgorithm::from_name(name) {
        return s.oid();
    }
    if let Some(e) = EncryptionAlgorithm::from_name(name) {
        return Some(e.oid());
    }
    name.trim().eq_ignore_ascii_case(ZLIB).then_some(oid::ZLIB)
}

/// Whether the registry knows `name`.
pub fn is_supported(name: &str) -> bool {
    oid_for_name(name).is_some()
}

/// Digest implied by a signature algorithm name (`SHA256withRSA` -> `SHA-256`).
pub fn default_digest_for(signature_algorithm: &str) -> Option<DigestAlgorithm> {
    SigningAlgorithm::from_name(signature_algorithm).map(|s| s.digest)
}

/// Rewrite a digest name in RFC3851 style (`sha-256` -> `sha256`).
/// Unknown names are lowercased and returned without hyphens.
pub fn normalize_to_rfc3851(name: &str) -> String {
    match DigestAlgorithm::from_name(name) {
        Some(d) => d.rfc3851_name().to_string(),
        None => name.trim().to_ascii_lowercase().replace('-', ""),
    }
}

/// Rewrite a digest name in RFC5751 style (`sha256` -> `sha-256`).
pub fn normalize_to_rfc5751(name: &str) -> String {
    match DigestAlgorithm::from_name(name) {
        Some(d) => d.rfc5751_name().to_string(),
        None => name.trim().to_ascii_lowercase(),
    }
}

/// Rewrite a digest or signature name in JCA style
/// (`sha256` -> `SHA-256`, `sha256withrsa` -> `SHA256withRSA`).
pub fn normalize_jca_name(name: &str) -> String {
    if let Some(d) = DigestAlgorithm::from_name(name) {
        return d.jca_name().to_string();
    }
    if let Some(s) = SigningAlgorithm::from_name(name) {
        return s.name();
    }
    name.trim().to_string()
}

/// Compare two digest names ignoring case and hyphens.
pub fn same_digest(a: &str, b: &str) -> bool {
    strip_digest_name(a) == strip_digest_name(b)
}

fn strip_digest_name(name: &str) -> String {
    name.trim().replace('-', "").to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_digest() {
        assert!(same_digest("SHA-256", "sha256"));
        assert!(same_digest("SHA256", "SHA-256"));
        assert!(!same_digest("SHA-256", "SHA-1"));
        assert!(same_digest("md5", "MD5"));
    }

    #[test]
    fn test_digest_spellings() {
        for name in ["sha256", "sha-256", "SHA-256", "SHA256"] {
            assert_eq!(DigestAlgorithm::from_name(name), Some(DigestAlgorithm::Sha256));
        }
        assert_eq!(DigestAlgorithm::from_name("sha-3"), None);
        assert_eq!(DigestAlgorithm::Sha1.rfc5751_name(), "sha-1");
    }

    #[test]
    fn test_oid_round_trip_full_table() {
        let mut oids: Vec<ObjectIdentifier> =
            DigestAlgorithm::ALL.into_iter().map(|d| d.oid()).collect();
        oids.extend(SigningAlgorithm::all().filter_map(|s| s.oid()));
        oids.extend(EncryptionAlgorithm::ALL.into_iter().map(|e| e.oid()));
        oids.push(oid::ZLIB);

        for o in oids {
            let name = name_for_oid(&o).unwrap();
            assert_eq!(oid_for_name(&name), Some(o), "round trip of {name}");
            assert_eq!(name_for_oid(&oid_for_name(&name).unwrap()), Some(name));
        }
    }

    #[test]
    fn test_signature_table_size() {
        // 6 RSA + 5 DSA + 5 ECDSA
        assert_eq!(SigningAlgorithm::all().count(), 16);
        assert!(SigningAlgorithm::from_name("MD5withDSA").is_none());
    }

    #[test]
    fn test_default_digest_for() {
        assert_eq!(default_digest_for("SHA256withRSA"), Some(DigestAlgorithm::Sha256));
        assert_eq!(
            default_digest_for("sha384WithRSAEncryption"),
            Some(DigestAlgorithm::Sha384)
        );
        assert_eq!(default_digest_for("SHA1withECDSA"), Some(DigestAlgorithm::Sha1));
        assert_eq!(default_digest_for("nonsense"), None);
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_to_rfc3851("SHA-256"), "sha256");
        assert_eq!(normalize_to_rfc5751("sha512"), "sha-512");
        assert_eq!(normalize_jca_name("sha1"), "SHA-1");
        assert_eq!(normalize_jca_name("sha256withrsa"), "SHA256withRSA");
    }

    #[test]
    fn test_encryption_aliases() {
        assert_eq!(
            EncryptionAlgorithm::from_name("aes128-gcm"),
            Some(EncryptionAlgorithm::Aes128Gcm)
        );
        assert_eq!(
            EncryptionAlgorithm::from_name("AES256"),
            Some(EncryptionAlgorithm::Aes256Cbc)
        );
        assert_eq!(
            EncryptionAlgorithm::from_name("DESede"),
            Some(EncryptionAlgorithm::TripleDes)
        );
        assert_eq!(EncryptionAlgorithm::default(), EncryptionAlgorithm::Aes128Gcm);
        assert!(!is_supported("IDEA"));
    }

    #[test]
    fn test_known_digest_vector() {
        let expected =
            hex_literal::hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(DigestAlgorithm::Sha256.digest(b"abc"), expected.to_vec());
    }

    #[test]
    fn test_mic_style_detection() {
        assert_eq!(MicAlgorithmStyle::of("sha-256"), MicAlgorithmStyle::Rfc5751);
        assert_eq!(MicAlgorithmStyle::of("sha256"), MicAlgorithmStyle::Rfc3851);
        assert_eq!(MicAlgorithmStyle::of("md5"), MicAlgorithmStyle::Rfc3851);
    }
}

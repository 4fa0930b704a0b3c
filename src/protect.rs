//! Protection seams.
//!
//! The engines never perform signature cryptography themselves; they hand
//! the DER of the protected part (header plus body) to a
//! [`MessageProtection`] when sending and to a [`ProtectionVerifier`] when
//! receiving. [`PasswordMac`] is the built-in shared-secret provider used
//! by the mock responder and the tests.

use der::asn1::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};
use spki::AlgorithmIdentifierOwned;

use crate::error::{CmpError, Result};
use crate::types::{EncryptedValue, PkiMessage};
use x509_cert::Certificate;

/// Digest algorithm selectable through the context options.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DigestAlg {
    /// SHA-256 (default).
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl DigestAlg {
    /// OID of the digest algorithm.
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            Self::Sha256 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1"),
            Self::Sha384 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2"),
            Self::Sha512 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3"),
        }
    }

    /// Digest `data` with this algorithm.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Computes protection bits for outbound messages.
///
/// Implementations decide the algorithm; signature-based providers live
/// outside this crate behind this trait.
pub trait MessageProtection: Send + Sync {
    /// Algorithm identifier placed into the header's protectionAlg field.
    fn algorithm(&self) -> AlgorithmIdentifierOwned;

    /// Compute the protection over the DER-encoded protected part.
    fn compute(&self, protected_part: &[u8]) -> Result<Vec<u8>>;
}

/// Verifies protection bits of inbound messages.
///
/// The full message is provided so implementations can consult
/// protectionAlg, senderKID and extraCerts when locating the key.
pub trait ProtectionVerifier: Send + Sync {
    /// Verify `protection` over the DER-encoded protected part.
    fn verify(&self, msg: &PkiMessage, protected_part: &[u8], protection: &[u8]) -> Result<()>;
}

/// Unwraps certificates returned encrypted for indirect proof of
/// possession.
pub trait CertDecrypter: Send + Sync {
    /// Decrypt an [`EncryptedValue`] into the certificate it carries.
    fn decrypt(&self, enc: &EncryptedValue) -> Result<Certificate>;
}

/// id-PasswordBasedMac (RFC 4210 Section 5.1.3.1).
pub const ID_PASSWORD_BASED_MAC: ObjectIdentifier = const_oid::db::rfc5912::ID_PASSWORD_BASED_MAC;

/// Shared-secret MAC protection.
///
/// Computes `digest(secret || protected part)` and advertises
/// id-PasswordBasedMac. Deterministic and key-symmetric, which is what the
/// in-process responder and the tests need; production deployments install
/// a signature-based provider instead.
#[derive(Clone)]
pub struct PasswordMac {
    secret: Vec<u8>,
    digest: DigestAlg,
}

impl PasswordMac {
    /// Create a provider over the given shared secret.
    pub fn new(secret: impl Into<Vec<u8>>, digest: DigestAlg) -> Self {
        Self {
            secret: secret.into(),
            digest,
        }
    }

    fn mac(&self, data: &[u8]) -> Vec<u8> {
        let mut input = self.secret.clone();
        input.extend_from_slice(data);
        self.digest.digest(&input)
    }
}

impl std::fmt::Debug for PasswordMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordMac")
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

impl MessageProtection for PasswordMac {
    fn algorithm(&self) -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: ID_PASSWORD_BASED_MAC,
            parameters: None,
        }
    }

    fn compute(&self, protected_part: &[u8]) -> Result<Vec<u8>> {
        Ok(self.mac(protected_part))
    }
}

impl ProtectionVerifier for PasswordMac {
    fn verify(&self, msg: &PkiMessage, protected_part: &[u8], protection: &[u8]) -> Result<()> {
        let alg = msg
            .header
            .protection_alg
            .as_ref()
            .ok_or_else(|| CmpError::protection("no protection algorithm in header"))?;
        if alg.oid != ID_PASSWORD_BASED_MAC {
            return Err(CmpError::protection(format!(
                "unsupported protection algorithm {}",
                alg.oid
            )));
        }
        if self.mac(protected_part) != protection {
            return Err(CmpError::protection("MAC mismatch"));
        }
        Ok(())
    }
}

//! Digital signature types and data structures.
//!
//! This module defines the options that shape a signature and the
//! [`Credential`] handle a caller passes in to sign with.

use std::fmt;
use std::sync::Arc;

use der::oid::ObjectIdentifier;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use super::keystore::{KeyMaterial, KeyStore, KeyStoreError};

/// Digest algorithm used for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-256 (recommended)
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Get the OID for this digest algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha256 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1"),
            DigestAlgorithm::Sha384 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2"),
            DigestAlgorithm::Sha512 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3"),
        }
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Hash `data` with this algorithm.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    Pkcs7Detached,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    #[default]
    CadesDetached,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
        }
    }
}

/// Options for signing a PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignOptions {
    /// Digest algorithm to use
    pub digest_algorithm: DigestAlgorithm,
    /// Signature sub-filter (format)
    pub sub_filter: SignatureSubFilter,
    /// Reason for signing
    pub reason: Option<String>,
    /// Location where the document was signed
    pub location: Option<String>,
    /// Contact information
    pub contact_info: Option<String>,
    /// Name of the signer (if different from certificate CN)
    pub name: Option<String>,
    /// Estimated signature size in bytes (for ByteRange calculation)
    pub estimated_size: usize,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            digest_algorithm: DigestAlgorithm::Sha256,
            sub_filter: SignatureSubFilter::CadesDetached,
            reason: None,
            location: None,
            contact_info: None,
            name: None,
            estimated_size: 8192,
        }
    }
}

impl SignOptions {
    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the contact information.
    pub fn with_contact_info(mut self, contact_info: impl Into<String>) -> Self {
        self.contact_info = Some(contact_info.into());
        self
    }

    /// Override the signer name taken from the certificate.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the digest algorithm.
    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Set the space reserved for the CMS container, in bytes.
    pub fn with_estimated_size(mut self, estimated_size: usize) -> Self {
        self.estimated_size = estimated_size;
        self
    }
}

/// Handle to a signing key: which keystore, which entry, and how to unlock it.
///
/// Only the passphrase is held; key material is fetched from the keystore
/// for the duration of a signing call.
#[derive(Clone)]
pub struct Credential {
    keystore: Arc<dyn KeyStore>,
    alias: String,
    passphrase: Zeroizing<String>,
}

impl Credential {
    /// Create a credential for `alias` in `keystore`.
    pub fn new(keystore: Arc<dyn KeyStore>, alias: impl Into<String>, passphrase: impl Into<String>) -> Self {
        Self {
            keystore,
            alias: alias.into(),
            passphrase: Zeroizing::new(passphrase.into()),
        }
    }

    /// Alias of the keystore entry.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Unlock the key and chain. The caller drops the material as soon as
    /// it has been used.
    pub(crate) fn retrieve(&self) -> Result<KeyMaterial, KeyStoreError> {
        self.keystore.retrieve(&self.alias, &self.passphrase)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("alias", &self.alias)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

//! Credential storage for signing keys.
//!
//! A [`KeyStore`] hands out a private key and its certificate chain when
//! given the right alias and passphrase. [`MemoryKeyStore`] keeps each key
//! as a PKCS#8 `EncryptedPrivateKeyInfo` (PBES2 with PBKDF2-SHA256 and
//! AES-256-CBC), so plaintext keys exist only inside [`KeyStore::retrieve`]
//! results.
//!
//! Errors never carry the passphrase.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use der::oid::ObjectIdentifier;
use der::{Decode, Encode};
use pkcs8::{pkcs5, DecodePrivateKey, EncryptedPrivateKeyInfo, PrivateKeyInfo};
use spki::DecodePublicKey;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{RsaPrivateKey, RsaPublicKey};
use x509_cert::Certificate;

/// rsaEncryption
const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
/// id-ecPublicKey
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// Default PBKDF2 iteration count for imported keys.
pub const DEFAULT_KDF_ITERATIONS: u32 = 50_000;

/// Errors raised by keystore access.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    /// The store is locked
    #[error("keystore is locked")]
    Locked,

    /// No entry under this alias
    #[error("no key under alias '{0}'")]
    UnknownAlias(String),

    /// The passphrase did not decrypt the key
    #[error("wrong passphrase for alias '{0}'")]
    BadPassphrase(String),

    /// The key algorithm is not RSA or ECDSA P-256
    #[error("unsupported key: {0}")]
    UnsupportedKey(String),

    /// The key or certificate data is malformed
    #[error("invalid keystore entry: {0}")]
    InvalidEntry(String),
}

/// Private key usable for signing.
pub enum SigningKey {
    /// RSA key, signs with PKCS#1 v1.5
    Rsa(RsaPrivateKey),
    /// ECDSA key on NIST P-256
    EcdsaP256(p256::ecdsa::SigningKey),
}

impl SigningKey {
    /// Decode an unencrypted PKCS#8 private key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, KeyStoreError> {
        let info = PrivateKeyInfo::try_from(der)
            .map_err(|e| KeyStoreError::InvalidEntry(format!("PKCS#8: {}", e)))?;
        let oid = info.algorithm.oid;
        if oid == RSA_ENCRYPTION {
            RsaPrivateKey::from_pkcs8_der(der)
                .map(SigningKey::Rsa)
                .map_err(|e| KeyStoreError::InvalidEntry(format!("RSA key: {}", e)))
        } else if oid == EC_PUBLIC_KEY {
            p256::ecdsa::SigningKey::from_pkcs8_der(der)
                .map(SigningKey::EcdsaP256)
                .map_err(|_| KeyStoreError::UnsupportedKey("EC key is not on P-256".into()))
        } else {
            Err(KeyStoreError::UnsupportedKey(format!("algorithm {}", oid)))
        }
    }

    /// Check that `cert_der` certifies the public half of this key.
    pub fn check_certificate(&self, cert_der: &[u8]) -> Result<(), KeyStoreError> {
        let cert = Certificate::from_der(cert_der)
            .map_err(|e| KeyStoreError::InvalidEntry(format!("signer certificate: {}", e)))?;
        let spki = &cert.tbs_certificate.subject_public_key_info;
        let matches = match self {
            SigningKey::Rsa(key) => spki
                .to_der()
                .ok()
                .and_then(|der| RsaPublicKey::from_public_key_der(&der).ok())
                .is_some_and(|public| public == key.to_public_key()),
            SigningKey::EcdsaP256(key) => spki
                .subject_public_key
                .as_bytes()
                .and_then(|point| p256::ecdsa::VerifyingKey::from_sec1_bytes(point).ok())
                .is_some_and(|public| &public == key.verifying_key()),
        };
        if matches {
            Ok(())
        } else {
            Err(KeyStoreError::InvalidEntry(format!(
                "signer certificate does not match the {} private key",
                self.algorithm()
            )))
        }
    }

    /// Short algorithm name.
    pub fn algorithm(&self) -> &'static str {
        match self {
            SigningKey::Rsa(_) => "RSA",
            SigningKey::EcdsaP256(_) => "ECDSA-P256",
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey({}, [REDACTED])", self.algorithm())
    }
}

/// A key and its certificate chain, leaf first.
///
/// Both key variants wipe their secret on drop.
#[derive(Debug)]
pub struct KeyMaterial {
    /// The private key
    pub key: SigningKey,
    /// DER certificates, signer certificate first
    pub chain: Vec<Vec<u8>>,
}

impl KeyMaterial {
    /// DER of the signer certificate.
    pub fn leaf(&self) -> Option<&[u8]> {
        self.chain.first().map(Vec::as_slice)
    }
}

/// Source of signing keys.
pub trait KeyStore: Send + Sync {
    /// Unlock the key stored under `alias` with `passphrase`.
    fn retrieve(&self, alias: &str, passphrase: &str) -> Result<KeyMaterial, KeyStoreError>;
}

struct KeyEntry {
    encrypted_key: Vec<u8>,
    chain: Vec<Vec<u8>>,
}

/// In-memory keystore with passphrase-encrypted entries.
pub struct MemoryKeyStore {
    entries: RwLock<BTreeMap<String, KeyEntry>>,
    locked: AtomicBool,
    kdf_iterations: u32,
}

impl MemoryKeyStore {
    /// Create an empty, unlocked store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            locked: AtomicBool::new(false),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        }
    }

    /// Use `iterations` PBKDF2 rounds for keys imported from now on.
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations.max(1);
        self
    }

    /// Encrypt an unencrypted PKCS#8 key under `passphrase` and store it
    /// with its certificate chain (leaf first).
    pub fn import(
        &self,
        alias: &str,
        pkcs8_der: &[u8],
        chain: Vec<Vec<u8>>,
        passphrase: &str,
    ) -> Result<(), KeyStoreError> {
        validate_chain(&chain)?;
        // Reject keys we could never sign with before storing them.
        SigningKey::from_pkcs8_der(pkcs8_der)?.check_certificate(&chain[0])?;

        let encrypted = self.encrypt_key(pkcs8_der, passphrase)?;
        self.insert_entry(alias, encrypted, chain)
    }

    fn encrypt_key(&self, pkcs8_der: &[u8], passphrase: &str) -> Result<Vec<u8>, KeyStoreError> {
        let info = PrivateKeyInfo::try_from(pkcs8_der)
            .map_err(|e| KeyStoreError::InvalidEntry(format!("PKCS#8: {}", e)))?;
        let mut salt = [0u8; 16];
        let mut iv = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut iv);
        let params = pkcs5::pbes2::Parameters::pbkdf2_sha256_aes256cbc(self.kdf_iterations, &salt, &iv)
            .map_err(|e| KeyStoreError::InvalidEntry(format!("PBES2 parameters: {}", e)))?;
        let encrypted = info
            .encrypt_with_params(params, passphrase.as_bytes())
            .map_err(|e| KeyStoreError::InvalidEntry(format!("key encryption: {}", e)))?;
        Ok(encrypted.as_bytes().to_vec())
    }

    /// Store an already encrypted key (`ENCRYPTED PRIVATE KEY` PEM) with a
    /// PEM bundle of certificates, leaf first.
    ///
    /// The key cannot be read without its passphrase, so whether the leaf
    /// certificate matches it is checked on [`KeyStore::retrieve`].
    pub fn insert_pem(&self, alias: &str, encrypted_key_pem: &str, chain_pem: &str) -> Result<(), KeyStoreError> {
        let mut encrypted_key = None;
        for pem in x509_parser::pem::Pem::iter_from_buffer(encrypted_key_pem.as_bytes()) {
            let pem = pem.map_err(|e| KeyStoreError::InvalidEntry(format!("key PEM: {}", e)))?;
            if pem.label == "ENCRYPTED PRIVATE KEY" {
                encrypted_key = Some(pem.contents);
                break;
            }
        }
        let encrypted_key = encrypted_key
            .ok_or_else(|| KeyStoreError::InvalidEntry("no ENCRYPTED PRIVATE KEY block".into()))?;
        EncryptedPrivateKeyInfo::try_from(encrypted_key.as_slice())
            .map_err(|e| KeyStoreError::InvalidEntry(format!("encrypted key: {}", e)))?;

        let mut chain = Vec::new();
        for pem in x509_parser::pem::Pem::iter_from_buffer(chain_pem.as_bytes()) {
            let pem = pem.map_err(|e| KeyStoreError::InvalidEntry(format!("certificate PEM: {}", e)))?;
            if pem.label == "CERTIFICATE" {
                chain.push(pem.contents);
            }
        }
        validate_chain(&chain)?;

        self.insert_entry(alias, encrypted_key, chain)
    }

    /// Remove an entry. Returns whether it existed.
    pub fn remove(&self, alias: &str) -> bool {
        match self.entries.write() {
            Ok(mut entries) => entries.remove(alias).is_some(),
            Err(_) => false,
        }
    }

    /// Refuse all retrievals until [`unlock`](Self::unlock).
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    /// Allow retrievals again.
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    /// Whether the store is locked.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// Stored aliases in sorted order.
    pub fn aliases(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn insert_entry(&self, alias: &str, encrypted_key: Vec<u8>, chain: Vec<Vec<u8>>) -> Result<(), KeyStoreError> {
        if alias.is_empty() {
            return Err(KeyStoreError::InvalidEntry("empty alias".into()));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| KeyStoreError::InvalidEntry("keystore poisoned".into()))?;
        entries.insert(alias.to_string(), KeyEntry { encrypted_key, chain });
        log::debug!("Stored key under alias '{}'", alias);
        Ok(())
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryKeyStore")
            .field("aliases", &self.aliases())
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl KeyStore for MemoryKeyStore {
    fn retrieve(&self, alias: &str, passphrase: &str) -> Result<KeyMaterial, KeyStoreError> {
        if self.is_locked() {
            return Err(KeyStoreError::Locked);
        }
        let entries = self
            .entries
            .read()
            .map_err(|_| KeyStoreError::InvalidEntry("keystore poisoned".into()))?;
        let entry = entries
            .get(alias)
            .ok_or_else(|| KeyStoreError::UnknownAlias(alias.to_string()))?;

        let encrypted = EncryptedPrivateKeyInfo::try_from(entry.encrypted_key.as_slice())
            .map_err(|e| KeyStoreError::InvalidEntry(format!("encrypted key: {}", e)))?;
        let secret = encrypted
            .decrypt(passphrase.as_bytes())
            .map_err(|_| KeyStoreError::BadPassphrase(alias.to_string()))?;
        // A wrong passphrase can still yield valid padding; the result then
        // fails to parse as PKCS#8.
        PrivateKeyInfo::try_from(secret.as_bytes())
            .map_err(|_| KeyStoreError::BadPassphrase(alias.to_string()))?;
        let key = SigningKey::from_pkcs8_der(secret.as_bytes())?;
        let leaf = entry
            .chain
            .first()
            .ok_or_else(|| KeyStoreError::InvalidEntry("empty certificate chain".into()))?;
        key.check_certificate(leaf)?;

        Ok(KeyMaterial {
            key,
            chain: entry.chain.clone(),
        })
    }
}

fn validate_chain(chain: &[Vec<u8>]) -> Result<(), KeyStoreError> {
    if chain.is_empty() {
        return Err(KeyStoreError::InvalidEntry("empty certificate chain".into()));
    }
    for (i, der) in chain.iter().enumerate() {
        x509_parser::parse_x509_certificate(der)
            .map_err(|e| KeyStoreError::InvalidEntry(format!("certificate {}: {}", i, e)))?;
    }
    Ok(())
}

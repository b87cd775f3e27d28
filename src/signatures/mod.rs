//! PDF Digital Signatures module.
//!
//! Binds stamped images to a detached signature over the whole document,
//! following the PDF specification and PAdES (PDF Advanced Electronic
//! Signatures).
//!
//! ## Features
//!
//! - **Visible signatures**: each signature element becomes a widget whose
//!   appearance is the element's image
//! - **One container per document**: all widgets share one signature value
//! - **Keystore abstraction**: keys are unlocked per signing call and dropped
//! - **ByteRange handling**: placeholders patched in place after writing
//!
//! ## Signature Types Supported
//!
//! - PAdES signatures (ETSI.CAdES.detached), the default
//! - PKCS#7 detached signatures (adbe.pkcs7.detached)
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pdf_stamper::signatures::{Credential, MemoryKeyStore, SignOptions, SignatureBinder};
//! use pdf_stamper::writer::ContentWriter;
//!
//! let store = Arc::new(MemoryKeyStore::new());
//! store.import("signer", &pkcs8_der, vec![cert_der], "passphrase")?;
//! let credential = Credential::new(store, "signer", "passphrase");
//!
//! let mut writer = ContentWriter::open(&source)?;
//! let mut binder = SignatureBinder::new(SignOptions::default());
//! binder.sign(&mut writer, &raster, &rect, 1, "sig_p0_e0", &credential)?;
//! let signed = binder.finish(writer, &credential)?;
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - ISO 32000-2:2020 Section 12.8 - Digital Signatures
//! - ETSI TS 102 778 - PAdES
//! - RFC 5652 (CMS), RFC 5035 (ESS signing-certificate-v2)

mod appearance;
mod binder;
mod byterange;
mod keystore;
mod signer;
mod types;

pub use appearance::graphic_appearance;
pub use binder::SignatureBinder;
pub use byterange::{ByteRangeCalculator, PlaceholderLocation, BYTE_RANGE_PLACEHOLDER};
pub use keystore::{KeyMaterial, KeyStore, KeyStoreError, MemoryKeyStore, SigningKey, DEFAULT_KDF_ITERATIONS};
pub use signer::{signer_common_name, PdfSigner};
pub use types::{Credential, DigestAlgorithm, SignOptions, SignatureSubFilter};

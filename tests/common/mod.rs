//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use lopdf::{dictionary, Document as LoDocument, Object, ObjectId, Stream};
use pdf_stamper::signatures::{Credential, MemoryKeyStore};
use pkcs8::EncodePrivateKey;
use rand::rngs::OsRng;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::Encode;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;

pub const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

pub const PASSPHRASE: &str = "integration-pass";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A PDF with `page_count` pages, each with its own MediaBox and one line of text.
pub fn fixture_pdf(page_count: usize, media_box: [f32; 4]) -> Vec<u8> {
    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let mut kids = Vec::new();
    for i in 0..page_count {
        let content = format!("BT /F1 12 Tf 1 0 0 RG 72 700 Td (Fixture page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Opaque PNG of one color.
pub fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageOutputFormat::Png)
        .unwrap();
    out
}

/// Page object ids, 1-based.
pub fn page_ids(pdf: &[u8]) -> Vec<ObjectId> {
    let doc = LoDocument::load_mem(pdf).unwrap();
    doc.get_pages().values().copied().collect()
}

/// Number of image XObjects in the file.
pub fn image_count(pdf: &[u8]) -> usize {
    let doc = LoDocument::load_mem(pdf).unwrap();
    doc.objects
        .values()
        .filter(|obj| match obj {
            Object::Stream(stream) => stream
                .dict
                .get(b"Subtype")
                .and_then(|s| s.as_name())
                .map(|name| name == b"Image")
                .unwrap_or(false),
            _ => false,
        })
        .count()
}

/// Decoded content of page `page_number` (1-based).
pub fn page_content(pdf: &[u8], page_number: u32) -> Vec<u8> {
    let doc = LoDocument::load_mem(pdf).unwrap();
    let page_id = doc.get_pages()[&page_number];
    doc.get_page_content(page_id).unwrap()
}

/// Self-signed RSA identity: (PKCS#8 key, certificate DER).
pub fn rsa_identity(common_name: &str) -> (Vec<u8>, Vec<u8>) {
    let key = rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let pkcs8 = key.to_pkcs8_der().unwrap().as_bytes().to_vec();
    let spki = SubjectPublicKeyInfoOwned::from_key(key.to_public_key()).unwrap();
    let signer = rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(key);
    let builder = CertificateBuilder::new(
        Profile::Root,
        SerialNumber::from(42u32),
        Validity::from_now(Duration::from_secs(3600)).unwrap(),
        Name::from_str(&format!("CN={},O=Stamper Tests", common_name)).unwrap(),
        spki,
        &signer,
    )
    .unwrap();
    let cert = builder.build::<rsa::pkcs1v15::Signature>().unwrap();
    (pkcs8, cert.to_der().unwrap())
}

/// Self-signed P-256 identity: (PKCS#8 key, certificate DER).
pub fn p256_identity(common_name: &str) -> (Vec<u8>, Vec<u8>) {
    let key = p256::ecdsa::SigningKey::random(&mut OsRng);
    let pkcs8 = key.to_pkcs8_der().unwrap().as_bytes().to_vec();
    let spki = SubjectPublicKeyInfoOwned::from_key(*key.verifying_key()).unwrap();
    let builder = CertificateBuilder::new(
        Profile::Root,
        SerialNumber::from(43u32),
        Validity::from_now(Duration::from_secs(3600)).unwrap(),
        Name::from_str(&format!("CN={}", common_name)).unwrap(),
        spki,
        &key,
    )
    .unwrap();
    let cert = builder.build::<p256::ecdsa::DerSignature>().unwrap();
    (pkcs8, cert.to_der().unwrap())
}

/// A P-256 signer certificate issued by a separate P-256 CA.
pub struct ChainedIdentity {
    pub leaf_key: Vec<u8>,
    pub leaf: Vec<u8>,
    pub ca: Vec<u8>,
}

pub fn chained_p256_identity(common_name: &str) -> ChainedIdentity {
    let ca_key = p256::ecdsa::SigningKey::random(&mut OsRng);
    let ca_name = Name::from_str("CN=Stamper Test CA,O=Stamper Tests").unwrap();
    let ca = CertificateBuilder::new(
        Profile::Root,
        SerialNumber::from(1u32),
        Validity::from_now(Duration::from_secs(7200)).unwrap(),
        ca_name.clone(),
        SubjectPublicKeyInfoOwned::from_key(*ca_key.verifying_key()).unwrap(),
        &ca_key,
    )
    .unwrap()
    .build::<p256::ecdsa::DerSignature>()
    .unwrap();

    let leaf_key = p256::ecdsa::SigningKey::random(&mut OsRng);
    let leaf = CertificateBuilder::new(
        Profile::Leaf {
            issuer: ca_name,
            enable_key_agreement: false,
            enable_key_encipherment: false,
        },
        SerialNumber::from(2u32),
        Validity::from_now(Duration::from_secs(3600)).unwrap(),
        Name::from_str(&format!("CN={}", common_name)).unwrap(),
        SubjectPublicKeyInfoOwned::from_key(*leaf_key.verifying_key()).unwrap(),
        &ca_key,
    )
    .unwrap()
    .build::<p256::ecdsa::DerSignature>()
    .unwrap();

    ChainedIdentity {
        leaf_key: leaf_key.to_pkcs8_der().unwrap().as_bytes().to_vec(),
        leaf: leaf.to_der().unwrap(),
        ca: ca.to_der().unwrap(),
    }
}

/// Keystore holding one identity under `alias`, and a credential for it.
pub fn credential_for(alias: &str, pkcs8: &[u8], cert: Vec<u8>) -> Credential {
    credential_with_chain(alias, pkcs8, vec![cert])
}

/// Like [`credential_for`] with a full chain, leaf first.
pub fn credential_with_chain(alias: &str, pkcs8: &[u8], chain: Vec<Vec<u8>>) -> Credential {
    let store = MemoryKeyStore::new().with_kdf_iterations(1000);
    store.import(alias, pkcs8, chain, PASSPHRASE).unwrap();
    Credential::new(Arc::new(store), alias, PASSPHRASE)
}

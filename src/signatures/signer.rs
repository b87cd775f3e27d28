//! PDF signing implementation.
//!
//! [`PdfSigner`] produces the signature dictionary written into the
//! document and, once the document bytes are final, the detached CMS
//! `SignedData` container that goes into its `/Contents`.

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::signed_data::{EncapsulatedContentInfo, SignerIdentifier};
use der::asn1::{GeneralizedTime, OctetString, SetOfVec, UtcTime};
use der::oid::ObjectIdentifier;
use der::{Any, Decode, Encode, EncodeValue, Tagged};
use lopdf::{dictionary, Dictionary, Object, StringFormat};
use sha2::{Digest, Sha256};
use signature::{Keypair, Signer};
use spki::{AlgorithmIdentifierOwned, DynSignatureAlgorithmIdentifier, EncodePublicKey, SignatureBitStringEncoding};
use x509_cert::attr::Attribute;
use x509_cert::time::Time;
use x509_cert::Certificate;

use super::byterange::ByteRangeCalculator;
use super::keystore::{KeyMaterial, SigningKey};
use super::types::{DigestAlgorithm, SignOptions};
use crate::error::{Error, Result};

/// id-data
const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
/// id-signingTime
const ID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
/// id-aa-signingCertificateV2
const ID_SIGNING_CERTIFICATE_V2: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.2.47");

/// ESSCertIDv2 with the default (SHA-256) hash algorithm and no issuer serial.
#[derive(Clone, Debug, Eq, PartialEq, der::Sequence)]
struct EssCertIdV2 {
    cert_hash: OctetString,
}

/// SigningCertificateV2 without policies.
#[derive(Clone, Debug, Eq, PartialEq, der::Sequence)]
struct SigningCertificateV2 {
    certs: Vec<EssCertIdV2>,
}

/// PDF signer that creates digital signatures.
#[derive(Debug, Clone)]
pub struct PdfSigner {
    options: SignOptions,
    byte_range_calc: ByteRangeCalculator,
}

impl PdfSigner {
    /// Create a new PDF signer with the given options.
    pub fn new(options: SignOptions) -> Self {
        let byte_range_calc = ByteRangeCalculator::new(options.estimated_size);
        Self {
            options,
            byte_range_calc,
        }
    }

    /// Get the placeholder size for the signature.
    pub fn placeholder_size(&self) -> usize {
        self.byte_range_calc.placeholder_size()
    }

    /// The calculator sized for this signer's placeholder.
    pub fn byte_range_calculator(&self) -> &ByteRangeCalculator {
        &self.byte_range_calc
    }

    /// Build the signature dictionary with ByteRange and /Contents placeholders.
    ///
    /// `/ByteRange` is inserted before `/Contents`; both are patched once
    /// the document has been written.
    pub fn build_signature_dictionary(&self, signer_name: Option<&str>, signing_time: DateTime<Utc>) -> Dictionary {
        let byte_range: Vec<Object> = ByteRangeCalculator::placeholder_byte_range()
            .iter()
            .map(|&v| Object::Integer(v))
            .collect();
        let mut dict = dictionary! {
            "Type" => "Sig",
            "Filter" => "Adobe.PPKLite",
            "SubFilter" => self.options.sub_filter.as_pdf_name(),
            "ByteRange" => byte_range,
            "Contents" => Object::String(
                vec![0u8; self.byte_range_calc.capacity()],
                StringFormat::Hexadecimal,
            ),
            "M" => Object::string_literal(format_pdf_date(signing_time)),
        };

        if let Some(name) = self.options.name.as_deref().or(signer_name) {
            dict.set("Name", text_string(name));
        }
        if let Some(ref reason) = self.options.reason {
            dict.set("Reason", text_string(reason));
        }
        if let Some(ref location) = self.options.location {
            dict.set("Location", text_string(location));
        }
        if let Some(ref contact) = self.options.contact_info {
            dict.set("ContactInfo", text_string(contact));
        }
        dict
    }

    /// Compute the digest of the signed bytes.
    pub fn compute_digest(&self, signed_bytes: &[u8]) -> Vec<u8> {
        self.options.digest_algorithm.digest(signed_bytes)
    }

    /// Create the DER-encoded detached CMS `SignedData` for `digest`.
    ///
    /// Signed attributes are content-type, message-digest, signing-time and
    /// ESS signing-certificate-v2. The whole chain in `material` is embedded.
    pub fn create_signature(
        &self,
        digest: &[u8],
        material: &KeyMaterial,
        signing_time: DateTime<Utc>,
    ) -> Result<Vec<u8>> {
        let certificates = material
            .chain
            .iter()
            .map(|der| Certificate::from_der(der))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::CredentialError(format!("certificate chain: {}", e)))?;
        let leaf_der = material
            .leaf()
            .ok_or_else(|| Error::CredentialError("empty certificate chain".into()))?;
        material.key.check_certificate(leaf_der)?;
        let leaf = &certificates[0];

        let parts = CmsParts {
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: leaf.tbs_certificate.issuer.clone(),
                serial_number: leaf.tbs_certificate.serial_number.clone(),
            }),
            digest_algorithm: AlgorithmIdentifierOwned {
                oid: self.options.digest_algorithm.oid(),
                parameters: None,
            },
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_DATA,
                econtent: None,
            },
            attributes: vec![
                signing_time_attribute(signing_time)?,
                signing_certificate_attribute(leaf_der)?,
            ],
            certificates,
            message_digest: digest,
        };

        match (&material.key, self.options.digest_algorithm) {
            (SigningKey::Rsa(key), DigestAlgorithm::Sha256) => parts
                .assemble::<_, rsa::pkcs1v15::Signature>(&rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone())),
            (SigningKey::Rsa(key), DigestAlgorithm::Sha384) => parts.assemble::<_, rsa::pkcs1v15::Signature>(
                &rsa::pkcs1v15::SigningKey::<sha2::Sha384>::new(key.clone()),
            ),
            (SigningKey::Rsa(key), DigestAlgorithm::Sha512) => parts.assemble::<_, rsa::pkcs1v15::Signature>(
                &rsa::pkcs1v15::SigningKey::<sha2::Sha512>::new(key.clone()),
            ),
            (SigningKey::EcdsaP256(key), DigestAlgorithm::Sha256) => {
                parts.assemble::<_, p256::ecdsa::DerSignature>(key)
            },
            (SigningKey::EcdsaP256(_), other) => Err(Error::CredentialError(format!(
                "ECDSA P-256 keys sign with SHA-256, not {}",
                other.name()
            ))),
        }
    }

    /// Calculate the ByteRange for a document with the signature value at `contents_offset`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        self.byte_range_calc.calculate_byte_range(file_size, contents_offset)
    }

    /// Extract the bytes covered by `byte_range`.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        ByteRangeCalculator::extract_signed_bytes(pdf_data, byte_range)
    }

    /// Hex-encode `signature` into the placeholder at `contents_offset`.
    pub fn insert_signature(&self, pdf_data: &mut [u8], contents_offset: usize, signature: &[u8]) -> Result<()> {
        if signature.len() > self.byte_range_calc.capacity() {
            return Err(Error::ProcessingError(format!(
                "Signature of {} bytes does not fit the {}-byte placeholder",
                signature.len(),
                self.byte_range_calc.capacity()
            )));
        }
        self.byte_range_calc
            .insert_signature(pdf_data, contents_offset, &bytes_to_hex(signature))
    }
}

struct CmsParts<'a> {
    sid: SignerIdentifier,
    digest_algorithm: AlgorithmIdentifierOwned,
    encap_content_info: EncapsulatedContentInfo,
    attributes: Vec<Attribute>,
    certificates: Vec<Certificate>,
    message_digest: &'a [u8],
}

impl CmsParts<'_> {
    fn assemble<S, Sig>(self, signer: &S) -> Result<Vec<u8>>
    where
        S: Keypair + DynSignatureAlgorithmIdentifier + Signer<Sig>,
        S::VerifyingKey: EncodePublicKey,
        Sig: SignatureBitStringEncoding,
    {
        let mut signer_info = SignerInfoBuilder::new(
            signer,
            self.sid,
            self.digest_algorithm.clone(),
            &self.encap_content_info,
            Some(self.message_digest),
        )
        .map_err(cms_error)?;
        for attribute in self.attributes {
            signer_info.add_signed_attribute(attribute).map_err(cms_error)?;
        }

        let mut builder = SignedDataBuilder::new(&self.encap_content_info);
        builder
            .add_digest_algorithm(self.digest_algorithm)
            .map_err(cms_error)?;
        for certificate in self.certificates {
            builder
                .add_certificate(CertificateChoices::Certificate(certificate))
                .map_err(cms_error)?;
        }
        builder
            .add_signer_info::<S, Sig>(signer_info)
            .map_err(cms_error)?;
        let content_info = builder.build().map_err(cms_error)?;
        Ok(content_info.to_der()?)
    }
}

fn cms_error<E: std::fmt::Debug>(err: E) -> Error {
    Error::ProcessingError(format!("CMS assembly failed: {:?}", err))
}

fn attribute<T: Tagged + EncodeValue>(oid: ObjectIdentifier, value: &T) -> Result<Attribute> {
    let value = Any::encode_from(value)?;
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}

fn signing_time_attribute(signing_time: DateTime<Utc>) -> Result<Attribute> {
    let seconds = u64::try_from(signing_time.timestamp())
        .map_err(|_| Error::ProcessingError(format!("signing time {} predates 1970", signing_time)))?;
    let since_epoch = Duration::from_secs(seconds);
    // RFC 5280: UTCTime through 2049, GeneralizedTime after
    let time = if signing_time.year() < 2050 {
        Time::UtcTime(UtcTime::from_unix_duration(since_epoch)?)
    } else {
        Time::GeneralTime(GeneralizedTime::from_unix_duration(since_epoch)?)
    };
    attribute(ID_SIGNING_TIME, &time)
}

fn signing_certificate_attribute(leaf_der: &[u8]) -> Result<Attribute> {
    let value = SigningCertificateV2 {
        certs: vec![EssCertIdV2 {
            cert_hash: OctetString::new(Sha256::digest(leaf_der).to_vec())?,
        }],
    };
    attribute(ID_SIGNING_CERTIFICATE_V2, &value)
}

/// Common name of a DER certificate's subject.
pub fn signer_common_name(cert_der: &[u8]) -> Option<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(cert_der).ok()?;
    let name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string);
    name
}

/// Convert bytes to uppercase hex string.
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8] = b"0123456789ABCDEF";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
pub(crate) fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        return Object::string_literal(s);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Literal)
}

/// Format a timestamp as a PDF date string.
pub(crate) fn format_pdf_date(time: DateTime<Utc>) -> String {
    time.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::keystore::tests::p256_identity;
    use chrono::TimeZone;
    use cms::content_info::ContentInfo;
    use cms::signed_data::SignedData;
    use p256::ecdsa::signature::Verifier;

    fn p256_material() -> KeyMaterial {
        let (key, cert) = p256_identity("Jane Signer");
        KeyMaterial {
            key: SigningKey::from_pkcs8_der(&key).unwrap(),
            chain: vec![cert],
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_format_pdf_date() {
        assert_eq!(format_pdf_date(fixed_time()), "D:20240305143000+00'00'");
    }

    #[test]
    fn test_bytes_to_hex() {
        assert_eq!(bytes_to_hex(&[0x00, 0xAB, 0x7F]), "00AB7F");
    }

    #[test]
    fn test_text_string_encoding() {
        assert_eq!(text_string("Lisbon"), Object::string_literal("Lisbon"));
        match text_string("Zürich") {
            Object::String(bytes, _) => assert_eq!(&bytes[..4], &[0xFE, 0xFF, 0x00, b'Z']),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_build_signature_dictionary() {
        let opts = SignOptions::default()
            .with_reason("Test signing")
            .with_location("Test City")
            .with_estimated_size(64);
        let signer = PdfSigner::new(opts);
        let dict = signer.build_signature_dictionary(Some("Jane Signer"), fixed_time());

        assert_eq!(dict.get(b"Type").unwrap().as_name().unwrap(), b"Sig");
        assert_eq!(dict.get(b"Filter").unwrap().as_name().unwrap(), b"Adobe.PPKLite");
        assert_eq!(
            dict.get(b"SubFilter").unwrap().as_name().unwrap(),
            b"ETSI.CAdES.detached"
        );
        assert_eq!(dict.get(b"Name").unwrap(), &Object::string_literal("Jane Signer"));
        assert_eq!(dict.get(b"Reason").unwrap(), &Object::string_literal("Test signing"));
        assert!(!dict.has(b"ContactInfo"));

        let keys: Vec<&[u8]> = dict.iter().map(|(k, _)| k.as_slice()).collect();
        let byte_range = keys.iter().position(|k| *k == b"ByteRange").unwrap();
        let contents = keys.iter().position(|k| *k == b"Contents").unwrap();
        assert!(byte_range < contents);
        match dict.get(b"Contents").unwrap() {
            Object::String(bytes, StringFormat::Hexadecimal) => assert_eq!(bytes.len(), 64),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_option_name_overrides_certificate_name() {
        let signer = PdfSigner::new(SignOptions::default().with_name("Acme Corp"));
        let dict = signer.build_signature_dictionary(Some("Jane Signer"), fixed_time());
        assert_eq!(dict.get(b"Name").unwrap(), &Object::string_literal("Acme Corp"));
    }

    #[test]
    fn test_calculate_byte_range() {
        let signer = PdfSigner::new(SignOptions::default().with_estimated_size(50));
        let byte_range = signer.calculate_byte_range(1000, 400);
        assert_eq!(byte_range, [0, 400, 502, 498]);
    }

    #[test]
    fn test_signer_common_name() {
        let (_, cert) = p256_identity("Jane Signer");
        assert_eq!(signer_common_name(&cert).as_deref(), Some("Jane Signer"));
        assert_eq!(signer_common_name(b"not a certificate"), None);
    }

    #[test]
    fn test_ecdsa_cms_signature_verifies() {
        let signer = PdfSigner::new(SignOptions::default());
        let material = p256_material();
        let digest = signer.compute_digest(b"document bytes");
        let der = signer.create_signature(&digest, &material, fixed_time()).unwrap();

        let content_info = ContentInfo::from_der(&der).unwrap();
        let signed_data = content_info.content.decode_as::<SignedData>().unwrap();
        assert!(signed_data.encap_content_info.econtent.is_none());
        assert_eq!(signed_data.certificates.as_ref().unwrap().0.len(), 1);

        let signer_info = signed_data.signer_infos.0.iter().next().unwrap();
        let signed_attrs = signer_info.signed_attrs.as_ref().unwrap();
        let oids: Vec<String> = signed_attrs.iter().map(|a| a.oid.to_string()).collect();
        assert!(oids.contains(&"1.2.840.113549.1.9.3".to_string()));
        assert!(oids.contains(&"1.2.840.113549.1.9.4".to_string()));
        assert!(oids.contains(&"1.2.840.113549.1.9.5".to_string()));
        assert!(oids.contains(&"1.2.840.113549.1.9.16.2.47".to_string()));

        let message_digest = signed_attrs
            .iter()
            .find(|a| a.oid.to_string() == "1.2.840.113549.1.9.4")
            .unwrap();
        let value = message_digest.values.iter().next().unwrap();
        let octets = value.decode_as::<OctetString>().unwrap();
        assert_eq!(octets.as_bytes(), digest.as_slice());

        let verifying_key = match &material.key {
            SigningKey::EcdsaP256(key) => *key.verifying_key(),
            _ => unreachable!(),
        };
        let sig = p256::ecdsa::DerSignature::from_bytes(signer_info.signature.as_bytes()).unwrap();
        verifying_key
            .verify(&signed_attrs.to_der().unwrap(), &sig)
            .unwrap();
    }

    #[test]
    fn test_certificate_of_another_key_is_credential_error() {
        let (_, other_cert) = p256_identity("Someone Else");
        let mut material = p256_material();
        material.chain = vec![other_cert];
        let signer = PdfSigner::new(SignOptions::default());
        let digest = signer.compute_digest(b"document bytes");
        let result = signer.create_signature(&digest, &material, fixed_time());
        assert!(matches!(result, Err(Error::CredentialError(_))));
    }

    #[test]
    fn test_ecdsa_rejects_other_digests() {
        let signer = PdfSigner::new(SignOptions::default().with_digest_algorithm(DigestAlgorithm::Sha512));
        let material = p256_material();
        let digest = signer.compute_digest(b"document bytes");
        let result = signer.create_signature(&digest, &material, fixed_time());
        assert!(matches!(result, Err(Error::CredentialError(_))));
    }

    #[test]
    fn test_insert_signature_too_large() {
        let signer = PdfSigner::new(SignOptions::default().with_estimated_size(2));
        let mut pdf = b"XX<0000>YY".to_vec();
        assert!(signer.insert_signature(&mut pdf, 2, &[1, 2, 3]).is_err());
        signer.insert_signature(&mut pdf, 2, &[0xAB]).unwrap();
        assert_eq!(&pdf, b"XX<AB00>YY");
    }
}

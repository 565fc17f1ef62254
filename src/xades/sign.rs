use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use rsa::RsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::{Digest, Sha256};

use super::c14n::{Target, canonicalize_enveloped, canonicalize_target};
use super::error::SigningError;
use super::pem::{pem_body, pem_der, private_key_from_pem};
use super::{
    DSIG_NS, ENVELOPED_SIGNATURE, EXC_C14N, RSA_SHA256, SHA256, SIGNED_PROPERTIES_TYPE,
    XADES_NS, digest_base64,
};

/// Produces enveloped signatures with one RSA key and its certificate.
///
/// Signing is deterministic: the same document, key, certificate and
/// signing time always yield the same bytes.
///
/// ```no_run
/// use facturae::xades::XadesSigner;
///
/// let cert = std::fs::read_to_string("cert.pem").unwrap();
/// let key = std::fs::read_to_string("key.pem").unwrap();
/// let signer = XadesSigner::from_pem(&cert, &key).unwrap();
/// let signed = signer.sign("<Factura>...</Factura>").unwrap();
/// assert!(signed.contains("<ds:X509Certificate>"));
/// ```
#[derive(Clone)]
pub struct XadesSigner {
    key: SigningKey<Sha256>,
    certificate: String,
    certificate_digest: String,
    signing_time: Option<DateTime<Utc>>,
}

impl fmt::Debug for XadesSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XadesSigner")
            .field("certificate_len", &self.certificate.len())
            .field("signing_time", &self.signing_time)
            .finish_non_exhaustive()
    }
}

impl XadesSigner {
    /// Build a signer from PEM certificate and private key text.
    ///
    /// Empty material is reported before anything is decoded.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self, SigningError> {
        if cert_pem.trim().is_empty() {
            return Err(SigningError::InputMissing("certificate content is empty".into()));
        }
        if key_pem.trim().is_empty() {
            return Err(SigningError::InputMissing("private key content is empty".into()));
        }
        let key = private_key_from_pem(key_pem)?;
        let certificate_der = pem_der(cert_pem)?;
        Ok(Self::from_parts(key, pem_body(cert_pem), &certificate_der))
    }

    fn from_parts(key: RsaPrivateKey, certificate: String, certificate_der: &[u8]) -> Self {
        Self {
            key: SigningKey::<Sha256>::new(key),
            certificate,
            certificate_digest: digest_base64(certificate_der),
            signing_time: None,
        }
    }

    /// Add XAdES-BES qualifying properties stamped with `time`.
    pub fn with_signing_time(mut self, time: DateTime<Utc>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Base64 body of the certificate embedded in `ds:KeyInfo`.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    /// Sign `xml`, appending `ds:Signature` as the last child of the root.
    ///
    /// Every byte outside the inserted signature is preserved.
    #[tracing::instrument(skip_all, fields(len = xml.len(), xades = self.signing_time.is_some()))]
    pub fn sign(&self, xml: &str) -> Result<String, SigningError> {
        let document = canonicalize_enveloped(xml)?;
        let document_digest = Sha256::digest(document.as_bytes());
        let signature_id = format!("Signature-{}", hex(&document_digest[..8]));

        let mut references = reference(
            None,
            "",
            &[ENVELOPED_SIGNATURE, EXC_C14N],
            &STANDARD.encode(document_digest),
        );

        let object = match self.signing_time {
            Some(time) => {
                let properties_id = format!("{signature_id}-SignedProperties");
                let object = self.qualifying_properties(&signature_id, &properties_id, time);
                let properties = canonicalize_target(
                    &wrap_in_signature(&object),
                    Target::Id(&properties_id),
                    false,
                )?;
                references.push_str(&reference(
                    Some(SIGNED_PROPERTIES_TYPE),
                    &format!("#{properties_id}"),
                    &[EXC_C14N],
                    &digest_base64(properties.as_bytes()),
                ));
                object
            }
            None => String::new(),
        };

        let signed_info = format!(
            "<ds:SignedInfo>\
             <ds:CanonicalizationMethod Algorithm=\"{EXC_C14N}\"></ds:CanonicalizationMethod>\
             <ds:SignatureMethod Algorithm=\"{RSA_SHA256}\"></ds:SignatureMethod>\
             {references}</ds:SignedInfo>"
        );
        let canonical_signed_info = canonicalize_target(
            &wrap_in_signature(&signed_info),
            Target::Element {
                ns: DSIG_NS,
                local: "SignedInfo",
            },
            false,
        )?;
        let signature_value = self
            .key
            .try_sign(canonical_signed_info.as_bytes())
            .map_err(|e| SigningError::Crypto(e.to_string()))?;

        let signature = format!(
            "<ds:Signature xmlns:ds=\"{DSIG_NS}\" Id=\"{signature_id}\">{signed_info}\
             <ds:SignatureValue>{}</ds:SignatureValue>\
             <ds:KeyInfo></ds:KeyInfo>{object}</ds:Signature>",
            STANDARD.encode(signature_value.to_bytes())
        );
        let signature = embed_certificate(&signature, &self.certificate)?;

        let signed = append_to_root(xml, &signature)?;
        tracing::debug!(signature_id = %signature_id, "document signed");
        Ok(signed)
    }

    fn qualifying_properties(
        &self,
        signature_id: &str,
        properties_id: &str,
        time: DateTime<Utc>,
    ) -> String {
        format!(
            "<ds:Object>\
             <xades:QualifyingProperties xmlns:xades=\"{XADES_NS}\" Target=\"#{signature_id}\">\
             <xades:SignedProperties Id=\"{properties_id}\">\
             <xades:SignedSignatureProperties>\
             <xades:SigningTime>{}</xades:SigningTime>\
             <xades:SigningCertificateV2><xades:Cert><xades:CertDigest>\
             <ds:DigestMethod Algorithm=\"{SHA256}\"></ds:DigestMethod>\
             <ds:DigestValue>{}</ds:DigestValue>\
             </xades:CertDigest></xades:Cert></xades:SigningCertificateV2>\
             </xades:SignedSignatureProperties>\
             </xades:SignedProperties>\
             </xades:QualifyingProperties>\
             </ds:Object>",
            time.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.certificate_digest,
        )
    }
}

/// Sign a Facturae document with PEM certificate and key text.
pub fn sign_facturae_xml(xml: &str, cert_pem: &str, key_pem: &str) -> Result<String, SigningError> {
    XadesSigner::from_pem(cert_pem, key_pem)?.sign(xml)
}

fn reference(kind: Option<&str>, uri: &str, transforms: &[&str], digest: &str) -> String {
    let mut out = String::from("<ds:Reference");
    if let Some(kind) = kind {
        out.push_str(&format!(" Type=\"{kind}\""));
    }
    out.push_str(&format!(" URI=\"{uri}\"><ds:Transforms>"));
    for transform in transforms {
        out.push_str(&format!(
            "<ds:Transform Algorithm=\"{transform}\"></ds:Transform>"
        ));
    }
    out.push_str(&format!(
        "</ds:Transforms><ds:DigestMethod Algorithm=\"{SHA256}\"></ds:DigestMethod>\
         <ds:DigestValue>{digest}</ds:DigestValue></ds:Reference>"
    ));
    out
}

fn wrap_in_signature(fragment: &str) -> String {
    format!("<ds:Signature xmlns:ds=\"{DSIG_NS}\">{fragment}</ds:Signature>")
}

/// Insert the certificate into the signature's empty `ds:KeyInfo`.
fn embed_certificate(signature: &str, certificate: &str) -> Result<String, SigningError> {
    let marker = "</ds:KeyInfo>";
    let at = signature
        .rfind(marker)
        .ok_or_else(|| SigningError::Xml("signature has no ds:KeyInfo".into()))?;
    let data = format!("<ds:X509Data><ds:X509Certificate>{certificate}</ds:X509Certificate></ds:X509Data>");
    let embedded = format!("{}{data}{}", &signature[..at], &signature[at..]);
    if !embedded.contains(&format!("<ds:X509Certificate>{certificate}</ds:X509Certificate>")) {
        return Err(SigningError::Xml("certificate was not embedded in ds:KeyInfo".into()));
    }
    Ok(embedded)
}

/// Splice `fragment` in front of the root element's end tag.
fn append_to_root(xml: &str, fragment: &str) -> Result<String, SigningError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    loop {
        let before = position(&reader)?;
        let event = reader
            .read_event()
            .map_err(|e| SigningError::Xml(format!("XML parse error at position {before}: {e}")))?;
        match event {
            Event::Start(_) => depth += 1,
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let mut out = String::with_capacity(xml.len() + fragment.len());
                    out.push_str(&xml[..before]);
                    out.push_str(fragment);
                    out.push_str(&xml[before..]);
                    tracing::trace!(root = %String::from_utf8_lossy(e.name().as_ref()), "signature appended");
                    return Ok(out);
                }
            }
            Event::Empty(ref e) if depth == 0 => {
                let after = position(&reader)?;
                let tag = xml[before..after].trim_end_matches("/>");
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let mut out = String::with_capacity(xml.len() + fragment.len() + name.len() + 3);
                out.push_str(&xml[..before]);
                out.push_str(tag);
                out.push('>');
                out.push_str(fragment);
                out.push_str(&format!("</{name}>"));
                out.push_str(&xml[after..]);
                return Ok(out);
            }
            Event::Eof => return Err(SigningError::Xml("document has no root element".into())),
            _ => {}
        }
    }
}

fn position(reader: &Reader<&[u8]>) -> Result<usize, SigningError> {
    usize::try_from(reader.buffer_position())
        .map_err(|_| SigningError::Xml("document too large".into()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

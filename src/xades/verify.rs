use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use sha2::Sha256;

use super::c14n::{Target, canonicalize_enveloped, canonicalize_target};
use super::error::SigningError;
use super::{DSIG_NS, RSA_SHA256, digest_base64};

/// What a successful verification found in the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    /// Base64 body of the embedded certificate.
    pub certificate: String,
    /// Number of references whose digest matched.
    pub references: usize,
    /// XAdES signing time, when qualifying properties are present.
    pub signing_time: Option<String>,
}

/// Check the first `ds:Signature` of `xml` against `key`.
///
/// Every reference digest is recomputed and the signature value is checked
/// over the canonical `SignedInfo`. A signature without an embedded
/// certificate is rejected.
pub fn verify_signed_xml(xml: &str, key: &RsaPublicKey) -> Result<VerifiedSignature, SigningError> {
    let parts = SignatureParts::read(xml)?;

    if parts.signature_method != RSA_SHA256 {
        return Err(SigningError::Verification(format!(
            "unsupported signature method {:?}",
            parts.signature_method
        )));
    }
    if parts.references.is_empty() {
        return Err(SigningError::Verification("signature has no references".into()));
    }
    let certificate = parts
        .certificate
        .filter(|c| !c.is_empty())
        .ok_or_else(|| SigningError::Verification("ds:KeyInfo has no certificate".into()))?;
    STANDARD
        .decode(certificate.as_bytes())
        .map_err(|e| SigningError::Verification(format!("certificate is not base64: {e}")))?;

    for (uri, expected) in &parts.references {
        let canonical = match uri.strip_prefix('#') {
            Some(id) => canonicalize_target(xml, Target::Id(id), false)?,
            None if uri.is_empty() => canonicalize_enveloped(xml)?,
            None => {
                return Err(SigningError::Verification(format!(
                    "unsupported reference URI {uri:?}"
                )));
            }
        };
        if digest_base64(canonical.as_bytes()) != *expected {
            return Err(SigningError::Verification(format!(
                "digest mismatch for reference {uri:?}"
            )));
        }
    }

    let signed_info = canonicalize_target(
        xml,
        Target::Element {
            ns: DSIG_NS,
            local: "SignedInfo",
        },
        false,
    )?;
    let value = STANDARD
        .decode(parts.signature_value.as_bytes())
        .map_err(|e| SigningError::Verification(format!("signature value is not base64: {e}")))?;
    let signature = Signature::try_from(value.as_slice())
        .map_err(|e| SigningError::Verification(e.to_string()))?;
    VerifyingKey::<Sha256>::new(key.clone())
        .verify(signed_info.as_bytes(), &signature)
        .map_err(|_| SigningError::Verification("signature value does not match".into()))?;

    Ok(VerifiedSignature {
        certificate,
        references: parts.references.len(),
        signing_time: parts.signing_time,
    })
}

/// Text content pulled out of the first signature.
#[derive(Default)]
struct SignatureParts {
    signature_method: String,
    references: Vec<(String, String)>,
    signature_value: String,
    certificate: Option<String>,
    signing_time: Option<String>,
}

impl SignatureParts {
    fn read(xml: &str) -> Result<Self, SigningError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut parts = Self::default();
        let mut path: Vec<String> = Vec::new();
        let mut signature_depth: Option<usize> = None;
        let mut found = false;
        let mut current_uri = String::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                SigningError::Xml(format!(
                    "XML parse error at position {}: {e}",
                    reader.buffer_position()
                ))
            })?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let empty = matches!(event, Event::Empty(_));
                    let name = local_name(e);
                    if signature_depth.is_none() && !found && name == "Signature" {
                        signature_depth = Some(path.len());
                        found = true;
                    }
                    if signature_depth.is_some() {
                        match name.as_str() {
                            "SignatureMethod" if parent_is(&path, "SignedInfo") => {
                                parts.signature_method = attribute(e, "Algorithm")?;
                            }
                            "Reference" if parent_is(&path, "SignedInfo") => {
                                current_uri = attribute(e, "URI")?;
                            }
                            _ => {}
                        }
                    }
                    if !empty {
                        path.push(name);
                    } else if signature_depth == Some(path.len()) {
                        signature_depth = None;
                    }
                }
                Event::Text(ref e) if signature_depth.is_some() => {
                    let text = e
                        .unescape()
                        .map_err(|err| SigningError::Xml(format!("invalid text: {err}")))?
                        .into_owned();
                    let tail: Vec<&str> = path.iter().rev().take(2).map(String::as_str).collect();
                    match tail.as_slice() {
                        ["DigestValue", "Reference"] => {
                            parts.references.push((current_uri.clone(), text));
                        }
                        ["SignatureValue", "Signature"] => parts.signature_value = text,
                        ["X509Certificate", "X509Data"] => {
                            parts.certificate = Some(text.split_whitespace().collect());
                        }
                        ["SigningTime", "SignedSignatureProperties"] => {
                            parts.signing_time = Some(text);
                        }
                        _ => {}
                    }
                }
                Event::End(_) => {
                    path.pop();
                    if signature_depth == Some(path.len()) {
                        signature_depth = None;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !found {
            return Err(SigningError::Verification("document is not signed".into()));
        }
        Ok(parts)
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn parent_is(path: &[String], name: &str) -> bool {
    path.last().is_some_and(|p| p == name)
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<String, SigningError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| SigningError::Xml(format!("invalid attribute: {err}")))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|err| SigningError::Xml(format!("invalid attribute value: {err}")))?;
            return Ok(value.into_owned());
        }
    }
    Ok(String::new())
}

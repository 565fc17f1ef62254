//! XAdES / XML-DSig enveloped signatures for Facturae documents.
//!
//! A signature covers the whole document (minus any signature) through one
//! `Reference URI=""` with the enveloped-signature transform and exclusive
//! canonicalization, digested with SHA-256 and signed with
//! RSASSA-PKCS1-v1_5 / SHA-256. The signer's certificate is embedded in
//! `ds:KeyInfo`.
//!
//! When a signing time is configured the signature also carries XAdES-BES
//! qualifying properties (`SigningTime`, `SigningCertificateV2`), covered
//! by a second reference.
//!
//! ```text
//! Factura
//!   ...
//!   ds:Signature
//!     ds:SignedInfo      (c14n method, RSA-SHA256, references)
//!     ds:SignatureValue
//!     ds:KeyInfo         (ds:X509Data/ds:X509Certificate)
//!     ds:Object          (xades:QualifyingProperties, optional)
//! ```

mod c14n;
mod error;
mod pem;
mod sign;
mod verify;

pub use c14n::{canonicalize, canonicalize_enveloped};
pub use error::SigningError;
pub use pem::{pem_body, private_key_from_pem, public_key_from_pem};
pub use sign::{XadesSigner, sign_facturae_xml};
pub use verify::{VerifiedSignature, verify_signed_xml};

pub use rsa::{RsaPrivateKey, RsaPublicKey};

/// XML-DSig namespace.
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
/// XAdES 1.3.2 namespace.
pub const XADES_NS: &str = "http://uri.etsi.org/01903/v1.3.2#";
/// Exclusive canonicalization without comments.
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
/// Enveloped-signature transform.
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
/// RSASSA-PKCS1-v1_5 with SHA-256.
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
/// SHA-256 digest.
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
/// Reference type of the XAdES signed properties.
pub const SIGNED_PROPERTIES_TYPE: &str = "http://uri.etsi.org/01903#SignedProperties";

fn digest_base64(bytes: &[u8]) -> String {
    use base64::Engine as _;
    use sha2::{Digest, Sha256};

    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(bytes))
}

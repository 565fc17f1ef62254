//! Facturae XML generation and reading.
//!
//! The document is a compact subset of the Spanish Facturae 3.2 invoice:
//!
//! ```text
//! Factura
//!   Cabecera:     NumeroFactura, FechaFactura, TipoFactura
//!   Emisor:       NIF, Nombre
//!   Receptor:     NIF, Nombre
//!   DatosFactura: ImporteTotal, IVA { Tipo, BaseImponible, Cuota }
//!   Items:        Item { Description, Quantity, UnitPrice, Total }*
//! ```
//!
//! # Example
//!
//! ```
//! use facturae::facturae::{FacturaeDocument, to_facturae_xml};
//!
//! let doc = FacturaeDocument::from_json(&serde_json::json!({
//!     "numeroFactura": "fac-2024-0001",
//!     "items": [{ "description": "Consulta", "quantity": 1, "unitPrice": 90, "total": 90 }]
//! }));
//! let xml = to_facturae_xml(&doc).unwrap();
//! assert!(xml.contains("<NumeroFactura>fac-2024-0001</NumeroFactura>"));
//! ```

mod document;
mod generate;
mod parse;
pub(crate) mod xml_utils;

pub use document::{FacturaeDocument, FacturaeItem, PartyInfo};
pub use generate::{invoice_to_facturae_xml, to_facturae_xml};
pub use parse::from_facturae_xml;
pub use xml_utils::{format_amount, format_number};

/// Default namespace of the `Factura` root element.
pub const FACTURAE_NS: &str = "http://www.facturae.es/Facturae/2009/v3.2/Facturae";

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::document::{FacturaeDocument, FacturaeItem, PartyInfo};
use crate::core::FacturaError;

/// Read a Facturae document back into its display values.
///
/// Unlike the builder this is strict: a wrong root element, an invalid
/// date or a non-numeric amount is an error. An embedded `Signature` is
/// skipped.
pub fn from_facturae_xml(xml: &str) -> Result<FacturaeDocument, FacturaError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = ParsedDocument::default();
    let mut path: Vec<String> = Vec::new();
    let mut signature_depth: Option<usize> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                if path.is_empty() && name != "Factura" {
                    return Err(FacturaError::Xml(format!(
                        "expected root element Factura, found {name}"
                    )));
                }
                if signature_depth.is_none() && name == "Signature" {
                    signature_depth = Some(path.len());
                }
                if signature_depth.is_none() && name == "Item" && parent_is(&path, "Items") {
                    parsed.items.push(FacturaeItem::default());
                }
                path.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                let name = local_name(e);
                if path.is_empty() {
                    return Err(FacturaError::Xml(format!(
                        "expected root element Factura with content, found empty {name}"
                    )));
                }
                if signature_depth.is_none() && name == "Item" && parent_is(&path, "Items") {
                    parsed.items.push(FacturaeItem::default());
                }
            }
            Ok(Event::Text(ref e)) => {
                if signature_depth.is_some() {
                    continue;
                }
                let text = e
                    .unescape()
                    .map_err(|err| FacturaError::Xml(format!("invalid text: {err}")))?;
                if !text.is_empty() {
                    parsed.handle_text(&path, &text)?;
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
                if signature_depth == Some(path.len()) {
                    signature_depth = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FacturaError::Xml(format!(
                    "XML parse error at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    parsed.into_document()
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn parent_is(path: &[String], name: &str) -> bool {
    path.last().is_some_and(|p| p == name)
}

#[derive(Default)]
struct ParsedDocument {
    number: String,
    issue_date: Option<NaiveDate>,
    invoice_type: String,
    issuer: PartyInfo,
    recipient: PartyInfo,
    total: Decimal,
    tax_rate: Decimal,
    taxable_base: Decimal,
    tax_amount: Decimal,
    items: Vec<FacturaeItem>,
}

impl ParsedDocument {
    fn handle_text(&mut self, path: &[String], text: &str) -> Result<(), FacturaError> {
        let tail: Vec<&str> = path.iter().skip(1).map(String::as_str).collect();
        match tail.as_slice() {
            ["Cabecera", "NumeroFactura"] => self.number = text.to_string(),
            ["Cabecera", "FechaFactura"] => {
                let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| {
                    FacturaError::Xml(format!("invalid FechaFactura {text:?}: {e}"))
                })?;
                self.issue_date = Some(date);
            }
            ["Cabecera", "TipoFactura"] => self.invoice_type = text.to_string(),
            ["Emisor", "NIF"] => self.issuer.nif = text.to_string(),
            ["Emisor", "Nombre"] => self.issuer.name = text.to_string(),
            ["Receptor", "NIF"] => self.recipient.nif = text.to_string(),
            ["Receptor", "Nombre"] => self.recipient.name = text.to_string(),
            ["DatosFactura", "ImporteTotal"] => self.total = decimal("ImporteTotal", text)?,
            ["DatosFactura", "IVA", "Tipo"] => self.tax_rate = decimal("Tipo", text)?,
            ["DatosFactura", "IVA", "BaseImponible"] => {
                self.taxable_base = decimal("BaseImponible", text)?
            }
            ["DatosFactura", "IVA", "Cuota"] => self.tax_amount = decimal("Cuota", text)?,
            ["Items", "Item", field] => {
                let Some(item) = self.items.last_mut() else {
                    return Ok(());
                };
                match *field {
                    "Description" => item.description = text.to_string(),
                    "Quantity" => item.quantity = decimal("Quantity", text)?,
                    "UnitPrice" => item.unit_price = decimal("UnitPrice", text)?,
                    "Total" => item.total = decimal("Total", text)?,
                    _ => {}
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn into_document(self) -> Result<FacturaeDocument, FacturaError> {
        let issue_date = self
            .issue_date
            .ok_or_else(|| FacturaError::Xml("missing Cabecera/FechaFactura".into()))?;
        Ok(FacturaeDocument {
            number: self.number,
            issue_date,
            invoice_type: self.invoice_type,
            issuer: self.issuer,
            recipient: self.recipient,
            total: self.total,
            tax_rate: self.tax_rate,
            taxable_base: self.taxable_base,
            tax_amount: self.tax_amount,
            items: self.items,
        })
    }
}

fn decimal(field: &str, text: &str) -> Result<Decimal, FacturaError> {
    Decimal::from_str(text.trim())
        .map_err(|e| FacturaError::Xml(format!("invalid {field} {text:?}: {e}")))
}

use super::FACTURAE_NS;
use super::document::{FacturaeDocument, FacturaeItem};
use super::xml_utils::{XmlResult, XmlWriter};
use crate::core::{FacturaError, Invoice, Party};

/// Render a Facturae XML document.
///
/// The item list is never empty in the output: a document without items
/// gets one all-zero placeholder `Item`. Writing goes to memory, so the
/// only possible error is an encoder failure.
pub fn to_facturae_xml(doc: &FacturaeDocument) -> XmlResult {
    let mut w = XmlWriter::new()?;

    w.start_element_with_attrs("Factura", &[("xmlns", FACTURAE_NS)])?;

    w.start_element("Cabecera")?;
    w.text_element("NumeroFactura", &doc.number)?;
    w.text_element("FechaFactura", &doc.issue_date.format("%Y-%m-%d").to_string())?;
    w.text_element("TipoFactura", &doc.invoice_type)?;
    w.end_element("Cabecera")?;

    w.start_element("Emisor")?;
    w.text_element("NIF", &doc.issuer.nif)?;
    w.text_element("Nombre", &doc.issuer.name)?;
    w.end_element("Emisor")?;

    w.start_element("Receptor")?;
    w.text_element("NIF", &doc.recipient.nif)?;
    w.text_element("Nombre", &doc.recipient.name)?;
    w.end_element("Receptor")?;

    w.start_element("DatosFactura")?;
    w.amount_element("ImporteTotal", doc.total)?;
    w.start_element("IVA")?;
    w.number_element("Tipo", doc.tax_rate)?;
    w.amount_element("BaseImponible", doc.taxable_base)?;
    w.amount_element("Cuota", doc.tax_amount)?;
    w.end_element("IVA")?;
    w.end_element("DatosFactura")?;

    w.start_element("Items")?;
    if doc.items.is_empty() {
        write_item(&mut w, &FacturaeItem::default())?;
    } else {
        for item in &doc.items {
            write_item(&mut w, item)?;
        }
    }
    w.end_element("Items")?;

    w.end_element("Factura")?;

    tracing::debug!(
        number = %doc.number,
        items = doc.items.len(),
        "facturae XML generated"
    );
    w.into_string()
}

/// Render the XML of a stored invoice with its resolved parties.
pub fn invoice_to_facturae_xml(
    invoice: &Invoice,
    issuer: Option<&Party>,
    recipient: Option<&Party>,
) -> XmlResult {
    to_facturae_xml(&FacturaeDocument::from_invoice(invoice, issuer, recipient))
}

fn write_item(w: &mut XmlWriter, item: &FacturaeItem) -> Result<(), FacturaError> {
    w.start_element("Item")?;
    w.text_element("Description", &item.description)?;
    w.number_element("Quantity", item.quantity)?;
    w.number_element("UnitPrice", item.unit_price)?;
    w.number_element("Total", item.total)?;
    w.end_element("Item")?;
    Ok(())
}

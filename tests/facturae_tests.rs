#![cfg(feature = "facturae")]

use chrono::NaiveDate;
use facturae::core::*;
use facturae::facturae::{
    FACTURAE_NS, FacturaeDocument, from_facturae_xml, invoice_to_facturae_xml, to_facturae_xml,
};
use rust_decimal_macros::dec;
use serde_json::json;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn invoice() -> Invoice {
    Invoice {
        id: "inv-1".into(),
        number: "fac-2024-0003".into(),
        issue_date: date(2024, 6, 15),
        operation_date: date(2024, 6, 14),
        invoice_type: "completa".into(),
        issuer_id: "abogada-1".into(),
        recipient_id: "cliente-1".into(),
        case_id: Some("exp-9".into()),
        items: vec![
            DraftLine::new("Consulta", dec!(2), dec!(100)).to_line_item(),
            DraftLine::new("Escrito <urgente>", dec!(0.5), dec!(201)).to_line_item(),
        ],
        discount: dec!(0),
        tax_rate: dec!(21),
        apply_tax: true,
        withholding: dec!(0),
        taxable_base: dec!(300.50),
        tax_amount: dec!(63.11),
        total: dec!(363.61),
        state: InvoiceState::Emitida,
        annulment_reason: None,
        xml: None,
        signed_xml: None,
    }
}

fn issuer() -> Party {
    Party {
        id: "abogada-1".into(),
        name: "Despacho Ruiz & Asociados".into(),
        dni: Some("12345678Z".into()),
        email: Some("ruiz@example.com".into()),
    }
}

fn recipient() -> Party {
    Party {
        id: "cliente-1".into(),
        name: "Cliente Uno".into(),
        dni: None,
        email: Some("cliente@example.com".into()),
    }
}

#[test]
fn renders_expected_structure() {
    let xml = invoice_to_facturae_xml(&invoice(), Some(&issuer()), Some(&recipient())).unwrap();

    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains(&format!("<Factura xmlns=\"{FACTURAE_NS}\">")));
    assert!(xml.contains("<NumeroFactura>fac-2024-0003</NumeroFactura>"));
    assert!(xml.contains("<FechaFactura>2024-06-15</FechaFactura>"));
    assert!(xml.contains("<TipoFactura>completa</TipoFactura>"));
    assert!(xml.contains("<NIF>12345678Z</NIF>"));
    assert!(xml.contains("<Nombre>Despacho Ruiz &amp; Asociados</Nombre>"));
    assert!(xml.contains("<NIF>cliente@example.com</NIF>"));
    assert!(xml.contains("<ImporteTotal>363.61</ImporteTotal>"));
    assert!(xml.contains("<Tipo>21</Tipo>"));
    assert!(xml.contains("<BaseImponible>300.50</BaseImponible>"));
    assert!(xml.contains("<Cuota>63.11</Cuota>"));
    assert!(xml.contains("<Description>Escrito &lt;urgente&gt;</Description>"));
    assert!(xml.contains("<Quantity>0.5</Quantity>"));
    assert!(xml.contains("<Total>100.5</Total>"));
    assert_eq!(xml.matches("<Item>").count(), 2);
}

#[test]
fn element_order_is_fixed() {
    let xml = invoice_to_facturae_xml(&invoice(), Some(&issuer()), Some(&recipient())).unwrap();
    let order = ["<Cabecera>", "<Emisor>", "<Receptor>", "<DatosFactura>", "<IVA>", "<Items>"];
    let positions: Vec<usize> = order.iter().map(|tag| xml.find(tag).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn unresolved_parties_render_empty() {
    let xml = invoice_to_facturae_xml(&invoice(), None, None).unwrap();
    let doc = from_facturae_xml(&xml).unwrap();
    assert_eq!(doc.issuer.nif, "");
    assert_eq!(doc.recipient.name, "");
}

#[test]
fn round_trip_through_reader() {
    let original =
        FacturaeDocument::from_invoice(&invoice(), Some(&issuer()), Some(&recipient()));
    let xml = to_facturae_xml(&original).unwrap();
    let back = from_facturae_xml(&xml).unwrap();
    assert_eq!(back, original);
}

#[test]
fn lenient_json_with_wrong_types() {
    let payload = json!({
        "numeroFactura": 17,
        "fechaFactura": "not a date",
        "importeTotal": "mucho",
        "tipoIVA": 21,
        "emisor": { "name": "Despacho", "dni": null, "email": "d@example.com" },
        "receptor": "nobody",
        "items": [
            { "description": "Consulta", "quantity": "x", "unitPrice": 50, "total": 50 },
            42,
            "texto"
        ]
    });
    let today = date(2024, 1, 31);
    let doc = FacturaeDocument::from_json_at(&payload, today);

    assert_eq!(doc.number, "");
    assert_eq!(doc.issue_date, today);
    assert_eq!(doc.total, dec!(0));
    assert_eq!(doc.tax_rate, dec!(21));
    assert_eq!(doc.issuer.nif, "d@example.com");
    assert_eq!(doc.recipient.nif, "");
    assert_eq!(doc.items.len(), 1);
    assert_eq!(doc.items[0].quantity, dec!(0));
    assert_eq!(doc.items[0].unit_price, dec!(50));

    let xml = to_facturae_xml(&doc).unwrap();
    assert!(xml.contains("<FechaFactura>2024-01-31</FechaFactura>"));
    assert!(xml.contains("<ImporteTotal>0.00</ImporteTotal>"));
}

#[test]
fn empty_items_get_placeholder() {
    for items in [json!([]), json!("no es una lista"), json!(null)] {
        let doc = FacturaeDocument::from_json_at(&json!({ "items": items }), date(2024, 1, 1));
        let xml = to_facturae_xml(&doc).unwrap();
        assert_eq!(xml.matches("<Item>").count(), 1);
        assert!(xml.contains("<Description></Description>") || xml.contains("<Description/>"));
        assert!(xml.contains("<Quantity>0</Quantity>"));
        assert!(xml.contains("<UnitPrice>0</UnitPrice>"));
    }
}

#[test]
fn reader_rejects_invalid_documents() {
    assert!(from_facturae_xml("<Factura><Cabecera>").is_err());
    assert!(from_facturae_xml("<Invoice/>").is_err());
    let bad_date = "<Factura><Cabecera><FechaFactura>15/06/2024</FechaFactura></Cabecera></Factura>";
    assert!(matches!(from_facturae_xml(bad_date), Err(FacturaError::Xml(_))));
}

//! Edge cases that cut across totals, validation, XML and signing.

#![cfg(feature = "xades")]

use facturae::core::*;
use facturae::facturae::{FacturaeDocument, from_facturae_xml, to_facturae_xml};
use facturae::xades::{private_key_from_pem, sign_facturae_xml, verify_signed_xml};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

const CERT: &str = include_str!("fixtures/signing_cert.pem");
const KEY: &str = include_str!("fixtures/signing_key.pem");

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

#[test]
fn full_discount_zeroes_everything() {
    let items = [DraftLine::new("Consulta", dec!(3), dec!(75)).to_line_item()];
    let params = TotalsParams::default().discount(dec!(100));
    let totals = calculate_totals(&items, &params).unwrap();
    assert_eq!(totals.gross_base, dec!(225));
    assert_eq!(totals.taxable_base, Decimal::ZERO);
    assert_eq!(totals.total, Decimal::ZERO);
}

#[test]
fn fractional_quantities_round_only_at_the_end() {
    // 0.333 h * 150 = 49.95 ; three lines = 149.85 ; IVA 31.4685 -> 31.47
    let items: Vec<LineItem> = (0..3)
        .map(|_| DraftLine::new("Hora", dec!(0.333), dec!(150)).to_line_item())
        .collect();
    let totals = calculate_totals(&items, &TotalsParams::default()).unwrap();
    assert_eq!(totals.gross_base, dec!(149.850));
    assert_eq!(totals.taxable_base, dec!(149.85));
    assert_eq!(totals.tax_amount, dec!(31.47));
    assert_eq!(totals.total, dec!(181.32));
}

#[test]
fn withholding_without_tax() {
    let items = [DraftLine::new("Informe", dec!(1), dec!(500)).to_line_item()];
    let params = TotalsParams::default()
        .tax(false, dec!(21))
        .withholding(dec!(15));
    let totals = calculate_totals(&items, &params).unwrap();
    assert_eq!(totals.withheld_amount, dec!(75.00));
    assert_eq!(totals.total, dec!(425.00));
}

// ---------------------------------------------------------------------------
// Validation limits
// ---------------------------------------------------------------------------

#[test]
fn too_many_lines_rejected() {
    let mut builder = InvoiceDraftBuilder::new("abogada-1", "cliente-1");
    for _ in 0..=MAX_LINE_ITEMS {
        builder = builder.add_line("x", dec!(1), dec!(1));
    }
    let err = builder.build().unwrap_err();
    assert!(matches!(err, FacturaError::InvalidInput(_)));
}

#[test]
fn overlong_number_rejected() {
    let draft = InvoiceDraftBuilder::new("abogada-1", "cliente-1")
        .number("9".repeat(MAX_NUMBER_LEN + 1))
        .add_line("Consulta", dec!(1), dec!(1))
        .build_unchecked();
    let errors = validate_draft(&draft);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "numeroFactura");
}

#[test]
fn invalid_date_in_payload_is_rejected() {
    let result: Result<InvoiceDraft, _> = serde_json::from_value(json!({
        "emisorId": "abogada-1",
        "receptorId": "cliente-1",
        "fechaFactura": "31/12/2024",
        "items": []
    }));
    assert!(result.is_err());
}

#[test]
fn blank_date_means_default() {
    let draft: InvoiceDraft = serde_json::from_value(json!({
        "emisorId": "abogada-1",
        "receptorId": "cliente-1",
        "fechaFactura": "  ",
        "items": []
    }))
    .unwrap();
    assert_eq!(draft.issue_date, None);
}

// ---------------------------------------------------------------------------
// XML text and signing
// ---------------------------------------------------------------------------

fn document() -> FacturaeDocument {
    FacturaeDocument::from_json(&json!({
        "numeroFactura": "fac-2024-0042",
        "fechaFactura": "2024-11-30",
        "tipoFactura": "rectificativa",
        "emisor": { "name": "Peña & Núñez Abogados", "dni": "12345678Z" },
        "receptor": { "name": "Compañía \"Ñandú\" <S.L.>", "dni": "B00000000" },
        "importeTotal": 121,
        "tipoIVA": 21,
        "baseImponible": 100,
        "cuotaIVA": 21,
        "items": [{ "description": "Minuta — 1ª instancia", "quantity": 1, "unitPrice": 100, "total": 100 }]
    }))
}

#[test]
fn non_ascii_and_markup_survive_round_trip() {
    let doc = document();
    let xml = to_facturae_xml(&doc).unwrap();
    assert!(xml.contains("Peña &amp; Núñez Abogados"));
    let back = from_facturae_xml(&xml).unwrap();
    assert_eq!(back.recipient.name, "Compañía \"Ñandú\" <S.L.>");
    assert_eq!(back.items[0].description, "Minuta — 1ª instancia");
}

#[test]
fn non_ascii_document_signs_and_verifies() {
    let xml = to_facturae_xml(&document()).unwrap();
    let signed = sign_facturae_xml(&xml, CERT, KEY).unwrap();
    let public = private_key_from_pem(KEY).unwrap().to_public_key();
    assert!(verify_signed_xml(&signed, &public).is_ok());

    let tampered = signed.replace("Peña", "Pena");
    assert!(verify_signed_xml(&tampered, &public).is_err());
}

#[test]
fn resigning_keeps_both_signatures() {
    let xml = to_facturae_xml(&document()).unwrap();
    let once = sign_facturae_xml(&xml, CERT, KEY).unwrap();
    let twice = sign_facturae_xml(&once, CERT, KEY).unwrap();
    assert_eq!(twice.matches("<ds:Signature ").count(), 2);
    // The second signature excludes the first one, so both documents read alike.
    assert_eq!(from_facturae_xml(&twice).unwrap(), from_facturae_xml(&xml).unwrap());
}

// ---------------------------------------------------------------------------
// Out-of-range amounts through the service
// ---------------------------------------------------------------------------

#[cfg(feature = "lifecycle")]
mod out_of_range {
    use super::*;
    use facturae::lifecycle::{InvoiceService, MemoryStore};

    fn service() -> InvoiceService<MemoryStore> {
        InvoiceService::new(MemoryStore::new())
    }

    #[test]
    fn overflowing_line_is_rejected_not_panicking() {
        let service = service();
        let err = service
            .create_from_json(&json!({
                "emisorId": "abogada-1",
                "receptorId": "cliente-1",
                "items": [{
                    "description": "Honorarios",
                    "quantity": "100000000000000000000",
                    "unitPrice": "100000000000000000000"
                }]
            }))
            .unwrap_err();
        assert!(matches!(err, FacturaError::InvalidInput(_)));
        assert!(err.to_string().contains("items.0.quantity"));
        assert!(service.find_all().unwrap().is_empty());
    }

    #[test]
    fn overflowing_discount_on_update_leaves_invoice_untouched() {
        let service = service();
        let draft = InvoiceDraftBuilder::new("abogada-1", "cliente-1")
            .add_line("Consulta", MAX_AMOUNT, MAX_AMOUNT)
            .build()
            .unwrap();
        let invoice = service.create(draft).unwrap();

        let update = InvoiceUpdate {
            discount: Some(Decimal::MIN),
            ..Default::default()
        };
        let err = service.update(&invoice.id, update).unwrap_err();
        assert!(matches!(err, FacturaError::InvalidInput(_)));
        let stored = service.find_one(&invoice.id).unwrap().invoice;
        assert_eq!(stored.discount, invoice.discount);
        assert_eq!(stored.total, invoice.total);
    }
}

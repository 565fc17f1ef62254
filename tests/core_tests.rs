use chrono::NaiveDate;
use facturae::core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn lines(draft: &InvoiceDraft) -> Vec<LineItem> {
    draft.items.iter().map(DraftLine::to_line_item).collect()
}

fn provision(id: &str, amount: Decimal) -> FundProvision {
    FundProvision {
        id: id.into(),
        client_id: "cliente-1".into(),
        amount,
        description: "Provisión de fondos".into(),
        invoice_id: None,
    }
}

// --- Totals ---

#[test]
fn standard_invoice_with_default_tax() {
    let draft = InvoiceDraftBuilder::new("abogada-1", "cliente-1")
        .add_line("Consulta", dec!(2), dec!(100))
        .build()
        .unwrap();
    let totals = calculate_totals(&lines(&draft), &draft.totals_params(Decimal::ZERO))
        .unwrap();

    assert_eq!(totals.gross_base, dec!(200));
    assert_eq!(totals.taxable_base, dec!(200.00));
    assert_eq!(totals.tax_amount, dec!(42.00));
    assert_eq!(totals.withheld_amount, dec!(0));
    assert_eq!(totals.total, dec!(242.00));
}

#[test]
fn discount_and_provision_reduce_base() {
    let draft = InvoiceDraftBuilder::new("abogada-1", "cliente-1")
        .add_line("Honorarios", dec!(1), dec!(200))
        .discount(dec!(10))
        .provision("prov-1")
        .build()
        .unwrap();
    let provisions = [provision("prov-1", dec!(30))];
    let params = draft.totals_params(provisions_total(&provisions).unwrap());
    let totals = calculate_totals(&lines(&draft), &params).unwrap();

    assert_eq!(totals.taxable_base, dec!(150.00));
    assert_eq!(totals.tax_amount, dec!(31.50));
    assert_eq!(totals.total, dec!(181.50));
}

#[test]
fn withholding_is_subtracted() {
    let params = TotalsParams::default().withholding(dec!(15));
    let items = [LineItem {
        description: "Dictamen".into(),
        quantity: dec!(1),
        unit_price: dec!(1000),
        total: dec!(1000),
    }];
    let totals = calculate_totals(&items, &params).unwrap();
    assert_eq!(totals.tax_amount, dec!(210.00));
    assert_eq!(totals.withheld_amount, dec!(150.00));
    assert_eq!(totals.total, dec!(1060.00));
}

#[test]
fn tax_can_be_switched_off() {
    let params = TotalsParams::default().tax(false, dec!(21));
    let items = [DraftLine::new("Tasa judicial", dec!(1), dec!(80)).to_line_item()];
    let totals = calculate_totals(&items, &params).unwrap();
    assert_eq!(totals.tax_amount, Decimal::ZERO);
    assert_eq!(totals.total, dec!(80.00));
}

#[test]
fn provisions_larger_than_base_give_negative_total() {
    let params = TotalsParams::default().provisions(dec!(300));
    let items = [DraftLine::new("Consulta", dec!(1), dec!(100)).to_line_item()];
    let totals = calculate_totals(&items, &params).unwrap();
    assert_eq!(totals.taxable_base, dec!(-200.00));
    assert_eq!(totals.tax_amount, dec!(-42.00));
    assert_eq!(totals.total, dec!(-242.00));
}

#[test]
fn client_supplied_line_total_is_ignored() {
    let line: DraftLine = serde_json::from_value(serde_json::json!({
        "description": "Consulta",
        "quantity": 3,
        "unitPrice": "33.33",
        "total": 1
    }))
    .unwrap();
    assert_eq!(line.to_line_item().total, dec!(99.99));
}

// --- Numbering ---

#[test]
fn numbering_resumes_after_highest_suffix() {
    let existing = ["fac-2024-0002", "fac-2024-0010", "fac-2024-0007", "fac-2023-0099"];
    let mut seq = InvoiceNumberSequence::resume(INVOICE_PREFIX, 2024, existing);
    assert_eq!(seq.next_number(), "fac-2024-0011");
    assert_eq!(seq.next_number(), "fac-2024-0012");
}

#[test]
fn numbering_ignores_foreign_formats() {
    let existing = ["fac-2024-12", "fac-2024-abcd", "manual-7"];
    let mut seq = InvoiceNumberSequence::resume(INVOICE_PREFIX, 2024, existing);
    assert_eq!(seq.next_number(), "fac-2024-0001");
}

#[test]
fn numbering_continues_past_manual_numbers() {
    let existing = ["fac-2024-0003", "FAC-2024-0050", "fac-2024-0050-R"];
    let mut seq = InvoiceNumberSequence::resume(INVOICE_PREFIX, 2024, existing);
    assert_eq!(seq.next_number(), "fac-2024-0004");
}

// --- Validation ---

#[test]
fn empty_items_rejected() {
    let err = InvoiceDraftBuilder::new("abogada-1", "cliente-1")
        .build()
        .unwrap_err();
    assert!(matches!(err, FacturaError::InvalidInput(_)));
    assert!(err.to_string().contains("items"));
}

#[test]
fn all_errors_reported_together() {
    let draft = InvoiceDraftBuilder::new("", " ").build_unchecked();
    let errors = validate_draft(&draft);
    assert_eq!(errors.len(), 3);
    let msg = into_result(errors).unwrap_err().to_string();
    assert!(msg.contains("emisorId"));
    assert!(msg.contains("receptorId"));
    assert!(msg.contains("; "));
}

#[test]
fn annulment_reason_needs_three_characters() {
    assert!(!validate_annulment_reason("  ok ").is_empty());
    assert!(validate_annulment_reason("  Duplicada ").is_empty());
}

#[test]
fn error_classification() {
    assert!(FacturaError::NotFound("x".into()).is_client_error());
    assert!(FacturaError::Conflict("x".into()).is_client_error());
    assert!(!FacturaError::Storage(StoreError::Poisoned).is_client_error());
    assert_eq!(
        FacturaError::Unauthorized("x".into()).kind(),
        ErrorKind::Unauthorized
    );
}

// --- Wire format ---

#[test]
fn draft_from_original_payload_shape() {
    let draft: InvoiceDraft = serde_json::from_value(serde_json::json!({
        "emisorId": "abogada-1",
        "receptorId": "cliente-1",
        "fechaFactura": "2024-06-15T10:00:00.000Z",
        "tipoIVA": 10,
        "aplicarIVA": true,
        "items": [{ "description": "Consulta", "quantity": 1, "unitPrice": 50 }],
        "provisionIds": ["p1"]
    }))
    .unwrap();
    assert_eq!(draft.issue_date, Some(date(2024, 6, 15)));
    assert_eq!(draft.tax_rate, Some(dec!(10)));
    assert_eq!(draft.provision_ids, vec!["p1".to_string()]);
    assert_eq!(draft.totals_params(Decimal::ZERO).discount, Decimal::ZERO);
}

#[test]
fn party_tax_id_falls_back_to_email() {
    let mut party = Party {
        id: "c1".into(),
        name: "Cliente".into(),
        dni: None,
        email: Some("cliente@example.com".into()),
    };
    assert_eq!(party.tax_id(), "cliente@example.com");
    party.dni = Some("12345678Z".into());
    assert_eq!(party.tax_id(), "12345678Z");
    party.dni = None;
    party.email = None;
    assert_eq!(party.tax_id(), "");
}

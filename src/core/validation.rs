use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::draft::{DraftLine, InvoiceDraft, InvoiceUpdate};
use super::error::{FacturaError, ValidationError, into_result};

/// Upper bound on line items per invoice.
pub const MAX_LINE_ITEMS: usize = 10_000;
/// Upper bound on the magnitude of a line's quantity and unit price.
pub const MAX_AMOUNT: Decimal = dec!(1000000000000);

/// Upper bound on invoice number length.
pub const MAX_NUMBER_LEN: usize = 200;
/// Minimum length of a trimmed annulment reason.
pub const MIN_ANNULMENT_REASON: usize = 3;

/// Validate a creation payload.
/// Returns all validation errors found (not just the first).
pub fn validate_draft(draft: &InvoiceDraft) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if draft.items.is_empty() {
        errors.push(ValidationError::new(
            "items",
            "at least one line item is required",
        ));
    }
    validate_lines(&draft.items, &mut errors);

    if let Some(number) = &draft.number {
        validate_number(number, &mut errors);
    }
    if draft.issuer_id.trim().is_empty() {
        errors.push(ValidationError::new("emisorId", "issuer is required"));
    }
    if draft.recipient_id.trim().is_empty() {
        errors.push(ValidationError::new("receptorId", "recipient is required"));
    }

    errors
}

/// Validate an update payload. Only the supplied fields are checked.
pub fn validate_update(update: &InvoiceUpdate) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(items) = &update.items {
        if items.is_empty() {
            errors.push(ValidationError::new(
                "items",
                "replacement item list must not be empty",
            ));
        }
        validate_lines(items, &mut errors);
    }
    if let Some(number) = &update.number {
        validate_number(number, &mut errors);
    }

    errors
}

/// Validate the free-text reason given when annulling an invoice.
pub fn validate_annulment_reason(reason: &str) -> Vec<ValidationError> {
    if reason.trim().chars().count() < MIN_ANNULMENT_REASON {
        vec![ValidationError::new(
            "motivoAnulacion",
            format!("reason is required and must have at least {MIN_ANNULMENT_REASON} characters"),
        )]
    } else {
        Vec::new()
    }
}

pub(crate) fn check_draft(draft: &InvoiceDraft) -> Result<(), FacturaError> {
    into_result(validate_draft(draft))
}

fn validate_lines(lines: &[DraftLine], errors: &mut Vec<ValidationError>) {
    if lines.len() > MAX_LINE_ITEMS {
        errors.push(ValidationError::new(
            "items",
            format!("invoice cannot have more than {MAX_LINE_ITEMS} line items"),
        ));
    }
    for (i, line) in lines.iter().enumerate() {
        if line.quantity.abs() > MAX_AMOUNT {
            errors.push(ValidationError::new(
                format!("items.{i}.quantity"),
                format!("must not exceed {MAX_AMOUNT} in magnitude"),
            ));
        }
        if line.unit_price.abs() > MAX_AMOUNT {
            errors.push(ValidationError::new(
                format!("items.{i}.unitPrice"),
                format!("must not exceed {MAX_AMOUNT} in magnitude"),
            ));
        }
    }
}

fn validate_number(number: &str, errors: &mut Vec<ValidationError>) {
    if number.trim().is_empty() {
        errors.push(ValidationError::new("numeroFactura", "must not be blank"));
    }
    if number.len() > MAX_NUMBER_LEN {
        errors.push(ValidationError::new(
            "numeroFactura",
            format!("invoice number cannot exceed {MAX_NUMBER_LEN} characters"),
        ));
    }
}

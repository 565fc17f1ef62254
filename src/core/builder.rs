use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::draft::{DraftLine, InvoiceDraft};
use super::error::FacturaError;
use super::validation;

/// Builder for invoice creation payloads.
///
/// ```
/// use facturae::core::*;
/// use rust_decimal_macros::dec;
///
/// let draft = InvoiceDraftBuilder::new("abogada-1", "cliente-7")
///     .add_line("Consulta inicial", dec!(1), dec!(90))
///     .add_line("Redacción de demanda", dec!(3), dec!(120))
///     .withholding(dec!(15))
///     .build()
///     .unwrap();
///
/// assert_eq!(draft.items.len(), 2);
/// ```
pub struct InvoiceDraftBuilder {
    issuer_id: String,
    recipient_id: String,
    number: Option<String>,
    issue_date: Option<NaiveDate>,
    operation_date: Option<NaiveDate>,
    invoice_type: String,
    case_id: Option<String>,
    items: Vec<DraftLine>,
    discount: Option<Decimal>,
    tax_rate: Option<Decimal>,
    apply_tax: Option<bool>,
    withholding: Option<Decimal>,
    provision_ids: Vec<String>,
}

impl InvoiceDraftBuilder {
    pub fn new(issuer_id: impl Into<String>, recipient_id: impl Into<String>) -> Self {
        Self {
            issuer_id: issuer_id.into(),
            recipient_id: recipient_id.into(),
            number: None,
            issue_date: None,
            operation_date: None,
            invoice_type: String::new(),
            case_id: None,
            items: Vec::new(),
            discount: None,
            tax_rate: None,
            apply_tax: None,
            withholding: None,
            provision_ids: Vec::new(),
        }
    }

    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn issue_date(mut self, date: NaiveDate) -> Self {
        self.issue_date = Some(date);
        self
    }

    pub fn operation_date(mut self, date: NaiveDate) -> Self {
        self.operation_date = Some(date);
        self
    }

    pub fn invoice_type(mut self, kind: impl Into<String>) -> Self {
        self.invoice_type = kind.into();
        self
    }

    pub fn case_id(mut self, case_id: impl Into<String>) -> Self {
        self.case_id = Some(case_id.into());
        self
    }

    pub fn add_line(
        mut self,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        self.items.push(DraftLine::new(description, quantity, unit_price));
        self
    }

    pub fn discount(mut self, percent: Decimal) -> Self {
        self.discount = Some(percent);
        self
    }

    pub fn tax(mut self, apply: bool, rate: Decimal) -> Self {
        self.apply_tax = Some(apply);
        self.tax_rate = Some(rate);
        self
    }

    pub fn withholding(mut self, percent: Decimal) -> Self {
        self.withholding = Some(percent);
        self
    }

    pub fn provision(mut self, provision_id: impl Into<String>) -> Self {
        self.provision_ids.push(provision_id.into());
        self
    }

    /// Build the draft and run [`validate_draft`](super::validate_draft).
    /// Returns all validation errors (not just the first).
    pub fn build(self) -> Result<InvoiceDraft, FacturaError> {
        let draft = self.build_unchecked();
        validation::check_draft(&draft)?;
        Ok(draft)
    }

    /// Build without validation, for exercising rejection paths.
    pub fn build_unchecked(self) -> InvoiceDraft {
        InvoiceDraft {
            number: self.number,
            issue_date: self.issue_date,
            operation_date: self.operation_date,
            invoice_type: self.invoice_type,
            issuer_id: self.issuer_id,
            recipient_id: self.recipient_id,
            case_id: self.case_id,
            items: self.items,
            discount: self.discount,
            tax_rate: self.tax_rate,
            apply_tax: self.apply_tax,
            withholding: self.withholding,
            provision_ids: self.provision_ids,
        }
    }
}

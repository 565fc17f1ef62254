use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::totals::{DEFAULT_TAX_RATE, TotalsParams, line_total};
use super::types::LineItem;

/// Creation payload for an invoice.
///
/// Optional financial fields fall back to the [`TotalsParams`] defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    /// Explicit number; assigned from the yearly sequence when absent.
    #[serde(rename = "numeroFactura", default)]
    pub number: Option<String>,
    /// Defaults to today.
    #[serde(rename = "fechaFactura", default, deserialize_with = "de_opt_date")]
    pub issue_date: Option<NaiveDate>,
    /// Defaults to the issue date.
    #[serde(rename = "fechaOperacion", default, deserialize_with = "de_opt_date")]
    pub operation_date: Option<NaiveDate>,
    #[serde(rename = "tipoFactura", default)]
    pub invoice_type: String,
    #[serde(rename = "emisorId", default)]
    pub issuer_id: String,
    #[serde(rename = "receptorId", default)]
    pub recipient_id: String,
    #[serde(rename = "expedienteId", default)]
    pub case_id: Option<String>,
    pub items: Vec<DraftLine>,
    #[serde(rename = "descuento", default)]
    pub discount: Option<Decimal>,
    #[serde(rename = "tipoIVA", default)]
    pub tax_rate: Option<Decimal>,
    #[serde(rename = "aplicarIVA", default)]
    pub apply_tax: Option<bool>,
    #[serde(rename = "retencion", default)]
    pub withholding: Option<Decimal>,
    /// Fund provisions to offset against this invoice.
    #[serde(rename = "provisionIds", default)]
    pub provision_ids: Vec<String>,
}

impl InvoiceDraft {
    /// Totals parameters for this draft, with `provisions` already summed.
    pub fn totals_params(&self, provisions: Decimal) -> TotalsParams {
        TotalsParams {
            discount: self.discount.unwrap_or(Decimal::ZERO),
            tax_rate: self.tax_rate.unwrap_or(DEFAULT_TAX_RATE),
            apply_tax: self.apply_tax.unwrap_or(true),
            withholding: self.withholding.unwrap_or(Decimal::ZERO),
            provisions,
        }
    }
}

/// A line as submitted by the caller; the total is always recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLine {
    #[serde(default)]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl DraftLine {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    pub fn to_line_item(&self) -> LineItem {
        LineItem {
            description: self.description.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            total: line_total(self.quantity, self.unit_price),
        }
    }
}

/// Partial update of an invoice. Every field is optional; `items`, when
/// present, replaces the whole item list.
///
/// Provision ids are not part of an update: the provisions linked at
/// creation stay linked.
///
/// Totals are recomputed whenever [`changes_amounts`](Self::changes_amounts)
/// holds, so a new discount, tax rate, tax flag or withholding alone also
/// refreshes them, not only a new item list. Stored totals therefore always
/// match the stored parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceUpdate {
    #[serde(rename = "numeroFactura", default)]
    pub number: Option<String>,
    #[serde(rename = "fechaFactura", default, deserialize_with = "de_opt_date")]
    pub issue_date: Option<NaiveDate>,
    #[serde(rename = "fechaOperacion", default, deserialize_with = "de_opt_date")]
    pub operation_date: Option<NaiveDate>,
    #[serde(rename = "tipoFactura", default)]
    pub invoice_type: Option<String>,
    #[serde(rename = "receptorId", default)]
    pub recipient_id: Option<String>,
    #[serde(rename = "expedienteId", default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<DraftLine>>,
    #[serde(rename = "descuento", default)]
    pub discount: Option<Decimal>,
    #[serde(rename = "tipoIVA", default)]
    pub tax_rate: Option<Decimal>,
    #[serde(rename = "aplicarIVA", default)]
    pub apply_tax: Option<bool>,
    #[serde(rename = "retencion", default)]
    pub withholding: Option<Decimal>,
}

impl InvoiceUpdate {
    /// Whether this update touches anything the totals depend on.
    pub fn changes_amounts(&self) -> bool {
        self.items.is_some()
            || self.discount.is_some()
            || self.tax_rate.is_some()
            || self.apply_tax.is_some()
            || self.withholding.is_some()
    }
}

/// Parse a calendar date from `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().or_else(|| {
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.date_naive())
    })
}

fn de_opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_date(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {s}"))),
    }
}

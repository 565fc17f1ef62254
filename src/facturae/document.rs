use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Invoice, Party, parse_date};

/// Everything rendered into a Facturae document, already resolved to
/// display values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacturaeDocument {
    pub number: String,
    pub issue_date: NaiveDate,
    pub invoice_type: String,
    pub issuer: PartyInfo,
    pub recipient: PartyInfo,
    pub total: Decimal,
    pub tax_rate: Decimal,
    pub taxable_base: Decimal,
    pub tax_amount: Decimal,
    pub items: Vec<FacturaeItem>,
}

/// `Emisor` / `Receptor` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyInfo {
    pub nif: String,
    pub name: String,
}

impl From<&Party> for PartyInfo {
    fn from(party: &Party) -> Self {
        Self {
            nif: party.tax_id().to_string(),
            name: party.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacturaeItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
}

impl FacturaeDocument {
    /// Document for a stored invoice. Unresolved parties render as empty
    /// `NIF`/`Nombre`.
    pub fn from_invoice(
        invoice: &Invoice,
        issuer: Option<&Party>,
        recipient: Option<&Party>,
    ) -> Self {
        Self {
            number: invoice.number.clone(),
            issue_date: invoice.issue_date,
            invoice_type: invoice.invoice_type.clone(),
            issuer: issuer.map(PartyInfo::from).unwrap_or_default(),
            recipient: recipient.map(PartyInfo::from).unwrap_or_default(),
            total: invoice.total,
            tax_rate: invoice.tax_rate,
            taxable_base: invoice.taxable_base,
            tax_amount: invoice.tax_amount,
            items: invoice
                .items
                .iter()
                .map(|item| FacturaeItem {
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total: item.total,
                })
                .collect(),
        }
    }

    /// Lenient construction from an untyped invoice payload, dated today
    /// when the payload carries no usable date.
    pub fn from_json(value: &Value) -> Self {
        Self::from_json_at(value, chrono::Local::now().date_naive())
    }

    /// Lenient construction from an untyped invoice payload.
    ///
    /// Never fails: a missing or wrong-typed field becomes `0` or `""`,
    /// an unusable `fechaFactura` becomes `today`, and entries of `items`
    /// that are not objects are dropped.
    pub fn from_json_at(value: &Value, today: NaiveDate) -> Self {
        let issue_date = match value.get("fechaFactura") {
            Some(Value::String(s)) => parse_date(s).unwrap_or_else(|| {
                tracing::debug!(value = %s, "unparseable fechaFactura, using today");
                today
            }),
            _ => today,
        };

        let items = match value.get("items") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter(|entry| entry.is_object())
                .map(|entry| FacturaeItem {
                    description: json_string(entry, "description"),
                    quantity: json_decimal(entry, "quantity"),
                    unit_price: json_decimal(entry, "unitPrice"),
                    total: json_decimal(entry, "total"),
                })
                .collect(),
            Some(other) => {
                tracing::debug!(kind = json_kind(other), "items is not an array, ignoring");
                Vec::new()
            }
            None => Vec::new(),
        };

        Self {
            number: json_string(value, "numeroFactura"),
            issue_date,
            invoice_type: json_string(value, "tipoFactura"),
            issuer: json_party(value.get("emisor")),
            recipient: json_party(value.get("receptor")),
            total: json_decimal(value, "importeTotal"),
            tax_rate: json_decimal(value, "tipoIVA"),
            taxable_base: json_decimal(value, "baseImponible"),
            tax_amount: json_decimal(value, "cuotaIVA"),
            items,
        }
    }
}

fn json_party(value: Option<&Value>) -> PartyInfo {
    let Some(party) = value.filter(|v| v.is_object()) else {
        return PartyInfo::default();
    };
    let nif = [json_string(party, "dni"), json_string(party, "email")]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    PartyInfo {
        nif,
        name: json_string(party, "name"),
    }
}

fn json_string(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => {
            tracing::debug!(field = key, kind = json_kind(other), "expected string, using \"\"");
            String::new()
        }
        _ => String::new(),
    }
}

fn json_decimal(value: &Value, key: &str) -> Decimal {
    match value.get(key) {
        Some(Value::Number(n)) => number_to_decimal(n).unwrap_or_else(|| {
            tracing::debug!(field = key, value = %n, "number out of range, using 0");
            Decimal::ZERO
        }),
        Some(other) if !other.is_null() => {
            tracing::debug!(field = key, kind = json_kind(other), "expected number, using 0");
            Decimal::ZERO
        }
        _ => Decimal::ZERO,
    }
}

fn number_to_decimal(n: &serde_json::Number) -> Option<Decimal> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
        .or_else(|| n.as_f64().and_then(Decimal::from_f64))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

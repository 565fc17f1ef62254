use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An issued invoice together with its line items.
///
/// Field names on the wire follow the original JSON contract
/// (`numeroFactura`, `baseImponible`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    /// Sequential number, `fac-<year>-<NNNN>`.
    #[serde(rename = "numeroFactura")]
    pub number: String,
    #[serde(rename = "fechaFactura")]
    pub issue_date: NaiveDate,
    #[serde(rename = "fechaOperacion")]
    pub operation_date: NaiveDate,
    /// Free-text invoice type ("TipoFactura").
    #[serde(rename = "tipoFactura", default)]
    pub invoice_type: String,
    #[serde(rename = "emisorId")]
    pub issuer_id: String,
    #[serde(rename = "receptorId")]
    pub recipient_id: String,
    #[serde(rename = "expedienteId", default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    /// Ordered line items, owned by this invoice.
    pub items: Vec<LineItem>,
    /// Discount percentage applied to the item base.
    #[serde(rename = "descuento")]
    pub discount: Decimal,
    /// Tax (IVA) rate percentage.
    #[serde(rename = "tipoIVA")]
    pub tax_rate: Decimal,
    #[serde(rename = "aplicarIVA")]
    pub apply_tax: bool,
    /// Withholding (IRPF) percentage.
    #[serde(rename = "retencion")]
    pub withholding: Decimal,
    #[serde(rename = "baseImponible")]
    pub taxable_base: Decimal,
    #[serde(rename = "cuotaIVA")]
    pub tax_amount: Decimal,
    #[serde(rename = "importeTotal")]
    pub total: Decimal,
    #[serde(rename = "estado")]
    pub state: InvoiceState,
    #[serde(rename = "motivoAnulacion", default, skip_serializing_if = "Option::is_none")]
    pub annulment_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml: Option<String>,
    #[serde(rename = "xmlFirmado", default, skip_serializing_if = "Option::is_none")]
    pub signed_xml: Option<String>,
}

impl Invoice {
    pub fn is_annulled(&self) -> bool {
        self.state == InvoiceState::Anulada
    }
}

/// A single invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// `quantity * unit_price`.
    pub total: Decimal,
}

/// A client's pre-paid retainer, optionally offset against one invoice.
///
/// The link to the invoice is weak: removing the invoice clears
/// `invoice_id` but keeps the provision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundProvision {
    pub id: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "invoiceId", default)]
    pub invoice_id: Option<String>,
}

/// An issuer or recipient as resolved from the user records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub dni: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Party {
    /// Tax identifier used in the XML: the DNI/NIF on file, else the email.
    pub fn tax_id(&self) -> &str {
        self.dni
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.email.as_deref())
            .unwrap_or("")
    }
}

/// Invoice lifecycle state. `Anulada` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceState {
    Emitida,
    Anulada,
}

impl InvoiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emitida => "emitida",
            Self::Anulada => "anulada",
        }
    }
}

impl std::fmt::Display for InvoiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computed invoice amounts. See [`calculate_totals`](super::calculate_totals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    /// Σ quantity × unit price, before discount.
    pub gross_base: Decimal,
    /// Base after discount and provisions. May be negative.
    pub taxable_base: Decimal,
    pub tax_amount: Decimal,
    pub withheld_amount: Decimal,
    /// `taxable_base + tax_amount - withheld_amount`.
    pub total: Decimal,
}

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::config::{MaterialSource, SigningConfig};
use super::store::{InvoiceStore, WriteBatch, WriteOp};
use crate::core::{
    FacturaError, FundProvision, INVOICE_PREFIX, Invoice, InvoiceDraft, InvoiceNumberSequence,
    InvoiceState, InvoiceUpdate, LineItem, StoreError, TotalsParams, calculate_totals,
    into_result, provisions_total, validate_annulment_reason, validate_draft, validate_update,
};
use crate::facturae::invoice_to_facturae_xml;
use crate::xades::{SigningError, XadesSigner};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// An invoice together with the fund provisions offset against it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceWithProvisions {
    #[serde(flatten)]
    pub invoice: Invoice,
    #[serde(rename = "provisionFondos")]
    pub provisions: Vec<FundProvision>,
}

/// Where to find the certificate and key for [`InvoiceService::sign`].
///
/// Inline content wins over a path; when neither is given the paths of the
/// service's [`SigningConfig`] are used.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    #[serde(default)]
    pub cert_content: Option<String>,
    #[serde(default)]
    pub key_content: Option<String>,
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl SignRequest {
    pub fn inline(cert_pem: impl Into<String>, key_pem: impl Into<String>) -> Self {
        Self {
            cert_content: Some(cert_pem.into()),
            key_content: Some(key_pem.into()),
            ..Self::default()
        }
    }

    pub fn paths(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: Some(cert_path.into()),
            key_path: Some(key_path.into()),
            ..Self::default()
        }
    }

    fn certificate(&self, config: &SigningConfig) -> Option<MaterialSource> {
        source(&self.cert_content, &self.cert_path, &config.cert_path)
    }

    fn key(&self, config: &SigningConfig) -> Option<MaterialSource> {
        source(&self.key_content, &self.key_path, &config.key_path)
    }
}

impl fmt::Debug for SignRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignRequest")
            .field("cert_content", &self.cert_content.as_ref().map(String::len))
            .field("key_content", &self.key_content.as_ref().map(|_| "<redacted>"))
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .finish()
    }
}

fn source(
    content: &Option<String>,
    path: &Option<PathBuf>,
    fallback: &Option<PathBuf>,
) -> Option<MaterialSource> {
    match (content, path, fallback) {
        (Some(pem), _, _) if !pem.trim().is_empty() => Some(MaterialSource::Inline(pem.clone())),
        (_, Some(path), _) | (_, None, Some(path)) => Some(MaterialSource::Path(path.clone())),
        _ => None,
    }
}

/// Orchestrates invoice creation, update, removal, annulment and signing
/// over an [`InvoiceStore`].
///
/// ```
/// use facturae::core::InvoiceDraftBuilder;
/// use facturae::lifecycle::{InvoiceService, MemoryStore};
/// use rust_decimal_macros::dec;
///
/// let service = InvoiceService::new(MemoryStore::new());
/// let draft = InvoiceDraftBuilder::new("abogada-1", "cliente-1")
///     .add_line("Consulta", dec!(2), dec!(100))
///     .build()
///     .unwrap();
/// let invoice = service.create(draft).unwrap();
/// assert_eq!(invoice.total, dec!(242.00));
/// assert!(invoice.xml.is_some());
/// ```
pub struct InvoiceService<S> {
    store: S,
    clock: Clock,
    signing: SigningConfig,
}

impl<S: fmt::Debug> fmt::Debug for InvoiceService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvoiceService")
            .field("store", &self.store)
            .field("signing", &self.signing)
            .finish_non_exhaustive()
    }
}

impl<S: InvoiceStore> InvoiceService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(Utc::now),
            signing: SigningConfig::default(),
        }
    }

    /// Replace the source of "now" (issue date defaults, numbering year,
    /// XAdES signing time).
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_signing_config(mut self, config: SigningConfig) -> Self {
        self.signing = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn today(&self) -> NaiveDate {
        (self.clock)().date_naive()
    }

    /// Create an invoice: number, totals, items, provision links and XML
    /// are persisted in one unit.
    #[instrument(skip_all, fields(issuer = %draft.issuer_id, items = draft.items.len()))]
    pub fn create(&self, draft: InvoiceDraft) -> Result<Invoice, FacturaError> {
        into_result(validate_draft(&draft))?;

        let provisions = self.store.provisions_by_ids(&draft.provision_ids)?;
        let items: Vec<LineItem> = draft.items.iter().map(|l| l.to_line_item()).collect();
        let params = draft.totals_params(provisions_total(&provisions)?);
        let totals = calculate_totals(&items, &params)?;

        let number = match draft.number.clone() {
            Some(number) => number,
            None => self.next_number()?,
        };
        let issue_date = draft.issue_date.unwrap_or_else(|| self.today());

        let mut invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            number,
            issue_date,
            operation_date: draft.operation_date.unwrap_or(issue_date),
            invoice_type: draft.invoice_type,
            issuer_id: draft.issuer_id,
            recipient_id: draft.recipient_id,
            case_id: draft.case_id,
            items,
            discount: draft.discount.unwrap_or_default(),
            tax_rate: draft.tax_rate.unwrap_or(crate::core::DEFAULT_TAX_RATE),
            apply_tax: draft.apply_tax.unwrap_or(true),
            withholding: draft.withholding.unwrap_or_default(),
            taxable_base: totals.taxable_base,
            tax_amount: totals.tax_amount,
            total: totals.total,
            state: InvoiceState::Emitida,
            annulment_reason: None,
            xml: None,
            signed_xml: None,
        };
        invoice.xml = Some(self.render_xml(&invoice)?);

        let provision_ids: Vec<String> = provisions.iter().map(|p| p.id.clone()).collect();
        let mut batch = WriteBatch::new().push(WriteOp::InsertInvoice(invoice.clone()));
        if !provision_ids.is_empty() {
            batch = batch.push(WriteOp::LinkProvisions {
                invoice_id: invoice.id.clone(),
                provision_ids,
            });
        }
        self.commit("create", &invoice.id, batch)?;

        info!(id = %invoice.id, number = %invoice.number, total = %invoice.total, "invoice created");
        Ok(invoice)
    }

    /// [`create`](Self::create) from an untyped JSON payload. Shape errors
    /// (such as `items` not being a list) are invalid input.
    pub fn create_from_json(&self, payload: &Value) -> Result<Invoice, FacturaError> {
        if !payload.get("items").is_some_and(Value::is_array) {
            return Err(FacturaError::InvalidInput(
                "items: must be a non-empty list of line items".into(),
            ));
        }
        let draft: InvoiceDraft = serde_json::from_value(payload.clone())
            .map_err(|e| FacturaError::InvalidInput(format!("invalid invoice payload: {e}")))?;
        self.create(draft)
    }

    /// Apply a partial update. Totals are recomputed against the provisions
    /// currently linked to the invoice whenever items or financial
    /// parameters change.
    #[instrument(skip(self, update))]
    pub fn update(&self, id: &str, update: InvoiceUpdate) -> Result<Invoice, FacturaError> {
        into_result(validate_update(&update))?;

        let current = self.require(id)?;
        if current.is_annulled() {
            warn!(id, "update rejected: invoice is annulled");
            return Err(FacturaError::Conflict(format!(
                "invoice {id} is annulled and cannot be modified"
            )));
        }

        let recompute = update.changes_amounts();
        let mut invoice = current;
        if let Some(number) = update.number {
            invoice.number = number;
        }
        if let Some(date) = update.issue_date {
            invoice.issue_date = date;
        }
        if let Some(date) = update.operation_date {
            invoice.operation_date = date;
        }
        if let Some(kind) = update.invoice_type {
            invoice.invoice_type = kind;
        }
        if let Some(recipient) = update.recipient_id {
            invoice.recipient_id = recipient;
        }
        if let Some(case_id) = update.case_id {
            invoice.case_id = Some(case_id);
        }
        let replaced_items = update.items.is_some();
        if let Some(lines) = update.items {
            invoice.items = lines.iter().map(|l| l.to_line_item()).collect();
        }
        invoice.discount = update.discount.unwrap_or(invoice.discount);
        invoice.tax_rate = update.tax_rate.unwrap_or(invoice.tax_rate);
        invoice.apply_tax = update.apply_tax.unwrap_or(invoice.apply_tax);
        invoice.withholding = update.withholding.unwrap_or(invoice.withholding);

        if recompute {
            let provisions = self.store.provisions_for_invoice(id)?;
            let params = TotalsParams::default()
                .discount(invoice.discount)
                .tax(invoice.apply_tax, invoice.tax_rate)
                .withholding(invoice.withholding)
                .provisions(provisions_total(&provisions)?);
            let totals = calculate_totals(&invoice.items, &params)?;
            invoice.taxable_base = totals.taxable_base;
            invoice.tax_amount = totals.tax_amount;
            invoice.total = totals.total;
        }
        invoice.xml = Some(self.render_xml(&invoice)?);

        let mut batch = WriteBatch::new().push(WriteOp::UpdateInvoice(invoice.clone()));
        if replaced_items {
            batch = batch.push(WriteOp::ReplaceItems {
                invoice_id: invoice.id.clone(),
                items: invoice.items.clone(),
            });
        }
        self.commit("update", id, batch)?;

        info!(id, recomputed = recompute, total = %invoice.total, "invoice updated");
        Ok(invoice)
    }

    /// Delete an invoice and its items. Linked provisions survive, unlinked.
    #[instrument(skip(self))]
    pub fn remove(&self, id: &str) -> Result<Invoice, FacturaError> {
        let invoice = self.require(id)?;
        let batch = WriteBatch::new()
            .push(WriteOp::UnlinkProvisions {
                invoice_id: id.to_string(),
            })
            .push(WriteOp::DeleteItems {
                invoice_id: id.to_string(),
            })
            .push(WriteOp::DeleteInvoice {
                invoice_id: id.to_string(),
            });
        self.commit("remove", id, batch)?;

        info!(id, number = %invoice.number, "invoice removed");
        Ok(invoice)
    }

    /// Sign the stored XML and persist the signed document.
    #[instrument(skip(self, request))]
    pub fn sign(&self, id: &str, request: &SignRequest) -> Result<Invoice, FacturaError> {
        let mut invoice = self.require(id)?;
        let xml = invoice
            .xml
            .clone()
            .ok_or_else(|| FacturaError::NotFound(format!("invoice {id} has no XML to sign")))?;

        let cert_pem = load_material(request.certificate(&self.signing), "certificate")?;
        let key_pem = load_material(request.key(&self.signing), "private key")?;

        let mut signer = XadesSigner::from_pem(&cert_pem, &key_pem)?;
        if self.signing.xades_signing_time {
            signer = signer.with_signing_time((self.clock)());
        }
        let signed_xml = signer.sign(&xml)?;

        let batch = WriteBatch::new().push(WriteOp::SetSignedXml {
            invoice_id: id.to_string(),
            signed_xml: signed_xml.clone(),
        });
        self.commit("sign", id, batch)?;

        info!(id, number = %invoice.number, "invoice signed");
        invoice.signed_xml = Some(signed_xml);
        Ok(invoice)
    }

    /// Move an invoice to `anulada`. Only its issuer may do so.
    #[instrument(skip(self, reason))]
    pub fn annul(&self, id: &str, reason: &str, caller: &str) -> Result<Invoice, FacturaError> {
        let mut invoice = self.require(id)?;
        ensure_issuer(&invoice, caller)?;
        if invoice.is_annulled() {
            warn!(id, "annulment rejected: already annulled");
            return Err(FacturaError::Conflict(format!("invoice {id} is already annulled")));
        }
        into_result(validate_annulment_reason(reason))?;

        invoice.state = InvoiceState::Anulada;
        invoice.annulment_reason = Some(reason.trim().to_string());
        let batch = WriteBatch::new().push(WriteOp::UpdateInvoice(invoice.clone()));
        self.commit("annul", id, batch)?;

        info!(id, number = %invoice.number, "invoice annulled");
        Ok(invoice)
    }

    /// XML of each invoice, generated and stored first where missing.
    ///
    /// Stops at the first unknown or foreign invoice; XML stored for the
    /// ids before it is kept.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn generate_xml_for_many(
        &self,
        ids: &[String],
        caller: &str,
    ) -> Result<Vec<(String, String)>, FacturaError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let invoice = self.require(id)?;
            ensure_issuer(&invoice, caller)?;
            let xml = match invoice.xml.clone() {
                Some(xml) => xml,
                None => {
                    let xml = self.render_xml(&invoice)?;
                    let batch = WriteBatch::new().push(WriteOp::SetXml {
                        invoice_id: id.clone(),
                        xml: xml.clone(),
                    });
                    self.commit("generate_xml", id, batch)?;
                    xml
                }
            };
            out.push((id.clone(), xml));
        }
        Ok(out)
    }

    /// Store a document signed outside this service, e.g. by a desktop
    /// signing tool. The content is stored as given.
    #[instrument(skip(self, signed_xml), fields(len = signed_xml.len()))]
    pub fn save_signed_xml(
        &self,
        id: &str,
        signed_xml: &str,
        caller: &str,
    ) -> Result<Invoice, FacturaError> {
        let mut invoice = self.require(id)?;
        ensure_issuer(&invoice, caller)?;

        let batch = WriteBatch::new().push(WriteOp::SetSignedXml {
            invoice_id: id.to_string(),
            signed_xml: signed_xml.to_string(),
        });
        self.commit("save_signed_xml", id, batch)?;

        info!(id, "signed XML stored");
        invoice.signed_xml = Some(signed_xml.to_string());
        Ok(invoice)
    }

    pub fn find_one(&self, id: &str) -> Result<InvoiceWithProvisions, FacturaError> {
        let invoice = self.require(id)?;
        let provisions = self.store.provisions_for_invoice(id)?;
        Ok(InvoiceWithProvisions {
            invoice,
            provisions,
        })
    }

    pub fn find_all(&self) -> Result<Vec<InvoiceWithProvisions>, FacturaError> {
        self.store
            .invoices()?
            .into_iter()
            .map(|invoice| -> Result<InvoiceWithProvisions, FacturaError> {
                let provisions = self.store.provisions_for_invoice(&invoice.id)?;
                Ok(InvoiceWithProvisions {
                    invoice,
                    provisions,
                })
            })
            .collect()
    }

    /// Stored XML of an invoice, or a freshly rendered one when none is
    /// stored. Nothing is persisted.
    pub fn xml_for(&self, id: &str) -> Result<String, FacturaError> {
        let invoice = self.require(id)?;
        match &invoice.xml {
            Some(xml) => Ok(xml.clone()),
            None => self.render_xml(&invoice),
        }
    }

    fn require(&self, id: &str) -> Result<Invoice, FacturaError> {
        self.store
            .invoice(id)?
            .ok_or_else(|| FacturaError::NotFound(format!("invoice {id} not found")))
    }

    fn next_number(&self) -> Result<String, FacturaError> {
        let year = self.today().year();
        let prefix = format!("{INVOICE_PREFIX}{year}-");
        let existing = self.store.numbers_with_prefix(&prefix)?;
        let mut sequence =
            InvoiceNumberSequence::resume(INVOICE_PREFIX, year, existing.iter().map(String::as_str));
        Ok(sequence.next_number())
    }

    fn render_xml(&self, invoice: &Invoice) -> Result<String, FacturaError> {
        let issuer = self.store.party(&invoice.issuer_id)?;
        let recipient = self.store.party(&invoice.recipient_id)?;
        invoice_to_facturae_xml(invoice, issuer.as_ref(), recipient.as_ref())
    }

    fn commit(&self, operation: &str, id: &str, batch: WriteBatch) -> Result<(), FacturaError> {
        self.store.apply(batch).map_err(|e: StoreError| {
            error!(operation, id, error = %e, "storage write failed");
            FacturaError::from(e)
        })
    }
}

/// Only the issuer of an invoice may act on it.
pub fn ensure_issuer(invoice: &Invoice, caller: &str) -> Result<(), FacturaError> {
    if invoice.issuer_id == caller {
        return Ok(());
    }
    warn!(id = %invoice.id, caller, "caller is not the issuer");
    Err(FacturaError::Unauthorized(format!(
        "caller is not the issuer of invoice {}",
        invoice.id
    )))
}

fn load_material(source: Option<MaterialSource>, what: &str) -> Result<String, SigningError> {
    match source {
        Some(source) => source.load(what),
        None => Err(SigningError::InputMissing(format!("{what} not provided"))),
    }
}

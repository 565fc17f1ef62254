use std::collections::HashMap;
use std::sync::RwLock;

use super::store::{InvoiceStore, WriteBatch, WriteOp};
use crate::core::{FundProvision, Invoice, LineItem, Party, StoreError};

/// In-process [`InvoiceStore`].
///
/// A batch is applied to a copy of the tables under the write lock and
/// swapped in only when every operation succeeded, so readers never see a
/// half-applied unit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    /// Invoice headers in insertion order; items live in `items`.
    invoices: Vec<Invoice>,
    items: HashMap<String, Vec<LineItem>>,
    provisions: Vec<FundProvision>,
    parties: HashMap<String, Party>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user, client or firm.
    pub fn insert_party(&self, party: Party) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        tables.parties.insert(party.id.clone(), party);
        Ok(())
    }

    /// Register a fund provision, replacing one with the same id.
    pub fn insert_provision(&self, provision: FundProvision) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        tables.provisions.retain(|p| p.id != provision.id);
        tables.provisions.push(provision);
        Ok(())
    }

    /// Look up a provision regardless of its link.
    pub fn provision(&self, id: &str) -> Result<Option<FundProvision>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.provisions.iter().find(|p| p.id == id).cloned())
    }

    /// Number of line item rows stored for `invoice_id`.
    pub fn item_count(&self, invoice_id: &str) -> Result<usize, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.items.get(invoice_id).map_or(0, Vec::len))
    }
}

impl Tables {
    fn with_items(&self, header: &Invoice) -> Invoice {
        let mut invoice = header.clone();
        invoice.items = self.items.get(&header.id).cloned().unwrap_or_default();
        invoice
    }

    fn position(&self, invoice_id: &str) -> Result<usize, StoreError> {
        self.invoices
            .iter()
            .position(|i| i.id == invoice_id)
            .ok_or_else(|| StoreError::Missing {
                entity: "invoice",
                id: invoice_id.to_string(),
            })
    }

    fn check_number(&self, invoice: &Invoice) -> Result<(), StoreError> {
        if self
            .invoices
            .iter()
            .any(|i| i.id != invoice.id && i.number == invoice.number)
        {
            return Err(StoreError::UniqueViolation(format!(
                "invoice number {} already exists",
                invoice.number
            )));
        }
        Ok(())
    }

    fn apply(&mut self, op: WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::InsertInvoice(mut invoice) => {
                if self.invoices.iter().any(|i| i.id == invoice.id) {
                    return Err(StoreError::UniqueViolation(format!(
                        "invoice id {} already exists",
                        invoice.id
                    )));
                }
                self.check_number(&invoice)?;
                let items = std::mem::take(&mut invoice.items);
                self.items.insert(invoice.id.clone(), items);
                self.invoices.push(invoice);
            }
            WriteOp::UpdateInvoice(mut invoice) => {
                let at = self.position(&invoice.id)?;
                self.check_number(&invoice)?;
                invoice.items.clear();
                self.invoices[at] = invoice;
            }
            WriteOp::ReplaceItems { invoice_id, items } => {
                self.position(&invoice_id)?;
                self.items.insert(invoice_id, items);
            }
            WriteOp::DeleteItems { invoice_id } => {
                self.items.remove(&invoice_id);
            }
            WriteOp::DeleteInvoice { invoice_id } => {
                let at = self.position(&invoice_id)?;
                if self.items.get(&invoice_id).is_some_and(|items| !items.is_empty()) {
                    return Err(StoreError::Backend(format!(
                        "invoice {invoice_id} still has line items"
                    )));
                }
                if self
                    .provisions
                    .iter()
                    .any(|p| p.invoice_id.as_deref() == Some(invoice_id.as_str()))
                {
                    return Err(StoreError::Backend(format!(
                        "invoice {invoice_id} is still referenced by fund provisions"
                    )));
                }
                self.invoices.remove(at);
            }
            WriteOp::SetXml { invoice_id, xml } => {
                let at = self.position(&invoice_id)?;
                self.invoices[at].xml = Some(xml);
            }
            WriteOp::SetSignedXml {
                invoice_id,
                signed_xml,
            } => {
                let at = self.position(&invoice_id)?;
                self.invoices[at].signed_xml = Some(signed_xml);
            }
            WriteOp::LinkProvisions {
                invoice_id,
                provision_ids,
            } => {
                self.position(&invoice_id)?;
                for id in &provision_ids {
                    let provision = self
                        .provisions
                        .iter_mut()
                        .find(|p| &p.id == id)
                        .ok_or_else(|| StoreError::Missing {
                            entity: "fund provision",
                            id: id.clone(),
                        })?;
                    provision.invoice_id = Some(invoice_id.clone());
                }
            }
            WriteOp::UnlinkProvisions { invoice_id } => {
                for provision in &mut self.provisions {
                    if provision.invoice_id.as_deref() == Some(invoice_id.as_str()) {
                        provision.invoice_id = None;
                    }
                }
            }
        }
        Ok(())
    }
}

impl InvoiceStore for MemoryStore {
    fn invoice(&self, id: &str) -> Result<Option<Invoice>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables
            .invoices
            .iter()
            .find(|i| i.id == id)
            .map(|header| tables.with_items(header)))
    }

    fn invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables
            .invoices
            .iter()
            .map(|header| tables.with_items(header))
            .collect())
    }

    fn numbers_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables
            .invoices
            .iter()
            .filter(|i| i.number.starts_with(prefix))
            .map(|i| i.number.clone())
            .collect())
    }

    fn provisions_by_ids(&self, ids: &[String]) -> Result<Vec<FundProvision>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables
            .provisions
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    fn provisions_for_invoice(&self, invoice_id: &str) -> Result<Vec<FundProvision>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables
            .provisions
            .iter()
            .filter(|p| p.invoice_id.as_deref() == Some(invoice_id))
            .cloned()
            .collect())
    }

    fn party(&self, id: &str) -> Result<Option<Party>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.parties.get(id).cloned())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let mut staged = tables.clone();
        for op in batch {
            staged.apply(op)?;
        }
        *tables = staged;
        Ok(())
    }
}

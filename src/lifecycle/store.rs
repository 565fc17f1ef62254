use crate::core::{FundProvision, Invoice, LineItem, Party, StoreError};

/// Persistence collaborator of [`InvoiceService`](super::InvoiceService).
///
/// Reads are plain lookups. Every write goes through [`apply`](Self::apply),
/// which must execute the whole batch or nothing.
pub trait InvoiceStore: Send + Sync {
    /// Invoice with its items, or `None` when the id is unknown.
    fn invoice(&self, id: &str) -> Result<Option<Invoice>, StoreError>;

    /// Every invoice with its items, in insertion order.
    fn invoices(&self) -> Result<Vec<Invoice>, StoreError>;

    /// Numbers of all invoices whose number starts with `prefix`.
    fn numbers_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Provisions with one of the given ids. Unknown ids are skipped.
    fn provisions_by_ids(&self, ids: &[String]) -> Result<Vec<FundProvision>, StoreError>;

    /// Provisions currently linked to `invoice_id`.
    fn provisions_for_invoice(&self, invoice_id: &str) -> Result<Vec<FundProvision>, StoreError>;

    /// A user, client or firm record by id.
    fn party(&self, id: &str) -> Result<Option<Party>, StoreError>;

    /// Execute `batch` atomically.
    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

/// One write of a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a new invoice together with its items. The number must be unique.
    InsertInvoice(Invoice),
    /// Overwrite the header of an existing invoice; its items are left alone.
    UpdateInvoice(Invoice),
    ReplaceItems {
        invoice_id: String,
        items: Vec<LineItem>,
    },
    DeleteItems {
        invoice_id: String,
    },
    DeleteInvoice {
        invoice_id: String,
    },
    SetXml {
        invoice_id: String,
        xml: String,
    },
    SetSignedXml {
        invoice_id: String,
        signed_xml: String,
    },
    /// Point each provision at `invoice_id`.
    LinkProvisions {
        invoice_id: String,
        provision_ids: Vec<String>,
    },
    /// Clear the link of every provision pointing at `invoice_id`.
    UnlinkProvisions {
        invoice_id: String,
    },
}

impl WriteOp {
    /// Invoice the operation touches.
    pub fn invoice_id(&self) -> &str {
        match self {
            Self::InsertInvoice(invoice) | Self::UpdateInvoice(invoice) => &invoice.id,
            Self::ReplaceItems { invoice_id, .. }
            | Self::DeleteItems { invoice_id }
            | Self::DeleteInvoice { invoice_id }
            | Self::SetXml { invoice_id, .. }
            | Self::SetSignedXml { invoice_id, .. }
            | Self::LinkProvisions { invoice_id, .. }
            | Self::UnlinkProvisions { invoice_id } => invoice_id,
        }
    }
}

/// An ordered unit of writes that succeeds or fails as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

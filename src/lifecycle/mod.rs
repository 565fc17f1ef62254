//! Invoice lifecycle: creation, update, removal, annulment and signing.
//!
//! [`InvoiceService`] ties the pure pieces together over an
//! [`InvoiceStore`]:
//!
//! ```text
//! create ─► totals ─► number ─► XML ─► store.apply([insert, link provisions])
//! sign   ─► stored XML ─► XadesSigner ─► store.apply([set signed XML])
//! ```
//!
//! State machine: `emitida ─annul─► anulada` (terminal).

mod config;
mod memory;
mod service;
mod store;

pub use config::{ENV_PREFIX, MaterialSource, SigningConfig};
pub use memory::MemoryStore;
pub use service::{InvoiceService, InvoiceWithProvisions, SignRequest, ensure_issuer};
pub use store::{InvoiceStore, WriteBatch, WriteOp};

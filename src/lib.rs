//! # facturae
//!
//! Invoicing core for a legal office: totals with discounts, fund
//! provisions, IVA and IRPF withholding; Facturae XML; XAdES enveloped
//! signatures; and the invoice lifecycle over a pluggable store.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use facturae::core::*;
//! use rust_decimal_macros::dec;
//!
//! let draft = InvoiceDraftBuilder::new("abogada-1", "cliente-1")
//!     .add_line("Consulta", dec!(1), dec!(150))
//!     .add_line("Escrito", dec!(1), dec!(50))
//!     .build()
//!     .unwrap();
//!
//! let items: Vec<LineItem> = draft.items.iter().map(DraftLine::to_line_item).collect();
//! let totals = calculate_totals(&items, &draft.totals_params(dec!(0))).unwrap();
//! assert_eq!(totals.total, dec!(242.00));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Invoice types, totals, numbering, validation |
//! | `facturae` | Facturae XML generation and reading |
//! | `xades` | XAdES / XML-DSig enveloped signing and verification |
//! | `lifecycle` | Invoice service, store trait, in-memory store, signing config |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "facturae")]
pub mod facturae;

#[cfg(feature = "xades")]
pub mod xades;

#[cfg(feature = "lifecycle")]
pub mod lifecycle;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;

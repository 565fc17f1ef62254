//! Core invoice types, totals, numbering, and payload validation.
//!
//! Everything here is pure and performs no I/O.

mod builder;
mod draft;
mod error;
mod numbering;
mod totals;
mod types;
mod validation;

pub use builder::*;
pub use draft::*;
pub use error::*;
pub use numbering::*;
pub use totals::*;
pub use types::*;
pub use validation::*;

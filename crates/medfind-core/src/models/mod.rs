//! Domain models for the medfind system.

mod medicine;
mod pharmacy;
mod resolution;

pub use medicine::*;
pub use pharmacy::*;
pub use resolution::*;

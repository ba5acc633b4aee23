//! Embedding vectors for medicine names: provider clients and the
//! persistent cache in front of them.

mod cache;
mod provider;

pub use cache::*;
pub use provider::*;

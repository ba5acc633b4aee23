//! Medfind Core Library
//!
//! Finds a medicine in nearby pharmacy stock and, when nobody stocks it,
//! falls back to ranked alternatives from a static medicine catalog.
//!
//! # Architecture
//!
//! ```text
//!                      query (+ optional lat/lng)
//!                                  │
//!                     ┌────────────▼────────────┐
//!                     │   Inventory (SQLite)    │── hit ──▶ pharmacies, nearest first
//!                     └────────────┬────────────┘
//!                                  │ empty
//!                     ┌────────────▼────────────┐
//!                     │  Fuzzy (catalog names)  │── hit ──▶ typo corrections
//!                     └────────────┬────────────┘
//!                                  │ empty
//!                     ┌────────────▼────────────┐
//!                     │ Semantic (embeddings)   │── hit ──▶ similar medicines
//!                     └────────────┬────────────┘
//!                                  │ empty
//!                                  ▼
//!                                None
//! ```
//!
//! # Modules
//!
//! - [`catalog`]: Immutable medicine catalog loaded from the CSV dataset
//! - [`db`]: SQLite database layer for pharmacies and their stock
//! - [`embedding`]: Embedding providers and the persistent vector cache
//! - [`geo`]: Great-circle distance and bounding boxes
//! - [`inventory`]: Geospatial stock queries
//! - [`models`]: Domain types (MedicineRecord, Pharmacy, Resolution, etc.)
//! - [`resolver`]: Fuzzy matcher, semantic ranker and the tier pipeline

pub mod catalog;
pub mod db;
pub mod embedding;
pub mod geo;
pub mod inventory;
pub mod models;
pub mod resolver;

// Re-export commonly used types
pub use catalog::Catalog;
pub use db::Database;
pub use embedding::{
    DisabledProvider, EmbeddingCache, EmbeddingProvider, OpenAiEmbeddingProvider,
};
pub use inventory::{PharmacyStore, SqlitePharmacyStore};
pub use models::{
    GeoPoint, InventoryItem, InventoryMatch, MedicineRecord, Pharmacy, Resolution,
    ResolutionResult, Suggestion, Tier,
};
pub use resolver::{Resolver, ResolverConfig, ResolverError, SharedIndex};

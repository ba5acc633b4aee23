//! SQLite schema definition.

/// Pharmacy store schema.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Pharmacies
-- ============================================================================

CREATE TABLE IF NOT EXISTS pharmacies (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    address TEXT,
    phone TEXT,
    lat REAL NOT NULL CHECK (lat BETWEEN -90 AND 90),
    lng REAL NOT NULL CHECK (lng BETWEEN -180 AND 180),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Bounding-box pre-filter for proximity queries
CREATE INDEX IF NOT EXISTS idx_pharmacies_lat_lng ON pharmacies(lat, lng);

-- ============================================================================
-- Inventory (one row per pharmacy and normalized medicine name)
-- ============================================================================

CREATE TABLE IF NOT EXISTS pharmacy_inventory (
    pharmacy_id TEXT NOT NULL REFERENCES pharmacies(id) ON DELETE CASCADE,
    medicine TEXT NOT NULL,                      -- normalized lowercase name
    quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    price REAL CHECK (price IS NULL OR price >= 0),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (pharmacy_id, medicine)
);

CREATE INDEX IF NOT EXISTS idx_inventory_medicine ON pharmacy_inventory(medicine);
"#;

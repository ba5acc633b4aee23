//! Pharmacy and inventory database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::geo::BoundingBox;
use crate::models::{normalize_name, GeoPoint, InventoryFilter, InventoryItem, Pharmacy};

/// A pharmacy with the inventory lines that satisfied a stock query.
#[derive(Debug, Clone, PartialEq)]
pub struct StockRow {
    pub pharmacy: Pharmacy,
    pub items: Vec<InventoryItem>,
}

impl Database {
    /// Insert or update a pharmacy profile.
    pub fn upsert_pharmacy(&self, pharmacy: &Pharmacy) -> DbResult<()> {
        if !pharmacy.location.is_valid() {
            return Err(DbError::Constraint(format!(
                "invalid location for pharmacy {}",
                pharmacy.id
            )));
        }

        self.conn.execute(
            r#"
            INSERT INTO pharmacies (id, name, address, phone, lat, lng, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                address = excluded.address,
                phone = excluded.phone,
                lat = excluded.lat,
                lng = excluded.lng,
                updated_at = datetime('now')
            "#,
            params![
                pharmacy.id,
                pharmacy.name,
                pharmacy.address,
                pharmacy.phone,
                pharmacy.location.lat,
                pharmacy.location.lng,
            ],
        )?;
        Ok(())
    }

    /// Add or update a pharmacy together with its stock lines, atomically.
    /// If any line is rejected, nothing is written.
    pub fn seed_pharmacy(&self, pharmacy: &Pharmacy, items: &[InventoryItem]) -> DbResult<()> {
        let tx = self.transaction()?;
        self.upsert_pharmacy(pharmacy)?;
        for item in items {
            self.set_inventory_item(&pharmacy.id, item)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Get a pharmacy by ID.
    pub fn get_pharmacy(&self, id: &str) -> DbResult<Option<Pharmacy>> {
        let pharmacy = self
            .conn
            .query_row(
                "SELECT id, name, address, phone, lat, lng FROM pharmacies WHERE id = ?",
                [id],
                pharmacy_from_row,
            )
            .optional()?;
        Ok(pharmacy)
    }

    /// Number of pharmacies in the store.
    pub fn count_pharmacies(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pharmacies", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Set the stock line for a medicine, replacing any existing line for the
    /// same normalized name.
    pub fn set_inventory_item(&self, pharmacy_id: &str, item: &InventoryItem) -> DbResult<()> {
        let medicine = normalize_name(&item.medicine);
        if medicine.is_empty() {
            return Err(DbError::Constraint("medicine name is empty".into()));
        }
        if item.price.is_some_and(|p| !p.is_finite() || p < 0.0) {
            return Err(DbError::Constraint(format!("invalid price for {}", medicine)));
        }
        if self.get_pharmacy(pharmacy_id)?.is_none() {
            return Err(DbError::NotFound(pharmacy_id.to_string()));
        }

        self.conn.execute(
            r#"
            INSERT INTO pharmacy_inventory (pharmacy_id, medicine, quantity, price, updated_at)
            VALUES (?1, ?2, ?3, ?4, datetime('now'))
            ON CONFLICT(pharmacy_id, medicine) DO UPDATE SET
                quantity = excluded.quantity,
                price = excluded.price,
                updated_at = datetime('now')
            "#,
            params![pharmacy_id, medicine, item.quantity, item.price],
        )?;
        Ok(())
    }

    /// Pharmacies with in-stock lines matching `filter`, optionally limited to
    /// a bounding box. Pharmacies come back in insertion order; exact distance
    /// filtering and ordering is the caller's job.
    pub fn stock_candidates(
        &self,
        filter: &InventoryFilter,
        bbox: Option<&BoundingBox>,
    ) -> DbResult<Vec<StockRow>> {
        let predicate = match filter {
            InventoryFilter::Contains(_) => "instr(i.medicine, ?1) > 0",
            InventoryFilter::Exact(_) => "i.medicine = ?1",
        };
        let sql = format!(
            r#"
            SELECT p.id, p.name, p.address, p.phone, p.lat, p.lng,
                   i.medicine, i.quantity, i.price
            FROM pharmacies p
            JOIN pharmacy_inventory i ON i.pharmacy_id = p.id
            WHERE {predicate}
              AND i.quantity > 0
              AND p.lat BETWEEN ?2 AND ?3
              AND (?4 IS NULL OR p.lng BETWEEN ?4 AND ?5)
            ORDER BY p.rowid, i.medicine
            "#
        );

        let (min_lat, max_lat, lng_lo, lng_hi) = match bbox {
            Some(b) => (
                b.min_lat,
                b.max_lat,
                b.lng_range.map(|r| r.0),
                b.lng_range.map(|r| r.1),
            ),
            None => (-90.0, 90.0, None, None),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![filter.needle(), min_lat, max_lat, lng_lo, lng_hi],
            |row| Ok((pharmacy_from_row(row)?, inventory_at(row, 6)?)),
        )?;

        let mut grouped: Vec<StockRow> = Vec::new();
        for row in rows {
            let (pharmacy, item) = row?;
            match grouped.last_mut() {
                Some(last) if last.pharmacy.id == pharmacy.id => last.items.push(item),
                _ => grouped.push(StockRow {
                    pharmacy,
                    items: vec![item],
                }),
            }
        }
        Ok(grouped)
    }
}

fn pharmacy_from_row(row: &Row<'_>) -> rusqlite::Result<Pharmacy> {
    Ok(Pharmacy {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        phone: row.get(3)?,
        location: GeoPoint::new(row.get(4)?, row.get(5)?),
    })
}

fn inventory_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        medicine: row.get(offset)?,
        quantity: row.get(offset + 1)?,
        price: row.get(offset + 2)?,
    })
}

//! CSV dataset parsing.
//!
//! The dataset has one row per medicine. List-valued attributes are spread
//! over numbered columns (`substitute0..4`, `use0..4`, `sideEffect0..N`);
//! their numeric suffix defines list order.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use tracing::warn;

use crate::models::{normalize_name, MedicineRecord, MAX_SUBSTITUTES, MAX_USES};

use super::CatalogResult;

/// Column positions resolved from the header row.
#[derive(Debug, Default)]
struct ColumnMap {
    id: Option<usize>,
    name: Option<usize>,
    substitutes: Vec<usize>,
    uses: Vec<usize>,
    side_effects: Vec<usize>,
    chemical_class: Option<usize>,
    habit_forming: Option<usize>,
    therapeutic_class: Option<usize>,
    action_class: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut map = ColumnMap::default();
        let mut substitutes = Vec::new();
        let mut uses = Vec::new();
        let mut side_effects = Vec::new();

        for (pos, header) in headers.iter().enumerate() {
            let header = header.trim();
            match header {
                "id" => map.id = Some(pos),
                "name" => map.name = Some(pos),
                "Chemical Class" => map.chemical_class = Some(pos),
                "Habit Forming" => map.habit_forming = Some(pos),
                "Therapeutic Class" => map.therapeutic_class = Some(pos),
                "Action Class" => map.action_class = Some(pos),
                _ => {
                    if let Some(n) = numbered(header, "substitute") {
                        substitutes.push((n, pos));
                    } else if let Some(n) = numbered(header, "use") {
                        uses.push((n, pos));
                    } else if let Some(n) = numbered(header, "sideEffect") {
                        side_effects.push((n, pos));
                    }
                }
            }
        }

        map.substitutes = ordered(substitutes);
        map.uses = ordered(uses);
        map.side_effects = ordered(side_effects);
        map
    }
}

/// Parse `prefix<digits>` headers, returning the number.
fn numbered(header: &str, prefix: &str) -> Option<u32> {
    let suffix = header.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

fn ordered(mut columns: Vec<(u32, usize)>) -> Vec<usize> {
    columns.sort_by_key(|(n, _)| *n);
    columns.into_iter().map(|(_, pos)| pos).collect()
}

fn cell(row: &StringRecord, pos: Option<usize>) -> Option<&str> {
    pos.and_then(|p| row.get(p))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn list(row: &StringRecord, positions: &[usize], max: Option<usize>) -> Vec<String> {
    let values = positions
        .iter()
        .filter_map(|&p| cell(row, Some(p)))
        .map(String::from);
    match max {
        Some(max) => values.take(max).collect(),
        None => values.collect(),
    }
}

fn parse_row(row: &StringRecord, columns: &ColumnMap) -> Option<MedicineRecord> {
    let name = normalize_name(cell(row, columns.name)?);
    if name.is_empty() {
        return None;
    }

    Some(MedicineRecord {
        id: cell(row, columns.id).map(String::from),
        name,
        substitutes: list(row, &columns.substitutes, Some(MAX_SUBSTITUTES)),
        uses: list(row, &columns.uses, Some(MAX_USES)),
        side_effects: list(row, &columns.side_effects, None),
        chemical_class: cell(row, columns.chemical_class).unwrap_or("NA").into(),
        habit_forming: cell(row, columns.habit_forming).unwrap_or("No").into(),
        therapeutic_class: cell(row, columns.therapeutic_class).unwrap_or("NA").into(),
        action_class: cell(row, columns.action_class).unwrap_or("NA").into(),
    })
}

/// Read every usable medicine row from a CSV source.
///
/// Rows without a name are skipped silently; rows the CSV reader rejects are
/// skipped with a warning.
pub fn read_records<R: Read>(reader: R) -> CatalogResult<Vec<MedicineRecord>> {
    let mut csv = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(csv.headers()?);
    if columns.name.is_none() {
        return Err(super::CatalogError::MissingColumn("name"));
    }

    let mut records = Vec::new();
    for (line, row) in csv.records().enumerate() {
        match row {
            Ok(row) => {
                if let Some(record) = parse_row(&row, &columns) {
                    records.push(record);
                }
            }
            Err(e) => warn!(row = line + 1, error = %e, "Skipping malformed dataset row"),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
id,name,substitute0,substitute1,sideEffect0,sideEffect1,use0,use1,Chemical Class,Habit Forming,Therapeutic Class,Action Class
1,  Augmentin 625 Duo Tablet ,Penciclav 500,,Vomiting,Nausea,Treatment of Bacterial infections,,,No,ANTI INFECTIVES,
2,,ignored,,,,,,,,,
3,azithral 500 tablet,Azax 500,Azifast 500,Vomiting,,Bacterial infections,Acne,Macrolides,No,ANTI INFECTIVES,Macrolides
";

    #[test]
    fn test_read_sample() {
        let records = read_records(SAMPLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.id.as_deref(), Some("1"));
        assert_eq!(first.name, "augmentin 625 duo tablet");
        assert_eq!(first.substitutes, vec!["Penciclav 500"]);
        assert_eq!(first.side_effects, vec!["Vomiting", "Nausea"]);
        assert_eq!(first.uses, vec!["Treatment of Bacterial infections"]);
        assert_eq!(first.chemical_class, "NA");
        assert_eq!(first.action_class, "NA");
        assert_eq!(first.therapeutic_class, "ANTI INFECTIVES");

        let second = &records[1];
        assert_eq!(second.substitutes, vec!["Azax 500", "Azifast 500"]);
        assert_eq!(second.uses, vec!["Bacterial infections", "Acne"]);
        assert_eq!(second.action_class, "Macrolides");
    }

    #[test]
    fn test_numbered_columns_sorted_numerically() {
        let csv = "name,sideEffect10,sideEffect2,sideEffect0\nx,ten,two,zero\n";
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records[0].side_effects, vec!["zero", "two", "ten"]);
    }

    #[test]
    fn test_numbered_header_parsing() {
        assert_eq!(numbered("use3", "use"), Some(3));
        assert_eq!(numbered("uses", "use"), None);
        assert_eq!(numbered("use", "use"), None);
        assert_eq!(numbered("sideEffect41", "sideEffect"), Some(41));
    }

    #[test]
    fn test_missing_name_column() {
        let csv = "id,title\n1,x\n";
        assert!(matches!(
            read_records(csv.as_bytes()),
            Err(super::super::CatalogError::MissingColumn("name"))
        ));
    }

    #[test]
    fn test_short_rows_tolerated() {
        let csv = "name,substitute0,use0\ncrocin\n";
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].substitutes.is_empty());
    }
}

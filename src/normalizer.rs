use crate::models::{parse_decimal, specialty_entity, ColumnNames, CutoffRecord, RawSheet};
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub records: Vec<CutoffRecord>,
    pub dropped_rows: usize,
    pub duplicates_removed: usize,
    pub skipped_sheets: usize,
}

struct SheetColumns {
    row_number: usize,
    name: usize,
    cutoff: usize,
    quota: Option<usize>,
    note: Option<usize>,
}

impl SheetColumns {
    fn locate(sheet: &RawSheet, columns: &ColumnNames) -> Result<Self> {
        let required = |name: &str| {
            sheet
                .column_index(name)
                .ok_or_else(|| anyhow!("Sheet '{}' has no '{}' column", sheet.title, name))
        };

        Ok(Self {
            row_number: required(&columns.row_number)?,
            name: required(&columns.name)?,
            cutoff: required(&columns.cutoff)?,
            quota: sheet.column_index(&columns.quota),
            note: sheet.column_index(&columns.note),
        })
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

fn optional_cell(row: &[String], index: Option<usize>) -> Option<String> {
    index
        .map(|i| cell(row, i))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Reshape raw sheets into one (year, entity) cutoff per row.
///
/// Rows carrying a row number name a school. Rows without one are
/// specialised-subject classes of the last named school and become
/// "<school> - <subject>" entities. Source-class rows and rows without a
/// numeric cutoff are dropped, and only the first cutoff per (entity, year)
/// is kept. Sheets missing a required column are reported and skipped.
pub fn normalize(sheets: &[RawSheet], columns: &ColumnNames, source_class_marker: &str) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut root_school: Option<String> = None;

    for sheet in sheets {
        let cols = match SheetColumns::locate(sheet, columns) {
            Ok(cols) => cols,
            Err(e) => {
                println!("   ⚠️  Skipping sheet: {}", e);
                outcome.skipped_sheets += 1;
                continue;
            }
        };

        for row in &sheet.rows {
            let name = cell(row, cols.name);
            let has_row_number = !cell(row, cols.row_number).is_empty();

            if has_row_number {
                root_school = Some(name.to_string());
            }

            let school = match &root_school {
                Some(school) => school.clone(),
                None => {
                    outcome.dropped_rows += 1;
                    continue;
                }
            };

            if name == source_class_marker || name.is_empty() {
                outcome.dropped_rows += 1;
                continue;
            }

            let entity = if has_row_number {
                name.to_string()
            } else {
                specialty_entity(&school, name)
            };

            let cutoff = match parse_decimal(cell(row, cols.cutoff)) {
                Some(cutoff) => cutoff,
                None => {
                    outcome.dropped_rows += 1;
                    continue;
                }
            };

            if !seen.insert((entity.clone(), sheet.year.clone())) {
                outcome.duplicates_removed += 1;
                continue;
            }

            outcome.records.push(CutoffRecord {
                year: sheet.year.clone(),
                school,
                entity,
                cutoff,
                quota: optional_cell(row, cols.quota),
                note: optional_cell(row, cols.note),
            });
        }
    }

    outcome
}

pub fn save_cache(records: &[CutoffRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create cache file: {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_cache(path: &Path) -> Result<Vec<CutoffRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Data file not found: {}", path.display()))?;

    let mut records = Vec::new();
    for record in reader.deserialize() {
        let record: CutoffRecord = record
            .with_context(|| format!("Malformed row in data file: {}", path.display()))?;
        records.push(record);
    }
    Ok(records)
}

/// The cache is fresh when it exists and was written less than `ttl` ago.
pub fn cache_is_fresh(path: &Path, ttl: Duration) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age < ttl)
        .unwrap_or(false)
}

/// Unique school years in ascending order.
pub fn years(records: &[CutoffRecord]) -> Vec<String> {
    let mut years: Vec<String> = records.iter().map(|r| r.year.clone()).collect();
    years.sort();
    years.dedup();
    years
}

/// Unique entities in first-seen order.
pub fn entities(records: &[CutoffRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.entity.as_str()))
        .map(|r| r.entity.clone())
        .collect()
}

/// All observations of one entity, oldest year first.
pub fn history<'a>(records: &'a [CutoffRecord], entity: &str) -> Vec<&'a CutoffRecord> {
    let mut series: Vec<&CutoffRecord> = records.iter().filter(|r| r.entity == entity).collect();
    series.sort_by(|a, b| a.year.cmp(&b.year));
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(year: &str, rows: &[&[&str]]) -> RawSheet {
        RawSheet {
            title: format!("Điểm chuẩn {}", year),
            year: year.to_string(),
            header: ["STT", "Tên trường", "Điểm chuẩn", "Chỉ tiêu", "Ghi chú"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: rows
                .iter()
                .map(|r| {
                    let mut row: Vec<String> = r.iter().map(|c| c.to_string()).collect();
                    row.resize(5, String::new());
                    row
                })
                .collect(),
        }
    }

    fn sample() -> Vec<RawSheet> {
        vec![sheet(
            "2023-2024",
            &[
                &["1", "THPT Tây Ninh", "30,5", "585", ""],
                &["2", "Trường chuyên Hoàng Lê Kha", "", "", ""],
                &["", "Ngữ Văn", "38.25", "35", ""],
                &["", "Toán", "40", "35", "thi lại"],
                &["", "Lớp nguồn", "35", "", ""],
                &[" ", "Tin học", "36", "", ""],
                &["3", "THPT Lê Quý Đôn", "x", "", ""],
            ],
        )]
    }

    #[test]
    fn subject_rows_become_specialty_entities() {
        let outcome = normalize(&sample(), &ColumnNames::default(), "Lớp nguồn");
        let entities: Vec<&str> = outcome.records.iter().map(|r| r.entity.as_str()).collect();
        assert_eq!(
            entities,
            vec![
                "THPT Tây Ninh",
                "Trường chuyên Hoàng Lê Kha - Ngữ Văn",
                "Trường chuyên Hoàng Lê Kha - Toán",
                "Trường chuyên Hoàng Lê Kha - Tin học",
            ]
        );
        assert_eq!(outcome.records[0].cutoff, 30.5);
        assert_eq!(outcome.records[0].quota.as_deref(), Some("585"));
        assert_eq!(outcome.records[2].school, "Trường chuyên Hoàng Lê Kha");
        assert_eq!(outcome.records[2].note.as_deref(), Some("thi lại"));
        // title row, source class and the unparsable cutoff
        assert_eq!(outcome.dropped_rows, 3);
    }

    #[test]
    fn duplicate_entity_year_keeps_first() {
        let sheets = vec![sheet(
            "2022-2023",
            &[&["1", "THPT Tây Ninh", "29", "", ""], &["2", "THPT Tây Ninh", "31", "", ""]],
        )];
        let outcome = normalize(&sheets, &ColumnNames::default(), "Lớp nguồn");
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].cutoff, 29.0);
        assert_eq!(outcome.duplicates_removed, 1);
    }

    #[test]
    fn sheet_without_required_columns_is_skipped() {
        let good = sheet("2023-2024", &[&["1", "THPT Tây Ninh", "31", "", ""]]);
        let mut aux = sheet("2023-2024", &[&["Nguồn: Sở GD&ĐT", "", "", "", ""]]);
        aux.title = "2023-2024 ghi chú".to_string();
        aux.header = vec!["Ghi chú".to_string()];

        let outcome = normalize(&[good, aux], &ColumnNames::default(), "Lớp nguồn");
        assert_eq!(outcome.skipped_sheets, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].entity, "THPT Tây Ninh");
    }

    #[test]
    fn subject_rows_inherit_school_from_previous_sheet() {
        let sheets = vec![
            sheet(
                "2022-2023",
                &[&["1", "THPT Tây Ninh", "30", "", ""], &["2", "Trường chuyên Hoàng Lê Kha", "", "", ""]],
            ),
            sheet("2023-2024", &[&["", "Toán", "40", "", ""], &["", "Ngữ Văn", "38", "", ""]]),
        ];
        let outcome = normalize(&sheets, &ColumnNames::default(), "Lớp nguồn");

        let entities: Vec<&str> = outcome.records.iter().map(|r| r.entity.as_str()).collect();
        assert_eq!(
            entities,
            vec![
                "THPT Tây Ninh",
                "Trường chuyên Hoàng Lê Kha - Toán",
                "Trường chuyên Hoàng Lê Kha - Ngữ Văn",
            ]
        );
        assert_eq!(outcome.records[1].year, "2023-2024");
        assert_eq!(outcome.records[1].school, "Trường chuyên Hoàng Lê Kha");
    }

    #[test]
    fn cache_round_trip_keeps_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("data.csv");
        let outcome = normalize(&sample(), &ColumnNames::default(), "Lớp nguồn");

        save_cache(&outcome.records, &path).unwrap();
        assert!(cache_is_fresh(&path, Duration::from_secs(3600)));
        assert!(!cache_is_fresh(&path, Duration::ZERO));
        assert!(!cache_is_fresh(&dir.path().join("absent.csv"), Duration::from_secs(3600)));

        let loaded = load_cache(&path).unwrap();
        assert_eq!(loaded, outcome.records);
    }

    #[test]
    fn history_is_sorted_by_year() {
        let sheets = vec![
            sheet("2023-2024", &[&["1", "THPT Tây Ninh", "31", "", ""]]),
            sheet("2021-2022", &[&["1", "THPT Tây Ninh", "28", "", ""]]),
            sheet("2022-2023", &[&["1", "THPT Tây Ninh", "29", "", ""], &["2", "THPT Nguyễn Trãi", "20", "", ""]]),
        ];
        let records = normalize(&sheets, &ColumnNames::default(), "Lớp nguồn").records;

        let cutoffs: Vec<f64> = history(&records, "THPT Tây Ninh").iter().map(|r| r.cutoff).collect();
        assert_eq!(cutoffs, vec![28.0, 29.0, 31.0]);
        assert_eq!(years(&records), vec!["2021-2022", "2022-2023", "2023-2024"]);
        assert_eq!(entities(&records), vec!["THPT Tây Ninh", "THPT Nguyễn Trãi"]);
    }
}

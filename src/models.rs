use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Data source configuration
    pub data_source_mode: DataSourceMode,
    pub data_directory: Option<String>,
    pub cache_file: String,
    pub cache_ttl_secs: u64,
    pub output_directory: Option<String>,
    // Spreadsheet layout
    pub header_row: usize,
    pub source_class_marker: String,
    // Recommendation settings
    pub top_n: usize,
    // Tables last so the TOML file stays valid
    pub columns: ColumnNames,
    pub sheet_urls: Option<Vec<SheetUrl>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataSourceMode {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "internet")]
    Internet,
    #[serde(rename = "both")]
    Both,
}

/// A published sheet export; the title carries the school year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetUrl {
    pub title: String,
    pub url: String,
}

/// Header names used by the cutoff spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnNames {
    pub row_number: String,
    pub name: String,
    pub cutoff: String,
    pub quota: String,
    pub note: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            row_number: "STT".to_string(),
            name: "Tên trường".to_string(),
            cutoff: "Điểm chuẩn".to_string(),
            quota: "Chỉ tiêu".to_string(),
            note: "Ghi chú".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_source_mode: DataSourceMode::Local,
            data_directory: Some("data-source".to_string()),
            cache_file: "admission_data_processed.csv".to_string(),
            cache_ttl_secs: 3600,
            output_directory: Some("output".to_string()),
            header_row: 5,
            source_class_marker: "Lớp nguồn".to_string(),
            top_n: 5,
            columns: ColumnNames::default(),
            sheet_urls: Some(vec![SheetUrl {
                title: "2024-2025".to_string(),
                url: "https://docs.google.com/spreadsheets/d/<sheet-id>/export?format=csv&gid=0".to_string(),
            }]),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// One worksheet as exported: header row plus the data rows below it.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub title: String,
    pub year: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawSheet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.trim() == name)
    }
}

/// A single (year, entity) cutoff observation in the canonical dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoffRecord {
    pub year: String,
    pub school: String,
    pub entity: String,
    pub cutoff: f64,
    pub quota: Option<String>,
    pub note: Option<String>,
}

pub const ENTITY_SEPARATOR: &str = " - ";

impl CutoffRecord {
    /// Specialised-subject name when the entity is a "<school> - <subject>" class.
    pub fn specialty_subject(&self) -> Option<&str> {
        specialty_subject_of(&self.school, &self.entity)
    }
}

pub fn specialty_entity(school: &str, subject: &str) -> String {
    format!("{}{}{}", school, ENTITY_SEPARATOR, subject)
}

pub fn specialty_subject_of<'a>(school: &str, entity: &'a str) -> Option<&'a str> {
    entity
        .strip_prefix(school)
        .and_then(|rest| rest.strip_prefix(ENTITY_SEPARATOR))
        .filter(|subject| !subject.is_empty())
}

/// Round to two decimals, the precision all published scores use.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse a spreadsheet number, accepting a comma decimal separator.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

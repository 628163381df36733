use crate::models::{Config, DataSourceMode, RawSheet};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use scraper::{Html, Selector};
use std::fs;
use std::path::{Path, PathBuf};

pub struct SheetScraper {
    client: reqwest::Client,
    header_row: usize,
}

/// Extract the school year ("2023-2024") from a sheet title.
pub fn sheet_year(title: &str) -> Option<String> {
    let year_regex = Regex::new(r"(\d{4}-\d{4})").ok()?;
    year_regex
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl SheetScraper {
    /// `header_row` is the zero-based row holding the column headers.
    pub fn new(header_row: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            header_row,
        }
    }

    /// Read every `.csv` and `.html` export in a directory, in file name order.
    pub fn scrape_directory(&self, dir: &Path) -> Result<Vec<RawSheet>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read data directory: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        paths.sort();

        let mut sheets = Vec::new();
        for path in paths {
            let result = match path.extension().and_then(|s| s.to_str()) {
                Some("csv") => self.scrape_csv_file(&path),
                Some("html") | Some("htm") => self.scrape_html_file(&path),
                _ => continue,
            };

            println!("📄 Processing: {}", path.display());
            match result {
                Ok(found) => {
                    for sheet in &found {
                        println!("   ✅ Sheet '{}' ({}): {} rows", sheet.title, sheet.year, sheet.rows.len());
                    }
                    sheets.extend(found);
                }
                Err(e) => {
                    println!("   ❌ Error processing file: {}", e);
                }
            }
        }

        Ok(sheets)
    }

    pub fn scrape_csv_file(&self, path: &Path) -> Result<Vec<RawSheet>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        self.parse_csv_content(&content, &file_title(path))
    }

    pub fn scrape_html_file(&self, path: &Path) -> Result<Vec<RawSheet>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        self.parse_html_content(&content, &file_title(path))
    }

    pub async fn scrape_url(&self, title: &str, url: &str) -> Result<Vec<RawSheet>> {
        println!("🌐 Fetching sheet '{}' from: {}", title, url);

        let response = self.client
            .get(url)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP request failed with status: {}", response.status()));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(false);

        let content = response.text().await
            .with_context(|| format!("Failed to read response body from: {}", url))?;

        if is_html || content.trim_start().starts_with('<') {
            self.parse_html_content(&content, title)
        } else {
            self.parse_csv_content(&content, title)
        }
    }

    /// A CSV export holds exactly one sheet. Blank spreadsheet rows export as
    /// ",,," lines; fully empty lines are dropped by the reader.
    pub fn parse_csv_content(&self, content: &str, title: &str) -> Result<Vec<RawSheet>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("Malformed CSV in sheet '{}'", title))?;
            rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
        }

        Ok(self.table_from_rows(title, rows).into_iter().collect())
    }

    /// Parse a published spreadsheet page: one `table` per sheet, titles from the tab menu.
    pub fn parse_html_content(&self, content: &str, fallback_title: &str) -> Result<Vec<RawSheet>> {
        let document = Html::parse_document(content);

        let menu_selector = selector("#sheet-menu li")?;
        let table_selector = selector("table")?;
        let row_selector = selector("tr")?;
        let cell_selector = selector("td")?;

        let titles: Vec<String> = document
            .select(&menu_selector)
            .map(|li| li.text().collect::<String>().trim().to_string())
            .collect();

        let tables: Vec<_> = document.select(&table_selector).collect();
        if tables.is_empty() {
            println!("   ⚠️  Warning: No tables found in {}", fallback_title);
        }

        let mut sheets = Vec::new();
        for (i, table) in tables.iter().enumerate() {
            let title = match titles.get(i) {
                Some(title) if !title.is_empty() => title.clone(),
                _ if tables.len() == 1 => fallback_title.to_string(),
                _ => format!("{} #{}", fallback_title, i + 1),
            };

            let rows: Vec<Vec<String>> = table
                .select(&row_selector)
                .map(|row| {
                    row.select(&cell_selector)
                        .map(|cell| cell.text().collect::<String>().trim().to_string())
                        .collect::<Vec<String>>()
                })
                .filter(|cells| !cells.is_empty())
                .collect();

            if let Some(sheet) = self.table_from_rows(&title, rows) {
                sheets.push(sheet);
            }
        }

        Ok(sheets)
    }

    /// Cut a sheet into header and data rows. Sheets without a school year in
    /// the title, or without rows past the header, are skipped.
    pub fn table_from_rows(&self, title: &str, rows: Vec<Vec<String>>) -> Option<RawSheet> {
        let year = match sheet_year(title) {
            Some(year) => year,
            None => {
                println!("   ⚠️  Skipping sheet without a school year (YYYY-YYYY) in its title: {}", title);
                return None;
            }
        };

        if rows.len() <= self.header_row {
            println!("   ⚠️  Skipping sheet {}: not enough rows ({})", title, rows.len());
            return None;
        }

        let mut rows = rows;
        let data_rows = rows.split_off(self.header_row + 1);
        let header: Vec<String> = rows
            .pop()
            .unwrap_or_default()
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();

        let width = header.len();
        let data_rows = data_rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();

        Some(RawSheet {
            title: title.to_string(),
            year,
            header,
            rows: data_rows,
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {}: {:?}", css, e))
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sheet")
        .to_string()
}

/// Load every configured sheet according to the data source mode.
pub async fn load_sources(config: &Config) -> Result<Vec<RawSheet>> {
    let scraper = SheetScraper::new(config.header_row);
    let mut sheets = Vec::new();

    if matches!(config.data_source_mode, DataSourceMode::Local | DataSourceMode::Both) {
        let data_dir = config.data_directory.as_deref().unwrap_or("data-source");
        println!("📂 Reading sheet exports from: {}", data_dir);
        match scraper.scrape_directory(Path::new(data_dir)) {
            Ok(found) => sheets.extend(found),
            Err(e) => println!("   ❌ Error reading data directory {}: {:#}", data_dir, e),
        }
    }

    if matches!(config.data_source_mode, DataSourceMode::Internet | DataSourceMode::Both) {
        for sheet_url in config.sheet_urls.iter().flatten() {
            match scraper.scrape_url(&sheet_url.title, &sheet_url.url).await {
                Ok(found) => {
                    for sheet in &found {
                        println!("   ✅ Sheet '{}' ({}): {} rows", sheet.title, sheet.year, sheet.rows.len());
                    }
                    sheets.extend(found);
                }
                Err(e) => {
                    println!("   ❌ Error fetching {}: {}", sheet_url.url, e);
                }
            }
        }
    }

    Ok(sheets)
}

//! Sales rows from the published spreadsheet.
//!
//! The sheet is read as CSV. Columns are located by header name, ignoring
//! case and surrounding spaces; missing columns read as empty strings.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;
use crate::models::SaleRecord;

const CLOSER_HEADERS: &[&str] = &["closer", "closer name"];
const SETTER_HEADERS: &[&str] = &["setter", "setter name"];
const KILOWATT_HEADERS: &[&str] = &["kw", "kilowatts", "system size"];
const REALIZATION_HEADERS: &[&str] = &["realization", "realized"];
const DATE_HEADERS: &[&str] = &["date", "sale date"];
const REGION_HEADERS: &[&str] = &["region"];

fn column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| names.contains(&header.trim().to_lowercase().as_str()))
}

pub fn parse_sales(text: &str) -> Result<Vec<SaleRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let closer = column(&headers, CLOSER_HEADERS);
    let setter = column(&headers, SETTER_HEADERS);
    let kilowatts = column(&headers, KILOWATT_HEADERS);
    let realization = column(&headers, REALIZATION_HEADERS);
    let sale_date = column(&headers, DATE_HEADERS);
    let region = column(&headers, REGION_HEADERS);

    if closer.is_none() && setter.is_none() {
        warn!("sales sheet has neither a closer nor a setter column");
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                debug!(error = %err, "skipping unreadable sales row");
                continue;
            }
        };
        let cell = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .unwrap_or_default()
                .to_string()
        };

        records.push(SaleRecord {
            closer: cell(closer),
            setter: cell(setter),
            kilowatts: cell(kilowatts),
            realization: cell(realization),
            sale_date: cell(sale_date),
            region: cell(region),
        });
    }

    Ok(records)
}

pub async fn fetch_sales(url: &str) -> Result<Vec<SaleRecord>> {
    let body = reqwest::get(url).await?.error_for_status()?.text().await?;
    let records = parse_sales(&body)?;
    debug!(url, rows = records.len(), "fetched sales sheet");
    Ok(records)
}

pub fn load_sales(path: &Path) -> Result<Vec<SaleRecord>> {
    let text = std::fs::read_to_string(path)?;
    parse_sales(&text)
}

/// Reads `source` as a URL when it looks like one, otherwise as a file path.
pub async fn read_sales(source: &str) -> Result<Vec<SaleRecord>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_sales(source).await
    } else {
        load_sales(Path::new(source))
    }
}

//! Decoding of the provider's historical-prices CSV.
//!
//! The payload has a header row naming its columns; only `Date` and `Close`
//! are read, wherever they appear. Rows come newest first and are returned
//! ascending.

use crate::domain::error::CloseCacheError;
use crate::domain::observation::{normalize_series, DailyClose};
use chrono::NaiveDate;

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, CloseCacheError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| CloseCacheError::MalformedPayload {
            reason: format!("missing {name} column"),
        })
}

pub fn decode_close_csv(body: &str) -> Result<Vec<DailyClose>, CloseCacheError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| CloseCacheError::MalformedPayload {
            reason: format!("CSV header error: {e}"),
        })?
        .clone();
    let date_col = column_index(&headers, "Date")?;
    let close_col = column_index(&headers, "Close")?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| CloseCacheError::MalformedPayload {
            reason: format!("CSV parse error: {e}"),
        })?;

        // Trailing blank lines decode as a single empty field
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let date_str = record
            .get(date_col)
            .ok_or_else(|| CloseCacheError::MalformedPayload {
                reason: "row is missing Date".into(),
            })?
            .trim();
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
            CloseCacheError::MalformedPayload {
                reason: format!("invalid date '{date_str}': {e}"),
            }
        })?;

        let close_str = record
            .get(close_col)
            .ok_or_else(|| CloseCacheError::MalformedPayload {
                reason: format!("row for {date} is missing Close"),
            })?
            .trim();
        let close: f64 = close_str.parse().map_err(|e| CloseCacheError::MalformedPayload {
            reason: format!("invalid close '{close_str}' on {date}: {e}"),
        })?;

        rows.push(DailyClose::new(date, close));
    }

    Ok(normalize_series(rows))
}

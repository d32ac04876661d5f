//! Daily close observations.

use chrono::NaiveDate;

/// One cached close price. Identity is `(symbol, date)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: f64,
}

/// A (date, close) pair as returned by a fetcher, before a symbol is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

impl DailyClose {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }

    pub fn into_observation(self, symbol: &str) -> Observation {
        Observation {
            symbol: symbol.to_string(),
            date: self.date,
            close: self.close,
        }
    }
}

/// Sort ascending by date and keep the first row seen for each date.
pub fn normalize_series(mut rows: Vec<DailyClose>) -> Vec<DailyClose> {
    rows.sort_by_key(|r| r.date);
    rows.dedup_by_key(|r| r.date);
    rows
}

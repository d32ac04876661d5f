#![allow(dead_code)]

use chrono::NaiveDate;
use closecache::adapters::sqlite_adapter::SqliteAdapter;
use closecache::domain::error::CloseCacheError;
pub use closecache::domain::observation::{DailyClose, Observation};
use closecache::domain::sync_request::UpperBound;
use closecache::ports::fetch_port::SeriesFetcher;
use closecache::ports::store_port::ManagedStore;
use std::cell::RefCell;
use std::collections::HashMap;

/// A fetch as seen by [`MockFetcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchCall {
    pub symbol: String,
    pub start: Option<NaiveDate>,
    pub end: UpperBound,
}

/// Serves canned histories and records every call.
pub struct MockFetcher {
    pub history: RefCell<HashMap<String, Vec<DailyClose>>>,
    pub unavailable: RefCell<bool>,
    pub calls: RefCell<Vec<FetchCall>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            history: RefCell::new(HashMap::new()),
            unavailable: RefCell::new(false),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_history(self, symbol: &str, rows: Vec<DailyClose>) -> Self {
        self.history.borrow_mut().insert(symbol.to_string(), rows);
        self
    }

    /// Simulate new trading days appearing at the provider.
    pub fn append(&self, symbol: &str, rows: Vec<DailyClose>) {
        self.history
            .borrow_mut()
            .entry(symbol.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn set_unavailable(&self, down: bool) {
        *self.unavailable.borrow_mut() = down;
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl SeriesFetcher for MockFetcher {
    fn fetch(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: UpperBound,
    ) -> Result<Vec<DailyClose>, CloseCacheError> {
        self.calls.borrow_mut().push(FetchCall {
            symbol: symbol.to_string(),
            start,
            end,
        });

        if *self.unavailable.borrow() {
            return Err(CloseCacheError::ProviderUnavailable {
                reason: "connection timed out".into(),
            });
        }

        let history = self.history.borrow();
        let rows = history
            .get(symbol)
            .ok_or_else(|| CloseCacheError::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;

        Ok(rows
            .iter()
            .filter(|r| start.is_none_or(|s| r.date >= s))
            .filter(|r| match end {
                UpperBound::Present => true,
                UpperBound::Through(e) => r.date <= e,
            })
            .copied()
            .collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Weekday closes from `start` for `count` trading days, rising by 1.0 a day.
pub fn trading_days(start: NaiveDate, count: usize, start_price: f64) -> Vec<DailyClose> {
    use chrono::{Datelike, Weekday};

    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(count)
        .enumerate()
        .map(|(i, d)| DailyClose::new(d, start_price + i as f64))
        .collect()
}

pub fn sqlite_store() -> SqliteAdapter {
    let store = SqliteAdapter::in_memory().unwrap();
    store.initialize_schema().unwrap();
    store
}

pub fn observations(symbol: &str, rows: &[DailyClose]) -> Vec<Observation> {
    rows.iter().map(|r| r.into_observation(symbol)).collect()
}

//! Persistent series store port.

use crate::domain::error::CloseCacheError;
use crate::domain::observation::Observation;
use chrono::NaiveDate;

pub trait SeriesStore {
    /// Latest cached date for `symbol`, or `None` if nothing is cached.
    fn max_date(&self, symbol: &str) -> Result<Option<NaiveDate>, CloseCacheError>;

    /// Rows for `symbol` with `start <= date <= end`, ascending by date.
    fn query_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, CloseCacheError>;

    /// Insert all rows in one transaction. Keys already present are skipped;
    /// any other failure rolls the whole batch back. Returns the number of
    /// rows newly written.
    fn bulk_insert(&self, observations: &[Observation]) -> Result<usize, CloseCacheError>;

    /// `(first date, last date, row count)` for `symbol`.
    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CloseCacheError>;
}

/// Schema provisioning for stores that own their table.
pub trait ManagedStore: SeriesStore {
    /// Create the price table if it does not exist.
    fn initialize_schema(&self) -> Result<(), CloseCacheError>;

    /// Drop all cached rows and recreate the table.
    fn reset_schema(&self) -> Result<(), CloseCacheError>;
}

impl<T: SeriesStore + ?Sized> SeriesStore for Box<T> {
    fn max_date(&self, symbol: &str) -> Result<Option<NaiveDate>, CloseCacheError> {
        (**self).max_date(symbol)
    }

    fn query_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, CloseCacheError> {
        (**self).query_range(symbol, start, end)
    }

    fn bulk_insert(&self, observations: &[Observation]) -> Result<usize, CloseCacheError> {
        (**self).bulk_insert(observations)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CloseCacheError> {
        (**self).data_range(symbol)
    }
}

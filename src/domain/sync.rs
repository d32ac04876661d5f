//! Read-through synchronization of cached close prices.
//!
//! [`CloseDataSync::get_close_data`] runs a fixed pipeline per call: look up
//! the latest cached date, decide what (if anything) must be fetched, merge
//! the fetched rows in one atomic write, then answer from the store. Calls
//! for the same symbol are serialized so the check and the merge cannot
//! interleave.

use crate::domain::error::CloseCacheError;
use crate::domain::observation::{DailyClose, Observation};
use crate::domain::sync_request::{Clock, DateRange, FetchPlan, SyncRequest};
use crate::ports::fetch_port::SeriesFetcher;
use crate::ports::store_port::SeriesStore;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Per-symbol mutexes, created on first use and dropped once idle.
#[derive(Default)]
struct SymbolLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SymbolLocks {
    fn acquire(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(symbol.to_string()).or_default())
    }

    /// Remove the entry for `symbol` if no other caller holds or waits on it.
    fn release(&self, symbol: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map's reference plus ours
        let idle = Arc::strong_count(&lock) == 2
            && locks.get(symbol).is_some_and(|entry| Arc::ptr_eq(entry, &lock));
        if idle {
            locks.remove(symbol);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

pub struct CloseDataSync<S, F> {
    store: S,
    fetcher: F,
    clock: Clock,
    locks: SymbolLocks,
}

impl<S: SeriesStore, F: SeriesFetcher> CloseDataSync<S, F> {
    pub fn new(store: S, fetcher: F) -> Self {
        Self {
            store,
            fetcher,
            clock: Clock::System,
            locks: SymbolLocks::default(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Daily closes for `symbol` in `[start_date, end_date]`, ascending.
    ///
    /// A missing start means 1970-01-01 and a missing end means today. The
    /// cache is brought up to the requested end first: a symbol with no rows
    /// gets its whole history fetched, a symbol whose cache stops short gets
    /// everything after its last cached day, and anything else is answered
    /// without touching the network.
    pub fn get_close_data(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Observation>, CloseCacheError> {
        self.run(&SyncRequest::new(symbol, start_date, end_date))
    }

    pub fn run(&self, request: &SyncRequest) -> Result<Vec<Observation>, CloseCacheError> {
        let range = request.resolve(self.clock);
        let symbol = request.symbol.as_str();

        let lock = self.locks.acquire(symbol);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.sync_locked(symbol, range)
        };
        self.locks.release(symbol, lock);
        result
    }

    fn sync_locked(&self, symbol: &str, range: DateRange) -> Result<Vec<Observation>, CloseCacheError> {
        let max_cached = self.store.max_date(symbol)?;
        let plan = FetchPlan::decide(max_cached, range.end, self.clock.today());
        tracing::debug!(%symbol, ?max_cached, end = %range.end, ?plan, "planned sync");

        if let Some((from, to)) = plan.fetch_window() {
            let fetched = self.fetcher.fetch(symbol, from, to)?;
            let merged = self.merge(symbol, fetched)?;
            tracing::info!(%symbol, ?plan, merged, "cache updated");
        }

        self.store.query_range(symbol, range.start, range.end)
    }

    fn merge(&self, symbol: &str, fetched: Vec<DailyClose>) -> Result<usize, CloseCacheError> {
        if fetched.is_empty() {
            return Ok(0);
        }
        let observations: Vec<Observation> = fetched
            .into_iter()
            .map(|row| row.into_observation(symbol))
            .collect();
        self.store.bulk_insert(&observations)
    }
}

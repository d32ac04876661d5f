//! Remote series port.

use crate::domain::error::CloseCacheError;
use crate::domain::observation::DailyClose;
use crate::domain::sync_request::UpperBound;
use chrono::NaiveDate;

/// A remote source of daily close prices.
///
/// Implementations return rows in ascending date order with no repeated
/// dates. A symbol the provider cannot resolve yields
/// [`CloseCacheError::UnknownSymbol`]; transport failures yield
/// [`CloseCacheError::ProviderUnavailable`].
pub trait SeriesFetcher {
    fn fetch(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: UpperBound,
    ) -> Result<Vec<DailyClose>, CloseCacheError>;
}

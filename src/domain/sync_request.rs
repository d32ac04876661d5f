//! Request resolution and fetch planning.

use chrono::{Days, Local, NaiveDate};

/// Earliest date a request can start from when no start is given.
pub const EPOCH_FLOOR: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(d) => d,
    None => panic!("invalid epoch floor"),
};

/// Source of "today" for defaulting open request ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::System => Local::now().date_naive(),
            Clock::Fixed(date) => *date,
        }
    }
}

/// Upper end of a remote fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpperBound {
    /// Up to whatever the provider has, resolved to today's date when the
    /// request goes out.
    Present,
    /// A fixed last day. The orchestrator always asks for [`UpperBound::Present`];
    /// this is for direct callers of the fetcher port that want a closed window.
    Through(NaiveDate),
}

impl UpperBound {
    pub fn resolve(&self, clock: Clock) -> NaiveDate {
        match self {
            UpperBound::Present => clock.today(),
            UpperBound::Through(date) => *date,
        }
    }

    /// Resolve against `clock`, never landing before `start`.
    pub fn resolve_after(&self, start: Option<NaiveDate>, clock: Clock) -> NaiveDate {
        let end = self.resolve(clock);
        start.map_or(end, |start| end.max(start))
    }
}

/// A close-data query as issued by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub symbol: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Inclusive date range with both ends known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SyncRequest {
    pub fn new(symbol: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            symbol: symbol.to_string(),
            start,
            end,
        }
    }

    /// Fill in missing bounds: start defaults to [`EPOCH_FLOOR`], end to today.
    pub fn resolve(&self, clock: Clock) -> DateRange {
        DateRange {
            start: self.start.unwrap_or(EPOCH_FLOOR),
            end: self.end.unwrap_or_else(|| clock.today()),
        }
    }
}

/// What the orchestrator must fetch before answering a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPlan {
    /// Nothing cached for the symbol: pull the whole history.
    FullHistory,
    /// Cache ends before the requested end: pull from `from` onwards.
    TopUp { from: NaiveDate },
    UpToDate,
}

impl FetchPlan {
    /// A cache that already holds `today` is up to date whatever the
    /// requested end, since the provider has nothing later.
    pub fn decide(max_cached: Option<NaiveDate>, requested_end: NaiveDate, today: NaiveDate) -> Self {
        match max_cached {
            None => FetchPlan::FullHistory,
            Some(max) if requested_end > max => match max.checked_add_days(Days::new(1)) {
                Some(from) if from <= today => FetchPlan::TopUp { from },
                _ => FetchPlan::UpToDate,
            },
            Some(_) => FetchPlan::UpToDate,
        }
    }

    /// Lower bound and upper bound of the remote fetch, if one is needed.
    pub fn fetch_window(&self) -> Option<(Option<NaiveDate>, UpperBound)> {
        match self {
            FetchPlan::FullHistory => Some((None, UpperBound::Present)),
            FetchPlan::TopUp { from } => Some((Some(*from), UpperBound::Present)),
            FetchPlan::UpToDate => None,
        }
    }
}

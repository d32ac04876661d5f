//! Yahoo historical-quotes fetcher.
//!
//! Two requests per fetch: the historical prices HTML page for the symbol and
//! date range, then the CSV download linked from that page. A page without a
//! download link means the provider does not know the symbol.

use crate::adapters::close_csv::decode_close_csv;
use crate::domain::error::CloseCacheError;
use crate::domain::observation::DailyClose;
use crate::domain::sync_request::{Clock, UpperBound};
use crate::ports::config_port::ConfigPort;
use crate::ports::fetch_port::SeriesFetcher;
use chrono::{Datelike, NaiveDate};
use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://finance.yahoo.com/q/hp";
pub const DEFAULT_CSV_PREFIX: &str = "http://ichart.finance.yahoo.com/table.csv";
const DEFAULT_TIMEOUT_SECS: i64 = 30;
const DEFAULT_USER_AGENT: &str = concat!("closecache/", env!("CARGO_PKG_VERSION"));

pub struct YahooAdapter {
    client: Client,
    base_url: String,
    csv_prefix: String,
    clock: Clock,
}

fn unavailable(e: reqwest::Error) -> CloseCacheError {
    CloseCacheError::ProviderUnavailable {
        reason: e.to_string(),
    }
}

/// Zero-based month, day and year, as the quotes page expects them.
fn date_triple(date: NaiveDate) -> (u32, u32, i32) {
    (date.month0(), date.day(), date.year())
}

/// Build the historical prices page URL. A missing start encodes as `0, 0, 0`.
pub fn history_page_url(
    base_url: &str,
    symbol: &str,
    start: Option<NaiveDate>,
    end: NaiveDate,
) -> Result<Url, CloseCacheError> {
    let (a, b, c) = start.map(date_triple).unwrap_or((0, 0, 0));
    let (d, e, f) = date_triple(end);

    Url::parse_with_params(
        base_url,
        &[
            ("s", format!("{symbol} Historical Prices")),
            ("a", a.to_string()),
            ("b", b.to_string()),
            ("c", c.to_string()),
            ("d", d.to_string()),
            ("e", e.to_string()),
            ("f", f.to_string()),
        ],
    )
    .map_err(|e| CloseCacheError::ConfigInvalid {
        section: "provider".into(),
        key: "base_url".into(),
        reason: e.to_string(),
    })
}

/// Find the CSV download link in a quotes page: the first `prefix` occurrence
/// extended to the last `.csv` on the same line.
pub fn extract_csv_link(page: &str, prefix: &str) -> Option<String> {
    page.match_indices(prefix).find_map(|(start, _)| {
        let rest = &page[start..];
        let line = rest.split('\n').next().unwrap_or(rest);
        let tail_end = line[prefix.len()..].rfind(".csv")?;
        let link = &line[..prefix.len() + tail_end + ".csv".len()];
        Some(link.replace("&amp;", "&"))
    })
}

impl YahooAdapter {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, CloseCacheError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(unavailable)?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            csv_prefix: DEFAULT_CSV_PREFIX.to_string(),
            clock: Clock::System,
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CloseCacheError> {
        let base_url = config
            .get_string("provider", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = config.get_int("provider", "timeout_secs", DEFAULT_TIMEOUT_SECS);
        if timeout_secs <= 0 {
            return Err(CloseCacheError::ConfigInvalid {
                section: "provider".into(),
                key: "timeout_secs".into(),
                reason: format!("must be positive, got {timeout_secs}"),
            });
        }
        let user_agent = config
            .get_string("provider", "user_agent")
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let adapter = Self::new(&base_url, Duration::from_secs(timeout_secs as u64), &user_agent)?;
        Ok(match config.get_string("provider", "csv_prefix") {
            Some(prefix) => adapter.with_csv_prefix(&prefix),
            None => adapter,
        })
    }

    pub fn with_csv_prefix(mut self, prefix: &str) -> Self {
        self.csv_prefix = prefix.to_string();
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn get_text(&self, url: &str) -> Result<(StatusCode, String), CloseCacheError> {
        let response = self.client.get(url).send().map_err(unavailable)?;
        let status = response.status();
        let body = response.text().map_err(unavailable)?;
        Ok((status, body))
    }
}

impl SeriesFetcher for YahooAdapter {
    fn fetch(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: UpperBound,
    ) -> Result<Vec<DailyClose>, CloseCacheError> {
        let page_url = history_page_url(
            &self.base_url,
            symbol,
            start,
            end.resolve_after(start, self.clock),
        )?;
        tracing::debug!(%symbol, url = %page_url, "requesting quotes page");

        let (status, page) = self.get_text(page_url.as_str())?;
        if status == StatusCode::NOT_FOUND {
            return Err(CloseCacheError::UnknownSymbol {
                symbol: symbol.to_string(),
            });
        }
        if !status.is_success() {
            return Err(CloseCacheError::ProviderUnavailable {
                reason: format!("HTTP {status} for {symbol} quotes page"),
            });
        }

        let csv_url = extract_csv_link(&page, &self.csv_prefix).ok_or_else(|| {
            CloseCacheError::UnknownSymbol {
                symbol: symbol.to_string(),
            }
        })?;
        tracing::debug!(%symbol, url = %csv_url, "downloading price CSV");

        let (status, body) = self.get_text(&csv_url)?;
        if !status.is_success() {
            return Err(CloseCacheError::ProviderUnavailable {
                reason: format!("HTTP {status} for {symbol} price CSV"),
            });
        }

        decode_close_csv(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        (listener, base)
    }

    /// Answer one request per connection with `responses` in order and
    /// return the request lines seen.
    fn serve(listener: TcpListener, responses: Vec<(u16, String)>) -> thread::JoinHandle<Vec<String>> {
        thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                seen.push(request_line.trim().to_string());
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                }
                write!(
                    stream,
                    "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                )
                .unwrap();
            }
            seen
        })
    }

    fn adapter(base: &str) -> YahooAdapter {
        YahooAdapter::new(&format!("{base}/q/hp"), Duration::from_secs(5), "test")
            .unwrap()
            .with_csv_prefix(&format!("{base}/table.csv"))
            .with_clock(Clock::Fixed(d(2012, 12, 21)))
    }

    #[test]
    fn page_url_encodes_zero_based_month() {
        let url = history_page_url(DEFAULT_BASE_URL, "SPY", Some(d(2012, 1, 11)), d(2012, 12, 21))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://finance.yahoo.com/q/hp?s=SPY+Historical+Prices&a=0&b=11&c=2012&d=11&e=21&f=2012"
        );
    }

    #[test]
    fn page_url_without_start_uses_zeros() {
        let url = history_page_url(DEFAULT_BASE_URL, "SPY", None, d(2013, 3, 4)).unwrap();
        assert!(url.as_str().ends_with("&a=0&b=0&c=0&d=2&e=4&f=2013"));
    }

    #[test]
    fn page_url_rejects_bad_base() {
        assert!(matches!(
            history_page_url("not a url", "SPY", None, d(2013, 3, 4)),
            Err(CloseCacheError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn extracts_link_to_last_csv_on_line() {
        let page = "<html>\n<a href=\"http://ichart.finance.yahoo.com/table.csv?s=SPY&amp;a=00&amp;g=d&amp;ignore=.csv\">Download</a>\n</html>";
        assert_eq!(
            extract_csv_link(page, DEFAULT_CSV_PREFIX).as_deref(),
            Some("http://ichart.finance.yahoo.com/table.csv?s=SPY&a=00&g=d&ignore=.csv")
        );
    }

    #[test]
    fn link_must_end_in_csv_on_same_line() {
        let page = "http://ichart.finance.yahoo.com/table.csv?s=SPY\n.csv";
        assert_eq!(extract_csv_link(page, DEFAULT_CSV_PREFIX), None);
        assert_eq!(extract_csv_link("<html>no link</html>", DEFAULT_CSV_PREFIX), None);
    }

    #[test]
    fn fetch_follows_link_and_decodes() {
        let (listener, base) = bind();
        let page = format!("<p>\n<a href=\"{base}/table.csv?s=SPY&amp;ignore=.csv\">Download</a>\n</p>");
        let csv = "Date,Open,High,Low,Close,Volume,Adj Close\n\
                   2012-01-04,1,1,1,127.50,1,1\n\
                   2012-01-03,1,1,1,127.25,1,1\n"
            .to_string();
        let handle = serve(listener, vec![(200, page), (200, csv)]);

        let rows = adapter(&base)
            .fetch("SPY", Some(d(2012, 1, 3)), UpperBound::Present)
            .unwrap();
        let seen = handle.join().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], DailyClose::new(d(2012, 1, 3), 127.25));
        assert!(seen[0].starts_with("GET /q/hp?s=SPY+Historical+Prices&a=0&b=3&c=2012&d=11&e=21&f=2012 "));
        assert!(seen[1].starts_with("GET /table.csv?s=SPY&ignore=.csv "));
    }

    #[test]
    fn open_end_is_never_before_start() {
        let (listener, base) = bind();
        let page = format!("<a href=\"{base}/table.csv?s=SPY&amp;ignore=.csv\">Download</a>");
        let csv = "Date,Open,High,Low,Close,Volume,Adj Close\n".to_string();
        let handle = serve(listener, vec![(200, page), (200, csv)]);

        // Adapter clock is 2012-12-21, one day before the requested start
        let rows = adapter(&base)
            .fetch("SPY", Some(d(2012, 12, 22)), UpperBound::Present)
            .unwrap();
        let seen = handle.join().unwrap();

        assert!(rows.is_empty());
        assert!(seen[0].contains("&a=11&b=22&c=2012&d=11&e=22&f=2012 "));
    }

    #[test]
    fn page_without_link_is_unknown_symbol() {
        let (listener, base) = bind();
        let handle = serve(listener, vec![(200, "<p>There are no results</p>".to_string())]);

        let err = adapter(&base)
            .fetch("ZZZZINVALID", None, UpperBound::Present)
            .unwrap_err();
        handle.join().unwrap();

        match err {
            CloseCacheError::UnknownSymbol { symbol } => assert_eq!(symbol, "ZZZZINVALID"),
            other => panic!("expected UnknownSymbol, got: {other}"),
        }
    }

    #[test]
    fn server_error_is_provider_unavailable() {
        let (listener, base) = bind();
        let handle = serve(listener, vec![(503, String::new())]);

        let err = adapter(&base).fetch("SPY", None, UpperBound::Present).unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, CloseCacheError::ProviderUnavailable { .. }));
    }

    #[test]
    fn unreachable_host_is_provider_unavailable() {
        let (listener, base) = bind();
        drop(listener);

        let err = adapter(&base).fetch("SPY", None, UpperBound::Present).unwrap_err();
        assert!(matches!(err, CloseCacheError::ProviderUnavailable { .. }));
    }

    struct ProviderConfig(i64);

    impl ConfigPort for ProviderConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, _default: i64) -> i64 {
            self.0
        }
    }

    #[test]
    fn from_config_rejects_non_positive_timeout() {
        assert!(matches!(
            YahooAdapter::from_config(&ProviderConfig(0)),
            Err(CloseCacheError::ConfigInvalid { .. })
        ));
        assert!(YahooAdapter::from_config(&ProviderConfig(10)).is_ok());
    }
}

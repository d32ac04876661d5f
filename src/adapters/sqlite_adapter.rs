//! SQLite series store.

use crate::domain::error::CloseCacheError;
use crate::domain::observation::Observation;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{ManagedStore, SeriesStore};
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const DATE_FORMAT: &str = "%Y-%m-%d";

const CREATE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS price_data (
        symbol TEXT NOT NULL CHECK (length(symbol) BETWEEN 1 AND 10),
        date TEXT NOT NULL,
        close REAL NOT NULL,
        PRIMARY KEY (symbol, date)
    );";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_error(e: rusqlite::Error) -> CloseCacheError {
    CloseCacheError::StoreQuery {
        reason: e.to_string(),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, CloseCacheError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| CloseCacheError::Store {
        reason: format!("bad stored date '{value}': {e}"),
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CloseCacheError> {
        let db_path = config.require_string("sqlite", "path")?;
        let pool_size = config.get_int("sqlite", "pool_size", 4);
        if pool_size < 1 {
            return Err(CloseCacheError::ConfigInvalid {
                section: "sqlite".into(),
                key: "pool_size".into(),
                reason: format!("must be at least 1, got {pool_size}"),
            });
        }

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size as u32)
            .build(manager)
            .map_err(|e: r2d2::Error| CloseCacheError::Store {
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %db_path, pool_size, "opened sqlite store");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, CloseCacheError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| CloseCacheError::Store {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, CloseCacheError> {
        self.pool.get().map_err(|e: r2d2::Error| CloseCacheError::Store {
            reason: e.to_string(),
        })
    }
}

impl SeriesStore for SqliteAdapter {
    fn max_date(&self, symbol: &str) -> Result<Option<NaiveDate>, CloseCacheError> {
        let max: Option<String> = self
            .conn()?
            .query_row(
                "SELECT MAX(date) FROM price_data WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )
            .map_err(query_error)?;

        max.as_deref().map(parse_date).transpose()
    }

    fn query_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, CloseCacheError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, close
                 FROM price_data
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                    ))
                },
            )
            .map_err(query_error)?;

        let mut observations = Vec::new();
        for row in rows {
            let (symbol, date, close) = row.map_err(query_error)?;
            observations.push(Observation {
                symbol,
                date: parse_date(&date)?,
                close,
            });
        }

        Ok(observations)
    }

    fn bulk_insert(&self, observations: &[Observation]) -> Result<usize, CloseCacheError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO price_data (symbol, date, close)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (symbol, date) DO NOTHING",
                )
                .map_err(query_error)?;

            for obs in observations {
                inserted += stmt
                    .execute(params![
                        obs.symbol,
                        obs.date.format(DATE_FORMAT).to_string(),
                        obs.close
                    ])
                    .map_err(query_error)?;
            }
        }

        // Dropping `tx` on an early return above rolls the batch back.
        tx.commit().map_err(query_error)?;
        Ok(inserted)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CloseCacheError> {
        let result: (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM price_data WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((parse_date(&min)?, parse_date(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl ManagedStore for SqliteAdapter {
    fn initialize_schema(&self) -> Result<(), CloseCacheError> {
        self.conn()?.execute_batch(CREATE_SCHEMA).map_err(query_error)
    }

    fn reset_schema(&self) -> Result<(), CloseCacheError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        tx.execute_batch("DROP TABLE IF EXISTS price_data;")
            .map_err(query_error)?;
        tx.execute_batch(CREATE_SCHEMA).map_err(query_error)?;
        tx.commit().map_err(query_error)
    }
}

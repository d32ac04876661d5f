//! PostgreSQL series store.

use crate::domain::error::CloseCacheError;
use crate::domain::observation::Observation;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{ManagedStore, SeriesStore};
use chrono::NaiveDate;
use postgres::NoTls;
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;

const CREATE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS public.price_data (
        symbol VARCHAR(10) NOT NULL CHECK (length(symbol) >= 1),
        date DATE NOT NULL,
        close DOUBLE PRECISION NOT NULL,
        PRIMARY KEY (symbol, date)
    );";

type Manager = PostgresConnectionManager<NoTls>;

pub struct PostgresAdapter {
    pool: Pool<Manager>,
}

fn query_error(e: postgres::Error) -> CloseCacheError {
    CloseCacheError::StoreQuery {
        reason: e.to_string(),
    }
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CloseCacheError> {
        let connection_string = config.require_string("postgres", "connection_string")?;
        let pg_config = connection_string
            .parse::<postgres::Config>()
            .map_err(|e| CloseCacheError::ConfigInvalid {
                section: "postgres".into(),
                key: "connection_string".into(),
                reason: e.to_string(),
            })?;

        let pool_size = config.get_int("postgres", "pool_size", 4);
        if pool_size < 1 {
            return Err(CloseCacheError::ConfigInvalid {
                section: "postgres".into(),
                key: "pool_size".into(),
                reason: format!("must be at least 1, got {pool_size}"),
            });
        }

        let pool = Pool::builder()
            .max_size(pool_size as u32)
            .build(PostgresConnectionManager::new(pg_config, NoTls))
            .map_err(|e: r2d2::Error| CloseCacheError::Store {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<Manager>, CloseCacheError> {
        self.pool.get().map_err(|e: r2d2::Error| CloseCacheError::Store {
            reason: e.to_string(),
        })
    }
}

impl SeriesStore for PostgresAdapter {
    fn max_date(&self, symbol: &str) -> Result<Option<NaiveDate>, CloseCacheError> {
        let row = self
            .conn()?
            .query_one(
                "SELECT MAX(date) FROM public.price_data WHERE symbol = $1",
                &[&symbol],
            )
            .map_err(query_error)?;

        Ok(row.get(0))
    }

    fn query_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, CloseCacheError> {
        let rows = self
            .conn()?
            .query(
                "SELECT symbol, date, close FROM public.price_data \
                 WHERE symbol = $1 AND date BETWEEN $2 AND $3 \
                 ORDER BY date ASC",
                &[&symbol, &start, &end],
            )
            .map_err(query_error)?;

        Ok(rows
            .into_iter()
            .map(|row| Observation {
                symbol: row.get(0),
                date: row.get(1),
                close: row.get(2),
            })
            .collect())
    }

    fn bulk_insert(&self, observations: &[Observation]) -> Result<usize, CloseCacheError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(query_error)?;
        let stmt = tx
            .prepare(
                "INSERT INTO public.price_data (symbol, date, close) VALUES ($1, $2, $3) \
                 ON CONFLICT (symbol, date) DO NOTHING",
            )
            .map_err(query_error)?;

        let mut inserted = 0;
        for obs in observations {
            inserted += tx
                .execute(&stmt, &[&obs.symbol, &obs.date, &obs.close])
                .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(inserted as usize)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, CloseCacheError> {
        let row = self
            .conn()?
            .query_one(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM public.price_data WHERE symbol = $1",
                &[&symbol],
            )
            .map_err(query_error)?;

        let min: Option<NaiveDate> = row.get(0);
        let max: Option<NaiveDate> = row.get(1);
        let count: i64 = row.get(2);

        match (min, max) {
            (Some(min), Some(max)) if count > 0 => Ok(Some((min, max, count as usize))),
            _ => Ok(None),
        }
    }
}

impl ManagedStore for PostgresAdapter {
    fn initialize_schema(&self) -> Result<(), CloseCacheError> {
        self.conn()?.batch_execute(CREATE_SCHEMA).map_err(query_error)
    }

    fn reset_schema(&self) -> Result<(), CloseCacheError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(query_error)?;
        tx.batch_execute("DROP TABLE IF EXISTS public.price_data;")
            .map_err(query_error)?;
        tx.batch_execute(CREATE_SCHEMA).map_err(query_error)?;
        tx.commit().map_err(query_error)
    }
}

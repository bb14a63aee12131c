use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PoolError};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Server-side limits applied to every pooled connection when it is opened.
/// A query (or a wait on a row lock) that runs past them is cancelled by
/// Postgres and surfaces as a query error.
#[derive(Debug, Clone, Copy)]
pub struct QueryTimeouts {
    pub statement: Duration,
    pub lock: Duration,
}

impl QueryTimeouts {
    fn sql(&self) -> String {
        // 0 disables the limit in Postgres, so never round down to it.
        let statement = self.statement.as_millis().max(1);
        let lock = self.lock.as_millis().max(1);
        format!("SET statement_timeout = {statement}; SET lock_timeout = {lock};")
    }
}

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for QueryTimeouts {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&self.sql())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Builds the Postgres pool. `connection_timeout` bounds how long a request
/// waits for a free connection before the checkout fails.
pub fn create_pool(
    database_url: &str,
    max_size: u32,
    connection_timeout: Duration,
    timeouts: QueryTimeouts,
) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_size)
        .min_idle(Some(2.min(max_size)))
        .connection_timeout(connection_timeout)
        .connection_customizer(Box::new(timeouts))
        .test_on_check_out(true)
        .build(manager)?;

    tracing::info!(
        max_size,
        statement_timeout_ms = timeouts.statement.as_millis() as u64,
        lock_timeout_ms = timeouts.lock.as_millis() as u64,
        "database connection pool created"
    );
    Ok(pool)
}

use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::RunQueryDsl;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Applies `statement_timeout` to every pooled connection so no single
/// store call can hang a worker.
#[derive(Debug, Clone, Copy)]
struct StatementTimeout(Duration);

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query(format!("SET statement_timeout = {}", self.0.as_millis()))
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Build the pool and open its initial connections. Fails if the database
/// is unreachable within `timeout`.
pub fn create_pool(database_url: &str, timeout: Duration) -> Result<DbPool, r2d2::Error> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .connection_timeout(timeout)
        .connection_customizer(Box::new(StatementTimeout(timeout)))
        .build(manager)
}

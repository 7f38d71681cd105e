//! Runtime and error plumbing shared by the sqlx-backed adapters

use crate::config::EngineKind;
use crate::error::{DbCliError, Result};
use sqlx::mysql::MySqlDatabaseError;
use std::future::Future;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

/// Current-thread runtime owned by one adapter; every driver call blocks on it.
pub(crate) fn runtime(engine: EngineKind) -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DbCliError::connection(engine, format!("failed to start runtime: {}", e)))
}

/// Drive a connect future with `timeout_secs` as the upper bound.
pub(crate) fn connect_with_timeout<C, F>(
    runtime: &Runtime,
    engine: EngineKind,
    timeout_secs: u64,
    connecting: F,
) -> Result<C>
where
    F: Future<Output = std::result::Result<C, sqlx::Error>>,
{
    let limit = Duration::from_secs(timeout_secs.max(1));
    runtime
        .block_on(async { tokio::time::timeout(limit, connecting).await })
        .map_err(|_| {
            DbCliError::connection(engine, format!("connection timed out after {}s", limit.as_secs()))
        })?
        .map_err(|err| DbCliError::connection(engine, err.to_string()))
}

/// Server errors keep their native code: the MySQL error number when there is
/// one, otherwise the SQLSTATE.
pub(crate) fn sqlx_error(engine: EngineKind, err: sqlx::Error) -> DbCliError {
    match err {
        sqlx::Error::Database(db) => {
            let code = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|e| e.number().to_string())
                .or_else(|| db.code().map(|c| c.into_owned()));
            DbCliError::engine(engine, code, db.message())
        }
        sqlx::Error::Io(e) => DbCliError::connection(engine, e.to_string()),
        other => DbCliError::engine(engine, None, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_are_connection_errors() {
        let err = sqlx_error(
            EngineKind::Postgres,
            sqlx::Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        );
        assert!(matches!(err, DbCliError::Connection { .. }));
    }

    #[test]
    fn connect_timeout_is_a_connection_error() {
        let rt = runtime(EngineKind::MySql).unwrap();
        let never = std::future::pending::<std::result::Result<(), sqlx::Error>>();
        let err = connect_with_timeout(&rt, EngineKind::MySql, 1, never).unwrap_err();
        assert!(err.to_string().contains("timed out after 1s"));
    }
}

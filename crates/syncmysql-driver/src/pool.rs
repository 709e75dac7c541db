//! Bounded session pool backing queued operations.

use std::time::Duration;

use mysql_async::Pool;
use syncmysql_core::error::{PoolError, PoolErrorKind};
use syncmysql_core::{Error, Result};

use crate::config::ConnectionConfig;
use crate::error::{ErrorContext, map_connect_error, map_statement_error};
use crate::logging;
use crate::result::{ResultSet, run_query};
use crate::types::TypeCastOptions;

/// Sessions for queued work, opened lazily and capped at
/// `queue_pool_size`. Cloning shares the same pool.
#[derive(Debug, Clone)]
pub struct QueuePool {
    pool: Pool,
    connect_timeout: Duration,
    max_size: usize,
    debug: bool,
}

impl QueuePool {
    /// Build the pool. No session is opened until the first statement.
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let opts = config.pool_opts()?;
        let max_size = opts.pool_opts().constraints().max();
        Ok(Self {
            pool: Pool::new(opts),
            connect_timeout: config.connect_timeout,
            max_size,
            debug: config.debug,
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Run a statement text on a pooled session and collect its result sets.
    ///
    /// The session goes back to the pool when this returns; `mysql_async`
    /// resets pending results before handing it out again.
    pub async fn run(
        &self,
        sql: &str,
        opts: &TypeCastOptions,
        ctx: &ErrorContext,
    ) -> Result<Vec<ResultSet>> {
        let mut conn = match tokio::time::timeout(self.connect_timeout, self.pool.get_conn()).await
        {
            Ok(Ok(conn)) => conn,
            // A closed pool maps to `Error::Pool(Closed)` here as well.
            Ok(Err(e)) => return Err(map_connect_error(e)),
            Err(_) => {
                return Err(Error::Pool(PoolError {
                    kind: PoolErrorKind::Timeout,
                    message: format!(
                        "no queue session available within {} ms",
                        self.connect_timeout.as_millis()
                    ),
                    source: None,
                }));
            }
        };

        logging::statement(self.debug, "queue", sql);
        let sets = run_query(&mut conn, sql, opts, ctx).await?;
        logging::outcome(self.debug, "queue", &sets);
        Ok(sets)
    }

    /// Close idle sessions and wait for checked-out ones to come back.
    pub async fn disconnect(self) -> Result<()> {
        self.pool
            .disconnect()
            .await
            .map_err(|e| map_statement_error(e, &ErrorContext::default()))?;
        tracing::debug!("Queue pool closed");
        Ok(())
    }
}

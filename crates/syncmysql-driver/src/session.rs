//! A single async MySQL session.

use mysql_async::Conn;
use mysql_async::prelude::Queryable;
use syncmysql_core::{Error, Result};

use crate::config::ConnectionConfig;
use crate::error::{ErrorContext, map_connect_error, map_statement_error};
use crate::logging;
use crate::result::{ResultSet, run_query};
use crate::types::TypeCastOptions;

/// One server session, used for the direct operations of a connection.
///
/// Session state such as user variables, temporary tables and
/// `LAST_INSERT_ID()` persists between statements.
#[derive(Debug)]
pub struct MySqlSession {
    conn: Conn,
    debug: bool,
}

impl MySqlSession {
    /// Open a session, bounded by the configured connect timeout.
    #[tracing::instrument(level = "debug", skip(config), fields(host = %config.host, port = config.port))]
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let opts = config.session_opts();
        let conn = match tokio::time::timeout(config.connect_timeout, Conn::new(opts)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(map_connect_error(e)),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = config.connect_timeout.as_millis(),
                    "Timed out opening session"
                );
                return Err(Error::Timeout);
            }
        };
        tracing::debug!(
            connection_id = conn.id(),
            server_version = ?conn.server_version(),
            "Session opened"
        );
        Ok(Self {
            conn,
            debug: config.debug,
        })
    }

    /// Server-side connection id.
    pub fn id(&self) -> u32 {
        self.conn.id()
    }

    /// Run one statement text and collect all of its result sets.
    pub async fn query(
        &mut self,
        sql: &str,
        opts: &TypeCastOptions,
        ctx: &ErrorContext,
    ) -> Result<Vec<ResultSet>> {
        logging::statement(self.debug, "session", sql);
        let sets = run_query(&mut self.conn, sql, opts, ctx).await?;
        logging::outcome(self.debug, "session", &sets);
        Ok(sets)
    }

    pub async fn ping(&mut self) -> Result<()> {
        self.conn
            .ping()
            .await
            .map_err(|e| map_statement_error(e, &ErrorContext::default()))
    }

    /// Close the session gracefully.
    pub async fn disconnect(self) -> Result<()> {
        let id = self.conn.id();
        self.conn
            .disconnect()
            .await
            .map_err(|e| map_statement_error(e, &ErrorContext::default()))?;
        tracing::debug!(connection_id = id, "Session closed");
        Ok(())
    }
}

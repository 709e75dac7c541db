//! The blocking connection.

use std::fmt;
use std::panic::Location;
use std::sync::{Mutex, PoisonError, RwLock};

use syncmysql_core::{Error, Result, Row, Value};
use syncmysql_driver::types::count_statements;
use syncmysql_driver::{
    ConnectionConfig, ErrorContext, MySqlSession, QueuePool, ResultSet, TypeCastOptions,
    call_statement, record_statement,
};
use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::call::CallResult;
use crate::deferred::Deferred;
use crate::runtime::{self, ensure_blocking_allowed, lock};

/// A blocking MySQL connection.
///
/// Direct operations (`query`, `call`, `update`, `get_record`) run on one
/// primary session and block the calling thread until the server has
/// answered. Session state such as user variables, temporary tables and
/// `LAST_INSERT_ID()` carries over from one direct call to the next.
/// Concurrent callers sharing a connection are served one at a time.
///
/// Queued operations (`queue_query`, `queue_call`, `queue_update`) return a
/// [`Deferred`] immediately and run on a separate pool of at most
/// `queue_pool_size` sessions, in parallel with each other and with
/// direct calls. [`finish_all`](Self::finish_all) waits for all of them.
///
/// Every blocking method must be called from outside any async runtime;
/// inside one they return `Error::Config`.
///
/// # Example
///
/// ```no_run
/// use syncmysql::prelude::*;
///
/// # fn main() -> syncmysql::Result<()> {
/// let conn = Connection::connect(
///     ConnectionConfig::new().user("app").password("secret").database("shop"),
/// )?;
///
/// let rows = conn.query("SELECT id, name FROM users WHERE age > ?", &[Value::from(18)])?;
/// for row in &rows {
///     let name: String = row.get_named("name")?;
///     println!("{name}");
/// }
///
/// let first = conn.queue_query("SELECT COUNT(*) FROM orders", &[]);
/// let second = conn.queue_call("refresh_stats", &[]);
/// conn.finish_all()?;
/// let count: i64 = first.wait()?[0].get_as(0)?;
/// let _stats = second.wait()?;
///
/// conn.dispose()?;
/// # let _ = count;
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    config: ConnectionConfig,
    cast: TypeCastOptions,
    /// `None` once disposed.
    runtime: RwLock<Option<Runtime>>,
    session: tokio::sync::Mutex<Option<MySqlSession>>,
    queue: QueuePool,
    pending: Mutex<Pending>,
}

/// Queued tasks that may still be running, plus how many operations were
/// queued since the last join.
#[derive(Default)]
struct Pending {
    tasks: Vec<JoinHandle<()>>,
    unjoined: usize,
}

impl Connection {
    /// Validate the configuration, start the connection's runtime and open
    /// the primary session.
    #[tracing::instrument(level = "debug", skip(config), fields(host = %config.host, port = config.port))]
    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        ensure_blocking_allowed()?;
        config.validate()?;

        let runtime = runtime::build(config.worker_threads)?;
        let queue = QueuePool::new(&config)?;
        let session = runtime.block_on(MySqlSession::connect(&config))?;
        tracing::info!(
            connection_id = session.id(),
            queue_pool_size = queue.max_size(),
            worker_threads = config.worker_threads,
            "Connected"
        );

        Ok(Self {
            cast: config.type_cast_options(),
            config,
            runtime: RwLock::new(Some(runtime)),
            session: tokio::sync::Mutex::new(Some(session)),
            queue,
            pending: Mutex::new(Pending::default()),
        })
    }

    /// Connect using a `mysql://` URL.
    pub fn from_url(url: &str) -> Result<Self> {
        Self::connect(ConnectionConfig::from_url(url)?)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_disposed(&self) -> bool {
        self.runtime
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Queued operations that are still running.
    pub fn queued(&self) -> usize {
        let mut pending = lock(&self.pending);
        pending.tasks.retain(|task| !task.is_finished());
        pending.tasks.len()
    }

    /// Run a statement and return its first result set.
    ///
    /// `?` placeholders take the next value as a literal, `??` as an
    /// identifier.
    #[track_caller]
    pub fn query(&self, sql: &str, values: &[Value]) -> Result<ResultSet> {
        let caller = Location::caller();
        self.run_direct(sql, values, caller).map(first_set)
    }

    /// Run a statement text and return every result set it produced.
    #[track_caller]
    pub fn query_multi(&self, sql: &str, values: &[Value]) -> Result<Vec<ResultSet>> {
        let caller = Location::caller();
        self.run_direct(sql, values, caller)
    }

    /// Same as [`query`](Self::query).
    #[track_caller]
    pub fn update(&self, sql: &str, values: &[Value]) -> Result<ResultSet> {
        let caller = Location::caller();
        self.run_direct(sql, values, caller).map(first_set)
    }

    /// Call a stored procedure with positional arguments.
    #[track_caller]
    pub fn call(&self, procedure: &str, args: &[Value]) -> Result<CallResult> {
        let caller = Location::caller();
        let sql = call_statement(procedure, args.len());
        self.run_direct(&sql, args, caller).map(CallResult::from_sets)
    }

    /// Fetch the row whose primary key column equals `id`.
    #[track_caller]
    pub fn get_record(&self, table: &str, id: impl Into<Value>) -> Result<Option<Row>> {
        let caller = Location::caller();
        let sql = record_statement(table, &self.config.primary_key);
        let set = self.run_direct(&sql, &[id.into()], caller).map(first_set)?;
        Ok(set.into_rows().into_iter().next())
    }

    /// Check that the primary session is alive.
    pub fn ping(&self) -> Result<()> {
        let runtime = self.runtime.read().unwrap_or_else(PoisonError::into_inner);
        let runtime = runtime.as_ref().ok_or_else(Error::disposed)?;
        ensure_blocking_allowed()?;
        runtime.block_on(async {
            let mut session = self.session.lock().await;
            session.as_mut().ok_or_else(Error::disposed)?.ping().await
        })
    }

    /// Queue a statement; the handle yields what [`query`](Self::query) would.
    #[track_caller]
    pub fn queue_query(&self, sql: &str, values: &[Value]) -> Deferred<ResultSet> {
        let caller = Location::caller();
        self.run_queued(sql, values, caller, first_set)
    }

    /// Same as [`queue_query`](Self::queue_query).
    #[track_caller]
    pub fn queue_update(&self, sql: &str, values: &[Value]) -> Deferred<ResultSet> {
        let caller = Location::caller();
        self.run_queued(sql, values, caller, first_set)
    }

    /// Queue a procedure call; the handle yields what [`call`](Self::call) would.
    #[track_caller]
    pub fn queue_call(&self, procedure: &str, args: &[Value]) -> Deferred<CallResult> {
        let caller = Location::caller();
        let sql = call_statement(procedure, args.len());
        self.run_queued(&sql, args, caller, CallResult::from_sets)
    }

    /// Block until every queued operation has finished.
    ///
    /// Operations queued while this runs are waited for as well. Returns how
    /// many operations were queued since the previous `finish_all`, finished
    /// or not; afterwards every handle returned so far is ready.
    pub fn finish_all(&self) -> Result<usize> {
        let runtime = self.runtime.read().unwrap_or_else(PoisonError::into_inner);
        let runtime = runtime.as_ref().ok_or_else(Error::disposed)?;
        ensure_blocking_allowed()?;
        let joined = self.join_pending(runtime);
        tracing::debug!(joined, "Queued operations finished");
        Ok(joined)
    }

    /// Wait for queued work, then close every session and stop the runtime.
    ///
    /// Calling it again is a no-op. Any other operation afterwards fails
    /// with a `Disposed` connection error.
    pub fn dispose(&self) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        ensure_blocking_allowed()?;
        let runtime = self
            .runtime
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match runtime {
            Some(runtime) => self.close(runtime),
            None => Ok(()),
        }
    }

    fn prepare(
        &self,
        sql: &str,
        values: &[Value],
        caller: &'static Location<'static>,
    ) -> Result<(String, ErrorContext)> {
        let statement = self.config.format_statement(sql, values)?;
        if !self.config.allows_multiple_statements() && count_statements(&statement) > 1 {
            return Err(Error::config(
                "statement text contains more than one statement; enable multiple_statements",
            ));
        }
        let ctx = if self.config.trace {
            ErrorContext {
                sql: Some(statement.clone()),
                detail: Some(format!("called from {}", caller)),
            }
        } else {
            ErrorContext::default()
        };
        Ok((statement, ctx))
    }

    fn run_direct(
        &self,
        sql: &str,
        values: &[Value],
        caller: &'static Location<'static>,
    ) -> Result<Vec<ResultSet>> {
        let runtime = self.runtime.read().unwrap_or_else(PoisonError::into_inner);
        let runtime = runtime.as_ref().ok_or_else(Error::disposed)?;
        ensure_blocking_allowed()?;
        let (statement, ctx) = self.prepare(sql, values, caller)?;

        runtime.block_on(async {
            let mut session = self.session.lock().await;
            let session = session.as_mut().ok_or_else(Error::disposed)?;
            session.query(&statement, &self.cast, &ctx).await
        })
    }

    fn run_queued<T, F>(
        &self,
        sql: &str,
        values: &[Value],
        caller: &'static Location<'static>,
        shape: F,
    ) -> Deferred<T>
    where
        T: Send + 'static,
        F: FnOnce(Vec<ResultSet>) -> T + Send + 'static,
    {
        // Held until the task is registered so `dispose` cannot miss it.
        let runtime = self.runtime.read().unwrap_or_else(PoisonError::into_inner);
        let Some(runtime) = runtime.as_ref() else {
            return Deferred::failed(Error::disposed());
        };
        let (statement, ctx) = match self.prepare(sql, values, caller) {
            Ok(prepared) => prepared,
            Err(e) => return Deferred::failed(e),
        };

        let (tx, rx) = oneshot::channel();
        let queue = self.queue.clone();
        let cast = self.cast;
        let task = runtime.spawn(async move {
            let result = queue.run(&statement, &cast, &ctx).await.map(shape);
            if let Err(e) = &result {
                tracing::debug!(error = %e, "Queued operation failed");
            }
            // The handle may have been dropped; the result is then discarded.
            let _ = tx.send(result);
        });
        let mut pending = lock(&self.pending);
        pending.tasks.retain(|task| !task.is_finished());
        pending.tasks.push(task);
        pending.unjoined += 1;
        Deferred::pending(rx)
    }

    fn join_pending(&self, runtime: &Runtime) -> usize {
        let mut joined = 0;
        loop {
            let tasks = {
                let mut pending = lock(&self.pending);
                joined += std::mem::take(&mut pending.unjoined);
                std::mem::take(&mut pending.tasks)
            };
            if tasks.is_empty() {
                return joined;
            }
            runtime.block_on(async {
                for task in tasks {
                    if let Err(e) = task.await {
                        tracing::error!(error = %e, "Queued operation aborted");
                    }
                }
            });
        }
    }

    fn close(&self, runtime: Runtime) -> Result<()> {
        let joined = self.join_pending(&runtime);

        let result = runtime.block_on(async {
            let mut first_error = None;
            if let Some(session) = self.session.lock().await.take() {
                if let Err(e) = session.disconnect().await {
                    tracing::warn!(error = %e, "Closing the primary session failed");
                    first_error.get_or_insert(e);
                }
            }
            if let Err(e) = self.queue.clone().disconnect().await {
                tracing::warn!(error = %e, "Closing the queue pool failed");
                first_error.get_or_insert(e);
            }
            first_error.map_or(Ok(()), Err)
        });
        drop(runtime);

        tracing::info!(joined, "Connection disposed");
        result
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(runtime) = runtime else {
            return;
        };
        if Handle::try_current().is_ok() {
            tracing::warn!("Connection dropped inside an async runtime; sessions closed without goodbye");
            runtime.shutdown_background();
            return;
        }
        if let Err(e) = self.close(runtime) {
            tracing::warn!(error = %e, "Dispose on drop failed");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .field("disposed", &self.is_disposed())
            .field("queued", &self.queued())
            .finish_non_exhaustive()
    }
}

fn first_set(sets: Vec<ResultSet>) -> ResultSet {
    sets.into_iter().next().unwrap_or_default()
}

//! The private runtime each connection drives its driver on.

use std::sync::{Mutex, MutexGuard, PoisonError};

use syncmysql_core::{Error, Result};
use tokio::runtime::{Builder, Handle, Runtime};

pub(crate) const WORKER_THREAD_NAME: &str = "syncmysql-worker";

pub(crate) fn build(worker_threads: usize) -> Result<Runtime> {
    let runtime = Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .thread_name(WORKER_THREAD_NAME)
        .enable_all()
        .build()?;
    Ok(runtime)
}

/// Blocking from inside a tokio runtime would stall (or panic) the
/// executor, so the blocking entry points refuse to.
pub(crate) fn ensure_blocking_allowed() -> Result<()> {
    if Handle::try_current().is_ok() {
        return Err(Error::config(
            "blocking syncmysql call made from inside an async runtime; \
             use spawn_blocking or a plain thread",
        ));
    }
    Ok(())
}

/// Lock, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_is_refused_inside_a_runtime() {
        assert!(ensure_blocking_allowed().is_ok());

        let rt = build(1).unwrap();
        let inside = rt.block_on(async { ensure_blocking_allowed() });
        assert!(matches!(inside, Err(Error::Config(_))));
    }

    #[test]
    fn workers_are_named() {
        let rt = build(1).unwrap();
        let name = rt
            .block_on(async {
                tokio::spawn(async { std::thread::current().name().map(str::to_string) }).await
            })
            .unwrap();
        assert_eq!(name.as_deref(), Some(WORKER_THREAD_NAME));
    }
}

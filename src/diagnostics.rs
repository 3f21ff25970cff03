//! Quiet scopes for engine calls.
//!
//! Engine calls run inside [`quietly`]. While the wrapped future is being
//! polled, [`allows`] rejects everything below ERROR, so the log layer that
//! carries it drops engine warnings. The flag is task-local: other tasks
//! never see it, and it is gone once the future completes, errors or
//! panics.

use std::future::Future;
use tracing::{Level, Metadata};

tokio::task_local! {
    static QUIET: bool;
}

/// Run `fut` with diagnostics suppressed.
pub async fn quietly<F>(fut: F) -> F::Output
where
    F: Future,
{
    QUIET.scope(true, fut).await
}

/// Whether the current task is inside a quiet scope.
pub fn is_quiet() -> bool {
    QUIET.try_with(|quiet| *quiet).unwrap_or(false)
}

/// Log filter predicate: inside a quiet scope only errors get through.
pub fn allows(metadata: &Metadata<'_>) -> bool {
    !(is_quiet() && *metadata.level() > Level::ERROR)
}

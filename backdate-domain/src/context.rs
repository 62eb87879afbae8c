//! Request-scoped "current version".
//!
//! Stored in tokio task-local storage: each request runs its future inside
//! [`scope`], so concurrent requests never observe each other's version.

use crate::resolve::ResolvedVersion;
use std::future::Future;

tokio::task_local! {
    static CURRENT_VERSION: ResolvedVersion;
}

/// Run `future` with `version` as the current version.
pub async fn scope<F>(version: ResolvedVersion, future: F) -> F::Output
where
    F: Future,
{
    CURRENT_VERSION.scope(version, future).await
}

/// Synchronous variant of [`scope`].
pub fn sync_scope<R>(version: ResolvedVersion, f: impl FnOnce() -> R) -> R {
    CURRENT_VERSION.sync_scope(version, f)
}

/// The version of the request being handled, or `None` outside any scope.
pub fn current_version() -> Option<ResolvedVersion> {
    CURRENT_VERSION.try_with(Clone::clone).ok()
}

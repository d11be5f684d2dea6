//! Per-call credential scoping.
//!
//! Every dispatched call runs inside a task-local scope that binds the
//! caller's bearer token. The binding lives exactly as long as the scoped
//! future: it is released when the future returns, fails, panics, or is
//! dropped by a cancelled transport. Nothing is stored in process-wide state,
//! so two calls interleaved on the same worker thread never see each other's
//! token.
//!
//! Task-locals are not inherited by `tokio::spawn`. Code that fans work out to
//! new tasks must re-bind explicitly with [`with_credential`], passing
//! [`current`] from the parent.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT: Credential;
}

/// Opaque bearer credential supplied by a caller. May be empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: Arc<str>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::from(token.into()),
        }
    }

    /// The unprivileged identity used when a caller sent no usable credential.
    pub fn empty() -> Self {
        Self::new(String::new())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Credential(<empty>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

/// Runs `future` with `credential` bound as the current credential.
pub async fn with_credential<F>(credential: Credential, future: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(credential, future).await
}

/// Returns the credential bound to the calling task, or the empty credential
/// when no scope is active.
pub fn current() -> Credential {
    try_current().unwrap_or_default()
}

/// Returns the credential bound to the calling task, if any scope is active.
pub fn try_current() -> Option<Credential> {
    CURRENT.try_with(Credential::clone).ok()
}

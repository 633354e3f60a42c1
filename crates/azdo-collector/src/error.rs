//! Collector error types.

use azdo_client::ClientError;
use azdo_metrics::CommitError;
use thiserror::Error;

/// Errors that abort one collection cycle.
///
/// A failed cycle queues nothing, so the previously committed series of
/// that project stay published.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("{call} failed: {source}")]
    Fetch {
        call: &'static str,
        #[source]
        source: ClientError,
    },

    #[error("commit failed: {0}")]
    Commit(#[from] CommitError),
}

impl CollectError {
    pub(crate) fn fetch(call: &'static str) -> impl FnOnce(ClientError) -> Self {
        move |source| Self::Fetch { call, source }
    }
}

pub type CollectResult<T> = Result<T, CollectError>;

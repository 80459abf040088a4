use thiserror::Error;

/// Errors surfaced by a [`crate::ChainApi`] implementation (spec §7: the
/// `Transport`/`NotFound` error kinds live here; callers decide what is
/// locally recoverable).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("requested resource not found")]
    NotFound,
    #[error("subscription closed")]
    SubscriptionClosed,
    #[error("decode error: {0}")]
    Decode(String)
}

impl ProviderError {
    /// True for errors spec §7 classifies as locally recoverable by retrying
    /// on the next poll tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transport(_) | ProviderError::NotFound)
    }
}

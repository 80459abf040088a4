use ethkit_provider::ProviderError;
use thiserror::Error;

/// Error kinds for the Receipt Listener (spec §7).
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("listener already started")]
    AlreadyStarted,
    #[error("listener cancelled")]
    Cancelled,
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("no matching receipt found before the wait budget elapsed")]
    NotFound
}

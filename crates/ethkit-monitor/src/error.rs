use ethkit_provider::ProviderError;
use thiserror::Error;

/// Error kinds for the Chain Monitor (spec §7). Only `AlreadyStarted` and
/// `Cancelled` are ever returned from `Run`/`Stop`; transport and invariant
/// errors are logged and absorbed inside the poll loop per spec's
/// propagation policy.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor already started")]
    AlreadyStarted,
    #[error("monitor cancelled")]
    Cancelled,
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("chain invariant violated: {0}")]
    Invariant(String)
}

impl MonitorError {
    /// Transport/NotFound/transient-Invariant errors are locally recoverable
    /// (spec §7): log and let the next poll tick retry.
    pub fn is_transient(&self) -> bool {
        match self {
            MonitorError::Provider(e) => e.is_transient(),
            MonitorError::Invariant(_) => true,
            MonitorError::AlreadyStarted | MonitorError::Cancelled => false
        }
    }
}

use thiserror::Error;

/// Error taxonomy for recording and playback, with CLI exit codes
///
/// Step-local errors ([`ReplayError::is_step_local`]) are retried and then
/// skipped by the orchestrator. The rest end the run.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Element not found by any locator fallback (exit code 2)
    #[error("Element not found for {kind} action: {target}")]
    LocatorResolution { kind: String, target: String },

    /// Page agent never answered ready (exit code 5)
    #[error("Page agent initialization timeout: {0}")]
    AgentUnavailable(String),

    /// Action round-trip exceeded its deadline (exit code 5)
    #[error("Action execution timed out after {0} ms")]
    DispatchTimeout(u64),

    /// Page agent reported a failure while executing (exit code 1)
    #[error("Page agent error: {0}")]
    AgentError(String),

    /// A recorded tabCreate/tabFocus could not be carried out (exit code 4)
    #[error("Tab action failed: {0}")]
    TabAction(String),

    /// No destination tab could be created or updated (exit code 4)
    #[error("Cannot provision playback tab: {0}")]
    TabProvisioning(String),

    /// Persistence store unreachable or corrupt (exit code 6)
    #[error("Store access failed: {0}")]
    StoreAccess(String),

    /// A playback run ended early; carries the code of its cause
    #[error("{message}")]
    PlaybackAborted { message: String, code: i32 },

    /// Generic error (exit code 1)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReplayError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ReplayError::LocatorResolution { .. } => 2,
            ReplayError::TabAction(_) | ReplayError::TabProvisioning(_) => 4,
            ReplayError::AgentUnavailable(_) | ReplayError::DispatchTimeout(_) => 5,
            ReplayError::StoreAccess(_) => 6,
            ReplayError::PlaybackAborted { code, .. } => *code,
            ReplayError::AgentError(_) | ReplayError::Other(_) => 1,
        }
    }

    /// Failures contained to a single playback step
    pub fn is_step_local(&self) -> bool {
        matches!(
            self,
            ReplayError::LocatorResolution { .. }
                | ReplayError::AgentUnavailable(_)
                | ReplayError::DispatchTimeout(_)
                | ReplayError::AgentError(_)
                | ReplayError::TabAction(_)
        )
    }

    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        ReplayError::StoreAccess(err.to_string())
    }
}

/// Map an error that reached `main` onto an exit code
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ReplayError>()
        .map(ReplayError::exit_code)
        .unwrap_or(1)
}

use thiserror::Error;

/// Errors returned by station registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("station '{0}' not found")]
    NotFound(String),

    #[error("station '{0}' already exists")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The registry actor is gone or did not answer in time.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Transport failures on the event publish path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("publish channel closed")]
    Closed,
}

/// Failures of a control service call as seen by a station agent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("control service unavailable: {0}")]
    Unavailable(String),

    #[error("control service call timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<RegistryError> for ControlError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(id) => ControlError::NotFound(id),
            RegistryError::AlreadyExists(id) => ControlError::AlreadyExists(id),
            RegistryError::InvalidArgument(msg) => ControlError::InvalidArgument(msg),
            RegistryError::Unavailable(msg) => ControlError::Unavailable(msg),
        }
    }
}

/// Errors from station agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("a station cannot be its own neighbor")]
    SelfNeighbor,

    #[error("station '{0}' is not registered yet")]
    NotRegistered(String),

    #[error(transparent)]
    Control(#[from] ControlError),
}

use std::fmt;

/// Lifecycle of a station agent.
///
/// `Unregistered → Registered → Sampling → Stopped`. `Stopped` is reachable
/// from every state and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Unregistered,
    Registered,
    Sampling,
    Stopped,
}

impl AgentState {
    pub fn can_transition_to(self, next: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, next),
            (Unregistered, Registered) | (Registered, Sampling) | (Unregistered | Registered | Sampling, Stopped)
        )
    }

    /// Whether the control service knows this station.
    pub fn is_registered(self) -> bool {
        matches!(self, AgentState::Registered | AgentState::Sampling)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Unregistered => "unregistered",
            AgentState::Registered => "registered",
            AgentState::Sampling => "sampling",
            AgentState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

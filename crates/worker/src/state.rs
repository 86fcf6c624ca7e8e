//! Worker lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the cache manager.
///
/// `Parsed → Installing → Installed → Activating → Activated`, with
/// `Redundant` when install fails. Fetches are intercepted only once
/// `Activated`; in every other state they pass straight to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }

    /// Installed and waiting for activation.
    pub fn is_waiting(&self) -> bool {
        matches!(self, WorkerState::Installed)
    }

    /// States from which an install may (re)start.
    pub fn can_install(&self) -> bool {
        matches!(self, WorkerState::Parsed | WorkerState::Redundant)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_activated_intercepts() {
        let intercepting: Vec<_> = [
            WorkerState::Parsed,
            WorkerState::Installing,
            WorkerState::Installed,
            WorkerState::Activating,
            WorkerState::Activated,
            WorkerState::Redundant,
        ]
        .into_iter()
        .filter(WorkerState::can_intercept_fetch)
        .collect();
        assert_eq!(intercepting, vec![WorkerState::Activated]);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&WorkerState::Activated).unwrap(), r#""activated""#);
        assert_eq!(WorkerState::Installed.to_string(), "installed");
        assert!(WorkerState::Redundant.can_install());
    }
}

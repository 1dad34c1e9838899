use std::fmt;

use cloudshare_api::EnvironmentStatus;
use serde::{Deserialize, Serialize};

/// Canonical machine state handed to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineState {
    Running,
    Starting,
    Stopping,
    Paused,
    Error,
    Unknown,
}

impl MachineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Starting => "Starting",
            Self::Stopping => "Stopping",
            Self::Paused => "Paused",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapse a CloudShare environment status into a machine state.
///
/// Total: codes without a mapping, including ones added by the provider
/// later, come out as `Unknown`.
pub fn translate(status: EnvironmentStatus) -> MachineState {
    match status {
        EnvironmentStatus::Ready | EnvironmentStatus::Publishing => MachineState::Running,
        EnvironmentStatus::Preparing | EnvironmentStatus::AllocationScheduledNoRun => {
            MachineState::Starting
        }
        EnvironmentStatus::Stopping => MachineState::Stopping,
        EnvironmentStatus::Suspended => MachineState::Paused,
        EnvironmentStatus::CreationFailed => MachineState::Error,
        EnvironmentStatus::Deleted
        | EnvironmentStatus::Archived
        | EnvironmentStatus::InGrace
        | EnvironmentStatus::Other(_) => MachineState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_status_has_a_fixed_mapping() {
        let table = [
            (EnvironmentStatus::Ready, MachineState::Running),
            (EnvironmentStatus::Preparing, MachineState::Starting),
            (EnvironmentStatus::AllocationScheduledNoRun, MachineState::Starting),
            (EnvironmentStatus::Publishing, MachineState::Running),
            (EnvironmentStatus::Stopping, MachineState::Stopping),
            (EnvironmentStatus::Suspended, MachineState::Paused),
            (EnvironmentStatus::CreationFailed, MachineState::Error),
            (EnvironmentStatus::Deleted, MachineState::Unknown),
            (EnvironmentStatus::Archived, MachineState::Unknown),
            (EnvironmentStatus::InGrace, MachineState::Unknown),
        ];
        for (status, expected) in table {
            assert_eq!(translate(status), expected, "{status:?}");
        }
    }

    #[test]
    fn unrecognized_codes_degrade_to_unknown() {
        for code in [0, 11, 99, -1] {
            let status = EnvironmentStatus::from(code);
            assert_eq!(translate(status), MachineState::Unknown, "code {code}");
        }
    }
}

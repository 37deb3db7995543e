//! The closed set of task kinds this agent executes.

use std::fmt;

/// Task kinds understood by the dispatcher. Anything else on the wire is
/// answered with a failed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    DeployApp,
    ManageApp,
    SystemCommand,
    FileTransfer,
    ServiceManage,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::DeployApp,
        TaskKind::ManageApp,
        TaskKind::SystemCommand,
        TaskKind::FileTransfer,
        TaskKind::ServiceManage,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeployApp => "deploy_app",
            Self::ManageApp => "manage_app",
            Self::SystemCommand => "system_command",
            Self::FileTransfer => "file_transfer",
            Self::ServiceManage => "service_manage",
        }
    }

    /// Parse a wire kind. Matching is exact.
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == kind)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

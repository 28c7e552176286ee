//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data in the
//! corresponding `*_statuses` database table.

use serde::{Deserialize, Serialize};

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// A status ID that has no matching enum variant.
#[derive(Debug, thiserror::Error)]
#[error("Unknown status id: {0}")]
pub struct UnknownStatus(pub StatusId);

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl TryFrom<StatusId> for $name {
            type Error = UnknownStatus;

            fn try_from(value: StatusId) -> Result<Self, Self::Error> {
                match value {
                    $( v if v == $val => Ok($name::$variant), )+
                    other => Err(UnknownStatus(other)),
                }
            }
        }
    };
}

define_status_enum! {
    /// Localization job execution status.
    JobStatus {
        Pending = 1,
        Running = 2,
        Completed = 3,
        Failed = 4,
        Cancelled = 5,
    }
}

impl JobStatus {
    /// Lowercase name used in JSON payloads and the lookup table.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Completed, failed and cancelled jobs never change status again
    /// through the scheduler.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the manual override path may move a job from `self` to `to`.
    ///
    /// - Re-asserting the current status is allowed (progress/step edits).
    /// - Pending and running jobs may be forced into a terminal status.
    /// - Nothing may go back to pending, and `running` is only ever entered
    ///   through a worker assignment.
    pub fn can_override_to(self, to: JobStatus) -> bool {
        if self == to {
            return true;
        }
        !self.is_terminal() && to.is_terminal()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Identifier newtypes, all backed by ULIDs for chronological sorting.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::ParseError;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Create a new unique identifier.
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Parse an identifier from its string form.
            pub fn parse(s: &str) -> Result<Self, ParseError> {
                Ulid::from_string(s.trim())
                    .map(Self)
                    .map_err(|_| ParseError::new($kind, s))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

ulid_id!(
    /// Unique identifier for a job.
    JobId,
    "job id"
);
ulid_id!(
    /// Unique identifier for a worker agent.
    AgentId,
    "agent id"
);
ulid_id!(
    /// Unique identifier for an agent type.
    AgentTypeId,
    "agent type id"
);
ulid_id!(
    /// Unique identifier for a managed service.
    ServiceId,
    "service id"
);
ulid_id!(
    /// Unique identifier for a participant (provider and/or consumer).
    ParticipantId,
    "participant id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_display_output() {
        let id = JobId::new();
        assert_eq!(JobId::parse(&id.to_string()), Ok(id));
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = AgentId::parse("not-an-id").unwrap_err();
        assert_eq!(err.kind, "agent id");
        assert_eq!(err.value, "not-an-id");
    }
}

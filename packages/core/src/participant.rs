//! Participants: the organisations that provide agents and consume services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ParticipantId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantState {
    #[default]
    Enabled,
    Disabled,
}

str_enum!(ParticipantState, "participant state", {
    Enabled => "enabled",
    Disabled => "disabled",
});

/// An organisation on the platform. The same participant may act as a
/// provider (it operates agents) and as a consumer (it owns services).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub state: ParticipantState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

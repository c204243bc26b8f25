use serde::{Deserialize, Serialize};

use crate::value_objects::{ParticipantId, Position, Timestamp};

/// 每位参与者保留的最近位置条数上限。
pub const LOCATION_HISTORY_LIMIT: usize = 10;

/// 参与者移动轨迹中的一个采样点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub participant_id: ParticipantId,
    pub position: Position,
    pub recorded_at: Timestamp,
}

impl LocationSample {
    pub fn new(participant_id: ParticipantId, position: Position, recorded_at: Timestamp) -> Self {
        Self {
            participant_id,
            position,
            recorded_at,
        }
    }
}

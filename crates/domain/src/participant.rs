use serde::{Deserialize, Serialize};

use crate::value_objects::{ParticipantId, ParticipantName, Position, RoomId, Timestamp};

/// 房间参与者，显示名在所属房间内唯一。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub room_id: RoomId,
    pub name: ParticipantName,
    pub position: Position,
    pub joined_at: Timestamp,
}

impl Participant {
    pub fn new(
        id: ParticipantId,
        room_id: RoomId,
        name: ParticipantName,
        position: Position,
        joined_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            name,
            position,
            joined_at,
        }
    }

    pub fn move_to(&mut self, position: Position) {
        self.position = position;
    }
}

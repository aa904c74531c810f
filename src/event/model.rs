use serde::{Deserialize, Serialize};

use crate::message::model::MessageDto;
use crate::message::{self, Status};
use crate::room::model::Room;
use crate::{room, user};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    NewMessage {
        message: MessageDto,
    },
    MessageUpdate {
        message: MessageDto,
    },
    StatusUpdate {
        room_id: room::Id,
        message_ids: Vec<message::Id>,
        status: Status,
    },
    RoomAdded {
        room: Room,
    },
    RoomUpdated {
        room: Room,
    },
    RoomDeleted {
        room_id: room::Id,
    },
    MemberRemoved {
        room_id: room::Id,
        user_id: user::Id,
    },
    MembersAdded {
        room_id: room::Id,
        user_ids: Vec<user::Id>,
    },
}

/// Payload for the notification dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushRequest {
    pub recipient: user::Id,
    pub title: String,
    pub body: String,
    pub room_id: room::Id,
}

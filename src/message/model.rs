use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Kind, Status};
use crate::{message, room, user};

const PREVIEW_MAX_CHARS: usize = 50;
pub const REVOKED_LABEL: &str = "Message revoked";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: message::Id,
    pub room_id: room::Id,
    pub sender: user::Id,
    /// Only set in direct rooms.
    pub recipient: Option<user::Id>,
    pub content: String,
    pub file_name: Option<String>,
    pub kind: Kind,
    pub status: Status,
    pub revoked: bool,
    #[serde(default)]
    pub deleted_for: Vec<user::Id>,
    #[serde(default)]
    pub reactions: HashMap<user::Id, String>,
    pub created_at: i64,
}

impl Message {
    pub fn new(
        room_id: room::Id,
        sender: user::Id,
        recipient: Option<user::Id>,
        content: String,
        kind: Kind,
        file_name: Option<String>,
    ) -> Self {
        Self {
            id: message::Id::random(),
            room_id,
            sender,
            recipient,
            content,
            file_name,
            kind,
            status: Status::Sent,
            revoked: false,
            deleted_for: Vec::new(),
            reactions: HashMap::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Already seen at creation so it never counts as unread.
    pub fn system(room_id: &room::Id, content: String) -> Self {
        Self {
            status: Status::Seen,
            ..Self::new(
                room_id.clone(),
                user::Id::system(),
                None,
                content,
                Kind::System,
                None,
            )
        }
    }

    pub fn is_deleted_for(&self, user: &user::Id) -> bool {
        self.deleted_for.contains(user)
    }

    /// Room-list preview and push body. Revocation wins over the kind.
    pub fn preview(&self) -> String {
        if self.revoked {
            return REVOKED_LABEL.to_string();
        }

        match self.kind {
            Kind::Text | Kind::System => self.content.chars().take(PREVIEW_MAX_CHARS).collect(),
            Kind::Image => "📷 Image".to_string(),
            Kind::Video => "🎥 Video".to_string(),
            Kind::Audio => "🎤 Audio".to_string(),
            Kind::File => format!("📎 {}", self.file_name.as_deref().unwrap_or("File")),
        }
    }
}

/// Wire shape of a message. Revoked content is hidden here so no read path
/// can leak it; `deleted_for` never leaves the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: message::Id,
    pub room_id: room::Id,
    pub sender: user::Id,
    pub sender_name: Option<String>,
    pub recipient: Option<user::Id>,
    pub content: String,
    pub file_name: Option<String>,
    pub kind: Kind,
    pub status: Status,
    pub revoked: bool,
    pub reactions: HashMap<user::Id, String>,
    pub created_at: i64,
}

impl MessageDto {
    pub fn from_message(msg: &Message, sender_name: Option<String>) -> Self {
        Self {
            id: msg.id.clone(),
            room_id: msg.room_id.clone(),
            sender: msg.sender.clone(),
            sender_name,
            recipient: msg.recipient.clone(),
            content: if msg.revoked {
                REVOKED_LABEL.to_string()
            } else {
                msg.content.clone()
            },
            file_name: msg.file_name.clone(),
            kind: msg.kind,
            status: msg.status,
            revoked: msg.revoked,
            reactions: msg.reactions.clone(),
            created_at: msg.created_at,
        }
    }
}

/// Incoming send request.
#[derive(Clone, Debug, Deserialize)]
pub struct SendRequest {
    /// Client-side placeholder (`temp_` prefix); never persisted, the stored
    /// message always gets a server-assigned id.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub room_id: Option<room::Id>,
    #[serde(default)]
    pub recipient: Option<user::Id>,
    pub content: String,
    #[serde(default = "default_kind")]
    pub kind: Kind,
    #[serde(default)]
    pub file_name: Option<String>,
}

fn default_kind() -> Kind {
    Kind::Text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_message(content: &str) -> Message {
        Message::new(
            room::Id("a_b".into()),
            user::Id("a".into()),
            Some(user::Id("b".into())),
            content.into(),
            Kind::Text,
            None,
        )
    }

    #[test]
    fn text_preview_truncates_to_fifty_chars() {
        let long = "x".repeat(80);
        let msg = text_message(&long);

        assert_eq!(msg.preview(), "x".repeat(50));
        assert_eq!(text_message("hello").preview(), "hello");
    }

    #[test]
    fn media_previews_use_fixed_labels() {
        let mut msg = text_message("ignored");

        msg.kind = Kind::Image;
        assert_eq!(msg.preview(), "📷 Image");

        msg.kind = Kind::Video;
        assert_eq!(msg.preview(), "🎥 Video");

        msg.kind = Kind::Audio;
        assert_eq!(msg.preview(), "🎤 Audio");

        msg.kind = Kind::File;
        assert_eq!(msg.preview(), "📎 File");

        msg.file_name = Some("report.pdf".into());
        assert_eq!(msg.preview(), "📎 report.pdf");
    }

    #[test]
    fn revoked_preview_overrides_kind() {
        let mut msg = text_message("secret");
        msg.revoked = true;
        assert_eq!(msg.preview(), REVOKED_LABEL);

        msg.kind = Kind::Image;
        assert_eq!(msg.preview(), REVOKED_LABEL);
    }

    #[test]
    fn dto_hides_revoked_content() {
        let mut msg = text_message("secret");
        msg.revoked = true;

        let dto = MessageDto::from_message(&msg, None);
        assert_eq!(dto.content, REVOKED_LABEL);
        assert!(dto.revoked);

        // storage keeps the original content
        assert_eq!(msg.content, "secret");
    }

    #[test]
    fn system_messages_are_pre_seen() {
        let msg = Message::system(&room::Id("g".into()), "u joined".into());

        assert_eq!(msg.status, Status::Seen);
        assert_eq!(msg.kind, Kind::System);
        assert!(msg.sender.is_system());
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use log::error;

use super::model::PushRequest;
use super::{Event, Subject};
use crate::message::model::MessageDto;
use crate::message::{self, Kind, Status};
use crate::room::model::Room;
use crate::{room, user};

const UNKNOWN_SENDER: &str = "Someone";

#[async_trait]
pub trait EventPublisher {
    async fn publish(&self, subject: &Subject<'_>, event: &Event);
}

pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, subject: &Subject<'_>, event: &Event) {
        if let Err(e) = self.client.publish(subject, Bytes::from(event)).await {
            error!("failed to publish to {subject}: {e:?}");
        }
    }
}

#[async_trait]
pub trait PushClient {
    async fn send(&self, push: &PushRequest);
}

pub struct HttpPushClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPushClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PushClient for HttpPushClient {
    async fn send(&self, push: &PushRequest) {
        let res = self
            .http
            .post(format!("{}/notifications", self.base_url))
            .json(push)
            .send()
            .await
            .and_then(|res| res.error_for_status());

        if let Err(e) = res {
            error!("failed to dispatch push for {}: {e:?}", push.recipient);
        }
    }
}

/// Fan-out rules. Every method is fire-and-forget from the caller's point of
/// view: failures are logged by the publisher/push client and never bubble up.
#[async_trait]
pub trait EventService {
    async fn message_created(
        &self,
        room: &Room,
        message: &MessageDto,
        sender_name: Option<&str>,
        preview: &str,
    );

    /// Reaction changes: room-scoped only.
    async fn message_updated(&self, room: &Room, message: &MessageDto);

    /// Revocations: room-scoped plus every member's personal subject.
    async fn message_revoked(&self, room: &Room, message: &MessageDto);

    /// Only the original sender learns that their messages changed status.
    async fn statuses_updated(
        &self,
        sender: &user::Id,
        room_id: &room::Id,
        message_ids: &[message::Id],
        status: Status,
    );

    async fn room_created(&self, room: &Room);

    async fn room_updated(&self, room: &Room);

    /// `room` is the post-removal snapshot; the removed user is notified even
    /// though they are no longer a member.
    async fn member_removed(&self, room: &Room, removed: &user::Id, system: Option<&MessageDto>);

    /// `room` is the post-addition snapshot.
    async fn members_added(&self, room: &Room, added: &[user::Id], system: Option<&MessageDto>);

    /// Notifies the pre-deletion member set.
    async fn room_deleted(&self, room_id: &room::Id, members: &[user::Id]);
}

pub struct EventServiceImpl {
    publisher: super::Publisher,
    push: super::Push,
}

impl EventServiceImpl {
    pub fn new(publisher: super::Publisher, push: super::Push) -> Self {
        Self { publisher, push }
    }

    async fn publish_to_members(&self, members: &[user::Id], event: &Event) {
        for member in members {
            self.publisher.publish(&Subject::User(member), event).await;
        }
    }

    async fn push_to_recipients(
        &self,
        room: &Room,
        message: &MessageDto,
        sender_name: Option<&str>,
        preview: &str,
    ) {
        for member in &room.members {
            if *member == message.sender || room.muted_by.contains(member) {
                continue;
            }

            let push = PushRequest {
                recipient: member.clone(),
                title: sender_name.unwrap_or(UNKNOWN_SENDER).to_string(),
                body: preview.to_string(),
                room_id: room.id.clone(),
            };
            self.push.send(&push).await;
        }
    }
}

#[async_trait]
impl EventService for EventServiceImpl {
    async fn message_created(
        &self,
        room: &Room,
        message: &MessageDto,
        sender_name: Option<&str>,
        preview: &str,
    ) {
        let event = Event::NewMessage {
            message: message.clone(),
        };
        self.publish_to_members(&room.members, &event).await;

        if message.kind != Kind::System {
            self.push_to_recipients(room, message, sender_name, preview)
                .await;
        }
    }

    async fn message_updated(&self, room: &Room, message: &MessageDto) {
        let event = Event::MessageUpdate {
            message: message.clone(),
        };
        self.publisher.publish(&Subject::Room(&room.id), &event).await;
    }

    async fn message_revoked(&self, room: &Room, message: &MessageDto) {
        let event = Event::MessageUpdate {
            message: message.clone(),
        };
        self.publisher.publish(&Subject::Room(&room.id), &event).await;
        self.publish_to_members(&room.members, &event).await;
    }

    async fn statuses_updated(
        &self,
        sender: &user::Id,
        room_id: &room::Id,
        message_ids: &[message::Id],
        status: Status,
    ) {
        let event = Event::StatusUpdate {
            room_id: room_id.clone(),
            message_ids: message_ids.to_vec(),
            status,
        };
        self.publisher.publish(&Subject::User(sender), &event).await;
    }

    async fn room_created(&self, room: &Room) {
        let event = Event::RoomAdded { room: room.clone() };
        self.publish_to_members(&room.members, &event).await;
    }

    async fn room_updated(&self, room: &Room) {
        let event = Event::RoomUpdated { room: room.clone() };
        self.publish_to_members(&room.members, &event).await;
    }

    async fn member_removed(&self, room: &Room, removed: &user::Id, system: Option<&MessageDto>) {
        let event = Event::MemberRemoved {
            room_id: room.id.clone(),
            user_id: removed.clone(),
        };
        self.publish_to_members(&room.members, &event).await;
        self.publisher.publish(&Subject::User(removed), &event).await;

        if let Some(system) = system {
            let event = Event::NewMessage {
                message: system.clone(),
            };
            self.publish_to_members(&room.members, &event).await;
        }
    }

    async fn members_added(&self, room: &Room, added: &[user::Id], system: Option<&MessageDto>) {
        let event = Event::MembersAdded {
            room_id: room.id.clone(),
            user_ids: added.to_vec(),
        };
        self.publish_to_members(&room.members, &event).await;

        let event = Event::RoomAdded { room: room.clone() };
        self.publish_to_members(added, &event).await;

        if let Some(system) = system {
            let event = Event::NewMessage {
                message: system.clone(),
            };
            self.publish_to_members(&room.members, &event).await;
        }
    }

    async fn room_deleted(&self, room_id: &room::Id, members: &[user::Id]) {
        let event = Event::RoomDeleted {
            room_id: room_id.clone(),
        };
        self.publish_to_members(members, &event).await;
    }
}

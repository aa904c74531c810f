#![allow(dead_code)]

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use chat_service::event::model::PushRequest;
use chat_service::event::service::{EventPublisher, EventServiceImpl, PushClient};
use chat_service::event::{Event, Subject};
use chat_service::integration::cache;
use chat_service::message::model::Message;
use chat_service::message::repository::{MessageRepository, SenderFilter};
use chat_service::message::service::MessageServiceImpl;
use chat_service::message::{Kind, Status};
use chat_service::room::model::Room;
use chat_service::room::repository::RoomRepository;
use chat_service::room::service::RoomServiceImpl;
use chat_service::user::client::UserClient;
use chat_service::user::model::UserInfo;
use chat_service::{event, message, room, user};

pub fn ctx(id: &str) -> user::Context {
    user::Context {
        id: user::Id(id.into()),
        name: None,
    }
}

pub fn named_ctx(id: &str, name: &str) -> user::Context {
    user::Context {
        id: user::Id(id.into()),
        name: Some(name.into()),
    }
}

pub fn uid(id: &str) -> user::Id {
    user::Id(id.into())
}

/// Lets spawned fan-out tasks run to completion before assertions.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<room::Id, Room>>,
}

impl InMemoryRoomRepository {
    pub fn get(&self, id: &room::Id) -> Option<Room> {
        self.rooms.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn insert(&self, room: &Room) -> room::Result<()> {
        let mut rooms = self.rooms.lock().unwrap();
        if rooms.contains_key(&room.id) {
            return Err(room::Error::AlreadyExists);
        }
        rooms.insert(room.id.clone(), room.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &room::Id) -> room::Result<Option<Room>> {
        Ok(self.rooms.lock().unwrap().get(id).cloned())
    }

    async fn find_by_member(&self, user: &user::Id) -> room::Result<Vec<Room>> {
        let rooms = self.rooms.lock().unwrap();
        let mut found: Vec<Room> = rooms
            .values()
            .filter(|r| r.is_member(user))
            .cloned()
            .collect();

        found.sort_by_key(|r| {
            (
                r.last_message_at.is_none(),
                Reverse(r.last_message_at.unwrap_or(0)),
                r.id.0.clone(),
            )
        });
        Ok(found)
    }

    async fn update_membership(
        &self,
        id: &room::Id,
        members: &[user::Id],
        admins: &[user::Id],
    ) -> room::Result<()> {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(room) = rooms.get_mut(id) {
            room.members = members.to_vec();
            room.admins = admins.to_vec();
        }
        Ok(())
    }

    async fn set_muted(&self, id: &room::Id, user: &user::Id, muted: bool) -> room::Result<()> {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(room) = rooms.get_mut(id) {
            if muted {
                if !room.muted_by.contains(user) {
                    room.muted_by.push(user.clone());
                }
            } else {
                room.muted_by.retain(|u| u != user);
            }
        }
        Ok(())
    }

    async fn update_last_message(&self, id: &room::Id, preview: &str, at: i64) -> room::Result<()> {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(room) = rooms.get_mut(id)
            && room.last_message_at.is_none_or(|t| t <= at)
        {
            room.last_message = Some(preview.to_string());
            room.last_message_at = Some(at);
        }
        Ok(())
    }

    async fn delete(&self, id: &room::Id) -> room::Result<()> {
        self.rooms.lock().unwrap().remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    msgs: Mutex<Vec<Message>>,
}

impl InMemoryMessageRepository {
    pub fn get(&self, id: &message::Id) -> Option<Message> {
        self.msgs.lock().unwrap().iter().find(|m| &m.id == id).cloned()
    }

    pub fn all_in_room(&self, room_id: &room::Id) -> Vec<Message> {
        let mut msgs: Vec<Message> = self
            .msgs
            .lock()
            .unwrap()
            .iter()
            .filter(|m| &m.room_id == room_id)
            .cloned()
            .collect();
        msgs.sort_by_key(|m| (m.created_at, m.id.0.clone()));
        msgs
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn insert(&self, msg: &Message) -> message::Result<()> {
        self.msgs.lock().unwrap().push(msg.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &message::Id) -> message::Result<Option<Message>> {
        Ok(self.get(id))
    }

    async fn find_by_room(&self, room_id: &room::Id) -> message::Result<Vec<Message>> {
        Ok(self.all_in_room(room_id))
    }

    async fn find_media(
        &self,
        room_id: &room::Id,
        kinds: &[Kind],
    ) -> message::Result<Vec<Message>> {
        let mut msgs: Vec<Message> = self
            .msgs
            .lock()
            .unwrap()
            .iter()
            .filter(|m| &m.room_id == room_id && kinds.contains(&m.kind) && !m.revoked)
            .cloned()
            .collect();
        msgs.sort_by_key(|m| Reverse(m.created_at));
        msgs.truncate(100);
        Ok(msgs)
    }

    async fn search_text(&self, room_id: &room::Id, keyword: &str) -> message::Result<Vec<Message>> {
        let keyword = keyword.to_lowercase();
        let mut msgs: Vec<Message> = self
            .msgs
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                &m.room_id == room_id
                    && m.kind == Kind::Text
                    && !m.revoked
                    && m.content.to_lowercase().contains(&keyword)
            })
            .cloned()
            .collect();
        msgs.sort_by_key(|m| Reverse(m.created_at));
        msgs.truncate(50);
        Ok(msgs)
    }

    async fn find_window(
        &self,
        room_id: &room::Id,
        target: &Message,
        before: i64,
        after: i64,
    ) -> message::Result<Vec<Message>> {
        let all = self.all_in_room(room_id);

        let older: Vec<Message> = all
            .iter()
            .filter(|m| m.created_at < target.created_at)
            .cloned()
            .collect();
        let newer: Vec<Message> = all
            .iter()
            .filter(|m| m.created_at > target.created_at)
            .cloned()
            .collect();

        let skip = older.len().saturating_sub(before as usize);
        let mut window: Vec<Message> = older.into_iter().skip(skip).collect();
        window.push(target.clone());
        window.extend(newer.into_iter().take(after as usize));
        Ok(window)
    }

    async fn count_unread(&self, room: &Room, user: &user::Id) -> message::Result<u64> {
        let count = self
            .msgs
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.room_id == room.id
                    && m.sender != *user
                    && matches!(m.status, Status::Sent | Status::Delivered)
                    && (room.is_group || m.recipient.as_ref() == Some(user))
            })
            .count();
        Ok(count as u64)
    }

    async fn update_statuses(
        &self,
        room_id: &room::Id,
        filter: SenderFilter<'_>,
        target: Status,
    ) -> message::Result<Vec<Message>> {
        let mut msgs = self.msgs.lock().unwrap();
        let mut updated = Vec::new();

        for msg in msgs.iter_mut() {
            if &msg.room_id != room_id {
                continue;
            }
            let sender_matches = match filter {
                SenderFilter::From(sender) => &msg.sender == sender,
                SenderFilter::NotFrom(sender) => &msg.sender != sender,
            };
            if sender_matches && msg.status.can_transition_to(target) {
                msg.status = target;
                updated.push(msg.clone());
            }
        }

        updated.sort_by_key(|m| (m.created_at, m.id.0.clone()));
        Ok(updated)
    }

    async fn set_revoked(&self, id: &message::Id) -> message::Result<Option<Message>> {
        let mut msgs = self.msgs.lock().unwrap();
        for msg in msgs.iter_mut() {
            if &msg.id == id {
                msg.revoked = true;
                return Ok(Some(msg.clone()));
            }
        }
        Ok(None)
    }

    async fn add_deleted_for(&self, id: &message::Id, user: &user::Id) -> message::Result<()> {
        let mut msgs = self.msgs.lock().unwrap();
        for msg in msgs.iter_mut() {
            if &msg.id == id && !msg.deleted_for.contains(user) {
                msg.deleted_for.push(user.clone());
            }
        }
        Ok(())
    }

    async fn set_reactions(
        &self,
        id: &message::Id,
        reactions: &HashMap<user::Id, String>,
    ) -> message::Result<()> {
        let mut msgs = self.msgs.lock().unwrap();
        for msg in msgs.iter_mut() {
            if &msg.id == id {
                msg.reactions = reactions.clone();
            }
        }
        Ok(())
    }

    async fn delete_by_room(&self, room_id: &room::Id) -> message::Result<()> {
        self.msgs.lock().unwrap().retain(|m| &m.room_id != room_id);
        Ok(())
    }
}

/// Profile-service stub with recorded lookups.
#[derive(Default)]
pub struct MockUserClient {
    names: Mutex<HashMap<user::Id, String>>,
    calls: Mutex<Vec<user::Id>>,
}

impl MockUserClient {
    pub fn with_name(self, id: &str, name: &str) -> Self {
        self.names.lock().unwrap().insert(uid(id), name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<user::Id> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserClient for MockUserClient {
    async fn find(&self, id: &user::Id) -> user::Result<UserInfo> {
        self.calls.lock().unwrap().push(id.clone());

        match self.names.lock().unwrap().get(id) {
            Some(name) => Ok(UserInfo {
                id: id.clone(),
                name: name.clone(),
                picture: None,
            }),
            None => Err(user::Error::NotFound(id.clone())),
        }
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(String, Event)>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<(String, Event)> {
        self.events.lock().unwrap().clone()
    }

    /// Events published to `events.{user}`.
    pub fn for_user(&self, id: &str) -> Vec<Event> {
        let subject = format!("events.{id}");
        self.events()
            .into_iter()
            .filter(|(s, _)| s == &subject)
            .map(|(_, e)| e)
            .collect()
    }

    /// Events published to `room-events.{room}`.
    pub fn for_room(&self, id: &room::Id) -> Vec<Event> {
        let subject = format!("room-events.{id}");
        self.events()
            .into_iter()
            .filter(|(s, _)| s == &subject)
            .map(|(_, e)| e)
            .collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, subject: &Subject<'_>, event: &Event) {
        self.events
            .lock()
            .unwrap()
            .push((format!("{subject}"), event.clone()));
    }
}

#[derive(Default)]
pub struct RecordingPushClient {
    pushes: Mutex<Vec<PushRequest>>,
}

impl RecordingPushClient {
    pub fn pushes(&self) -> Vec<PushRequest> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<user::Id> {
        self.pushes().into_iter().map(|p| p.recipient).collect()
    }
}

#[async_trait]
impl PushClient for RecordingPushClient {
    async fn send(&self, push: &PushRequest) {
        self.pushes.lock().unwrap().push(push.clone());
    }
}

/// Full service graph over in-memory backends.
pub struct TestApp {
    pub room_repo: Arc<InMemoryRoomRepository>,
    pub message_repo: Arc<InMemoryMessageRepository>,
    pub users: Arc<MockUserClient>,
    pub publisher: Arc<RecordingPublisher>,
    pub push: Arc<RecordingPushClient>,
    pub rooms: room::Service,
    pub messages: message::Service,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_users(MockUserClient::default())
    }

    pub fn with_users(users: MockUserClient) -> Self {
        let room_repo = Arc::new(InMemoryRoomRepository::default());
        let message_repo = Arc::new(InMemoryMessageRepository::default());
        let users = Arc::new(users);
        let publisher = Arc::new(RecordingPublisher::default());
        let push = Arc::new(RecordingPushClient::default());

        let event_service: event::Service = Arc::new(EventServiceImpl::new(
            publisher.clone(),
            push.clone(),
        ));
        let rooms: room::Service = Arc::new(RoomServiceImpl::new(
            room_repo.clone(),
            message_repo.clone(),
            users.clone(),
            event_service.clone(),
            cache::Redis::disabled(),
        ));
        let messages: message::Service = Arc::new(MessageServiceImpl::new(
            message_repo.clone(),
            rooms.clone(),
            users.clone(),
            event_service,
        ));

        Self {
            room_repo,
            message_repo,
            users,
            publisher,
            push,
            rooms,
            messages,
        }
    }
}

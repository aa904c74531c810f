use std::collections::HashMap;

use async_trait::async_trait;
use log::error;

use super::model::{Message, MessageDto, SendRequest};
use super::repository::SenderFilter;
use super::{Kind, Status};
use crate::room::model::Room;
use crate::{event, message, room, user};

/// Shown for group senders whose profile cannot be resolved.
const FALLBACK_SENDER_NAME: &str = "Member";

const DEFAULT_WINDOW: i64 = 25;

const DEFAULT_MEDIA_KINDS: &[Kind] = &[Kind::Image, Kind::Video];

#[async_trait]
pub trait MessageService {
    async fn send(&self, ctx: &user::Context, req: SendRequest) -> super::Result<MessageDto>;

    /// `target` is either a room id or a counterpart user id; in the latter
    /// case the direct room is resolved without being created.
    async fn update_statuses(
        &self,
        ctx: &user::Context,
        target: &str,
        status: Status,
    ) -> super::Result<Vec<MessageDto>>;

    async fn history(&self, ctx: &user::Context, target: &str) -> super::Result<Vec<MessageDto>>;

    async fn media(
        &self,
        ctx: &user::Context,
        room_id: &room::Id,
        kinds: &[Kind],
    ) -> super::Result<Vec<MessageDto>>;

    async fn search(
        &self,
        ctx: &user::Context,
        room_id: &room::Id,
        keyword: &str,
    ) -> super::Result<Vec<MessageDto>>;

    async fn around(
        &self,
        ctx: &user::Context,
        room_id: &room::Id,
        target: &message::Id,
        before: Option<i64>,
        after: Option<i64>,
    ) -> super::Result<Vec<MessageDto>>;

    async fn unread(&self, ctx: &user::Context, room_id: &room::Id) -> super::Result<u64>;

    async fn revoke(&self, ctx: &user::Context, id: &message::Id) -> super::Result<MessageDto>;

    async fn delete_for_user(&self, ctx: &user::Context, id: &message::Id) -> super::Result<()>;

    async fn react(
        &self,
        ctx: &user::Context,
        id: &message::Id,
        value: &str,
    ) -> super::Result<MessageDto>;
}

#[derive(Clone)]
pub struct MessageServiceImpl {
    repo: message::Repository,
    room_service: room::Service,
    user_client: user::Client,
    event_service: event::Service,
}

impl MessageServiceImpl {
    pub fn new(
        repo: message::Repository,
        room_service: room::Service,
        user_client: user::Client,
        event_service: event::Service,
    ) -> Self {
        Self {
            repo,
            room_service,
            user_client,
            event_service,
        }
    }

    /// Resolves `raw` as a room id first, then as a direct-chat counterpart.
    /// `None` means the direct room simply does not exist yet.
    async fn resolve_target(
        &self,
        acting: &user::Id,
        raw: &str,
    ) -> super::Result<Option<(Room, Option<user::Id>)>> {
        match self
            .room_service
            .find_by_id(&room::Id(raw.to_string()))
            .await
        {
            Ok(room) => {
                if !room.is_member(acting) {
                    return Err(message::Error::NotMember);
                }
                let other = room.other_member(acting).cloned();
                Ok(Some((room, other)))
            }
            Err(room::Error::NotFound(_)) => {
                let other = user::Id(raw.to_string());
                let room = self
                    .room_service
                    .resolve_or_create(acting, &other, false)
                    .await?;
                Ok(room.map(|r| (r, Some(other))))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn member_room(&self, id: &room::Id, user: &user::Id) -> super::Result<Room> {
        let room = self.room_service.find_by_id(id).await?;
        if !room.is_member(user) {
            return Err(message::Error::NotMember);
        }
        Ok(room)
    }

    /// Drops messages deleted for the viewer and, in group rooms, attaches
    /// best-effort sender names.
    async fn to_dtos(&self, room: &Room, msgs: Vec<Message>, viewer: &user::Id) -> Vec<MessageDto> {
        let mut names: HashMap<user::Id, String> = HashMap::new();
        let mut dtos = Vec::with_capacity(msgs.len());

        for msg in msgs {
            if msg.is_deleted_for(viewer) {
                continue;
            }

            let sender_name = if room.is_group && !msg.sender.is_system() {
                let name = match names.get(&msg.sender) {
                    Some(name) => name.clone(),
                    None => {
                        let name = self
                            .user_client
                            .find_name_or(&msg.sender, FALLBACK_SENDER_NAME)
                            .await;
                        names.insert(msg.sender.clone(), name.clone());
                        name
                    }
                };
                Some(name)
            } else {
                None
            };

            dtos.push(MessageDto::from_message(&msg, sender_name));
        }
        dtos
    }
}

#[async_trait]
impl MessageService for MessageServiceImpl {
    async fn send(&self, ctx: &user::Context, req: SendRequest) -> super::Result<MessageDto> {
        let room = match &req.room_id {
            Some(id) => self.member_room(id, &ctx.id).await?,
            None => {
                let recipient = req
                    .recipient
                    .as_ref()
                    .ok_or(message::Error::MissingRecipient)?;
                self.room_service
                    .resolve_or_create(&ctx.id, recipient, true)
                    .await?
                    .ok_or(room::Error::NotFound(None))?
            }
        };

        // clients cannot author system messages
        let kind = if req.kind == Kind::System {
            Kind::Text
        } else {
            req.kind
        };

        let msg = Message::new(
            room.id.clone(),
            ctx.id.clone(),
            room.other_member(&ctx.id).cloned(),
            req.content,
            kind,
            req.file_name,
        );
        self.repo.insert(&msg).await?;

        let preview = msg.preview();
        self.room_service
            .update_last_message(&room.id, &preview, msg.created_at)
            .await;

        let dto = MessageDto::from_message(&msg, ctx.name.clone());

        let events = self.event_service.clone();
        let snapshot = room.clone();
        let event_dto = dto.clone();
        let sender_name = ctx.name.clone();
        tokio::spawn(async move {
            events
                .message_created(&snapshot, &event_dto, sender_name.as_deref(), &preview)
                .await
        });

        Ok(dto)
    }

    async fn update_statuses(
        &self,
        ctx: &user::Context,
        target: &str,
        status: Status,
    ) -> super::Result<Vec<MessageDto>> {
        let Some((room, other)) = self.resolve_target(&ctx.id, target).await? else {
            return Ok(Vec::new());
        };

        let filter = if room.is_group {
            SenderFilter::NotFrom(&ctx.id)
        } else {
            match &other {
                Some(other) => SenderFilter::From(other),
                None => return Ok(Vec::new()),
            }
        };

        let updated = self.repo.update_statuses(&room.id, filter, status).await?;
        if updated.is_empty() {
            return Ok(Vec::new());
        }

        // tell each affected sender that their messages moved forward
        let mut by_sender: HashMap<user::Id, Vec<message::Id>> = HashMap::new();
        for msg in &updated {
            by_sender
                .entry(msg.sender.clone())
                .or_default()
                .push(msg.id.clone());
        }

        let events = self.event_service.clone();
        let room_id = room.id.clone();
        tokio::spawn(async move {
            for (sender, ids) in by_sender {
                events
                    .statuses_updated(&sender, &room_id, &ids, status)
                    .await;
            }
        });

        Ok(updated
            .iter()
            .map(|m| MessageDto::from_message(m, None))
            .collect())
    }

    async fn history(&self, ctx: &user::Context, target: &str) -> super::Result<Vec<MessageDto>> {
        let Some((room, _)) = self.resolve_target(&ctx.id, target).await? else {
            return Ok(Vec::new());
        };

        let msgs = match self.repo.find_by_room(&room.id).await {
            Ok(msgs) => msgs,
            Err(e) => {
                error!("failed to load history for {}: {e:?}", room.id);
                return Ok(Vec::new());
            }
        };

        Ok(self.to_dtos(&room, msgs, &ctx.id).await)
    }

    async fn media(
        &self,
        ctx: &user::Context,
        room_id: &room::Id,
        kinds: &[Kind],
    ) -> super::Result<Vec<MessageDto>> {
        let room = self.member_room(room_id, &ctx.id).await?;

        let kinds = if kinds.is_empty() {
            DEFAULT_MEDIA_KINDS
        } else {
            kinds
        };

        let msgs = match self.repo.find_media(room_id, kinds).await {
            Ok(msgs) => msgs,
            Err(e) => {
                error!("failed to load media for {room_id}: {e:?}");
                return Ok(Vec::new());
            }
        };

        Ok(self.to_dtos(&room, msgs, &ctx.id).await)
    }

    async fn search(
        &self,
        ctx: &user::Context,
        room_id: &room::Id,
        keyword: &str,
    ) -> super::Result<Vec<MessageDto>> {
        let room = self.member_room(room_id, &ctx.id).await?;

        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(Vec::new());
        }

        let msgs = match self.repo.search_text(room_id, keyword).await {
            Ok(msgs) => msgs,
            Err(e) => {
                error!("search failed for {room_id}: {e:?}");
                return Ok(Vec::new());
            }
        };

        Ok(self.to_dtos(&room, msgs, &ctx.id).await)
    }

    async fn around(
        &self,
        ctx: &user::Context,
        room_id: &room::Id,
        target: &message::Id,
        before: Option<i64>,
        after: Option<i64>,
    ) -> super::Result<Vec<MessageDto>> {
        let room = self.member_room(room_id, &ctx.id).await?;

        let anchor = self
            .repo
            .find_by_id(target)
            .await?
            .filter(|m| m.room_id == room.id)
            .ok_or(message::Error::NotFound(Some(target.clone())))?;

        let window = self
            .repo
            .find_window(
                room_id,
                &anchor,
                before.unwrap_or(DEFAULT_WINDOW),
                after.unwrap_or(DEFAULT_WINDOW),
            )
            .await?;

        Ok(self.to_dtos(&room, window, &ctx.id).await)
    }

    async fn unread(&self, ctx: &user::Context, room_id: &room::Id) -> super::Result<u64> {
        let room = self.member_room(room_id, &ctx.id).await?;

        match self.repo.count_unread(&room, &ctx.id).await {
            Ok(count) => Ok(count),
            Err(e) => {
                error!("failed to count unread for {room_id}: {e:?}");
                Ok(0)
            }
        }
    }

    async fn revoke(&self, _ctx: &user::Context, id: &message::Id) -> super::Result<MessageDto> {
        let msg = self
            .repo
            .set_revoked(id)
            .await?
            .ok_or(message::Error::NotFound(Some(id.clone())))?;

        let room = self.room_service.find_by_id(&msg.room_id).await?;

        // the guard lets this through only while the message is still newest
        self.room_service
            .update_last_message(&room.id, &msg.preview(), msg.created_at)
            .await;

        let dto = MessageDto::from_message(&msg, None);

        let events = self.event_service.clone();
        let snapshot = room.clone();
        let event_dto = dto.clone();
        tokio::spawn(async move { events.message_revoked(&snapshot, &event_dto).await });

        Ok(dto)
    }

    async fn delete_for_user(&self, ctx: &user::Context, id: &message::Id) -> super::Result<()> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(message::Error::NotFound(Some(id.clone())))?;

        self.repo.add_deleted_for(id, &ctx.id).await
    }

    async fn react(
        &self,
        ctx: &user::Context,
        id: &message::Id,
        value: &str,
    ) -> super::Result<MessageDto> {
        let mut msg = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(message::Error::NotFound(Some(id.clone())))?;

        let room = self.member_room(&msg.room_id, &ctx.id).await?;

        // toggle off on repeat, replace otherwise
        match msg.reactions.get(&ctx.id) {
            Some(current) if current == value => {
                msg.reactions.remove(&ctx.id);
            }
            _ => {
                msg.reactions.insert(ctx.id.clone(), value.to_string());
            }
        }
        self.repo.set_reactions(id, &msg.reactions).await?;

        let dto = MessageDto::from_message(&msg, None);

        let events = self.event_service.clone();
        let snapshot = room.clone();
        let event_dto = dto.clone();
        tokio::spawn(async move { events.message_updated(&snapshot, &event_dto).await });

        Ok(dto)
    }
}

use async_trait::async_trait;
use log::error;

use super::model::{MemberInfo, Role, RoleAction, Room, RoomDto};
use crate::integration::cache;
use crate::message::model::{Message, MessageDto};
use crate::{event, message, room, user};

#[async_trait]
pub trait RoomService {
    /// Direct-room resolution. The id is derived from the sorted member pair,
    /// so concurrent callers converge on one record: a losing insert turns
    /// into a re-fetch.
    async fn resolve_or_create(
        &self,
        a: &user::Id,
        b: &user::Id,
        create_if_missing: bool,
    ) -> super::Result<Option<Room>>;

    async fn create_group(
        &self,
        ctx: &user::Context,
        name: &str,
        members: &[user::Id],
    ) -> super::Result<Room>;

    async fn find_by_id(&self, id: &room::Id) -> super::Result<Room>;

    async fn find_one(&self, id: &room::Id, viewer: &user::Id) -> super::Result<RoomDto>;

    /// Viewer's room list with fresh unread counts. Degrades to an empty
    /// list when the store is unavailable.
    async fn find_all(&self, user: &user::Id) -> Vec<RoomDto>;

    async fn members(&self, id: &room::Id) -> super::Result<Vec<user::Id>>;

    async fn members_with_info(&self, id: &room::Id) -> super::Result<Vec<MemberInfo>>;

    async fn is_muted(&self, id: &room::Id, user: &user::Id) -> super::Result<bool>;

    async fn toggle_mute(&self, id: &room::Id, user: &user::Id) -> super::Result<bool>;

    async fn change_role(
        &self,
        id: &room::Id,
        ctx: &user::Context,
        target: &user::Id,
        action: RoleAction,
    ) -> super::Result<Room>;

    async fn kick(&self, id: &room::Id, ctx: &user::Context, target: &user::Id)
        -> super::Result<Room>;

    async fn leave(&self, id: &room::Id, ctx: &user::Context) -> super::Result<Room>;

    async fn delete_group(&self, id: &room::Id, ctx: &user::Context) -> super::Result<()>;

    async fn add_members(
        &self,
        id: &room::Id,
        ctx: &user::Context,
        new_members: &[user::Id],
    ) -> super::Result<Room>;

    /// Preview write-through; the repository guard keeps it monotonic.
    async fn update_last_message(&self, id: &room::Id, preview: &str, at: i64);
}

#[derive(Clone)]
pub struct RoomServiceImpl {
    repo: room::Repository,
    message_repo: message::Repository,
    user_client: user::Client,
    event_service: event::Service,
    redis: cache::Redis,
}

impl RoomServiceImpl {
    pub fn new(
        repo: room::Repository,
        message_repo: message::Repository,
        user_client: user::Client,
        event_service: event::Service,
        redis: cache::Redis,
    ) -> Self {
        Self {
            repo,
            message_repo,
            user_client,
            event_service,
            redis,
        }
    }

    async fn unread_count(&self, room: &Room, user: &user::Id) -> u64 {
        match self.message_repo.count_unread(room, user).await {
            Ok(count) => count,
            Err(e) => {
                error!("failed to count unread for {}: {e:?}", room.id);
                0
            }
        }
    }

    async fn find_group(&self, id: &room::Id) -> super::Result<Room> {
        let room = self.find_by_id(id).await?;
        if !room.is_group {
            return Err(room::Error::NotGroup);
        }
        Ok(room)
    }

    async fn invalidate_members(&self, id: &room::Id) {
        self.redis.del(cache::Key::RoomMembers(id.clone())).await;
    }

    /// System messages are attributed to the reserved sender and created
    /// already seen, so they never count as unread.
    async fn write_system_message(&self, room: &Room, content: String) -> super::Result<Message> {
        let msg = Message::system(&room.id, content);
        self.message_repo.insert(&msg).await?;
        self.update_last_message(&room.id, &msg.preview(), msg.created_at)
            .await;
        Ok(msg)
    }
}

#[async_trait]
impl RoomService for RoomServiceImpl {
    async fn resolve_or_create(
        &self,
        a: &user::Id,
        b: &user::Id,
        create_if_missing: bool,
    ) -> super::Result<Option<Room>> {
        let id = room::Id::direct(a, b);

        if let Some(room) = self.repo.find_by_id(&id).await? {
            return Ok(Some(room));
        }

        if !create_if_missing {
            return Ok(None);
        }

        let room = Room::direct(a, b);
        match self.repo.insert(&room).await {
            Ok(()) => Ok(Some(room)),
            Err(room::Error::AlreadyExists) => Ok(self.repo.find_by_id(&id).await?),
            Err(e) => Err(e),
        }
    }

    async fn create_group(
        &self,
        ctx: &user::Context,
        name: &str,
        members: &[user::Id],
    ) -> super::Result<Room> {
        if members.is_empty() {
            return Err(room::Error::NoMembers);
        }

        let room = Room::group(&ctx.id, name, members);
        self.repo.insert(&room).await?;

        let events = self.event_service.clone();
        let snapshot = room.clone();
        tokio::spawn(async move { events.room_created(&snapshot).await });

        Ok(room)
    }

    async fn find_by_id(&self, id: &room::Id) -> super::Result<Room> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(room::Error::NotFound(Some(id.clone())))
    }

    async fn find_one(&self, id: &room::Id, viewer: &user::Id) -> super::Result<RoomDto> {
        let room = self.find_by_id(id).await?;
        if !room.is_member(viewer) {
            return Err(room::Error::NotMember);
        }

        let unread = self.unread_count(&room, viewer).await;
        Ok(RoomDto::from_room(&room, viewer, unread))
    }

    async fn find_all(&self, user: &user::Id) -> Vec<RoomDto> {
        let rooms = match self.repo.find_by_member(user).await {
            Ok(rooms) => rooms,
            Err(e) => {
                error!("failed to list rooms for {user}: {e:?}");
                return Vec::new();
            }
        };

        let mut dtos = Vec::with_capacity(rooms.len());
        for room in &rooms {
            let unread = self.unread_count(room, user).await;
            dtos.push(RoomDto::from_room(room, user, unread));
        }
        dtos
    }

    async fn members(&self, id: &room::Id) -> super::Result<Vec<user::Id>> {
        let key = cache::Key::RoomMembers(id.clone());

        if let Some(cached) = self.redis.smembers(key.clone()).await
            && !cached.is_empty()
        {
            return Ok(cached.into_iter().map(user::Id).collect());
        }

        let room = self.find_by_id(id).await?;
        let raw: Vec<String> = room.members.iter().map(|m| m.0.clone()).collect();
        self.redis.sadd_all(key, &raw).await;

        Ok(room.members)
    }

    async fn members_with_info(&self, id: &room::Id) -> super::Result<Vec<MemberInfo>> {
        let room = self.find_group(id).await?;
        let members = self.members(id).await?;

        let mut infos = Vec::with_capacity(members.len());
        for member in &members {
            let name = self
                .user_client
                .find_name_or(member, &member.placeholder_name())
                .await;

            infos.push(MemberInfo {
                id: member.clone(),
                name,
                role: room.role_of(member),
            });
        }
        Ok(infos)
    }

    async fn is_muted(&self, id: &room::Id, user: &user::Id) -> super::Result<bool> {
        let room = self.find_by_id(id).await?;
        if !room.is_member(user) {
            return Err(room::Error::NotMember);
        }
        Ok(room.muted_by.contains(user))
    }

    async fn toggle_mute(&self, id: &room::Id, user: &user::Id) -> super::Result<bool> {
        let muted = self.is_muted(id, user).await?;
        self.repo.set_muted(id, user, !muted).await?;
        Ok(!muted)
    }

    async fn change_role(
        &self,
        id: &room::Id,
        ctx: &user::Context,
        target: &user::Id,
        action: RoleAction,
    ) -> super::Result<Room> {
        let mut room = self.find_group(id).await?;

        if room.role_of(&ctx.id) != Role::Owner {
            return Err(room::Error::Forbidden);
        }
        if !room.is_member(target) {
            return Err(room::Error::NotMember);
        }
        if room.owner.as_ref() == Some(target) {
            return Err(room::Error::OwnerImmutable);
        }

        match action {
            RoleAction::Promote => {
                if !room.admins.contains(target) {
                    room.admins.push(target.clone());
                }
            }
            RoleAction::Demote => room.admins.retain(|a| a != target),
        }

        self.repo
            .update_membership(id, &room.members, &room.admins)
            .await?;

        let events = self.event_service.clone();
        let snapshot = room.clone();
        tokio::spawn(async move { events.room_updated(&snapshot).await });

        Ok(room)
    }

    async fn kick(
        &self,
        id: &room::Id,
        ctx: &user::Context,
        target: &user::Id,
    ) -> super::Result<Room> {
        let mut room = self.find_group(id).await?;

        if !room.is_member(&ctx.id) || !room.is_member(target) {
            return Err(room::Error::NotMember);
        }
        if !room.role_of(&ctx.id).can_kick(room.role_of(target)) {
            return Err(room::Error::Forbidden);
        }

        // written before the removal so the target still counts as a member
        let name = self
            .user_client
            .find_name_or(target, &target.placeholder_name())
            .await;
        let system = self
            .write_system_message(&room, format!("{name} was removed from the group"))
            .await?;

        room.members.retain(|m| m != target);
        room.admins.retain(|m| m != target);
        self.repo
            .update_membership(id, &room.members, &room.admins)
            .await?;
        self.invalidate_members(id).await;

        let events = self.event_service.clone();
        let snapshot = room.clone();
        let removed = target.clone();
        let system_dto = MessageDto::from_message(&system, None);
        tokio::spawn(async move {
            events
                .member_removed(&snapshot, &removed, Some(&system_dto))
                .await
        });

        Ok(room)
    }

    async fn leave(&self, id: &room::Id, ctx: &user::Context) -> super::Result<Room> {
        let mut room = self.find_group(id).await?;

        if !room.is_member(&ctx.id) {
            return Err(room::Error::NotMember);
        }
        if room.role_of(&ctx.id) == Role::Owner {
            return Err(room::Error::OwnerCannotLeave);
        }

        room.members.retain(|m| m != &ctx.id);
        room.admins.retain(|m| m != &ctx.id);
        self.repo
            .update_membership(id, &room.members, &room.admins)
            .await?;
        self.invalidate_members(id).await;

        let events = self.event_service.clone();
        let snapshot = room.clone();
        let left = ctx.id.clone();
        tokio::spawn(async move { events.member_removed(&snapshot, &left, None).await });

        Ok(room)
    }

    async fn delete_group(&self, id: &room::Id, ctx: &user::Context) -> super::Result<()> {
        let room = self.find_group(id).await?;

        if room.role_of(&ctx.id) != Role::Owner {
            return Err(room::Error::Forbidden);
        }

        self.message_repo.delete_by_room(id).await?;
        self.repo.delete(id).await?;
        self.invalidate_members(id).await;

        let events = self.event_service.clone();
        let room_id = id.clone();
        let members = room.members;
        tokio::spawn(async move { events.room_deleted(&room_id, &members).await });

        Ok(())
    }

    async fn add_members(
        &self,
        id: &room::Id,
        ctx: &user::Context,
        new_members: &[user::Id],
    ) -> super::Result<Room> {
        let mut room = self.find_group(id).await?;

        if !room.is_member(&ctx.id) {
            return Err(room::Error::NotMember);
        }
        if !room.role_of(&ctx.id).can_manage_members() {
            return Err(room::Error::Forbidden);
        }

        let mut added: Vec<user::Id> = Vec::new();
        for m in new_members {
            if !room.is_member(m) && !added.contains(m) {
                added.push(m.clone());
            }
        }
        if added.is_empty() {
            return Err(room::Error::NoMembers);
        }

        let actor = match &ctx.name {
            Some(name) => name.clone(),
            None => ctx.id.placeholder_name(),
        };
        let mut names = Vec::with_capacity(added.len());
        for m in &added {
            names.push(
                self.user_client
                    .find_name_or(m, &m.placeholder_name())
                    .await,
            );
        }
        let system = self
            .write_system_message(&room, format!("{actor} added {}", names.join(", ")))
            .await?;

        room.members.extend(added.iter().cloned());
        self.repo
            .update_membership(id, &room.members, &room.admins)
            .await?;
        self.invalidate_members(id).await;

        let events = self.event_service.clone();
        let snapshot = room.clone();
        let added_snapshot = added.clone();
        let system_dto = MessageDto::from_message(&system, None);
        tokio::spawn(async move {
            events
                .members_added(&snapshot, &added_snapshot, Some(&system_dto))
                .await
        });

        Ok(room)
    }

    async fn update_last_message(&self, id: &room::Id, preview: &str, at: i64) {
        if let Err(e) = self.repo.update_last_message(id, preview, at).await {
            error!("failed to update preview for {id}: {e:?}");
        }
    }
}

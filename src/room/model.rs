use serde::{Deserialize, Serialize};

use crate::{room, user};

/// One record per conversation, direct or group. The preview pair
/// (`last_message`, `last_message_at`) is denormalised and only ever moves
/// forward in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "_id")]
    pub id: room::Id,
    pub is_group: bool,
    pub members: Vec<user::Id>,
    pub owner: Option<user::Id>,
    #[serde(default)]
    pub admins: Vec<user::Id>,
    pub name: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<i64>,
    #[serde(default)]
    pub muted_by: Vec<user::Id>,
}

impl Room {
    pub fn direct(a: &user::Id, b: &user::Id) -> Self {
        Self {
            id: room::Id::direct(a, b),
            is_group: false,
            members: vec![a.clone(), b.clone()],
            owner: None,
            admins: Vec::new(),
            name: None,
            last_message: None,
            last_message_at: None,
            muted_by: Vec::new(),
        }
    }

    pub fn group(owner: &user::Id, name: &str, members: &[user::Id]) -> Self {
        let mut all = vec![owner.clone()];
        for m in members {
            if !all.contains(m) {
                all.push(m.clone());
            }
        }

        Self {
            id: room::Id::group(),
            is_group: true,
            members: all,
            owner: Some(owner.clone()),
            admins: Vec::new(),
            name: Some(name.to_string()),
            last_message: None,
            last_message_at: None,
            muted_by: Vec::new(),
        }
    }

    pub fn is_member(&self, user: &user::Id) -> bool {
        self.members.contains(user)
    }

    /// Roles are derived from the membership snapshot, never stored.
    pub fn role_of(&self, user: &user::Id) -> Role {
        if self.owner.as_ref() == Some(user) {
            Role::Owner
        } else if self.admins.contains(user) {
            Role::Admin
        } else {
            Role::Member
        }
    }

    /// The counterpart in a direct room.
    pub fn other_member(&self, user: &user::Id) -> Option<&user::Id> {
        if self.is_group {
            return None;
        }
        self.members.iter().find(|m| *m != user)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    /// Owners remove admins and members, admins remove members only. The
    /// owner can never be removed.
    pub fn can_kick(self, target: Role) -> bool {
        match self {
            Role::Owner => target != Role::Owner,
            Role::Admin => target == Role::Member,
            Role::Member => false,
        }
    }

    pub fn can_manage_members(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoleAction {
    Promote,
    Demote,
}

/// Room as seen by one user: unread count and mute flag are viewer-specific.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomDto {
    pub id: room::Id,
    pub is_group: bool,
    pub name: Option<String>,
    pub members: Vec<user::Id>,
    pub owner: Option<user::Id>,
    pub admins: Vec<user::Id>,
    pub last_message: Option<String>,
    pub last_message_at: Option<i64>,
    pub unread_count: u64,
    pub muted: bool,
}

impl RoomDto {
    pub fn from_room(room: &Room, viewer: &user::Id, unread_count: u64) -> Self {
        Self {
            id: room.id.clone(),
            is_group: room.is_group,
            name: room.name.clone(),
            members: room.members.clone(),
            owner: room.owner.clone(),
            admins: room.admins.clone(),
            last_message: room.last_message.clone(),
            last_message_at: room.last_message_at,
            unread_count,
            muted: room.muted_by.contains(viewer),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemberInfo {
    pub id: user::Id,
    pub name: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_room() -> Room {
        let owner = user::Id("owner".into());
        let mut room = Room::group(
            &owner,
            "team",
            &[user::Id("admin".into()), user::Id("member".into())],
        );
        room.admins.push(user::Id("admin".into()));
        room
    }

    #[test]
    fn group_includes_owner_once() {
        let owner = user::Id("owner".into());
        let room = Room::group(&owner, "team", &[owner.clone(), user::Id("b".into())]);

        assert_eq!(room.members.len(), 2);
        assert_eq!(room.owner, Some(owner));
    }

    #[test]
    fn roles_derive_from_snapshot() {
        let room = group_room();

        assert_eq!(room.role_of(&user::Id("owner".into())), Role::Owner);
        assert_eq!(room.role_of(&user::Id("admin".into())), Role::Admin);
        assert_eq!(room.role_of(&user::Id("member".into())), Role::Member);
        assert_eq!(room.role_of(&user::Id("stranger".into())), Role::Member);
    }

    #[test]
    fn kick_matrix() {
        assert!(Role::Owner.can_kick(Role::Admin));
        assert!(Role::Owner.can_kick(Role::Member));
        assert!(!Role::Owner.can_kick(Role::Owner));

        assert!(Role::Admin.can_kick(Role::Member));
        assert!(!Role::Admin.can_kick(Role::Admin));
        assert!(!Role::Admin.can_kick(Role::Owner));

        assert!(!Role::Member.can_kick(Role::Member));
    }

    #[test]
    fn other_member_only_for_direct_rooms() {
        let a = user::Id("a".into());
        let b = user::Id("b".into());
        let direct = Room::direct(&a, &b);

        assert_eq!(direct.other_member(&a), Some(&b));
        assert_eq!(group_room().other_member(&a), None);
    }
}

use std::fmt::Display;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, put};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::user;

pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub type Repository = Arc<dyn repository::RoomRepository + Send + Sync>;
pub type Service = Arc<dyn service::RoomService + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

pub fn api<S>(state: AppState) -> Router<S> {
    Router::new()
        .route(
            "/rooms",
            get(handler::api::find_all).post(handler::api::create_group),
        )
        .route(
            "/rooms/{id}",
            get(handler::api::find_one).delete(handler::api::delete),
        )
        .route("/rooms/{id}/members", get(handler::api::members))
        .route(
            "/rooms/{id}/mute",
            get(handler::api::is_muted).put(handler::api::toggle_mute),
        )
        .route("/rooms/{id}/role", put(handler::api::change_role))
        .route("/rooms/{id}/kick", put(handler::api::kick))
        .route("/rooms/{id}/leave", put(handler::api::leave))
        .route("/rooms/{id}/add", put(handler::api::add_members))
        .with_state(state)
}

/// Conversation id. Direct rooms derive it from the sorted member pair, so
/// both participants always resolve to the same record; groups get an opaque
/// UUID.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Id(pub String);

impl Id {
    pub fn direct(a: &user::Id, b: &user::Id) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{first}_{second}"))
    }

    pub fn group() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Id, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Id(s))
    }
}

impl From<&Id> for mongodb::bson::Bson {
    fn from(id: &Id) -> Self {
        mongodb::bson::Bson::String(id.0.clone())
    }
}

#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    #[error("room not found: {0:?}")]
    NotFound(Option<Id>),
    #[error("room already exists")]
    AlreadyExists,
    #[error("not a group room")]
    NotGroup,
    #[error("not a member")]
    NotMember,
    #[error("operation requires a higher role")]
    Forbidden,
    #[error("owner cannot leave the group")]
    OwnerCannotLeave,
    #[error("owner role cannot be changed")]
    OwnerImmutable,
    #[error("no members to add")]
    NoMembers,

    _Message(Box<crate::message::Error>),
    _MongoDB(#[from] mongodb::error::Error),
}

impl From<crate::message::Error> for Error {
    fn from(e: crate::message::Error) -> Self {
        Self::_Message(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_id_is_order_independent() {
        let alice = user::Id("alice".into());
        let bob = user::Id("bob".into());

        assert_eq!(Id::direct(&alice, &bob), Id::direct(&bob, &alice));
        assert_eq!(Id::direct(&alice, &bob).0, "alice_bob");
    }

    #[test]
    fn group_ids_are_opaque_and_unique() {
        assert_ne!(Id::group(), Id::group());
    }
}

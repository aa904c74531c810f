use std::fmt::Display;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use serde::{Deserialize, Serialize};

use crate::room;
use crate::state::AppState;

pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub type Repository = Arc<dyn repository::MessageRepository + Send + Sync>;
pub type Service = Arc<dyn service::MessageService + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

pub fn api<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/messages", post(handler::api::send))
        .route(
            "/messages/{target}",
            get(handler::api::history).delete(handler::api::delete_for_me),
        )
        .route("/messages/{target}/status", put(handler::api::update_statuses))
        .route("/messages/{target}/media", get(handler::api::media))
        .route("/messages/{target}/search", get(handler::api::search))
        .route("/messages/{target}/around", get(handler::api::around))
        .route("/messages/{target}/unread", get(handler::api::unread))
        .route("/messages/{target}/revoke", put(handler::api::revoke))
        .route("/messages/{target}/reaction", put(handler::api::react))
        .with_state(state)
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Id(pub String);

impl Id {
    pub fn random() -> Self {
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

/// Message payload kind; `System` is reserved for service-synthesized
/// membership notices.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Text,
    Image,
    Video,
    File,
    Audio,
    System,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Text => "text",
            Kind::Image => "image",
            Kind::Video => "video",
            Kind::File => "file",
            Kind::Audio => "audio",
            Kind::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(Kind::Text),
            "image" => Some(Kind::Image),
            "video" => Some(Kind::Video),
            "file" => Some(Kind::File),
            "audio" => Some(Kind::Audio),
            "system" => Some(Kind::System),
            _ => None,
        }
    }
}

impl From<Kind> for mongodb::bson::Bson {
    fn from(kind: Kind) -> Self {
        mongodb::bson::Bson::String(kind.as_str().to_string())
    }
}

/// Delivery lifecycle. Transitions are forward-only; anything else is
/// silently filtered at write time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Sent,
    Delivered,
    Seen,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Sent => "sent",
            Status::Delivered => "delivered",
            Status::Seen => "seen",
        }
    }

    fn level(self) -> u8 {
        match self {
            Status::Sent => 0,
            Status::Delivered => 1,
            Status::Seen => 2,
        }
    }

    pub fn can_transition_to(self, target: Status) -> bool {
        target.level() > self.level()
    }

    /// Statuses that may still move to `target`.
    pub fn below(target: Status) -> Vec<Status> {
        [Status::Sent, Status::Delivered, Status::Seen]
            .into_iter()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }
}

impl From<Status> for mongodb::bson::Bson {
    fn from(status: Status) -> Self {
        mongodb::bson::Bson::String(status.as_str().to_string())
    }
}

#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    #[error("message not found: {0:?}")]
    NotFound(Option<Id>),
    #[error("not a member")]
    NotMember,
    #[error("either room_id or recipient is required")]
    MissingRecipient,

    _Room(#[from] room::Error),
    _MongoDB(#[from] mongodb::error::Error),
}

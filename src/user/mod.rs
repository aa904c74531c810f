use std::fmt::Display;

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod model;

pub type Client = std::sync::Arc<dyn client::UserClient + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

/// Reserved sender id for messages synthesized by the service itself.
const SYSTEM: &str = "SYSTEM";

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Id(pub String);

impl Id {
    pub fn system() -> Self {
        Self(SYSTEM.to_string())
    }

    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM
    }

    /// Display-name stand-in when the profile service cannot resolve a user.
    pub fn placeholder_name(&self) -> String {
        format!("User {}", self.0.chars().take(8).collect::<String>())
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

// bson's blanket impl derives the &Id conversion from this one.
impl From<Id> for mongodb::bson::Bson {
    fn from(id: Id) -> Self {
        mongodb::bson::Bson::String(id.0)
    }
}

/// Acting user for the current request, injected by the gateway through the
/// `X-User-Id` / `X-User-Name` headers.
#[derive(Clone, Debug)]
pub struct Context {
    pub id: Id,
    pub name: Option<String>,
}

impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| Id(v.to_string()))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let name = parts
            .headers
            .get("X-User-Name")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from);

        Ok(Self { id, name })
    }
}

#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    #[error("user not found: {0:?}")]
    NotFound(Id),

    _Reqwest(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_id_is_reserved() {
        assert!(Id::system().is_system());
        assert!(!Id("alice".into()).is_system());
    }

    #[test]
    fn ids_convert_to_bson_owned_or_borrowed() {
        use mongodb::bson::Bson;

        let id = Id("alice".into());
        assert_eq!(Bson::from(&id), Bson::String("alice".into()));
        assert_eq!(Bson::from(id), Bson::String("alice".into()));
    }

    #[test]
    fn placeholder_name_truncates_long_ids() {
        let id = Id("0123456789abcdef".into());
        assert_eq!(id.placeholder_name(), "User 01234567");

        let short = Id("bob".into());
        assert_eq!(short.placeholder_name(), "User bob");
    }
}

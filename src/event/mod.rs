use std::sync::Arc;

use crate::{room, user};

pub mod model;
pub mod service;

pub use model::{Event, PushRequest};

pub type Publisher = Arc<dyn service::EventPublisher + Send + Sync>;
pub type Push = Arc<dyn service::PushClient + Send + Sync>;
pub type Service = Arc<dyn service::EventService + Send + Sync>;

/// NATS subjects: one per user for personal fan-out, one per room for
/// room-scoped updates (reactions, revocations).
pub enum Subject<'a> {
    User(&'a user::Id),
    Room(&'a room::Id),
}

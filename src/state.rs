use std::sync::Arc;

use axum::extract::FromRef;

use crate::event::service::{EventServiceImpl, HttpPushClient, NatsPublisher};
use crate::integration::{self, cache};
use crate::message::repository::MongoMessageRepository;
use crate::message::service::MessageServiceImpl;
use crate::room::repository::MongoRoomRepository;
use crate::room::service::RoomServiceImpl;
use crate::user::client::HttpUserClient;
use crate::{event, message, room, user};

#[derive(Clone)]
pub struct AppState {
    pub room_service: room::Service,
    pub message_service: message::Service,
    pub event_service: event::Service,
}

impl AppState {
    pub async fn init(config: &integration::Config) -> integration::Result<Self> {
        let db = integration::mongo::init(&config.mongo).await?;
        let redis = cache::Redis::new(cache::init(&config.redis).await?);
        let nats = config.pubsub.connect().await;
        let http = integration::init_http_client();

        let room_repo: room::Repository = Arc::new(MongoRoomRepository::new(&db));
        let message_repo: message::Repository = Arc::new(MongoMessageRepository::new(&db));
        let user_client: user::Client =
            Arc::new(HttpUserClient::new(http.clone(), &config.user_service_url));

        let publisher: event::Publisher = Arc::new(NatsPublisher::new(nats));
        let push: event::Push = Arc::new(HttpPushClient::new(
            http,
            &config.notification_service_url,
        ));
        let event_service: event::Service = Arc::new(EventServiceImpl::new(publisher, push));

        let room_service: room::Service = Arc::new(RoomServiceImpl::new(
            room_repo,
            message_repo.clone(),
            user_client.clone(),
            event_service.clone(),
            redis,
        ));
        let message_service: message::Service = Arc::new(MessageServiceImpl::new(
            message_repo,
            room_service.clone(),
            user_client,
            event_service.clone(),
        ));

        Ok(Self {
            room_service,
            message_service,
            event_service,
        })
    }
}

impl FromRef<AppState> for room::Service {
    fn from_ref(state: &AppState) -> Self {
        state.room_service.clone()
    }
}

impl FromRef<AppState> for message::Service {
    fn from_ref(state: &AppState) -> Self {
        state.message_service.clone()
    }
}

impl FromRef<AppState> for event::Service {
    fn from_ref(state: &AppState) -> Self {
        state.event_service.clone()
    }
}

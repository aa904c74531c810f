use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

impl From<super::Error> for StatusCode {
    fn from(e: super::Error) -> Self {
        match e {
            super::Error::NotFound(_) => Self::NOT_FOUND,
            super::Error::NotMember | super::Error::MissingRecipient => Self::BAD_REQUEST,
            super::Error::_Room(e) => Self::from(e),
            super::Error::_MongoDB(_) => Self::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for super::Error {
    fn into_response(self) -> Response {
        log::debug!("message request failed: {self:?}");
        StatusCode::from(self).into_response()
    }
}

pub(super) mod api {
    use axum::Json;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use serde::Deserialize;

    use crate::message::model::{MessageDto, SendRequest};
    use crate::message::{self, Kind, Status};
    use crate::{room, user};

    pub async fn send(
        ctx: user::Context,
        message_service: State<message::Service>,
        Json(req): Json<SendRequest>,
    ) -> message::Result<(StatusCode, Json<MessageDto>)> {
        let dto = message_service.send(&ctx, req).await?;
        Ok((StatusCode::CREATED, Json(dto)))
    }

    pub async fn history(
        Path(target): Path<String>,
        ctx: user::Context,
        message_service: State<message::Service>,
    ) -> message::Result<Json<Vec<MessageDto>>> {
        let messages = message_service.history(&ctx, &target).await?;
        Ok(Json(messages))
    }

    #[derive(Deserialize)]
    pub struct StatusParams {
        status: Status,
    }

    pub async fn update_statuses(
        Path(target): Path<String>,
        ctx: user::Context,
        message_service: State<message::Service>,
        Json(params): Json<StatusParams>,
    ) -> message::Result<Json<Vec<MessageDto>>> {
        let updated = message_service
            .update_statuses(&ctx, &target, params.status)
            .await?;
        Ok(Json(updated))
    }

    #[derive(Deserialize)]
    pub struct MediaParams {
        /// Comma-separated kinds, e.g. `image,video`.
        kinds: Option<String>,
    }

    pub async fn media(
        Path(room_id): Path<room::Id>,
        Query(params): Query<MediaParams>,
        ctx: user::Context,
        message_service: State<message::Service>,
    ) -> message::Result<Json<Vec<MessageDto>>> {
        let kinds: Vec<Kind> = params
            .kinds
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(Kind::parse)
            .collect();

        let messages = message_service.media(&ctx, &room_id, &kinds).await?;
        Ok(Json(messages))
    }

    #[derive(Deserialize)]
    pub struct SearchParams {
        keyword: String,
    }

    pub async fn search(
        Path(room_id): Path<room::Id>,
        Query(params): Query<SearchParams>,
        ctx: user::Context,
        message_service: State<message::Service>,
    ) -> message::Result<Json<Vec<MessageDto>>> {
        let messages = message_service
            .search(&ctx, &room_id, &params.keyword)
            .await?;
        Ok(Json(messages))
    }

    #[derive(Deserialize)]
    pub struct AroundParams {
        target: message::Id,
        before: Option<i64>,
        after: Option<i64>,
    }

    pub async fn around(
        Path(room_id): Path<room::Id>,
        Query(params): Query<AroundParams>,
        ctx: user::Context,
        message_service: State<message::Service>,
    ) -> message::Result<Json<Vec<MessageDto>>> {
        let messages = message_service
            .around(&ctx, &room_id, &params.target, params.before, params.after)
            .await?;
        Ok(Json(messages))
    }

    pub async fn unread(
        Path(room_id): Path<room::Id>,
        ctx: user::Context,
        message_service: State<message::Service>,
    ) -> message::Result<Json<u64>> {
        let count = message_service.unread(&ctx, &room_id).await?;
        Ok(Json(count))
    }

    pub async fn revoke(
        Path(id): Path<message::Id>,
        ctx: user::Context,
        message_service: State<message::Service>,
    ) -> message::Result<Json<MessageDto>> {
        let dto = message_service.revoke(&ctx, &id).await?;
        Ok(Json(dto))
    }

    #[derive(Deserialize)]
    pub struct ReactionParams {
        value: String,
    }

    pub async fn react(
        Path(id): Path<message::Id>,
        ctx: user::Context,
        message_service: State<message::Service>,
        Json(params): Json<ReactionParams>,
    ) -> message::Result<Json<MessageDto>> {
        let dto = message_service.react(&ctx, &id, &params.value).await?;
        Ok(Json(dto))
    }

    pub async fn delete_for_me(
        Path(id): Path<message::Id>,
        ctx: user::Context,
        message_service: State<message::Service>,
    ) -> message::Result<StatusCode> {
        message_service.delete_for_user(&ctx, &id).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

impl From<super::Error> for StatusCode {
    fn from(e: super::Error) -> Self {
        match e {
            super::Error::NotFound(_) => Self::NOT_FOUND,
            super::Error::NotGroup
            | super::Error::NotMember
            | super::Error::Forbidden
            | super::Error::OwnerCannotLeave
            | super::Error::OwnerImmutable
            | super::Error::NoMembers => Self::BAD_REQUEST,
            super::Error::AlreadyExists => Self::CONFLICT,
            super::Error::_Message(e) => Self::from(*e),
            super::Error::_MongoDB(_) => Self::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for super::Error {
    fn into_response(self) -> Response {
        log::debug!("room request failed: {self:?}");
        StatusCode::from(self).into_response()
    }
}

pub(super) mod api {
    use axum::Json;
    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use serde::Deserialize;

    use crate::room::model::{MemberInfo, RoleAction, Room, RoomDto};
    use crate::{room, user};

    pub async fn find_all(
        ctx: user::Context,
        room_service: State<room::Service>,
    ) -> Json<Vec<RoomDto>> {
        Json(room_service.find_all(&ctx.id).await)
    }

    pub async fn find_one(
        Path(id): Path<room::Id>,
        ctx: user::Context,
        room_service: State<room::Service>,
    ) -> room::Result<Json<RoomDto>> {
        let dto = room_service.find_one(&id, &ctx.id).await?;
        Ok(Json(dto))
    }

    #[derive(Deserialize)]
    pub struct CreateGroupParams {
        name: String,
        members: Vec<user::Id>,
    }

    pub async fn create_group(
        ctx: user::Context,
        room_service: State<room::Service>,
        Json(params): Json<CreateGroupParams>,
    ) -> room::Result<(StatusCode, Json<Room>)> {
        let room = room_service
            .create_group(&ctx, &params.name, &params.members)
            .await?;
        Ok((StatusCode::CREATED, Json(room)))
    }

    pub async fn members(
        Path(id): Path<room::Id>,
        _ctx: user::Context,
        room_service: State<room::Service>,
    ) -> room::Result<Json<Vec<MemberInfo>>> {
        let members = room_service.members_with_info(&id).await?;
        Ok(Json(members))
    }

    pub async fn is_muted(
        Path(id): Path<room::Id>,
        ctx: user::Context,
        room_service: State<room::Service>,
    ) -> room::Result<Json<bool>> {
        let muted = room_service.is_muted(&id, &ctx.id).await?;
        Ok(Json(muted))
    }

    pub async fn toggle_mute(
        Path(id): Path<room::Id>,
        ctx: user::Context,
        room_service: State<room::Service>,
    ) -> room::Result<Json<bool>> {
        let muted = room_service.toggle_mute(&id, &ctx.id).await?;
        Ok(Json(muted))
    }

    #[derive(Deserialize)]
    pub struct ChangeRoleParams {
        target: user::Id,
        action: RoleAction,
    }

    pub async fn change_role(
        Path(id): Path<room::Id>,
        ctx: user::Context,
        room_service: State<room::Service>,
        Json(params): Json<ChangeRoleParams>,
    ) -> room::Result<Json<Room>> {
        let room = room_service
            .change_role(&id, &ctx, &params.target, params.action)
            .await?;
        Ok(Json(room))
    }

    #[derive(Deserialize)]
    pub struct KickParams {
        target: user::Id,
    }

    pub async fn kick(
        Path(id): Path<room::Id>,
        ctx: user::Context,
        room_service: State<room::Service>,
        Json(params): Json<KickParams>,
    ) -> room::Result<Json<Room>> {
        let room = room_service.kick(&id, &ctx, &params.target).await?;
        Ok(Json(room))
    }

    pub async fn leave(
        Path(id): Path<room::Id>,
        ctx: user::Context,
        room_service: State<room::Service>,
    ) -> room::Result<Json<Room>> {
        let room = room_service.leave(&id, &ctx).await?;
        Ok(Json(room))
    }

    pub async fn delete(
        Path(id): Path<room::Id>,
        ctx: user::Context,
        room_service: State<room::Service>,
    ) -> room::Result<StatusCode> {
        room_service.delete_group(&id, &ctx).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    #[derive(Deserialize)]
    pub struct AddMembersParams {
        members: Vec<user::Id>,
    }

    pub async fn add_members(
        Path(id): Path<room::Id>,
        ctx: user::Context,
        room_service: State<room::Service>,
        Json(params): Json<AddMembersParams>,
    ) -> room::Result<Json<Room>> {
        let room = room_service.add_members(&id, &ctx, &params.members).await?;
        Ok(Json(room))
    }
}

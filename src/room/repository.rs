use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, doc};

use super::model::Room;
use crate::{room, user};

const ROOMS_COLLECTION: &str = "rooms";

#[async_trait]
pub trait RoomRepository {
    /// Fails with [`room::Error::AlreadyExists`] when a room with the same id
    /// was inserted concurrently; callers resolve the race by re-fetching.
    async fn insert(&self, room: &Room) -> super::Result<()>;

    async fn find_by_id(&self, id: &room::Id) -> super::Result<Option<Room>>;

    /// Ordered by preview timestamp descending; rooms without messages last.
    async fn find_by_member(&self, user: &user::Id) -> super::Result<Vec<Room>>;

    async fn update_membership(
        &self,
        id: &room::Id,
        members: &[user::Id],
        admins: &[user::Id],
    ) -> super::Result<()>;

    async fn set_muted(&self, id: &room::Id, user: &user::Id, muted: bool) -> super::Result<()>;

    /// Guarded so a strictly newer preview is never overwritten; an equal
    /// timestamp wins, which lets revoking the newest message rewrite it.
    async fn update_last_message(&self, id: &room::Id, preview: &str, at: i64)
        -> super::Result<()>;

    async fn delete(&self, id: &room::Id) -> super::Result<()>;
}

#[derive(Clone)]
pub struct MongoRoomRepository {
    col: mongodb::Collection<Room>,
}

impl MongoRoomRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            col: db.collection(ROOMS_COLLECTION),
        }
    }
}

fn ids(values: &[user::Id]) -> Bson {
    Bson::Array(values.iter().map(Bson::from).collect())
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    matches!(
        &*e.kind,
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}

#[async_trait]
impl RoomRepository for MongoRoomRepository {
    async fn insert(&self, room: &Room) -> super::Result<()> {
        match self.col.insert_one(room).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(room::Error::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &room::Id) -> super::Result<Option<Room>> {
        let room = self.col.find_one(doc! { "_id": id }).await?;
        Ok(room)
    }

    async fn find_by_member(&self, user: &user::Id) -> super::Result<Vec<Room>> {
        let cursor = self
            .col
            .find(doc! { "members": user })
            .sort(doc! { "last_message_at": -1, "_id": 1 })
            .await?;

        let rooms = cursor.try_collect().await?;
        Ok(rooms)
    }

    async fn update_membership(
        &self,
        id: &room::Id,
        members: &[user::Id],
        admins: &[user::Id],
    ) -> super::Result<()> {
        self.col
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "members": ids(members),
                    "admins": ids(admins),
                }},
            )
            .await?;
        Ok(())
    }

    async fn set_muted(&self, id: &room::Id, user: &user::Id, muted: bool) -> super::Result<()> {
        let update = if muted {
            doc! { "$addToSet": { "muted_by": user } }
        } else {
            doc! { "$pull": { "muted_by": user } }
        };

        self.col.update_one(doc! { "_id": id }, update).await?;
        Ok(())
    }

    async fn update_last_message(
        &self,
        id: &room::Id,
        preview: &str,
        at: i64,
    ) -> super::Result<()> {
        self.col
            .update_one(
                doc! {
                    "_id": id,
                    "$or": [
                        { "last_message_at": Bson::Null },
                        { "last_message_at": { "$lte": at } },
                    ],
                },
                doc! { "$set": {
                    "last_message": preview,
                    "last_message_at": at,
                }},
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &room::Id) -> super::Result<()> {
        self.col.delete_one(doc! { "_id": id }).await?;
        Ok(())
    }
}

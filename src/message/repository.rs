use std::collections::HashMap;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::ReturnDocument;

use super::model::Message;
use super::{Kind, Status};
use crate::room::model::Room;
use crate::{message, room, user};

const MESSAGES_COLLECTION: &str = "messages";

pub const MEDIA_LIMIT: i64 = 100;
pub const SEARCH_LIMIT: i64 = 50;

/// Which senders a bulk status update applies to: the counterpart in a
/// direct room, everyone but the reader in a group.
pub enum SenderFilter<'a> {
    From(&'a user::Id),
    NotFrom(&'a user::Id),
}

#[async_trait]
pub trait MessageRepository {
    async fn insert(&self, msg: &Message) -> super::Result<()>;

    async fn find_by_id(&self, id: &message::Id) -> super::Result<Option<Message>>;

    /// Full room history, oldest first.
    async fn find_by_room(&self, room_id: &room::Id) -> super::Result<Vec<Message>>;

    /// Newest first, capped at [`MEDIA_LIMIT`].
    async fn find_media(&self, room_id: &room::Id, kinds: &[Kind]) -> super::Result<Vec<Message>>;

    /// Case-insensitive text search, newest first, capped at [`SEARCH_LIMIT`].
    /// The keyword is treated literally, never as a pattern.
    async fn search_text(&self, room_id: &room::Id, keyword: &str) -> super::Result<Vec<Message>>;

    /// Chronological window centred on `target`, `before`/`after` rows on
    /// each side, target included.
    async fn find_window(
        &self,
        room_id: &room::Id,
        target: &Message,
        before: i64,
        after: i64,
    ) -> super::Result<Vec<Message>>;

    /// Unread definition: not sent by `user`, still `sent`/`delivered`, and —
    /// in direct rooms — addressed to `user`.
    async fn count_unread(&self, room: &Room, user: &user::Id) -> super::Result<u64>;

    /// Applies `target` to every matching message whose current status can
    /// still reach it; the filter re-checks the status at write time, so a
    /// stale pre-read can never move a status backward. Returns only the
    /// messages actually updated.
    async fn update_statuses(
        &self,
        room_id: &room::Id,
        filter: SenderFilter<'_>,
        target: Status,
    ) -> super::Result<Vec<Message>>;

    /// Returns the post-update message, `None` when unknown.
    async fn set_revoked(&self, id: &message::Id) -> super::Result<Option<Message>>;

    /// Idempotent per-user delete marker.
    async fn add_deleted_for(&self, id: &message::Id, user: &user::Id) -> super::Result<()>;

    async fn set_reactions(
        &self,
        id: &message::Id,
        reactions: &HashMap<user::Id, String>,
    ) -> super::Result<()>;

    async fn delete_by_room(&self, room_id: &room::Id) -> super::Result<()>;
}

#[derive(Clone)]
pub struct MongoMessageRepository {
    col: mongodb::Collection<Message>,
}

impl MongoMessageRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            col: db.collection(MESSAGES_COLLECTION),
        }
    }
}

fn status_in(statuses: &[Status]) -> Bson {
    Bson::Array(statuses.iter().map(|s| Bson::from(*s)).collect())
}

pub(super) fn escape_keyword(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if !c.is_alphanumeric() && !c.is_whitespace() {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl MessageRepository for MongoMessageRepository {
    async fn insert(&self, msg: &Message) -> super::Result<()> {
        self.col.insert_one(msg).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &message::Id) -> super::Result<Option<Message>> {
        let msg = self.col.find_one(doc! { "_id": id }).await?;
        Ok(msg)
    }

    async fn find_by_room(&self, room_id: &room::Id) -> super::Result<Vec<Message>> {
        let cursor = self
            .col
            .find(doc! { "room_id": room_id })
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await?;

        let messages = cursor.try_collect().await?;
        Ok(messages)
    }

    async fn find_media(&self, room_id: &room::Id, kinds: &[Kind]) -> super::Result<Vec<Message>> {
        let kinds = Bson::Array(kinds.iter().map(|k| Bson::from(*k)).collect());
        let cursor = self
            .col
            .find(doc! {
                "room_id": room_id,
                "kind": { "$in": kinds },
                "revoked": false,
            })
            .sort(doc! { "created_at": -1 })
            .limit(MEDIA_LIMIT)
            .await?;

        let messages = cursor.try_collect().await?;
        Ok(messages)
    }

    async fn search_text(&self, room_id: &room::Id, keyword: &str) -> super::Result<Vec<Message>> {
        let cursor = self
            .col
            .find(doc! {
                "room_id": room_id,
                "kind": Kind::Text,
                "revoked": false,
                "content": { "$regex": escape_keyword(keyword), "$options": "i" },
            })
            .sort(doc! { "created_at": -1 })
            .limit(SEARCH_LIMIT)
            .await?;

        let messages = cursor.try_collect().await?;
        Ok(messages)
    }

    async fn find_window(
        &self,
        room_id: &room::Id,
        target: &Message,
        before: i64,
        after: i64,
    ) -> super::Result<Vec<Message>> {
        let older = self
            .col
            .find(doc! {
                "room_id": room_id,
                "created_at": { "$lt": target.created_at },
            })
            .sort(doc! { "created_at": -1, "_id": -1 })
            .limit(before)
            .await?;

        let mut window: Vec<Message> = older.try_collect().await?;
        window.reverse();
        window.push(target.clone());

        let newer = self
            .col
            .find(doc! {
                "room_id": room_id,
                "created_at": { "$gt": target.created_at },
            })
            .sort(doc! { "created_at": 1, "_id": 1 })
            .limit(after)
            .await?;

        let newer: Vec<Message> = newer.try_collect().await?;
        window.extend(newer);

        Ok(window)
    }

    async fn count_unread(&self, room: &Room, user: &user::Id) -> super::Result<u64> {
        let mut filter = doc! {
            "room_id": &room.id,
            "sender": { "$ne": user },
            "status": { "$in": status_in(&[Status::Sent, Status::Delivered]) },
        };
        if !room.is_group {
            filter.insert("recipient", user);
        }

        let count = self.col.count_documents(filter).await?;
        Ok(count)
    }

    async fn update_statuses(
        &self,
        room_id: &room::Id,
        filter: SenderFilter<'_>,
        target: Status,
    ) -> super::Result<Vec<Message>> {
        let eligible = status_in(&Status::below(target));
        let mut query = doc! {
            "room_id": room_id,
            "status": { "$in": eligible.clone() },
        };
        match filter {
            SenderFilter::From(sender) => query.insert("sender", sender),
            SenderFilter::NotFrom(sender) => query.insert("sender", doc! { "$ne": sender }),
        };

        let candidates: Vec<Message> = self.col.find(query).await?.try_collect().await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids = Bson::Array(candidates.iter().map(|m| Bson::from(&m.id)).collect());
        self.col
            .update_many(
                doc! { "_id": { "$in": ids.clone() }, "status": { "$in": eligible } },
                doc! { "$set": { "status": target } },
            )
            .await?;

        let updated = self
            .col
            .find(doc! { "_id": { "$in": ids }, "status": target })
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await?
            .try_collect()
            .await?;

        Ok(updated)
    }

    async fn set_revoked(&self, id: &message::Id) -> super::Result<Option<Message>> {
        let updated = self
            .col
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": { "revoked": true } })
            .return_document(ReturnDocument::After)
            .await?;

        Ok(updated)
    }

    async fn add_deleted_for(&self, id: &message::Id, user: &user::Id) -> super::Result<()> {
        self.col
            .update_one(
                doc! { "_id": id },
                doc! { "$addToSet": { "deleted_for": user } },
            )
            .await?;
        Ok(())
    }

    async fn set_reactions(
        &self,
        id: &message::Id,
        reactions: &HashMap<user::Id, String>,
    ) -> super::Result<()> {
        let mut map = Document::new();
        for (user, value) in reactions {
            map.insert(user.0.clone(), value.clone());
        }

        self.col
            .update_one(doc! { "_id": id }, doc! { "$set": { "reactions": map } })
            .await?;
        Ok(())
    }

    async fn delete_by_room(&self, room_id: &room::Id) -> super::Result<()> {
        self.col.delete_many(doc! { "room_id": room_id }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::escape_keyword;

    #[test]
    fn keywords_are_escaped_literally() {
        assert_eq!(escape_keyword("hello"), "hello");
        assert_eq!(escape_keyword("a.b*c"), "a\\.b\\*c");
        assert_eq!(escape_keyword("(x|y)"), "\\(x\\|y\\)");
        assert_eq!(escape_keyword("two words"), "two words");
    }
}

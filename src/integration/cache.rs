use std::env;
use std::fmt;

use log::error;
use redis::AsyncCommands;

use crate::integration::Result;
use crate::room;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 6379,
        }
    }
}

impl Config {
    pub fn env() -> Result<Self> {
        let host = env::var("REDIS_HOST")?;
        let port = env::var("REDIS_PORT")?.parse()?;
        Ok(Self { host, port })
    }
}

pub async fn init(config: &Config) -> Result<redis::aio::ConnectionManager> {
    let con = redis::Client::open(format!("redis://{}:{}", &config.host, &config.port))?
        .get_connection_manager()
        .await?;

    Ok(con)
}

const MEMBERS_TTL_SECS: i64 = 3600;

#[derive(Clone)]
pub enum Key {
    RoomMembers(room::Id),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::RoomMembers(id) => write!(f, "room:members:{id}"),
        }
    }
}

impl redis::ToRedisArgs for Key {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + redis::RedisWrite,
    {
        out.write_arg_fmt(self)
    }
}

/// Read-through cache handle. Every failure is logged and absorbed so a
/// degraded or absent redis never fails the calling operation.
#[derive(Clone)]
pub struct Redis {
    con: Option<redis::aio::ConnectionManager>,
}

impl Redis {
    pub fn new(con: redis::aio::ConnectionManager) -> Self {
        Self { con: Some(con) }
    }

    /// No-op cache: every read misses, every write is dropped.
    pub fn disabled() -> Self {
        Self { con: None }
    }

    pub async fn smembers(&self, key: Key) -> Option<Vec<String>> {
        let mut con = self.con.clone()?;
        match con.smembers(&key).await {
            Ok(members) => Some(members),
            Err(e) => {
                error!("failed to read {key} from cache: {e:?}");
                None
            }
        }
    }

    pub async fn sadd_all(&self, key: Key, members: &[String]) {
        let Some(mut con) = self.con.clone() else {
            return;
        };

        let res: redis::RedisResult<()> = redis::pipe()
            .sadd(&key, members)
            .expire(&key, MEMBERS_TTL_SECS)
            .query_async(&mut con)
            .await;

        if let Err(e) = res {
            error!("failed to cache {key}: {e:?}");
        }
    }

    pub async fn del(&self, key: Key) {
        let Some(mut con) = self.con.clone() else {
            return;
        };

        if let Err(e) = con.del::<_, ()>(&key).await {
            error!("failed to invalidate {key}: {e:?}");
        }
    }
}

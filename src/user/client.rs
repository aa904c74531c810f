use async_trait::async_trait;
use log::warn;

use super::model::UserInfo;
use super::Id;

#[async_trait]
pub trait UserClient {
    async fn find(&self, id: &Id) -> super::Result<UserInfo>;

    /// Best-effort display-name lookup. Lookup failures degrade to the
    /// provided fallback instead of propagating.
    async fn find_name_or(&self, id: &Id, fallback: &str) -> String {
        match self.find(id).await {
            Ok(info) => info.name,
            Err(e) => {
                warn!("failed to resolve name for {id}: {e:?}");
                fallback.to_string()
            }
        }
    }
}

#[derive(Clone)]
pub struct HttpUserClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpUserClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl UserClient for HttpUserClient {
    async fn find(&self, id: &Id) -> super::Result<UserInfo> {
        let res = self
            .http
            .get(format!("{}/users/{id}", self.base_url))
            .send()
            .await?;

        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(super::Error::NotFound(id.clone()));
        }

        let info = res.error_for_status()?.json::<UserInfo>().await?;
        Ok(info)
    }
}

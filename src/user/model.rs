use serde::{Deserialize, Serialize};

use super::Id;

/// Profile returned by the user service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

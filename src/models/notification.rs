use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    pub id: String,
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    pub received_at: DateTime<Utc>,
}

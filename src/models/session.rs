use serde::{Deserialize, Serialize};

/// Identity handle for the signed-in driver. The identity provider owns it;
/// the console only ever holds a copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: String,
}

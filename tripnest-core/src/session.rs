use serde::{Deserialize, Serialize};
use tripnest_shared::pii::Masked;

/// The authenticated guest an operation runs on behalf of.
///
/// Session management belongs to the auth provider; lifecycle operations
/// receive the resolved identity explicitly instead of reading global state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<Masked<String>>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(Masked(token.into()));
        self
    }
}

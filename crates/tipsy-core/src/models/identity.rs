//! Authenticated user identity

use serde::{Deserialize, Serialize};

/// The logged-in user as cached locally.
///
/// `openid` never changes for a given account and partitions every remote
/// record the user owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub openid: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub avatar_url: String,
}

impl UserIdentity {
    pub fn new(
        openid: impl Into<String>,
        nickname: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            openid: openid.into(),
            nickname: nickname.into(),
            avatar_url: avatar_url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_blob_uses_camel_case() {
        let identity = UserIdentity::new("o-1", "Ada", "cloud://b/avatar/o-1_1.jpg");
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value["avatarUrl"], "cloud://b/avatar/o-1_1.jpg");
    }

    #[test]
    fn missing_profile_fields_default_to_empty() {
        let identity: UserIdentity = serde_json::from_str(r#"{"openid":"o-2"}"#).unwrap();
        assert_eq!(identity.nickname, "");
        assert_eq!(identity.avatar_url, "");
    }
}

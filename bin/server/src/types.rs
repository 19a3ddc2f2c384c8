//! Response types shared by the HTTP handlers.

use stockwatch_platform_access::User;

/// User info returned by `/session`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: String,
    pub email: String,
    pub notification_enabled: bool,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id().to_string(),
            email: user.email().to_string(),
            notification_enabled: user.notification_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_keys() {
        let user = User::new("user@example.com".to_string());
        let json = serde_json::to_value(UserInfo::from(&user)).expect("serialize");

        assert_eq!(json["userId"], user.id().to_string());
        assert_eq!(json["email"], "user@example.com");
        assert_eq!(json["notificationEnabled"], false);
        assert_eq!(json.as_object().map(|o| o.len()), Some(3));
    }
}

use serde::Serialize;
use sqlx::types::time::OffsetDateTime;
use uuid::Uuid;

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    // Bcrypt hash; never serialized in responses.
    #[serde(skip_serializing)]
    pub password: String,
    pub balance: i32,
    pub role: String,
    pub phone: Option<String>,
    // Caller ID for outgoing calls
    #[serde(rename = "from")]
    pub from_number: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Call {
    pub id: Uuid,
    pub user_id: Uuid,
    pub record_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Voice {
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_json_hides_password_and_renames_caller_id() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "$2b$10$secret".to_string(),
            balance: 10,
            role: ROLE_USER.to_string(),
            phone: None,
            from_number: "+1234567890".to_string(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["from"], "+1234567890");
        assert_eq!(json["balance"], 10);
    }
}

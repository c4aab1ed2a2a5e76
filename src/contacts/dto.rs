use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::contacts::repo_types::Contact;

// ISO-8601 calendar date (`YYYY-MM-DD`) serde wiring for `time::Date`, which has
// no well-known string serde impl of its own.
time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Deserialize)]
pub struct ContactCreate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(with = "iso_date")]
    pub birthday: Date,
    #[serde(default)]
    pub additional_info: Option<String>,
}

/// Partial update: only supplied fields are written.
#[derive(Debug, Default, Deserialize)]
pub struct ContactUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub birthday: Option<Date>,
    pub additional_info: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Date,
    pub additional_info: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            phone_number: c.phone_number,
            birthday: c.birthday,
            additional_info: c.additional_info,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub search: Option<String>,
}

fn default_limit() -> i64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_leaves_missing_fields_unset() {
        let body: ContactUpdate = serde_json::from_str(r#"{"phone_number": "555-0100"}"#).unwrap();
        assert_eq!(body.phone_number.as_deref(), Some("555-0100"));
        assert!(body.first_name.is_none());
        assert!(body.last_name.is_none());
        assert!(body.email.is_none());
        assert!(body.birthday.is_none());
        assert!(body.additional_info.is_none());
    }

    #[test]
    fn query_defaults() {
        let q: ContactsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.limit, 10);
        assert_eq!(q.offset, 0);
        assert!(q.search.is_none());
    }

    #[test]
    fn create_parses_iso_birthday() {
        let body: ContactCreate = serde_json::from_str(
            r#"{
                "first_name": "Ann",
                "last_name": "Lee",
                "email": "ann@x.com",
                "phone_number": "555-0101",
                "birthday": "1992-02-29"
            }"#,
        )
        .unwrap();
        assert_eq!(body.birthday.to_string(), "1992-02-29");
        assert!(body.additional_info.is_none());
    }
}

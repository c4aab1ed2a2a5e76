use time::{Date, Duration, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::contacts::dto::{ContactCreate, ContactUpdate};
use crate::contacts::repo::ContactRepository;
use crate::contacts::repo_types::{Contact, NewContact};
use crate::error::{is_unique_violation, ApiError};
use crate::repository::EntityRepository;
use crate::state::AppState;

/// Month/day keys (`MM-DD`) covered by `[today, today + days]`, computed
/// from the actual dates so month and year rollover come out right.
pub fn birthday_window_keys(today: Date, days: i64) -> Vec<String> {
    (0..=days)
        .map(|offset| {
            let date = today + Duration::days(offset);
            format!("{:02}-{:02}", date.month() as u8, date.day())
        })
        .collect()
}

fn map_unique_violation(e: anyhow::Error) -> ApiError {
    if let Some(db_err) = e.downcast_ref::<sqlx::Error>() {
        if is_unique_violation(db_err) {
            return ApiError::Conflict("Contact with this email already exists".into());
        }
    }
    ApiError::Internal(e)
}

pub async fn create_contact(
    state: &AppState,
    user_id: Uuid,
    body: ContactCreate,
) -> Result<Contact, ApiError> {
    let contact = ContactRepository::new(state.db.clone())
        .create(NewContact {
            user_id,
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            phone_number: body.phone_number,
            birthday: body.birthday,
            additional_info: body.additional_info,
        })
        .await
        .map_err(map_unique_violation)?;
    info!(contact_id = %contact.id, user_id = %user_id, "contact created");
    Ok(contact)
}

pub async fn list_contacts(
    state: &AppState,
    user_id: Uuid,
    limit: i64,
    offset: i64,
    search: Option<&str>,
) -> Result<Vec<Contact>, ApiError> {
    Ok(ContactRepository::new(state.db.clone())
        .list(user_id, limit, offset, search)
        .await?)
}

/// Load a contact and apply the ownership filter: a contact owned by
/// someone else is indistinguishable from a missing one.
pub async fn get_contact(
    state: &AppState,
    user_id: Uuid,
    contact_id: Uuid,
) -> Result<Option<Contact>, ApiError> {
    let contact = ContactRepository::new(state.db.clone())
        .get_by_id(contact_id)
        .await?;
    Ok(contact.filter(|c| c.is_owned_by(user_id)))
}

pub async fn update_contact(
    state: &AppState,
    user_id: Uuid,
    contact_id: Uuid,
    body: &ContactUpdate,
) -> Result<Option<Contact>, ApiError> {
    if get_contact(state, user_id, contact_id).await?.is_none() {
        return Ok(None);
    }
    let updated = ContactRepository::new(state.db.clone())
        .update_partial(contact_id, body)
        .await
        .map_err(map_unique_violation)?;
    Ok(updated)
}

pub async fn remove_contact(
    state: &AppState,
    user_id: Uuid,
    contact_id: Uuid,
) -> Result<Option<Contact>, ApiError> {
    let repo = ContactRepository::new(state.db.clone());
    let Some(contact) = get_contact(state, user_id, contact_id).await? else {
        return Ok(None);
    };
    repo.delete(contact.id).await?;
    info!(contact_id = %contact.id, user_id = %user_id, "contact deleted");
    Ok(Some(contact))
}

/// Contacts whose birthday falls within the next 7 days.
pub async fn upcoming_birthdays(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<Contact>, ApiError> {
    let today = OffsetDateTime::now_utc().date();
    let keys = birthday_window_keys(today, 7);
    Ok(ContactRepository::new(state.db.clone())
        .find_by_birthday_keys(user_id, &keys)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn window_within_one_month() {
        let keys = birthday_window_keys(date!(2025 - 08 - 10), 7);
        assert_eq!(keys.len(), 8);
        assert_eq!(keys.first().unwrap(), "08-10");
        assert_eq!(keys.last().unwrap(), "08-17");
    }

    #[test]
    fn window_rolls_into_next_month() {
        let keys = birthday_window_keys(date!(2025 - 08 - 29), 7);
        assert!(keys.contains(&"08-31".to_string()));
        assert!(keys.contains(&"09-01".to_string()));
        assert!(keys.contains(&"09-05".to_string()));
        assert!(!keys.contains(&"09-06".to_string()));
    }

    #[test]
    fn window_rolls_over_year_end() {
        let keys = birthday_window_keys(date!(2025 - 12 - 29), 7);
        assert_eq!(keys.first().unwrap(), "12-29");
        assert!(keys.contains(&"12-31".to_string()));
        assert!(keys.contains(&"01-01".to_string()));
        assert_eq!(keys.last().unwrap(), "01-05");
    }

    #[test]
    fn leap_day_appears_only_in_leap_years() {
        let leap = birthday_window_keys(date!(2024 - 02 - 26), 7);
        assert!(leap.contains(&"02-29".to_string()));

        let common = birthday_window_keys(date!(2025 - 02 - 26), 7);
        assert!(!common.contains(&"02-29".to_string()));
        assert!(common.contains(&"03-01".to_string()));
    }

    #[test]
    fn ownership_filter_hides_foreign_contacts() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let contact = Contact {
            id: Uuid::new_v4(),
            user_id: Some(owner),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            email: "ann@x.com".into(),
            phone_number: "555-0101".into(),
            birthday: date!(1992 - 02 - 29),
            additional_info: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        assert!(contact.is_owned_by(owner));
        assert!(!contact.is_owned_by(stranger));
    }
}

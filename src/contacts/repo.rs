use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::contacts::dto::ContactUpdate;
use crate::contacts::repo_types::{Contact, NewContact};
use crate::repository::EntityRepository;

const CONTACT_COLUMNS: &str = "id, user_id, first_name, last_name, email, phone_number, \
                               birthday, additional_info, created_at, updated_at";

pub struct ContactRepository {
    db: PgPool,
}

impl ContactRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Owner-scoped page, optionally filtered by a case-insensitive
    /// substring over first name, last name and email.
    pub async fn list(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> anyhow::Result<Vec<Contact>> {
        let contacts = match search {
            Some(needle) => {
                let pattern = format!("%{needle}%");
                sqlx::query_as::<_, Contact>(&format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts
                     WHERE user_id = $1
                       AND (first_name ILIKE $4 OR last_name ILIKE $4 OR email ILIKE $4)
                     ORDER BY created_at
                     LIMIT $2 OFFSET $3"
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .bind(pattern)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Contact>(&format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts
                     WHERE user_id = $1
                     ORDER BY created_at
                     LIMIT $2 OFFSET $3"
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(contacts)
    }

    /// Write only the supplied fields; everything else keeps its value.
    pub async fn update_partial(
        &self,
        id: Uuid,
        body: &ContactUpdate,
    ) -> anyhow::Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "UPDATE contacts
             SET first_name      = COALESCE($2, first_name),
                 last_name       = COALESCE($3, last_name),
                 email           = COALESCE($4, email),
                 phone_number    = COALESCE($5, phone_number),
                 birthday        = COALESCE($6, birthday),
                 additional_info = COALESCE($7, additional_info),
                 updated_at      = now()
             WHERE id = $1
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(id)
        .bind(&body.first_name)
        .bind(&body.last_name)
        .bind(&body.email)
        .bind(&body.phone_number)
        .bind(body.birthday)
        .bind(&body.additional_info)
        .fetch_optional(&self.db)
        .await?;
        Ok(contact)
    }

    /// Contacts whose birthday month/day falls on one of the given keys
    /// (formatted `MM-DD`).
    pub async fn find_by_birthday_keys(
        &self,
        user_id: Uuid,
        keys: &[String],
    ) -> anyhow::Result<Vec<Contact>> {
        let contacts = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE user_id = $1 AND to_char(birthday, 'MM-DD') = ANY($2)
             ORDER BY to_char(birthday, 'MM-DD')"
        ))
        .bind(user_id)
        .bind(keys)
        .fetch_all(&self.db)
        .await?;
        Ok(contacts)
    }
}

#[async_trait]
impl EntityRepository for ContactRepository {
    type Entity = Contact;
    type NewEntity = NewContact;

    async fn get_all(&self) -> anyhow::Result<Vec<Contact>> {
        let contacts = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY created_at"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(contacts)
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(contact)
    }

    async fn create(&self, new: NewContact) -> anyhow::Result<Contact> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "INSERT INTO contacts
                 (user_id, first_name, last_name, email, phone_number, birthday, additional_info)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(new.user_id)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.email)
        .bind(&new.phone_number)
        .bind(new.birthday)
        .bind(&new.additional_info)
        .fetch_one(&self.db)
        .await?;
        Ok(contact)
    }

    async fn update(&self, entity: &Contact) -> anyhow::Result<Contact> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "UPDATE contacts
             SET first_name = $2, last_name = $3, email = $4, phone_number = $5,
                 birthday = $6, additional_info = $7, updated_at = now()
             WHERE id = $1
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(entity.id)
        .bind(&entity.first_name)
        .bind(&entity.last_name)
        .bind(&entity.email)
        .bind(&entity.phone_number)
        .bind(entity.birthday)
        .bind(&entity.additional_info)
        .fetch_one(&self.db)
        .await?;
        Ok(contact)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

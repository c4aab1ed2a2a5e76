use axum::async_trait;
use uuid::Uuid;

/// Generic CRUD surface shared by the entity repositories.
///
/// Each implementation binds `Entity` to one ORM-mapped row type and
/// `NewEntity` to the data needed to insert one. Every method issues a
/// single statement against the pool, so each call commits on its own.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    type Entity;
    type NewEntity;

    async fn get_all(&self) -> anyhow::Result<Vec<Self::Entity>>;
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Self::Entity>>;
    /// Insert and return the row with generated fields populated.
    async fn create(&self, new: Self::NewEntity) -> anyhow::Result<Self::Entity>;
    /// Write the entity's current state back and return the stored row.
    async fn update(&self, entity: &Self::Entity) -> anyhow::Result<Self::Entity>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;
}

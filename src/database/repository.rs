use serde_json::json;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::service::Database;
use crate::filter::FilterData;
use crate::tenant::{Entity, ScopedEntity};

/// Typed convenience layer over [`Database`] for one entity type.
pub struct Repository<E> {
    database: Database,
    _phantom: std::marker::PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<E>, DatabaseError> {
        self.database.query::<E>()?
            .filter(filter_data)?
            .select_all()
            .await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<E>, DatabaseError> {
        self.database.query::<E>()?
            .filter(filter_data)?
            .select_optional()
            .await
    }

    pub async fn select_404(&self, filter_data: FilterData) -> Result<E, DatabaseError> {
        self.database.query::<E>()?
            .filter(filter_data)?
            .select_one()
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => DatabaseError::NotFound("Record not found".to_string()),
                other => other,
            })
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        self.database.query::<E>()?
            .filter(filter_data)?
            .count()
            .await
    }

    pub async fn select_ids(&self, ids: Vec<Uuid>) -> Result<Vec<E>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let filter = FilterData {
            where_clause: Some(json!({ "id": { "$in": ids } })),
            ..Default::default()
        };
        self.select_any(filter).await
    }

    pub async fn insert(&self, entity: &E) -> Result<E, DatabaseError> {
        self.database.insert(entity).await
    }
}

impl<E: ScopedEntity> Repository<E> {
    pub async fn insert_scoped(&self, entity: &E) -> Result<E, DatabaseError> {
        self.database.insert_scoped(entity).await
    }
}

use crate::models::{MemoryRecord, MemoryStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Memory {0} not found")]
    NotFound(String),

    #[error("Database request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid database response: {0}")]
    InvalidResponse(String),
}

/// Access to the `memories` table.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    async fn find(&self, memory_id: &str) -> Result<Option<MemoryRecord>, RepositoryError>;

    async fn update_status(
        &self,
        memory_id: &str,
        status: MemoryStatus,
    ) -> Result<MemoryRecord, RepositoryError>;

    /// Store the bucket path of the generated model in `model_3d_url`.
    async fn set_model_path(
        &self,
        memory_id: &str,
        storage_path: &str,
    ) -> Result<MemoryRecord, RepositoryError>;
}

/// Repository held in process memory. Records every status change.
#[derive(Debug, Default)]
pub struct InMemoryMemoryRepository {
    records: Mutex<HashMap<String, MemoryRecord>>,
    history: Mutex<Vec<(String, MemoryStatus)>>,
}

impl InMemoryMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory(self, record: MemoryRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn insert(&self, record: MemoryRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(record.id.clone(), record);
        }
    }

    /// Status changes of `memory_id`, oldest first.
    pub fn status_history(&self, memory_id: &str) -> Vec<MemoryStatus> {
        self.history
            .lock()
            .map(|h| {
                h.iter()
                    .filter(|(id, _)| id == memory_id)
                    .map(|(_, status)| *status)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get(&self, memory_id: &str) -> Option<MemoryRecord> {
        self.records
            .lock()
            .ok()
            .and_then(|r| r.get(memory_id).cloned())
    }

    fn modify(
        &self,
        memory_id: &str,
        apply: impl FnOnce(&mut MemoryRecord),
    ) -> Result<MemoryRecord, RepositoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| RepositoryError::RequestFailed("lock poisoned".to_string()))?;
        let record = records
            .get_mut(memory_id)
            .ok_or_else(|| RepositoryError::NotFound(memory_id.to_string()))?;
        apply(record);
        Ok(record.clone())
    }
}

#[async_trait]
impl MemoryRepository for InMemoryMemoryRepository {
    async fn find(&self, memory_id: &str) -> Result<Option<MemoryRecord>, RepositoryError> {
        Ok(self.get(memory_id))
    }

    async fn update_status(
        &self,
        memory_id: &str,
        status: MemoryStatus,
    ) -> Result<MemoryRecord, RepositoryError> {
        let record = self.modify(memory_id, |r| r.status = Some(status.to_string()))?;
        if let Ok(mut history) = self.history.lock() {
            history.push((memory_id.to_string(), status));
        }
        Ok(record)
    }

    async fn set_model_path(
        &self,
        memory_id: &str,
        storage_path: &str,
    ) -> Result<MemoryRecord, RepositoryError> {
        self.modify(memory_id, |r| r.model_3d_url = Some(storage_path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(id: &str) -> MemoryRecord {
        MemoryRecord {
            id: id.to_string(),
            user_id: Some("u1".to_string()),
            figurine_url: Some("u1/figurines/a.png".to_string()),
            status: None,
            model_3d_url: None,
        }
    }

    #[tokio::test]
    async fn records_status_transitions() {
        let repo = InMemoryMemoryRepository::new().with_memory(memory("m1"));

        repo.update_status("m1", MemoryStatus::Processing3d).await.unwrap();
        let updated = repo.update_status("m1", MemoryStatus::Completed).await.unwrap();

        assert_eq!(updated.status.as_deref(), Some("completed"));
        assert_eq!(
            repo.status_history("m1"),
            vec![MemoryStatus::Processing3d, MemoryStatus::Completed]
        );
    }

    #[tokio::test]
    async fn unknown_memory_is_not_found() {
        let repo = InMemoryMemoryRepository::new();
        assert!(repo.find("nope").await.unwrap().is_none());
        assert!(matches!(
            repo.set_model_path("nope", "x.stl").await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}

//! Concurrent in-memory entity storage with an optional secondary index.
//!
//! One `RwLock` guards both indexes so they can never disagree. Point reads
//! share the lock; writes and scan snapshots take it exclusively or for the
//! duration of the copy respectively.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use super::domain::{Evaluation, Report};
use super::repository::RepositoryError;

/// Records that can live in an [`EntityStore`].
pub trait Entity: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn assign_id(&mut self, id: String);
    fn touch(&mut self, now: DateTime<Utc>);

    /// Derived key for the secondary index, if the entity participates in one.
    fn secondary_key(&self) -> Option<&str> {
        None
    }
}

impl Entity for Report {
    fn id(&self) -> &str {
        &self.id.0
    }

    fn assign_id(&mut self, id: String) {
        self.id.0 = id;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}

impl Entity for Evaluation {
    fn id(&self) -> &str {
        &self.id.0
    }

    fn assign_id(&mut self, id: String) {
        self.id.0 = id;
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }

    fn secondary_key(&self) -> Option<&str> {
        Some(&self.report_id.0)
    }
}

struct Indexes<T> {
    primary: HashMap<String, T>,
    secondary: HashMap<String, String>,
}

impl<T: Entity> Indexes<T> {
    fn insert(&mut self, entity: T) {
        let id = entity.id().to_string();

        if let Some(previous) = self.primary.get(&id) {
            if let Some(old_key) = previous.secondary_key() {
                if entity.secondary_key() != Some(old_key)
                    && self.secondary.get(old_key) == Some(&id)
                {
                    self.secondary.remove(old_key);
                }
            }
        }

        if let Some(key) = entity.secondary_key() {
            // Last writer wins; the displaced entity stays reachable by id only.
            if let Some(displaced) = self.secondary.insert(key.to_string(), id.clone()) {
                if displaced != id {
                    warn!(
                        secondary_key = key,
                        displaced_id = %displaced,
                        id = %id,
                        "secondary index entry overwritten"
                    );
                }
            }
        }

        self.primary.insert(id, entity);
    }

    fn remove(&mut self, id: &str) -> Option<T> {
        let entity = self.primary.remove(id)?;
        if let Some(key) = entity.secondary_key() {
            if self.secondary.get(key).map(String::as_str) == Some(id) {
                self.secondary.remove(key);
            }
        }
        Some(entity)
    }
}

/// Thread-safe keyed storage shared by the repositories.
pub struct EntityStore<T> {
    inner: RwLock<Indexes<T>>,
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> EntityStore<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Indexes {
                primary: HashMap::new(),
                secondary: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Indexes<T>>, RepositoryError> {
        self.inner
            .read()
            .map_err(|_| RepositoryError::Unavailable("entity store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Indexes<T>>, RepositoryError> {
        self.inner
            .write()
            .map_err(|_| RepositoryError::Unavailable("entity store lock poisoned".to_string()))
    }

    /// Insert or overwrite, generating an id when absent and refreshing `updated_at`.
    pub fn put(&self, mut entity: T) -> Result<T, RepositoryError> {
        if entity.id().is_empty() {
            entity.assign_id(Uuid::new_v4().to_string());
        }
        entity.touch(Utc::now());

        let mut guard = self.write()?;
        guard.insert(entity.clone());
        Ok(entity)
    }

    pub fn get(&self, id: &str) -> Result<T, RepositoryError> {
        let guard = self.read()?;
        guard.primary.get(id).cloned().ok_or(RepositoryError::NotFound)
    }

    pub fn get_by_secondary_key(&self, key: &str) -> Result<T, RepositoryError> {
        let guard = self.read()?;
        guard
            .secondary
            .get(key)
            .and_then(|id| guard.primary.get(id))
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    pub fn delete(&self, id: &str) -> Result<T, RepositoryError> {
        let mut guard = self.write()?;
        guard.remove(id).ok_or(RepositoryError::NotFound)
    }

    /// Snapshot of every entity matching `predicate`, taken under one read lock.
    pub fn scan<P>(&self, predicate: P) -> Result<impl Iterator<Item = T>, RepositoryError>
    where
        P: Fn(&T) -> bool,
    {
        let guard = self.read()?;
        let snapshot: Vec<T> = guard
            .primary
            .values()
            .filter(|entity| predicate(entity))
            .cloned()
            .collect();
        Ok(snapshot.into_iter())
    }

    /// Read-modify-write of one entity inside a single critical section.
    ///
    /// The mutation is discarded when `mutate` fails.
    pub fn update<F, E>(&self, id: &str, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&mut T) -> Result<(), E>,
        E: From<RepositoryError>,
    {
        let mut guard = self.write()?;
        let mut entity = guard
            .primary
            .get(id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        mutate(&mut entity)?;
        entity.touch(Utc::now());
        guard.insert(entity.clone());
        Ok(entity)
    }

    /// Update the entity indexed under `key`, or create one, atomically.
    pub fn upsert_by_secondary_key<U, C>(
        &self,
        key: &str,
        update: U,
        create: C,
    ) -> Result<T, RepositoryError>
    where
        U: FnOnce(&mut T),
        C: FnOnce() -> T,
    {
        let now = Utc::now();
        let mut guard = self.write()?;
        let existing = guard
            .secondary
            .get(key)
            .and_then(|id| guard.primary.get(id))
            .cloned();

        let entity = match existing {
            Some(mut entity) => {
                update(&mut entity);
                entity.touch(now);
                entity
            }
            None => {
                let mut entity = create();
                if entity.id().is_empty() {
                    entity.assign_id(Uuid::new_v4().to_string());
                }
                entity.touch(now);
                entity
            }
        };

        guard.insert(entity.clone());
        Ok(entity)
    }

    pub fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.read()?.primary.len())
    }

    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.len()? == 0)
    }
}

//! Owner-scoped CRUD over the record stores.
//!
//! Every operation takes the caller's identity as an `Option`: a missing
//! identity is rejected before the store is touched, and every read or write
//! of an existing record goes through [`is_owner`].

use anyhow::Result as StoreResult;
use chrono::Utc;
use std::path::Path;

use crate::auth::Identity;
use crate::models::{Project, ProjectFields, Skill, SkillFields};
use crate::storage::{JsonStore, Record, RecordMeta};
use crate::validation::{level_in_range, ValidationErrors};

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("{kind} not found or unauthorized")]
    NotFoundOrUnauthorized { kind: &'static str },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type AccessResult<T> = Result<T, AccessError>;

/// A record kind owned by exactly one user.
pub trait OwnedEntity: Record {
    /// Display name used in errors and logs.
    const KIND: &'static str;
    /// File name of the collection inside the data directory.
    const FILE: &'static str;

    /// Validated mutable fields.
    type Fields: Send;

    fn build(meta: RecordMeta, fields: Self::Fields) -> Self;

    /// Replace every mutable field. Bookkeeping is left to the caller.
    fn replace(&mut self, fields: Self::Fields);

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Invariants re-checked at the point of persistence.
    fn check(_fields: &Self::Fields) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

impl OwnedEntity for Skill {
    const KIND: &'static str = "Skill";
    const FILE: &'static str = "skills.json";

    type Fields = SkillFields;

    fn build(meta: RecordMeta, fields: SkillFields) -> Self {
        Self {
            meta,
            name: fields.name,
            level: fields.level,
            tags: fields.tags,
        }
    }

    fn replace(&mut self, fields: SkillFields) {
        self.name = fields.name;
        self.level = fields.level;
        self.tags = fields.tags;
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn check(fields: &SkillFields) -> Result<(), ValidationErrors> {
        if level_in_range(i64::from(fields.level)) {
            return Ok(());
        }
        let mut errors = ValidationErrors::new();
        errors.add("level", "Level must be between 1 and 5");
        Err(errors)
    }
}

impl OwnedEntity for Project {
    const KIND: &'static str = "Project";
    const FILE: &'static str = "projects.json";

    type Fields = ProjectFields;

    fn build(meta: RecordMeta, fields: ProjectFields) -> Self {
        Self {
            meta,
            title: fields.title,
            description: fields.description,
            tech_stack: fields.tech_stack,
            link: fields.link,
        }
    }

    fn replace(&mut self, fields: ProjectFields) {
        self.title = fields.title;
        self.description = fields.description;
        self.tech_stack = fields.tech_stack;
        self.link = fields.link;
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

/// The single ownership check applied to every existing record.
pub fn is_owner<R: Record>(caller: &Identity, record: &R) -> bool {
    record.owner_id() == caller.user_id
}

fn require_identity(caller: Option<&Identity>) -> AccessResult<&Identity> {
    caller.ok_or(AccessError::Unauthenticated)
}

pub struct OwnedRecords<E> {
    store: JsonStore<E>,
}

impl<E: OwnedEntity> OwnedRecords<E> {
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        Ok(Self {
            store: JsonStore::open(data_dir.join(E::FILE))?,
        })
    }

    pub async fn list(&self, caller: Option<&Identity>) -> AccessResult<Vec<E>> {
        let caller = require_identity(caller)?;
        Ok(self.store.list_by_owner(&caller.user_id).await?)
    }

    /// `None` when the record is missing or belongs to someone else.
    pub async fn get(&self, caller: Option<&Identity>, id: &str) -> AccessResult<Option<E>> {
        let caller = require_identity(caller)?;
        let record = self.store.get(id).await?;
        Ok(record.filter(|r| is_owner(caller, r)))
    }

    pub async fn create(&self, caller: Option<&Identity>, fields: E::Fields) -> AccessResult<String> {
        let caller = require_identity(caller)?;
        E::check(&fields)?;

        let record = E::build(RecordMeta::new(&caller.user_id, Utc::now()), fields);
        let record = self.store.insert(record).await?;

        tracing::info!(kind = E::KIND, id = %record.id(), owner = %caller.user_id, "record created");
        Ok(record.id().to_string())
    }

    pub async fn update(
        &self,
        caller: Option<&Identity>,
        id: &str,
        fields: E::Fields,
    ) -> AccessResult<String> {
        let caller = require_identity(caller)?;
        E::check(&fields)?;

        let patched = self
            .store
            .patch_if(
                id,
                |r| is_owner(caller, r),
                |r| {
                    r.replace(fields);
                    r.meta_mut().touch(Utc::now());
                },
            )
            .await?;

        match patched {
            Some(record) => {
                tracing::info!(kind = E::KIND, id = %record.id(), owner = %caller.user_id, "record updated");
                Ok(record.id().to_string())
            }
            None => {
                tracing::warn!(kind = E::KIND, %id, caller = %caller.user_id, "update refused");
                Err(AccessError::NotFoundOrUnauthorized { kind: E::KIND })
            }
        }
    }

    pub async fn delete(&self, caller: Option<&Identity>, id: &str) -> AccessResult<String> {
        let caller = require_identity(caller)?;

        match self.store.delete_if(id, |r| is_owner(caller, r)).await? {
            Some(record) => {
                tracing::info!(kind = E::KIND, id = %record.id(), owner = %caller.user_id, "record deleted");
                Ok(record.id().to_string())
            }
            None => {
                tracing::warn!(kind = E::KIND, %id, caller = %caller.user_id, "delete refused");
                Err(AccessError::NotFoundOrUnauthorized { kind: E::KIND })
            }
        }
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Bookkeeping fields shared by every owned record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A record that can live in a [`JsonStore`].
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn meta(&self) -> &RecordMeta;

    fn id(&self) -> &str {
        &self.meta().id
    }

    fn owner_id(&self) -> &str {
        &self.meta().owner_id
    }
}

/// A collection of records persisted as a JSON array in a single file.
///
/// The in-memory copy is only replaced after the file write succeeds, so a
/// failed save leaves both the file and the collection as they were.
pub struct JsonStore<T> {
    path: PathBuf,
    records: RwLock<Vec<T>>,
}

impl<T: Record> JsonStore<T> {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = load_json(&path)?;

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub async fn insert(&self, record: T) -> Result<T> {
        let mut records = self.records.write().await;

        let mut next = records.clone();
        next.push(record.clone());
        save_json(&self.path, &next)?;

        *records = next;
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id() == id).cloned())
    }

    /// All records owned by `owner_id`, newest first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<T>> {
        let records = self.records.read().await;

        // Reversed insertion order keeps equal timestamps newest-first
        // through the stable sort.
        let mut owned: Vec<T> = records
            .iter()
            .rev()
            .filter(|r| r.owner_id() == owner_id)
            .cloned()
            .collect();

        owned.sort_by(|a, b| b.meta().created_at.cmp(&a.meta().created_at));
        Ok(owned)
    }

    /// Apply `apply` to the record with `id` if `guard` accepts it.
    ///
    /// Returns `None` when the record is missing or the guard refuses. The
    /// guard and the mutation run under the same write lock.
    pub async fn patch_if<G, F>(&self, id: &str, guard: G, apply: F) -> Result<Option<T>>
    where
        G: FnOnce(&T) -> bool,
        F: FnOnce(&mut T),
    {
        let mut records = self.records.write().await;

        let Some(index) = records.iter().position(|r| r.id() == id) else {
            return Ok(None);
        };
        if !guard(&records[index]) {
            return Ok(None);
        }

        let mut next = records.clone();
        apply(&mut next[index]);
        let patched = next[index].clone();
        save_json(&self.path, &next)?;

        *records = next;
        Ok(Some(patched))
    }

    /// Remove the record with `id` if `guard` accepts it.
    pub async fn delete_if<G>(&self, id: &str, guard: G) -> Result<Option<T>>
    where
        G: FnOnce(&T) -> bool,
    {
        let mut records = self.records.write().await;

        let Some(index) = records.iter().position(|r| r.id() == id) else {
            return Ok(None);
        };
        if !guard(&records[index]) {
            return Ok(None);
        }

        let mut next = records.clone();
        let removed = next.remove(index);
        save_json(&self.path, &next)?;

        *records = next;
        Ok(Some(removed))
    }
}

pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read storage file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse storage file {}", path.display()))
}

pub(crate) fn save_json<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("Failed to serialize records")?;

    // Write beside the target and rename so readers never see a torn file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .with_context(|| format!("Failed to write to storage file {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace storage file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        #[serde(flatten)]
        meta: RecordMeta,
        body: String,
    }

    impl Record for Note {
        fn meta(&self) -> &RecordMeta {
            &self.meta
        }
    }

    fn note(id: &str, owner: &str, created_at: DateTime<Utc>) -> Note {
        Note {
            meta: RecordMeta {
                id: id.to_string(),
                owner_id: owner.to_string(),
                created_at,
                updated_at: created_at,
            },
            body: format!("note {id}"),
        }
    }

    #[tokio::test]
    async fn list_by_owner_is_newest_first_and_filtered() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::<Note>::open(dir.path().join("notes.json")).unwrap();
        let t0 = Utc::now();

        store.insert(note("a", "alice", t0)).await.unwrap();
        store.insert(note("b", "bob", t0)).await.unwrap();
        store.insert(note("c", "alice", t0 + Duration::seconds(5))).await.unwrap();
        store.insert(note("d", "alice", t0)).await.unwrap();

        let ids: Vec<String> = store
            .list_by_owner("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.meta.id)
            .collect();
        assert_eq!(ids, vec!["c", "d", "a"]);
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.json");

        {
            let store = JsonStore::<Note>::open(&path).unwrap();
            store.insert(note("a", "alice", Utc::now())).await.unwrap();
        }

        let reopened = JsonStore::<Note>::open(&path).unwrap();
        let found = reopened.get("a").await.unwrap().expect("persisted note");
        assert_eq!(found.body, "note a");
    }

    #[tokio::test]
    async fn refused_guard_leaves_record_untouched() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::<Note>::open(dir.path().join("notes.json")).unwrap();
        store.insert(note("a", "alice", Utc::now())).await.unwrap();

        let patched = store
            .patch_if("a", |_| false, |n| n.body = "changed".into())
            .await
            .unwrap();
        assert!(patched.is_none());

        let deleted = store.delete_if("a", |_| false).await.unwrap();
        assert!(deleted.is_none());

        assert_eq!(store.get("a").await.unwrap().unwrap().body, "note a");
    }

    #[tokio::test]
    async fn failed_save_does_not_commit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("notes.json");
        let store = JsonStore::<Note>::open(&path).unwrap();

        let result = store.insert(note("a", "alice", Utc::now())).await;
        assert!(result.is_err());
        assert!(store.records.read().await.is_empty());
    }
}

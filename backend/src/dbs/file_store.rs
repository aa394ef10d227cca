use crate::dbs::DbResult;
use serde::{Serialize, de::DeserializeOwned};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Directory of pretty-printed JSON arrays, one file per collection.
///
/// Every read loads the whole file and every write replaces it. Callers are
/// responsible for serializing read-modify-write cycles.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens the store, creating the directory if it does not exist yet.
    pub async fn open(dir: impl AsRef<Path>) -> DbResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    /// Reads a collection. A collection that was never written is empty.
    pub async fn read<T: DeserializeOwned>(&self, collection: &str) -> DbResult<Vec<T>> {
        match tokio::fs::read_to_string(self.file_path(collection)).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn write<T: Serialize>(&self, collection: &str, items: &[T]) -> DbResult<()> {
        let content = serde_json::to_string_pretty(items)?;
        tokio::fs::write(self.file_path(collection), content).await?;
        tracing::debug!(collection, count = items.len(), "Collection written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn open_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("data");

        let store = FileStore::open(&dir).await.unwrap();

        assert!(dir.is_dir());
        assert_eq!(store.dir(), dir.as_path());
    }

    #[tokio::test]
    async fn missing_collection_reads_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();

        let items: Vec<Value> = store.read("characters").await.unwrap();

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn write_replaces_whole_collection_pretty_printed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();

        store
            .write("characters", &[json!({ "id": 1 }), json!({ "id": 2 })])
            .await
            .unwrap();
        store.write("characters", &[json!({ "id": 3 })]).await.unwrap();

        let items: Vec<Value> = store.read("characters").await.unwrap();
        assert_eq!(items, vec![json!({ "id": 3 })]);

        let raw = std::fs::read_to_string(tmp.path().join("characters.json")).unwrap();
        assert!(raw.contains('\n'));
    }

    #[tokio::test]
    async fn corrupt_collection_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("characters.json"), "not json").unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();

        let result: DbResult<Vec<Value>> = store.read("characters").await;

        assert!(matches!(result, Err(crate::dbs::DbError::Serde(_))));
    }
}

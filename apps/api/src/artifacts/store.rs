//! Directory-backed blob store for generated documents.
//!
//! Layout: one flat directory, one file per artifact named `<uuid>.<ext>`.
//! There is no index; the directory listing and each file's mtime are the only
//! metadata. Writes go to a `.staging-*` file in the same directory and are
//! renamed into place without clobbering, so readers never see a partial blob.
//!
//! The artifact id is also the capability embedded in the download link:
//! anyone holding the link can fetch the file until the sweeper evicts it.

use std::fmt;
use std::fs::{self, File, ReadDir};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const STAGING_PREFIX: &str = ".staging-";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found")]
    NotFound,

    #[error("artifact id {0} already exists")]
    Collision(ArtifactId),

    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Random, unguessable identifier. Doubles as storage key and download token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ArtifactId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Rendered PDF.
    Document,
    /// JSON export of the submitted record.
    DataExport,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Document, ArtifactKind::DataExport];

    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Document => "pdf",
            ArtifactKind::DataExport => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Document => "application/pdf",
            ArtifactKind::DataExport => "application/json",
        }
    }

    /// Filename suggested to the browser in `Content-Disposition`.
    pub fn download_filename(self) -> &'static str {
        match self {
            ArtifactKind::Document => "cv.pdf",
            ArtifactKind::DataExport => "cv_data.json",
        }
    }

    pub fn download_route(self) -> &'static str {
        match self {
            ArtifactKind::Document => "/download-pdf",
            ArtifactKind::DataExport => "/download-json",
        }
    }

    pub fn download_link(self, id: ArtifactId) -> String {
        format!("{}/{}", self.download_route(), id)
    }

    fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.extension() == ext)
    }
}

/// A stored artifact, read back in full.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub bytes: Bytes,
    pub created_at: DateTime<Utc>,
}

/// One row of a directory listing. Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredEntry {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    pub created_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens the store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under a freshly generated id and returns that id.
    pub async fn put(&self, bytes: Bytes, kind: ArtifactKind) -> Result<ArtifactId, StoreError> {
        let id = ArtifactId::generate();
        let store = self.clone();
        let size = bytes.len();

        tokio::task::spawn_blocking(move || store.write_blob(id, kind, &bytes)).await??;

        debug!("Stored artifact {id} ({kind:?}, {size} bytes)");
        Ok(id)
    }

    /// Reads an artifact. Does not extend its lifetime.
    pub async fn get(&self, id: ArtifactId) -> Result<Artifact, StoreError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.read_blob(id)).await?
    }

    /// Removes an artifact. Missing artifacts are treated as success.
    pub async fn delete(&self, id: ArtifactId) -> Result<(), StoreError> {
        for kind in ArtifactKind::ALL {
            match tokio::fs::remove_file(self.blob_path(id, kind)).await {
                Ok(()) => debug!("Deleted artifact {id}"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        Ok(())
    }

    /// Lazily enumerates stored artifacts. Call again to restart.
    ///
    /// Blocking; callers on the async runtime should run it via `spawn_blocking`.
    pub fn list_all(&self) -> Result<Entries, StoreError> {
        Ok(Entries {
            inner: fs::read_dir(&self.root)?,
        })
    }

    fn blob_path(&self, id: ArtifactId, kind: ArtifactKind) -> PathBuf {
        self.root.join(format!("{id}.{}", kind.extension()))
    }

    fn write_blob(&self, id: ArtifactId, kind: ArtifactKind, bytes: &[u8]) -> Result<(), StoreError> {
        let mut staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.root)?;
        staging.write_all(bytes)?;
        staging.as_file().sync_all()?;

        // A dropped PersistError removes the staging file.
        staging
            .persist_noclobber(self.blob_path(id, kind))
            .map_err(|e| match e.error.kind() {
                io::ErrorKind::AlreadyExists => StoreError::Collision(id),
                _ => StoreError::Io(e.error),
            })?;
        Ok(())
    }

    fn read_blob(&self, id: ArtifactId) -> Result<Artifact, StoreError> {
        for kind in ArtifactKind::ALL {
            // Metadata and content come from one handle, so an unlink that
            // lands after `open` cannot truncate what we return.
            let mut file = match File::open(self.blob_path(id, kind)) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::Io(e)),
            };
            let created_at = file.metadata()?.modified()?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;

            return Ok(Artifact {
                id,
                kind,
                bytes: Bytes::from(buf),
                created_at: created_at.into(),
            });
        }
        Err(StoreError::NotFound)
    }
}

/// Iterator returned by [`ArtifactStore::list_all`].
///
/// Skips staging and foreign files, and entries removed mid-scan.
pub struct Entries {
    inner: ReadDir,
}

impl Iterator for Entries {
    type Item = Result<StoredEntry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let dirent = match self.inner.next()? {
                Ok(dirent) => dirent,
                Err(e) => return Some(Err(StoreError::Io(e))),
            };

            let Some((id, kind)) = parse_blob_name(&dirent.file_name().to_string_lossy()) else {
                continue;
            };

            match dirent.metadata().and_then(|m| m.modified()) {
                Ok(modified) => {
                    return Some(Ok(StoredEntry {
                        id,
                        kind,
                        created_at: modified.into(),
                    }))
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Some(Err(StoreError::Io(e))),
            }
        }
    }
}

fn parse_blob_name(name: &str) -> Option<(ArtifactId, ArtifactKind)> {
    if name.starts_with(STAGING_PREFIX) {
        return None;
    }
    let (stem, ext) = name.rsplit_once('.')?;
    let kind = ArtifactKind::from_extension(ext)?;
    let id = stem.parse::<ArtifactId>().ok()?;
    // Only the canonical form we write ourselves counts as a blob.
    (id.to_string() == stem).then_some((id, kind))
}

/// Shifts an artifact's write timestamp into the past.
#[cfg(test)]
pub(crate) fn backdate(store: &ArtifactStore, id: ArtifactId, kind: ArtifactKind, by: std::time::Duration) {
    let file = File::options()
        .write(true)
        .open(store.blob_path(id, kind))
        .unwrap();
    file.set_modified(std::time::SystemTime::now() - by).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path().join("artifacts")).unwrap();
        (dir, store)
    }

    fn entry_count(store: &ArtifactStore) -> usize {
        store.list_all().unwrap().count()
    }

    #[tokio::test]
    async fn test_put_then_get_returns_same_bytes_and_kind() {
        let (_dir, store) = temp_store();

        for kind in ArtifactKind::ALL {
            let payload = Bytes::from(format!("payload for {kind:?}"));
            let id = store.put(payload.clone(), kind).await.unwrap();

            let artifact = store.get(id).await.unwrap();
            assert_eq!(artifact.id, id);
            assert_eq!(artifact.kind, kind);
            assert_eq!(artifact.bytes, payload);
        }
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_not_found() {
        let (_dir, store) = temp_store();
        store.put(Bytes::from_static(b"x"), ArtifactKind::Document).await.unwrap();

        let result = store.get(ArtifactId::generate()).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = temp_store();
        let id = store
            .put(Bytes::from_static(b"%PDF-1.7"), ArtifactKind::Document)
            .await
            .unwrap();

        store.delete(id).await.unwrap();
        store.delete(id).await.unwrap();
        store.delete(ArtifactId::generate()).await.unwrap();

        assert!(matches!(store.get(id).await, Err(StoreError::NotFound)));
        assert_eq!(entry_count(&store), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_puts_get_distinct_ids() {
        let (_dir, store) = temp_store();

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store.put(Bytes::from_static(b"first"), ArtifactKind::Document).await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store.put(Bytes::from_static(b"second"), ArtifactKind::Document).await
            })
        };

        let id_a = a.await.unwrap().unwrap();
        let id_b = b.await.unwrap().unwrap();
        assert_ne!(id_a, id_b);

        assert_eq!(store.get(id_a).await.unwrap().bytes, Bytes::from_static(b"first"));
        assert_eq!(store.get(id_b).await.unwrap().bytes, Bytes::from_static(b"second"));
        assert_eq!(entry_count(&store), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_get_racing_delete_sees_whole_artifact_or_nothing() {
        let (_dir, store) = temp_store();
        let payload = Bytes::from(
            (0..4 * 1024 * 1024)
                .map(|i| (i % 251) as u8)
                .collect::<Vec<u8>>(),
        );

        for _ in 0..50 {
            let id = store.put(payload.clone(), ArtifactKind::Document).await.unwrap();

            let deleter = {
                let store = store.clone();
                tokio::spawn(async move { store.delete(id).await })
            };
            let read = store.get(id).await;
            deleter.await.unwrap().unwrap();

            match read {
                Ok(artifact) => {
                    assert_eq!(artifact.bytes.len(), payload.len());
                    assert_eq!(artifact.bytes, payload);
                }
                Err(StoreError::NotFound) => {}
                Err(other) => panic!("unexpected read failure: {other}"),
            }
            assert!(matches!(store.get(id).await, Err(StoreError::NotFound)));
        }
        assert_eq!(entry_count(&store), 0);
    }

    #[tokio::test]
    async fn test_get_does_not_refresh_timestamp() {
        let (_dir, store) = temp_store();
        let id = store
            .put(Bytes::from_static(b"{}"), ArtifactKind::DataExport)
            .await
            .unwrap();
        backdate(&store, id, ArtifactKind::DataExport, std::time::Duration::from_secs(600));

        let first = store.get(id).await.unwrap().created_at;
        let second = store.get(id).await.unwrap().created_at;
        assert_eq!(first, second);
        assert!(Utc::now() - first >= chrono::Duration::seconds(599));
    }

    #[tokio::test]
    async fn test_list_all_skips_staging_and_foreign_files() {
        let (_dir, store) = temp_store();
        let id = store
            .put(Bytes::from_static(b"%PDF"), ArtifactKind::Document)
            .await
            .unwrap();

        fs::write(store.root().join(".staging-abc123"), b"partial").unwrap();
        fs::write(store.root().join("notes.txt"), b"hello").unwrap();
        fs::write(store.root().join(format!("{id}.exe")), b"nope").unwrap();

        let entries: Vec<StoredEntry> = store.list_all().unwrap().map(Result::unwrap).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].kind, ArtifactKind::Document);

        // Restartable: a second enumeration sees the same set.
        assert_eq!(entry_count(&store), 1);
    }

    #[tokio::test]
    async fn test_no_staging_files_left_after_put() {
        let (_dir, store) = temp_store();
        store.put(Bytes::from_static(b"data"), ArtifactKind::Document).await.unwrap();

        let leftovers = fs::read_dir(store.root())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("a").join("b").join("c");
        let store = ArtifactStore::open(&root).unwrap();
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_open_fails_when_root_is_a_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("occupied");
        fs::write(&path, b"").unwrap();
        assert!(ArtifactStore::open(&path).is_err());
    }

    #[test]
    fn test_parse_blob_name() {
        let id = ArtifactId::generate();
        assert_eq!(
            parse_blob_name(&format!("{id}.pdf")),
            Some((id, ArtifactKind::Document))
        );
        assert_eq!(
            parse_blob_name(&format!("{id}.json")),
            Some((id, ArtifactKind::DataExport))
        );
        assert_eq!(parse_blob_name(&format!(".staging-{id}.pdf")), None);
        assert_eq!(parse_blob_name("cv.pdf"), None);
        assert_eq!(parse_blob_name(&id.to_string()), None);
    }

    #[test]
    fn test_download_link_uses_kind_route() {
        let id = ArtifactId::generate();
        assert_eq!(
            ArtifactKind::Document.download_link(id),
            format!("/download-pdf/{id}")
        );
        assert_eq!(
            ArtifactKind::DataExport.download_link(id),
            format!("/download-json/{id}")
        );
    }
}

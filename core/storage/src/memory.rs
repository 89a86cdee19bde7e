//! In-memory Google Drive for testing.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use vaultdrive_common::{Error, Result};

use crate::gdrive::api::{
    ByteStream, DriveApi, DriveFile, FileList, NewFile, FOLDER_MIME_TYPE, ROOT_ID,
};
use crate::gdrive::query::{LiteralValue, Operator, QueryAtom, Term};

/// A request received by [`MemoryDrive`], recorded in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveCall {
    GetFile(String),
    ListFiles(String),
    Download(String),
    CreateFile(String),
    UpdateFile(String),
}

#[derive(Debug, Clone)]
struct StoredFile {
    file: DriveFile,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    files: HashMap<String, StoredFile>,
    calls: Vec<DriveCall>,
    last_version: u64,
    offline: bool,
}

impl State {
    fn bump_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }

    /// Record a request and fail it when offline.
    fn begin(&mut self, call: DriveCall) -> Result<()> {
        self.calls.push(call);
        if self.offline {
            return Err(Error::Network("Connection refused".to_string()));
        }
        Ok(())
    }

    fn file_mut(&mut self, file_id: &str) -> Result<&mut StoredFile> {
        self.files
            .get_mut(file_id)
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", file_id)))
    }
}

/// In-memory Drive.
///
/// Versions are drawn from a single counter, so every write produces a new
/// token. Downloads are split into chunks of `chunk_size` bytes and searches
/// return at most `page_size` results.
#[derive(Clone)]
pub struct MemoryDrive {
    state: Arc<Mutex<State>>,
    chunk_size: usize,
    page_size: usize,
}

impl MemoryDrive {
    /// Create an empty drive.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            chunk_size: 64 * 1024,
            page_size: 100,
        }
    }

    /// Serve downloads in chunks of `chunk_size` bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Return at most `page_size` results per search.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Add a file directly, bypassing the call log. Returns its ID.
    pub fn insert_file(&self, name: &str, parent_id: Option<&str>, data: Vec<u8>) -> String {
        self.insert(name, parent_id, "application/octet-stream", data)
    }

    /// Add a folder directly, bypassing the call log. Returns its ID.
    pub fn insert_folder(&self, name: &str, parent_id: Option<&str>) -> String {
        self.insert(name, parent_id, FOLDER_MIME_TYPE, Vec::new())
    }

    fn insert(
        &self,
        name: &str,
        parent_id: Option<&str>,
        mime_type: &str,
        data: Vec<u8>,
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let id = Uuid::new_v4().simple().to_string();
        let version = state.bump_version();
        let file = new_drive_file(&id, name, parent_id, mime_type, &data, version);
        state.files.insert(id.clone(), StoredFile { file, data });
        id
    }

    /// Simulate an edit by another client.
    pub fn modify_remotely(&self, file_id: &str, data: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let version = state.bump_version();
        let stored = state.file_mut(file_id)?;
        replace_content(stored, data, version);
        Ok(())
    }

    /// Current content of a file.
    pub fn content(&self, file_id: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.files.get(file_id).map(|f| f.data.clone())
    }

    /// Requests received so far.
    pub fn calls(&self) -> Vec<DriveCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Forget the recorded requests.
    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Make every request fail with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }
}

impl Default for MemoryDrive {
    fn default() -> Self {
        Self::new()
    }
}

fn new_drive_file(
    id: &str,
    name: &str,
    parent_id: Option<&str>,
    mime_type: &str,
    data: &[u8],
    version: String,
) -> DriveFile {
    let now = Utc::now();
    let is_folder = mime_type == FOLDER_MIME_TYPE;
    DriveFile {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        size: (!is_folder).then(|| data.len().to_string()),
        created_time: Some(now),
        modified_time: Some(now),
        parents: vec![parent_id.unwrap_or(ROOT_ID).to_string()],
        md5_checksum: None,
        version: Some(version),
        trashed: false,
    }
}

fn replace_content(stored: &mut StoredFile, data: Vec<u8>, version: String) {
    stored.file.size = Some(data.len().to_string());
    stored.file.modified_time = Some(Utc::now());
    stored.file.version = Some(version);
    stored.data = data;
}

/// The subset of the query language Drive searches here use.
#[derive(Debug)]
enum Filter {
    And(Box<Filter>, Box<Filter>),
    InParents(String),
    NameContains(String),
    NameEquals(String),
}

impl Filter {
    /// Compile a query, rejecting shapes this drive cannot evaluate.
    fn compile(term: &Term) -> Result<Self> {
        match (&term.left, term.op, &term.right) {
            (QueryAtom::Term(left), Operator::And, QueryAtom::Term(right)) => Ok(Filter::And(
                Box::new(Self::compile(left)?),
                Box::new(Self::compile(right)?),
            )),
            (QueryAtom::Literal(LiteralValue::Text(id)), Operator::In, QueryAtom::Field(field))
                if field == "parents" =>
            {
                Ok(Filter::InParents(id.clone()))
            }
            (
                QueryAtom::Field(field),
                Operator::Contains,
                QueryAtom::Literal(LiteralValue::Text(pattern)),
            ) if field == "name" => Ok(Filter::NameContains(pattern.clone())),
            (
                QueryAtom::Field(field),
                Operator::Equals,
                QueryAtom::Literal(LiteralValue::Text(name)),
            ) if field == "name" => Ok(Filter::NameEquals(name.clone())),
            _ => Err(Error::InvalidInput(format!("Unsupported query: {}", term))),
        }
    }

    fn matches(&self, file: &DriveFile) -> bool {
        match self {
            Filter::And(left, right) => left.matches(file) && right.matches(file),
            Filter::InParents(id) => file.parents.contains(id),
            Filter::NameContains(pattern) => file.name.contains(pattern.as_str()),
            Filter::NameEquals(name) => &file.name == name,
        }
    }
}

#[async_trait]
impl DriveApi for MemoryDrive {
    async fn get_file(&self, file_id: &str) -> Result<DriveFile> {
        let mut state = self.state.lock().unwrap();
        state.begin(DriveCall::GetFile(file_id.to_string()))?;
        Ok(state.file_mut(file_id)?.file.clone())
    }

    async fn list_files(&self, query: &Term) -> Result<FileList> {
        let mut state = self.state.lock().unwrap();
        state.begin(DriveCall::ListFiles(query.to_query()))?;

        let filter = Filter::compile(query)?;
        let mut files: Vec<DriveFile> = state
            .files
            .values()
            .filter(|stored| !stored.file.trashed && filter.matches(&stored.file))
            .map(|stored| stored.file.clone())
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let next_page_token = if files.len() > self.page_size {
            files.truncate(self.page_size);
            Some(Uuid::new_v4().simple().to_string())
        } else {
            None
        };

        Ok(FileList {
            files,
            next_page_token,
        })
    }

    async fn download_stream(&self, file_id: &str) -> Result<ByteStream> {
        let data = {
            let mut state = self.state.lock().unwrap();
            state.begin(DriveCall::Download(file_id.to_string()))?;
            state.file_mut(file_id)?.data.clone()
        };

        let chunks: Vec<Result<Bytes>> = data
            .chunks(self.chunk_size)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn create_file(&self, file: &NewFile, data: Vec<u8>) -> Result<DriveFile> {
        let mut state = self.state.lock().unwrap();
        state.begin(DriveCall::CreateFile(file.name.clone()))?;

        let id = Uuid::new_v4().simple().to_string();
        let version = state.bump_version();
        let mut created = new_drive_file(
            &id,
            &file.name,
            None,
            "application/octet-stream",
            &data,
            version,
        );
        if !file.parents.is_empty() {
            created.parents = file.parents.clone();
        }

        state.files.insert(
            id,
            StoredFile {
                file: created.clone(),
                data,
            },
        );
        Ok(created)
    }

    async fn update_file(&self, file_id: &str, data: Vec<u8>) -> Result<DriveFile> {
        let mut state = self.state.lock().unwrap();
        state.begin(DriveCall::UpdateFile(file_id.to_string()))?;

        let version = state.bump_version();
        let stored = state.file_mut(file_id)?;
        replace_content(stored, data, version);
        Ok(stored.file.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdrive::versioned::collect_stream;

    #[tokio::test]
    async fn test_insert_and_get() {
        let drive = MemoryDrive::new();
        let id = drive.insert_file("a.kdbx", None, b"abc".to_vec());

        let file = drive.get_file(&id).await.unwrap();
        assert_eq!(file.name, "a.kdbx");
        assert_eq!(file.parents, vec![ROOT_ID.to_string()]);
        assert_eq!(file.size_bytes(), Some(3));
        assert!(file.version.is_some());
        assert_eq!(drive.calls(), vec![DriveCall::GetFile(id)]);
    }

    #[tokio::test]
    async fn test_get_missing_file() {
        let drive = MemoryDrive::new();
        assert!(matches!(
            drive.get_file("nope").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_every_write_bumps_version() {
        let drive = MemoryDrive::new();
        let id = drive.insert_file("a.kdbx", None, b"1".to_vec());
        let v1 = drive.get_file(&id).await.unwrap().version;

        drive.modify_remotely(&id, b"2".to_vec()).unwrap();
        let v2 = drive.get_file(&id).await.unwrap().version;

        let v3 = drive.update_file(&id, b"3".to_vec()).await.unwrap().version;

        assert_ne!(v1, v2);
        assert_ne!(v2, v3);
    }

    #[tokio::test]
    async fn test_list_evaluates_query() {
        let drive = MemoryDrive::new();
        let folder = drive.insert_folder("Backups", None);
        drive.insert_file("pwsafe.kdbx", None, vec![]);
        drive.insert_file("old-pwsafe.kdbx", Some(folder.as_str()), vec![]);
        drive.insert_file("notes.txt", Some(folder.as_str()), vec![]);

        let in_root = drive.list_files(&Term::children_of(ROOT_ID)).await.unwrap();
        let names: Vec<_> = in_root.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Backups", "pwsafe.kdbx"]);

        let query = Term::name_contains("pwsafe") & Term::children_of(&folder);
        let found = drive.list_files(&query).await.unwrap();
        assert_eq!(found.files.len(), 1);
        assert_eq!(found.files[0].name, "old-pwsafe.kdbx");
        assert!(found.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_list_pages() {
        let drive = MemoryDrive::new().with_page_size(2);
        for name in ["a", "b", "c"] {
            drive.insert_file(name, None, vec![]);
        }

        let page = drive.list_files(&Term::children_of(ROOT_ID)).await.unwrap();
        assert_eq!(page.files.len(), 2);
        assert!(page.next_page_token.is_some());
    }

    #[tokio::test]
    async fn test_unsupported_query() {
        let drive = MemoryDrive::new();
        let query = Term::new(
            QueryAtom::field("mimeType"),
            Operator::Equals,
            QueryAtom::literal(FOLDER_MIME_TYPE),
        );
        assert!(matches!(
            drive.list_files(&query).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_query_rejected_regardless_of_contents() {
        let drive = MemoryDrive::new();
        drive.insert_file("pwsafe.kdbx", None, vec![]);

        let query = Term::children_of(ROOT_ID)
            & Term::new(
                QueryAtom::field("trashed"),
                Operator::Equals,
                QueryAtom::literal("false"),
            );
        assert!(matches!(
            drive.list_files(&query).await,
            Err(Error::InvalidInput(_))
        ));

        let empty = MemoryDrive::new();
        assert!(matches!(
            empty.list_files(&query).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_download_is_chunked() {
        let drive = MemoryDrive::new().with_chunk_size(4);
        let id = drive.insert_file("a.kdbx", None, b"0123456789".to_vec());

        let stream = drive.download_stream(&id).await.unwrap();
        assert_eq!(collect_stream(stream).await.unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_offline_records_and_fails() {
        let drive = MemoryDrive::new();
        let id = drive.insert_file("a.kdbx", None, b"x".to_vec());
        drive.set_offline(true);

        let result = drive.update_file(&id, b"y".to_vec()).await;
        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(drive.calls(), vec![DriveCall::UpdateFile(id.clone())]);
        assert_eq!(drive.content(&id).unwrap(), b"x");
    }
}

// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! User store abstraction with in-memory and flat-file implementations.
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use pinboard_common::{Principal, PrincipalId};
use serde::{Deserialize, Serialize};
use tokio::{fs as tokio_fs, sync::Mutex};
use tracing::{info, warn};

use crate::auth::password::salt_of;
use crate::error::AppError;

/// Highest id ever allocated by a flat-file store; ids are never reused
const LAST_ID_FILE: &str = "last_id";

/// Credential record as persisted by a user store
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: PrincipalId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// PHC string; embeds the per-record salt
    pub password_hash: String,
}

impl UserRecord {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            username: self.username.clone(),
        }
    }

    /// The salt recorded in `password_hash`
    pub fn salt(&self) -> Option<String> {
        salt_of(&self.password_hash)
    }
}

/// A user record before the store assigns it an id
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

impl NewUser {
    fn into_record(self, id: PrincipalId) -> UserRecord {
        UserRecord {
            id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            password_hash: self.password_hash,
        }
    }
}

/// Trait for user storage backends.
///
/// `create` fails with `AppError::Duplicate` when the username or the email
/// (compared case-insensitively) is taken; `get`, `get_by_username` and
/// `delete` fail with `AppError::NotFound` for unknown users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user and return it with its assigned id
    async fn create(&self, user: NewUser) -> Result<UserRecord, AppError>;

    async fn get(&self, id: PrincipalId) -> Result<UserRecord, AppError>;

    /// Case-sensitive lookup
    async fn get_by_username(&self, username: &str) -> Result<UserRecord, AppError>;

    async fn delete(&self, id: PrincipalId) -> Result<(), AppError>;
}

/// Uniqueness index shared by both implementations
#[derive(Default)]
struct UserIndex {
    next_id: PrincipalId,
    by_id: HashMap<PrincipalId, UserRecord>,
    by_username: HashMap<String, PrincipalId>,
    by_email: HashMap<String, PrincipalId>,
}

impl UserIndex {
    fn check_unique(&self, user: &NewUser) -> Result<(), AppError> {
        if self.by_username.contains_key(&user.username) {
            return Err(AppError::Duplicate("username already taken".to_string()));
        }
        if self.by_email.contains_key(&user.email.to_lowercase()) {
            return Err(AppError::Duplicate("email already registered".to_string()));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> PrincipalId {
        self.next_id += 1;
        self.next_id
    }

    fn insert(&mut self, record: UserRecord) {
        self.next_id = self.next_id.max(record.id);
        self.by_username.insert(record.username.clone(), record.id);
        self.by_email.insert(record.email.to_lowercase(), record.id);
        self.by_id.insert(record.id, record);
    }

    fn remove(&mut self, id: PrincipalId) -> Option<UserRecord> {
        let record = self.by_id.remove(&id)?;
        self.by_username.remove(&record.username);
        self.by_email.remove(&record.email.to_lowercase());
        Some(record)
    }

    fn get(&self, id: PrincipalId) -> Result<UserRecord, AppError> {
        self.by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))
    }

    fn get_by_username(&self, username: &str) -> Result<UserRecord, AppError> {
        self.by_username
            .get(username)
            .and_then(|id| self.by_id.get(id))
            .cloned()
            .ok_or_else(|| AppError::NotFound("user".to_string()))
    }
}

/// Process-local user store
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    index: Arc<RwLock<UserIndex>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let mut index = self.index.write();
        index.check_unique(&user)?;
        let id = index.allocate_id();
        let record = user.into_record(id);
        index.insert(record.clone());
        Ok(record)
    }

    async fn get(&self, id: PrincipalId) -> Result<UserRecord, AppError> {
        self.index.read().get(id)
    }

    async fn get_by_username(&self, username: &str) -> Result<UserRecord, AppError> {
        self.index.read().get_by_username(username)
    }

    async fn delete(&self, id: PrincipalId) -> Result<(), AppError> {
        self.index
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))
    }
}

/// Flat-file user store: one JSON document per user under `<root>/users/`.
///
/// The index is rebuilt from disk at startup. Writes are serialized by an
/// async mutex so the uniqueness check and the file write happen together.
/// The highest allocated id is persisted next to the records, so deleting
/// the newest user never frees its id.
#[derive(Clone)]
pub struct FlatFileUserStore {
    root: PathBuf,
    index: Arc<Mutex<UserIndex>>,
}

impl FlatFileUserStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, AppError> {
        let root = root.as_ref().join("users");
        fs::create_dir_all(&root)?;

        let mut index = UserIndex::default();
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<UserRecord>(&content) {
                Ok(record) => index.insert(record),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable user record"),
            }
        }
        let last_id_path = root.join(LAST_ID_FILE);
        if last_id_path.exists() {
            let content = fs::read_to_string(&last_id_path)?;
            let last_id = content.trim().parse::<PrincipalId>().map_err(|e| {
                AppError::Internal(format!("corrupt {}: {e}", last_id_path.display()))
            })?;
            index.next_id = index.next_id.max(last_id);
        }
        info!(users = index.by_id.len(), root = %root.display(), "loaded user store");

        Ok(Self {
            root,
            index: Arc::new(Mutex::new(index)),
        })
    }

    fn record_path(&self, id: PrincipalId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

/// Write then rename so a crash never leaves a half-written file. The temp
/// file is removed if either step fails.
async fn write_atomically(path: &Path, contents: String) -> Result<(), AppError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written = match tokio_fs::write(&tmp, contents).await {
        Ok(()) => tokio_fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(cleanup) = tokio_fs::remove_file(&tmp).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %cleanup, "failed to remove temp file");
            }
        }
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl UserStore for FlatFileUserStore {
    async fn create(&self, user: NewUser) -> Result<UserRecord, AppError> {
        let mut index = self.index.lock().await;
        index.check_unique(&user)?;
        let id = index.allocate_id();
        let record = user.into_record(id);

        write_atomically(&self.root.join(LAST_ID_FILE), id.to_string()).await?;
        let json = serde_json::to_string_pretty(&record)?;
        write_atomically(&self.record_path(id), json).await?;

        index.insert(record.clone());
        Ok(record)
    }

    async fn get(&self, id: PrincipalId) -> Result<UserRecord, AppError> {
        self.index.lock().await.get(id)
    }

    async fn get_by_username(&self, username: &str) -> Result<UserRecord, AppError> {
        self.index.lock().await.get_by_username(username)
    }

    async fn delete(&self, id: PrincipalId) -> Result<(), AppError> {
        let mut index = self.index.lock().await;
        if !index.by_id.contains_key(&id) {
            return Err(AppError::NotFound(format!("user {id}")));
        }
        match tokio_fs::remove_file(self.record_path(id)).await {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(e.into()),
        }
        index.remove(id);
        Ok(())
    }
}

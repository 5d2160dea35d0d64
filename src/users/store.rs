use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::{NewUser, Role, User, UserChanges};
use crate::config::write_locked;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username '{0}' already exists")]
    Conflict(String),

    #[error("failed to persist users to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse users file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize users: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistent user table.
pub trait UserStore: Send + Sync {
    fn get(&self, id: u64) -> Option<User>;
    fn get_by_username(&self, username: &str) -> Option<User>;
    /// All users by ascending id.
    fn list(&self) -> Vec<User>;
    fn count(&self) -> usize;
    /// Insert a user. A `None` role resolves to admin only when the store is empty.
    fn create(&self, new: NewUser) -> Result<User, StoreError>;
    /// Apply a partial update. `Ok(None)` if the id does not exist.
    fn update(&self, id: u64, changes: UserChanges) -> Result<Option<User>, StoreError>;
    /// Returns whether a user was removed.
    fn delete(&self, id: u64) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserTable {
    next_id: u64,
    users: Vec<User>,
}

/// [`UserStore`] backed by a JSON file, or purely in memory.
///
/// Mutations are applied to a copy of the table, persisted, then installed;
/// a failed write leaves the in-memory table unchanged.
pub struct JsonUserStore {
    table: RwLock<UserTable>,
    path: Option<PathBuf>,
}

impl JsonUserStore {
    pub fn in_memory() -> Self {
        Self {
            table: RwLock::new(UserTable {
                next_id: 1,
                users: Vec::new(),
            }),
            path: None,
        }
    }

    /// Open the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let table = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<UserTable>(&contents).map_err(|source| {
                StoreError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => UserTable {
                next_id: 1,
                users: Vec::new(),
            },
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        tracing::debug!(path = %path.display(), users = table.users.len(), "User store opened");
        Ok(Self {
            table: RwLock::new(table),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn persist(&self, table: &UserTable) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = serde_json::to_string_pretty(table)?;
        write_locked(path, contents.as_bytes()).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })
    }
}

impl UserStore for JsonUserStore {
    fn get(&self, id: u64) -> Option<User> {
        self.table.read().users.iter().find(|u| u.id == id).cloned()
    }

    fn get_by_username(&self, username: &str) -> Option<User> {
        self.table
            .read()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
    }

    fn list(&self) -> Vec<User> {
        self.table.read().users.clone()
    }

    fn count(&self) -> usize {
        self.table.read().users.len()
    }

    fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut table = self.table.write();
        if table.users.iter().any(|u| u.username == new.username) {
            return Err(StoreError::Conflict(new.username));
        }

        let role = new.role.unwrap_or(if table.users.is_empty() {
            Role::Admin
        } else {
            Role::User
        });
        let now = Utc::now();
        let user = User {
            id: table.next_id,
            username: new.username,
            password_hash: new.password_hash,
            role,
            created_at: now,
            updated_at: now,
        };

        let mut next = table.clone();
        next.next_id += 1;
        next.users.push(user.clone());
        self.persist(&next)?;
        *table = next;

        tracing::info!(user_id = user.id, username = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    fn update(&self, id: u64, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let mut table = self.table.write();
        let Some(index) = table.users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(username) = &changes.username {
            if table.users.iter().any(|u| u.id != id && &u.username == username) {
                return Err(StoreError::Conflict(username.clone()));
            }
        }

        let mut next = table.clone();
        let user = &mut next.users[index];
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        user.updated_at = Utc::now();
        let updated = user.clone();

        self.persist(&next)?;
        *table = next;

        tracing::info!(user_id = id, "User updated");
        Ok(Some(updated))
    }

    fn delete(&self, id: u64) -> Result<bool, StoreError> {
        let mut table = self.table.write();
        if !table.users.iter().any(|u| u.id == id) {
            return Ok(false);
        }

        let mut next = table.clone();
        next.users.retain(|u| u.id != id);
        self.persist(&next)?;
        *table = next;

        tracing::info!(user_id = id, "User deleted");
        Ok(true)
    }
}

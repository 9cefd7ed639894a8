//! File-backed store
//!
//! One file per key under a directory. File names are the hex-encoded key,
//! contents are `{expires_at_millis}\n{value}`. Writes go through a temp
//! file and are published with a rename (`set`) or a hard link
//! (`set_if_absent`), so readers never observe a half-written value and
//! create-if-absent stays atomic across processes. Reclaiming an expired
//! value is not atomic: two processes reclaiming the same expired key at
//! the same instant can both succeed.

use super::KvStore;
use crate::error::{MirrorError, MirrorResult};
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Store persisting each key as a file
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub async fn open(dir: PathBuf) -> MirrorResult<Self> {
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| MirrorError::io(format!("creating store directory {}", dir.display()), e))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.kv", hex::encode(key.as_bytes())))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.tmp", Uuid::new_v4()))
    }

    fn encode(value: &[u8], ttl: Duration) -> Vec<u8> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms);
        let mut contents = format!("{}\n", expires_at).into_bytes();
        contents.extend_from_slice(value);
        contents
    }

    /// Split a file into (expires_at_millis, value)
    fn decode(contents: &[u8]) -> Option<(i64, &[u8])> {
        let newline = contents.iter().position(|b| *b == b'\n')?;
        let header = std::str::from_utf8(&contents[..newline]).ok()?;
        let expires_at = header.trim().parse().ok()?;
        Some((expires_at, &contents[newline + 1..]))
    }

    /// Read the live value at `path`, removing it if it has expired
    async fn read_live(&self, path: &PathBuf) -> MirrorResult<Option<Vec<u8>>> {
        let contents = match fs::read(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(MirrorError::io(
                    format!("reading store file {}", path.display()),
                    e,
                ))
            }
        };

        let Some((expires_at, value)) = Self::decode(&contents) else {
            warn!("Removing malformed store file {}", path.display());
            remove_if_exists(path).await?;
            return Ok(None);
        };

        if Utc::now().timestamp_millis() >= expires_at {
            debug!("Store file {} expired", path.display());
            remove_if_exists(path).await?;
            return Ok(None);
        }

        Ok(Some(value.to_vec()))
    }

    async fn write_temp(&self, contents: &[u8]) -> MirrorResult<PathBuf> {
        let temp = self.temp_path();
        fs::write(&temp, contents)
            .await
            .map_err(|e| MirrorError::io(format!("writing store file {}", temp.display()), e))?;
        Ok(temp)
    }
}

async fn remove_if_exists(path: &PathBuf) -> MirrorResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MirrorError::io(
            format!("removing store file {}", path.display()),
            e,
        )),
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> MirrorResult<Option<Vec<u8>>> {
        self.read_live(&self.path_for(key)).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> MirrorResult<()> {
        let path = self.path_for(key);
        let temp = self.write_temp(&Self::encode(value, ttl)).await?;

        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(MirrorError::io(
                format!("publishing store file {}", path.display()),
                e,
            ));
        }
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Duration) -> MirrorResult<bool> {
        let path = self.path_for(key);

        // Clears an expired value so the link below can succeed
        if self.read_live(&path).await?.is_some() {
            return Ok(false);
        }

        let temp = self.write_temp(&Self::encode(value, ttl)).await?;
        let linked = fs::hard_link(&temp, &path).await;
        let _ = fs::remove_file(&temp).await;

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(MirrorError::io(
                format!("creating store file {}", path.display()),
                e,
            )),
        }
    }

    async fn delete(&self, key: &str) -> MirrorResult<()> {
        remove_if_exists(&self.path_for(key)).await
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

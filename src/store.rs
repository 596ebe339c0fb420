// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 会话存储
//!
//! 字符串到字符串的键值存储，供持久化页面缓存使用。
//! `SessionStore` 把全部键值对保存在一个 JSON 文件中，应用重启后仍然可用；
//! 删除该文件即视为会话结束。
//!
//! 写盘可以推迟：`set_deferred` 只更新内存并返回一个 `PendingWrite`，
//! 调用方在释放锁之后（通常在 `spawn_blocking` 中）再执行它。
//! 每次变更带一个递增的代数，较旧的快照不会覆盖较新的文件内容。

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use log::{debug, error, warn};

use crate::exception::Exception;

/// 键值存储接口
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), Exception>;
    fn remove(&mut self, key: &str) -> Result<(), Exception>;
    fn keys(&self) -> Vec<String>;

    /// 更新内存并把写盘工作交给调用方，默认实现立即写入
    fn set_deferred(&mut self, key: &str, value: &str) -> Result<Option<PendingWrite>, Exception> {
        self.set(key, value)?;
        Ok(None)
    }
}

/// 一次尚未落盘的会话文件快照
#[derive(Debug)]
pub struct PendingWrite {
    file: Arc<SessionFile>,
    generation: u64,
    text: String,
}

impl PendingWrite {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 写入快照。文件已包含更新的代数时直接跳过。
    pub fn write(self) -> Result<(), Exception> {
        self.file.write(self.generation, &self.text)
    }
}

#[derive(Debug)]
struct SessionFile {
    path: PathBuf,
    // 已落盘的最新代数，同时串行化所有写入
    written: Mutex<u64>,
}

impl SessionFile {
    fn write(&self, generation: u64, text: &str) -> Result<(), Exception> {
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        if *written >= generation {
            debug!("会话文件已有更新的内容，跳过第{}代快照", generation);
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|_| Exception::StoreIo)?;
            }
        }
        fs::write(&self.path, text).map_err(|e| {
            error!("写入会话文件{}失败：{}", self.path.display(), e);
            Exception::StoreIo
        })?;
        *written = generation;
        Ok(())
    }
}

/// 纯内存实现，主要用于测试
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Exception> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), Exception> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// 以 JSON 文件为后端的会话存储
#[derive(Debug)]
pub struct SessionStore {
    file: Arc<SessionFile>,
    entries: BTreeMap<String, String>,
    generation: u64,
}

impl SessionStore {
    /// 打开会话文件。文件不存在时从空存储开始，内容损坏时丢弃旧内容。
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(map) => map,
                Err(e) => {
                    warn!("会话文件{}内容无法解析，将重新开始：{}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => {
                debug!("会话文件{}不存在，使用空存储", path.display());
                BTreeMap::new()
            }
        };
        Self {
            file: Arc::new(SessionFile {
                path,
                written: Mutex::new(0),
            }),
            entries,
            generation: 0,
        }
    }

    // 为当前内容生成下一代快照
    fn snapshot(&mut self) -> Result<PendingWrite, Exception> {
        let text = serde_json::to_string_pretty(&self.entries).map_err(|_| Exception::StoreIo)?;
        self.generation += 1;
        Ok(PendingWrite {
            file: Arc::clone(&self.file),
            generation: self.generation,
            text,
        })
    }

    fn flush(&mut self) -> Result<(), Exception> {
        self.snapshot()?.write()
    }
}

impl KeyValueStore for SessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Exception> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), Exception> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn set_deferred(&mut self, key: &str, value: &str) -> Result<Option<PendingWrite>, Exception> {
        self.entries.insert(key.to_string(), value.to_string());
        self.snapshot().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_basic() {
        let mut store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a"), Some("1".to_string()));
        store.remove("a").unwrap();
        assert!(store.get("a").is_none());
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_session_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut store = SessionStore::open(&path);
        store.set("k", "<h1>v</h1>").unwrap();
        drop(store);

        let reopened = SessionStore::open(&path);
        assert_eq!(reopened.get("k"), Some("<h1>v</h1>".to_string()));
    }

    #[test]
    fn test_session_store_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let store = SessionStore::open(&path);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_session_store_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut store = SessionStore::open(&path);
        store.set("k", "v").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_deferred_write_lands_only_when_executed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut store = SessionStore::open(&path);
        let pending = store.set_deferred("k", "v").unwrap().expect("session store defers");
        assert_eq!(store.get("k"), Some("v".to_string()));
        assert!(!path.exists());

        pending.write().unwrap();
        assert_eq!(SessionStore::open(&path).get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_stale_snapshot_does_not_overwrite_newer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut store = SessionStore::open(&path);
        let older = store.set_deferred("a", "1").unwrap().unwrap();
        let newer = store.set_deferred("b", "2").unwrap().unwrap();
        assert!(newer.generation() > older.generation());

        newer.write().unwrap();
        older.write().unwrap();

        let reopened = SessionStore::open(&path);
        assert_eq!(reopened.get("a"), Some("1".to_string()));
        assert_eq!(reopened.get("b"), Some("2".to_string()));
    }

    #[test]
    fn test_memory_store_writes_immediately() {
        let mut store = MemoryStore::new();
        assert!(store.set_deferred("k", "v").unwrap().is_none());
        assert_eq!(store.get("k"), Some("v".to_string()));
    }
}

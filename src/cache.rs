use std::collections::HashMap;
use std::fmt;

use log::warn;

use crate::{
    param::CACHE_PREFIX,
    store::{KeyValueStore, PendingWrite},
};

/// 缓存内容的种类，同一页面的模板和脚本分别记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Template,
    Script,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Template => write!(f, "template"),
            ContentKind::Script => write!(f, "script"),
        }
    }
}

enum Backend {
    // 专用的内存表，重启即失效
    Transient(HashMap<(ContentKind, String), String>),
    // 会话存储中以 RouterCache: 为前缀的键
    Persistent(Box<dyn KeyValueStore>),
}

/// 页面模板与脚本的缓存。
///
/// 条目在第一次成功取回时写入，不过期也不淘汰，只能通过 `clear` 清空。
pub struct PageCache {
    backend: Backend,
}

impl PageCache {
    // 内存模式
    pub fn transient() -> Self {
        Self {
            backend: Backend::Transient(HashMap::new()),
        }
    }

    // 持久化模式
    pub fn persistent(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            backend: Backend::Persistent(store),
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, Backend::Persistent(_))
    }

    /// 生成持久化键：`RouterCache:<kind>:<page>`
    pub fn storage_key(page: &str, kind: ContentKind) -> String {
        format!("{}:{}:{}", CACHE_PREFIX, kind, page)
    }

    // 查询
    pub fn get(&self, page: &str, kind: ContentKind) -> Option<String> {
        match &self.backend {
            Backend::Transient(map) => map.get(&(kind, page.to_string())).cloned(),
            Backend::Persistent(store) => store.get(&Self::storage_key(page, kind)),
        }
    }

    // 放入
    pub fn put(&mut self, page: &str, kind: ContentKind, text: &str) {
        match &mut self.backend {
            Backend::Transient(map) => {
                map.insert((kind, page.to_string()), text.to_string());
            }
            Backend::Persistent(store) => {
                // 写盘失败不影响本次导航，只是下次需要重新取回
                if let Err(e) = store.set(&Self::storage_key(page, kind), text) {
                    warn!("无法持久化{}的{}缓存：{}", page, kind, e);
                }
            }
        }
    }

    /// 与 `put` 相同，但持久化模式下把写盘交给调用方，以便在锁外执行
    pub fn put_deferred(&mut self, page: &str, kind: ContentKind, text: &str) -> Option<PendingWrite> {
        match &mut self.backend {
            Backend::Transient(map) => {
                map.insert((kind, page.to_string()), text.to_string());
                None
            }
            Backend::Persistent(store) => match store.set_deferred(&Self::storage_key(page, kind), text) {
                Ok(pending) => pending,
                Err(e) => {
                    warn!("无法持久化{}的{}缓存：{}", page, kind, e);
                    None
                }
            },
        }
    }

    // 清空
    pub fn clear(&mut self) {
        match &mut self.backend {
            Backend::Transient(map) => map.clear(),
            Backend::Persistent(store) => {
                let prefix = format!("{}:", CACHE_PREFIX);
                for key in store.keys() {
                    if key.starts_with(&prefix) {
                        if let Err(e) = store.remove(&key) {
                            warn!("无法移除缓存键{}：{}", key, e);
                        }
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.backend {
            Backend::Transient(map) => map.len(),
            Backend::Persistent(store) => {
                let prefix = format!("{}:", CACHE_PREFIX);
                store.keys().iter().filter(|k| k.starts_with(&prefix)).count()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

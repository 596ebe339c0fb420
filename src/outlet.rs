// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 渲染目标
//!
//! `Outlet` 是所有导航共享的输出区域，保存当前页面的 HTML 以及水合阶段绑定的动作。
//!
//! 每次路由变更都会通过 `begin` 领取一个单调递增的序号，并得到一个 `Frame`。
//! 只有序号仍是最新请求的 `Frame` 才能写入：较早发起、较晚完成的导航会被丢弃，
//! 因此"最后一次请求"的页面总是最终结果。

use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use log::debug;

use crate::exception::Exception;

pub type ActionFuture = Pin<Box<dyn Future<Output = Result<(), Exception>> + Send>>;

/// 水合时绑定到页面上的动作，参数为 `key=value` 形式的输入
pub type Action = Arc<dyn Fn(BTreeMap<String, String>) -> ActionFuture + Send + Sync>;

#[derive(Default)]
struct Surface {
    html: String,
    committed: u64,
    actions: BTreeMap<String, Action>,
}

#[derive(Default)]
pub struct Outlet {
    surface: Mutex<Surface>,
    latest: AtomicU64,
}

impl Outlet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 为一次新的导航领取序号
    pub fn begin(self: &Arc<Self>) -> Frame {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        Frame {
            outlet: Arc::clone(self),
            seq,
        }
    }

    /// 最近一次请求的序号
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// 当前内容来自哪一次导航，0 表示尚未渲染
    pub fn committed(&self) -> u64 {
        self.lock().committed
    }

    pub fn html(&self) -> String {
        self.lock().html.clone()
    }

    pub fn action(&self, name: &str) -> Option<Action> {
        self.lock().actions.get(name).cloned()
    }

    pub fn action_names(&self) -> Vec<String> {
        self.lock().actions.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Surface> {
        self.surface.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 一次导航持有的写入句柄
#[derive(Clone)]
pub struct Frame {
    outlet: Arc<Outlet>,
    seq: u64,
}

impl Frame {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_current(&self) -> bool {
        self.outlet.latest() == self.seq
    }

    /// 写入页面内容并清空旧页面的动作。已过期时丢弃并返回 `false`。
    pub fn render(&self, html: impl Into<String>) -> bool {
        if !self.is_current() {
            debug!("[NAV{}]导航已过期，丢弃渲染结果", self.seq);
            return false;
        }
        let mut surface = self.outlet.lock();
        surface.html = html.into();
        surface.committed = self.seq;
        surface.actions.clear();
        true
    }

    /// 绑定一个动作。已过期或页面尚未由本次导航渲染时忽略。
    pub fn bind<F, Fut>(&self, name: &str, action: F) -> bool
    where
        F: Fn(BTreeMap<String, String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Exception>> + Send + 'static,
    {
        let mut surface = self.outlet.lock();
        if surface.committed != self.seq || !self.is_current() {
            debug!("[NAV{}]页面已被替换，忽略动作{}", self.seq, name);
            return false;
        }
        let action: Action = Arc::new(move |args| Box::pin(action(args)) as ActionFuture);
        surface.actions.insert(name.to_string(), action);
        true
    }

    pub fn outlet(&self) -> &Arc<Outlet> {
        &self.outlet
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 导航模型
//!
//! 维护当前 URL 与浏览历史，并负责：
//! - 从查询字符串推导出当前路由（页面名 + 参数表）。
//! - 在程序化导航时按白名单规则改写查询字符串并压入历史。
//! - 通过广播通道发布路由变更事件。程序化导航、前进后退、重新加载都走同一个通道，
//!   路由器只需订阅这一处。

use std::{collections::BTreeMap, sync::Mutex};

use chrono::{DateTime, Local};
use log::{debug, info};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use url::Url;

use crate::exception::Exception;

/// 广播通道容量。路由器落后超过该数量的事件时会丢弃最旧的事件。
const CHANNEL_CAPACITY: usize = 64;

/// 由 URL 推导出的路由
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// 页面名，缺省时为默认页面
    pub page: String,
    /// 全部查询参数（包含 `page`）
    pub params: BTreeMap<String, String>,
    /// 随历史记录保存的状态对象，不出现在 URL 中
    pub state: Value,
}

impl Route {
    /// 解析 URL 的查询字符串。重复出现的键以最后一次为准。
    pub fn from_url(url: &Url, default_page: &str) -> Self {
        let mut params: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        let page = match params.get("page") {
            Some(p) if !p.is_empty() => p.clone(),
            _ => {
                params.insert("page".to_string(), default_page.to_string());
                default_page.to_string()
            }
        };
        Self {
            page,
            params,
            state: Value::Null,
        }
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    /// 生成模板参数：查询参数全部作为字符串，状态对象中的键覆盖同名参数
    pub fn template_params(&self) -> Value {
        let mut map: Map<String, Value> = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        if let Value::Object(state) = &self.state {
            for (k, v) in state {
                map.insert(k.clone(), v.clone());
            }
        }
        Value::Object(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }
}

/// 触发路由变更的原因
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavigationType {
    /// 应用启动
    Initial,
    /// 程序化导航
    Push,
    /// 前进或后退
    Pop,
    /// 重新加载当前页面
    Reload,
}

/// 路由变更事件
#[derive(Debug, Clone)]
pub struct RouteChange {
    pub url: Url,
    pub state: Value,
    pub kind: NavigationType,
}

impl RouteChange {
    pub fn route(&self, default_page: &str) -> Route {
        Route::from_url(&self.url, default_page).with_state(self.state.clone())
    }
}

/// `navigate` 的选项
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigateOptions {
    /// 为真时保留不在白名单中的现有参数
    pub preserve_params: bool,
}

impl NavigateOptions {
    pub fn preserve() -> Self {
        Self {
            preserve_params: true,
        }
    }
}

/// 一条历史记录
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub url: Url,
    pub state: Value,
    pub at: DateTime<Local>,
}

struct History {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl History {
    fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }
}

pub struct Navigator {
    history: Mutex<History>,
    sender: broadcast::Sender<RouteChange>,
    default_page: String,
}

impl Navigator {
    pub fn new(start_url: &str, default_page: &str) -> Result<Self, Exception> {
        let url = Url::parse(start_url).map_err(|_| Exception::InvalidUrl)?;
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Ok(Self {
            history: Mutex::new(History {
                entries: vec![HistoryEntry {
                    url,
                    state: Value::Null,
                    at: Local::now(),
                }],
                index: 0,
            }),
            sender,
            default_page: default_page.to_string(),
        })
    }

    /// 订阅路由变更事件
    pub fn subscribe(&self) -> broadcast::Receiver<RouteChange> {
        self.sender.subscribe()
    }

    pub fn default_page(&self) -> &str {
        &self.default_page
    }

    pub fn current_url(&self) -> Url {
        self.lock().current().url.clone()
    }

    pub fn current_route(&self) -> Route {
        let history = self.lock();
        let entry = history.current();
        Route::from_url(&entry.url, &self.default_page).with_state(entry.state.clone())
    }

    /// 程序化导航。
    ///
    /// 白名单为 `{"page"} ∪ params 的键`。未设置 `preserve_params` 时，
    /// 现有查询参数中不在白名单内的键全部丢弃；随后逐个应用 `params`：
    /// `None` 删除该键，`Some` 设置该键。新 URL 压入历史并发布事件。
    pub fn navigate(&self, params: &[(&str, Option<&str>)], options: NavigateOptions) -> Url {
        self.navigate_with_state(params, options, Value::Null)
    }

    /// 与 `navigate` 相同，但为新的历史记录附带一个状态对象
    pub fn navigate_with_state(
        &self,
        params: &[(&str, Option<&str>)],
        options: NavigateOptions,
        state: Value,
    ) -> Url {
        let url = {
            let mut history = self.lock();
            let current = history.current().url.clone();

            let mut pairs: Vec<(String, String)> = current
                .query_pairs()
                .into_owned()
                .filter(|(key, _)| {
                    options.preserve_params
                        || key == "page"
                        || params.iter().any(|(k, _)| k == key)
                })
                .collect();

            for (key, value) in params {
                match value {
                    None => pairs.retain(|(k, _)| k != key),
                    Some(v) => match pairs.iter_mut().find(|(k, _)| k == key) {
                        Some(pair) => pair.1 = v.to_string(),
                        None => pairs.push((key.to_string(), v.to_string())),
                    },
                }
            }

            let url = with_query(&current, &pairs);

            // 压入新记录时丢弃所有"前进"方向的记录
            let next = history.index + 1;
            history.entries.truncate(next);
            history.entries.push(HistoryEntry {
                url: url.clone(),
                state: state.clone(),
                at: Local::now(),
            });
            history.index = next;
            url
        };
        info!("导航至 {}", url);
        self.publish(url.clone(), state, NavigationType::Push);
        url
    }

    /// 后退一步，已在最早记录时返回 `false`
    pub fn back(&self) -> bool {
        self.step(-1)
    }

    /// 前进一步，已在最新记录时返回 `false`
    pub fn forward(&self) -> bool {
        self.step(1)
    }

    /// 对当前 URL 重新发布一次事件，不改动历史
    pub fn reload(&self) {
        let (url, state) = self.current_entry();
        self.publish(url, state, NavigationType::Reload);
    }

    /// 发布启动事件
    pub fn start(&self) {
        let (url, state) = self.current_entry();
        self.publish(url, state, NavigationType::Initial);
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().entries.clone()
    }

    pub fn history_position(&self) -> usize {
        self.lock().index
    }

    fn step(&self, delta: isize) -> bool {
        {
            let mut history = self.lock();
            let target = history.index as isize + delta;
            if target < 0 || target as usize >= history.entries.len() {
                return false;
            }
            history.index = target as usize;
        }
        let (url, state) = self.current_entry();
        self.publish(url, state, NavigationType::Pop);
        true
    }

    fn current_entry(&self) -> (Url, Value) {
        let history = self.lock();
        let entry = history.current();
        (entry.url.clone(), entry.state.clone())
    }

    fn publish(&self, url: Url, state: Value, kind: NavigationType) {
        if self.sender.send(RouteChange { url, state, kind }).is_err() {
            debug!("没有订阅者，{:?}事件被忽略", kind);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, History> {
        // 临界区内不会 panic，锁中毒时直接沿用内部数据
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn with_query(base: &Url, pairs: &[(String, String)]) -> Url {
    let mut url = base.clone();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }
    url
}

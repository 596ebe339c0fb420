// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由器
//!
//! 负责把一次路由变更从头到尾处理完：
//!
//! 1. 由导航模型得到路由（页面名 + 参数）。
//! 2. 查找该页面注册的处理器。
//! 3. 取模板：命中缓存直接使用，否则从页面源取回并写入缓存。
//! 4. 以同样方式取伴随脚本，取不到视为"没有脚本"。
//! 5. 构建水合闭包 `Hydrate`。
//! 6. 有处理器时交给处理器，由它负责渲染与水合；
//!    否则用模板引擎渲染、写入 `Outlet` 并自动水合。
//! 7. 模板取回失败时生成错误页面，按第 6 步同样处理，但默认路径不自动水合。
//!
//! 所有注册表都是 `Router` 的字段，在启动时构造，不存在全局单例。
//! 页面的交互逻辑来自静态注册的 `PageScript`，伴随脚本文本只作为数据传给它，
//! 从不被当作代码执行。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, RwLock},
};

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::json;
use tokio::{sync::broadcast::error::RecvError, task::JoinSet};

use crate::{
    cache::{ContentKind, PageCache},
    exception::Exception,
    navigation::{Navigator, Route, RouteChange},
    outlet::{Frame, Outlet},
    param::ERROR_TEMPLATE,
    source::PageSource,
    store::PendingWrite,
    template,
};

/// 交给页面处理器的全部上下文
pub struct PageContext {
    /// 模板文本；取回失败时为错误页面文本
    pub template: String,
    /// 模板是否取回失败
    pub failed: bool,
    pub route: Route,
    pub hydrate: Hydrate,
    pub frame: Frame,
}

/// 页面处理器：接管某个页面的渲染
#[async_trait]
pub trait PageHandler: Send + Sync {
    async fn handle(&self, page: PageContext);
}

/// 水合阶段执行的页面逻辑，静态链接，按页面名查找
pub trait PageScript: Send + Sync {
    fn hydrate(&self, ctx: &ScriptContext<'_>);
}

pub struct ScriptContext<'a> {
    pub route: &'a Route,
    pub frame: &'a Frame,
    /// 取回的伴随脚本文本（如果有）
    pub script: Option<&'a str>,
}

/// 每次导航构建一个的水合闭包。重复调用会重复执行同一段页面逻辑。
#[derive(Clone)]
pub struct Hydrate {
    route: Route,
    frame: Frame,
    script: Option<Arc<str>>,
    behavior: Option<Arc<dyn PageScript>>,
}

impl Hydrate {
    pub fn call(&self) {
        match &self.behavior {
            Some(behavior) => {
                debug!("[NAV{}]水合页面{}", self.frame.seq(), self.route.page);
                behavior.hydrate(&ScriptContext {
                    route: &self.route,
                    frame: &self.frame,
                    script: self.script.as_deref(),
                });
            }
            None if self.script.is_some() => {
                debug!(
                    "[NAV{}]页面{}有伴随脚本但没有注册页面逻辑，跳过",
                    self.frame.seq(),
                    self.route.page
                );
            }
            None => {}
        }
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn is_noop(&self) -> bool {
        self.behavior.is_none()
    }
}

pub struct Router {
    navigator: Arc<Navigator>,
    source: Arc<dyn PageSource>,
    cache: Mutex<PageCache>,
    handlers: RwLock<HashMap<String, Arc<dyn PageHandler>>>,
    scripts: RwLock<HashMap<String, Arc<dyn PageScript>>>,
    outlet: Arc<Outlet>,
    error_template: String,
}

impl Router {
    pub fn new(navigator: Arc<Navigator>, source: Arc<dyn PageSource>, cache: PageCache) -> Self {
        Self {
            navigator,
            source,
            cache: Mutex::new(cache),
            handlers: RwLock::new(HashMap::new()),
            scripts: RwLock::new(HashMap::new()),
            outlet: Outlet::new(),
            error_template: ERROR_TEMPLATE.to_string(),
        }
    }

    /// 替换模板取回失败时使用的错误页面，可使用 `<< page >>` 与 `<< error >>`
    pub fn with_error_template(mut self, template: &str) -> Self {
        self.error_template = template.to_string();
        self
    }

    /// 注册页面处理器，重复注册直接覆盖
    pub fn register_handler(&self, page: &str, handler: Arc<dyn PageHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.insert(page.to_string(), handler);
    }

    /// 注册页面逻辑，重复注册直接覆盖
    pub fn register_script(&self, page: &str, script: Arc<dyn PageScript>) {
        let mut scripts = self.scripts.write().unwrap_or_else(|e| e.into_inner());
        scripts.insert(page.to_string(), script);
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    pub fn outlet(&self) -> &Arc<Outlet> {
        &self.outlet
    }

    pub fn cached_entries(&self) -> usize {
        self.cache_lock().len()
    }

    pub fn clear_cache(&self) {
        self.cache_lock().clear();
        info!("页面缓存已清空");
    }

    /// 发布启动事件。需要先有订阅者（通常是 `run`）。
    pub fn init(&self) {
        self.navigator.start();
    }

    /// 事件循环：订阅导航事件并为每个事件启动一个独立的解析任务。
    ///
    /// 任务之间不做排队或取消，过期结果由 `Outlet` 的序号拦截。
    /// 解析任务归本循环所有：循环退出或被中止时，尚未完成的任务随之中止。
    pub async fn run(self: Arc<Self>) {
        let mut receiver = self.navigator.subscribe();
        let mut tasks = JoinSet::new();
        self.init();
        loop {
            tokio::select! {
                received = receiver.recv() => match received {
                    Ok(change) => {
                        let router = Arc::clone(&self);
                        tasks.spawn(async move {
                            router.resolve(change).await;
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("路由器处理过慢，丢弃了{}个导航事件", skipped);
                    }
                    Err(RecvError::Closed) => {
                        info!("导航通道已关闭，路由器退出");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            warn!("导航解析任务崩溃：{}", e);
                        }
                    }
                }
            }
        }
        tasks.shutdown().await;
    }

    /// 处理一次路由变更，返回本次导航的序号
    pub async fn resolve(&self, change: RouteChange) -> u64 {
        let frame = self.outlet.begin();
        let seq = frame.seq();
        let route = change.route(self.navigator.default_page());
        debug!("[NAV{}]{:?} {}", seq, change.kind, change.url);

        let handler = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers.get(&route.page).cloned()
        };
        let behavior = {
            let scripts = self.scripts.read().unwrap_or_else(|e| e.into_inner());
            scripts.get(&route.page).cloned()
        };

        let template = self.resolve_template(&route.page, seq).await;
        let script = self.resolve_script(&route.page, seq).await;

        let hydrate = Hydrate {
            route: route.clone(),
            frame: frame.clone(),
            script: script.map(Arc::from),
            behavior,
        };

        let (text, failed) = match template {
            Ok(text) => (text, false),
            Err(e) => {
                warn!("[NAV{}]页面{}的模板取回失败：{}", seq, route.page, e);
                let body = template::render(
                    &self.error_template,
                    &json!({ "page": route.page, "error": e.to_string() }),
                );
                (body, true)
            }
        };

        match handler {
            Some(handler) => {
                debug!("[NAV{}]交给页面处理器{}", seq, route.page);
                handler
                    .handle(PageContext {
                        template: text,
                        failed,
                        route,
                        hydrate,
                        frame,
                    })
                    .await;
            }
            None => {
                let html = template::render(&text, &route.template_params());
                if frame.render(html) && !failed {
                    hydrate.call();
                }
            }
        }
        debug!("[NAV{}]导航处理完毕", seq);
        seq
    }

    async fn resolve_template(&self, page: &str, seq: u64) -> Result<String, Exception> {
        let cached = self.cache_lock().get(page, ContentKind::Template);
        if let Some(text) = cached {
            debug!("[NAV{}]模板{}命中缓存", seq, page);
            return Ok(text);
        }
        let text = self.source.fetch_template(page).await?;
        let pending = self.cache_lock().put_deferred(page, ContentKind::Template, &text);
        persist(pending, seq).await;
        Ok(text)
    }

    async fn resolve_script(&self, page: &str, seq: u64) -> Option<String> {
        let cached = self.cache_lock().get(page, ContentKind::Script);
        if cached.is_some() {
            debug!("[NAV{}]脚本{}命中缓存", seq, page);
            return cached;
        }
        match self.source.fetch_script(page).await {
            Ok(Some(text)) => {
                let pending = self.cache_lock().put_deferred(page, ContentKind::Script, &text);
                persist(pending, seq).await;
                Some(text)
            }
            Ok(None) => None,
            Err(e) => {
                debug!("[NAV{}]脚本{}取回失败，视为没有脚本：{}", seq, page, e);
                None
            }
        }
    }

    fn cache_lock(&self) -> MutexGuard<'_, PageCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// 会话文件在阻塞线程池中写入，不占用缓存锁和运行时线程
async fn persist(pending: Option<PendingWrite>, seq: u64) {
    let Some(pending) = pending else {
        return;
    };
    match tokio::task::spawn_blocking(move || pending.write()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("[NAV{}]缓存写盘失败：{}", seq, e),
        Err(e) => warn!("[NAV{}]缓存写盘任务异常退出：{}", seq, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::NavigateOptions;
    use mockall::{mock, predicate::eq};
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        pub Source {}

        #[async_trait]
        impl PageSource for Source {
            async fn fetch_template(&self, page: &str) -> Result<String, Exception>;
            async fn fetch_script(&self, page: &str) -> Result<Option<String>, Exception>;
        }
    }

    fn router_with(source: MockSource, query: &str) -> Router {
        let navigator = Navigator::new(&format!("http://localhost/{}", query), "home").unwrap();
        Router::new(Arc::new(navigator), Arc::new(source), PageCache::transient())
    }

    fn push(router: &Router, params: &[(&str, Option<&str>)]) -> RouteChange {
        let mut rx = router.navigator().subscribe();
        router.navigator().navigate(params, NavigateOptions::default());
        rx.try_recv().unwrap()
    }

    struct CountingScript(Arc<AtomicUsize>);

    impl PageScript for CountingScript {
        fn hydrate(&self, ctx: &ScriptContext<'_>) {
            self.0.fetch_add(1, Ordering::SeqCst);
            ctx.frame.bind("ping", |_| async { Ok(()) });
        }
    }

    #[tokio::test]
    async fn test_template_fetched_once_then_cached() {
        let mut source = MockSource::new();
        source
            .expect_fetch_template()
            .with(eq("car"))
            .times(1)
            .returning(|_| Ok("<h1>Car << id >></h1>".to_string()));
        source.expect_fetch_script().times(1).returning(|_| Ok(None));

        let router = router_with(source, "");
        let change = push(&router, &[("page", Some("car")), ("id", Some("5"))]);
        router.resolve(change.clone()).await;
        assert_eq!(router.outlet().html(), "<h1>Car 5</h1>");

        router.resolve(change).await;
        assert_eq!(router.outlet().html(), "<h1>Car 5</h1>");
        assert_eq!(router.cached_entries(), 1);
    }

    #[tokio::test]
    async fn test_script_is_cached_and_hydrates() {
        let mut source = MockSource::new();
        source
            .expect_fetch_template()
            .returning(|_| Ok("<p>x</p>".to_string()));
        source
            .expect_fetch_script()
            .times(1)
            .returning(|_| Ok(Some("wire()".to_string())));

        let router = router_with(source, "?page=home");
        let count = Arc::new(AtomicUsize::new(0));
        router.register_script("home", Arc::new(CountingScript(Arc::clone(&count))));

        let change = push(&router, &[("page", Some("home"))]);
        router.resolve(change.clone()).await;
        router.resolve(change).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(router.cached_entries(), 2);
        assert!(router.outlet().action("ping").is_some());
    }

    #[tokio::test]
    async fn test_template_failure_renders_error_without_hydrate() {
        let mut source = MockSource::new();
        source
            .expect_fetch_template()
            .returning(|_| Err(Exception::HttpStatus(404)));
        source
            .expect_fetch_script()
            .returning(|_| Ok(Some("wire()".to_string())));

        let router = router_with(source, "");
        let count = Arc::new(AtomicUsize::new(0));
        router.register_script("ghost", Arc::new(CountingScript(Arc::clone(&count))));

        let change = push(&router, &[("page", Some("ghost"))]);
        router.resolve(change).await;

        let html = router.outlet().html();
        assert!(html.contains("Error"));
        assert!(html.contains("ghost"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        // 失败的模板不进缓存
        assert_eq!(router.cached_entries(), 1);
    }

    #[tokio::test]
    async fn test_script_error_is_silent() {
        let mut source = MockSource::new();
        source
            .expect_fetch_template()
            .returning(|_| Ok("ok".to_string()));
        source
            .expect_fetch_script()
            .returning(|_| Err(Exception::ConnectionFailed));

        let router = router_with(source, "");
        let change = push(&router, &[("page", Some("home"))]);
        router.resolve(change).await;
        assert_eq!(router.outlet().html(), "ok");
    }

    struct RecordingHandler {
        seen: Arc<Mutex<Vec<(String, bool, Option<String>)>>>,
    }

    #[async_trait]
    impl PageHandler for RecordingHandler {
        async fn handle(&self, page: PageContext) {
            self.seen.lock().unwrap().push((
                page.template.clone(),
                page.failed,
                page.route.get("id").map(String::from),
            ));
            page.frame.render("custom");
        }
    }

    #[tokio::test]
    async fn test_handler_takes_over_rendering() {
        let mut source = MockSource::new();
        source
            .expect_fetch_template()
            .returning(|_| Ok("<< id >>".to_string()));
        source.expect_fetch_script().returning(|_| Ok(None));

        let router = router_with(source, "");
        let seen = Arc::new(Mutex::new(Vec::new()));
        router.register_handler("car", Arc::new(RecordingHandler { seen: Arc::clone(&seen) }));

        let change = push(&router, &[("page", Some("car")), ("id", Some("9"))]);
        router.resolve(change).await;

        assert_eq!(router.outlet().html(), "custom");
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], ("<< id >>".to_string(), false, Some("9".to_string())));
    }

    #[tokio::test]
    async fn test_handler_receives_error_text() {
        let mut source = MockSource::new();
        source
            .expect_fetch_template()
            .returning(|_| Err(Exception::TemplateNotFound));
        source.expect_fetch_script().returning(|_| Ok(None));

        let router = router_with(source, "").with_error_template("oops << page >>");
        let seen = Arc::new(Mutex::new(Vec::new()));
        router.register_handler("car", Arc::new(RecordingHandler { seen: Arc::clone(&seen) }));

        let change = push(&router, &[("page", Some("car"))]);
        router.resolve(change).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "oops car");
        assert!(seen[0].1);
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let mut source = MockSource::new();
        source.expect_fetch_template().returning(|_| Ok("t".to_string()));
        source.expect_fetch_script().returning(|_| Ok(None));

        let router = router_with(source, "");
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        router.register_handler("car", Arc::new(RecordingHandler { seen: Arc::clone(&first) }));
        router.register_handler("car", Arc::new(RecordingHandler { seen: Arc::clone(&second) }));

        let change = push(&router, &[("page", Some("car"))]);
        router.resolve(change).await;

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let mut source = MockSource::new();
        source
            .expect_fetch_template()
            .times(2)
            .returning(|_| Ok("t".to_string()));
        source.expect_fetch_script().returning(|_| Ok(None));

        let router = router_with(source, "");
        let change = push(&router, &[("page", Some("home"))]);
        router.resolve(change.clone()).await;
        router.clear_cache();
        assert_eq!(router.cached_entries(), 0);
        router.resolve(change).await;
    }

    #[test]
    fn test_hydrate_without_behavior_is_noop() {
        let outlet = Outlet::new();
        let frame = outlet.begin();
        let navigator = Navigator::new("http://localhost/?page=home", "home").unwrap();
        let hydrate = Hydrate {
            route: navigator.current_route(),
            frame,
            script: Some(Arc::from("alert(1)")),
            behavior: None,
        };
        assert!(hydrate.is_noop());
        assert_eq!(hydrate.script(), Some("alert(1)"));
        hydrate.call();
        assert_eq!(outlet.html(), "");
    }
}

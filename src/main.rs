// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 车辆管理控制台
//!
//! 在终端里驱动客户端路由器：
//! - 启动时加载配置，组装导航模型、页面源、页面缓存与路由器
//! - 路由器作为后台任务订阅导航事件并渲染页面
//! - 前台读取标准输入，把命令翻译成导航或页面动作

use std::{collections::BTreeMap, sync::Arc};

use carlot::{
    api::CarApi,
    cache::PageCache,
    config::{Config, PageSourceKind},
    http::build_client,
    navigation::{NavigateOptions, Navigator},
    pages::{register_pages, Alert, ConsoleAlert},
    router::Router,
    source::{FsSource, HttpSource, PageSource},
    store::SessionStore,
};
use log::{debug, error, info, warn, LevelFilter};
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
};
use tokio::io::{AsyncBufReadExt, BufReader};

const LOG_CONFIG: &str = "config/log4rs.yaml";
const APP_CONFIG: &str = "config/development.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // 1. 日志：优先使用 YAML 配置，缺失时退回只输出警告的终端日志
    init_logging(LOG_CONFIG);

    // 2. 配置
    let config = match Config::from_toml(APP_CONFIG) {
        Ok(config) => {
            info!("配置文件{}已载入", APP_CONFIG);
            config
        }
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::new()
        }
    };

    // 3. 组装各组件
    let client = match build_client(config.request_timeout()) {
        Ok(client) => client,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    let source: Arc<dyn PageSource> = match config.page_source() {
        PageSourceKind::Fs => {
            info!("页面源：本地目录{}", config.www_root());
            Arc::new(FsSource::new(config.www_root()))
        }
        PageSourceKind::Http => match HttpSource::new(client.clone(), config.page_base_url()) {
            Ok(source) => {
                info!("页面源：{}", config.page_base_url());
                Arc::new(source)
            }
            Err(e) => {
                error!("页面源地址{}无效：{}", config.page_base_url(), e);
                return;
            }
        },
    };
    let cache = if config.persistent_cache() {
        info!("使用会话存储{}缓存页面", config.session_store());
        PageCache::persistent(Box::new(SessionStore::open(config.session_store())))
    } else {
        PageCache::transient()
    };
    let navigator = match Navigator::new(config.start_url(), config.default_page()) {
        Ok(navigator) => Arc::new(navigator),
        Err(e) => {
            error!("起始地址{}无效：{}", config.start_url(), e);
            return;
        }
    };
    let api = match CarApi::new(client, config.api_base_url()) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            error!("API地址{}无效：{}", config.api_base_url(), e);
            return;
        }
    };

    let mut router = Router::new(Arc::clone(&navigator), source, cache);
    if let Some(template) = config.error_template() {
        router = router.with_error_template(template);
    }
    let router = Arc::new(router);
    let alert: Arc<dyn Alert> = Arc::new(ConsoleAlert);
    register_pages(&router, api, Arc::clone(&alert));

    // 4. 路由器在后台运行，启动时会先渲染起始地址
    let router_task = tokio::spawn(Arc::clone(&router).run());
    println!("输入 help 查看可用命令");

    // 5. 交互式控制台
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!("读取标准输入失败：{}", e);
                break;
            }
        }
        let mut words = input.split_whitespace();
        let cmd = match words.next() {
            Some(cmd) => cmd,
            None => continue,
        };
        let args: Vec<&str> = words.collect();
        debug!("控制台命令：{} {:?}", cmd, args);

        match cmd {
            "go" | "go+" => {
                let params = parse_navigation(&args);
                let options = if cmd == "go+" {
                    NavigateOptions::preserve()
                } else {
                    NavigateOptions::default()
                };
                let borrowed: Vec<(&str, Option<&str>)> = params
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_deref()))
                    .collect();
                let url = navigator.navigate(&borrowed, options);
                println!("-> {}", url);
            }
            "back" => {
                if !navigator.back() {
                    println!("已经是最早的记录");
                }
            }
            "forward" => {
                if !navigator.forward() {
                    println!("已经是最新的记录");
                }
            }
            "reload" => navigator.reload(),
            "show" => {
                println!("== {} ==", navigator.current_url());
                println!("{}", router.outlet().html());
                println!("====================");
            }
            "actions" => {
                let names = router.outlet().action_names();
                if names.is_empty() {
                    println!("当前页面没有可用的动作");
                } else {
                    println!("可用动作：{}", names.join(", "));
                }
            }
            "do" => {
                let name = match args.first() {
                    Some(name) => *name,
                    None => {
                        println!("用法：do <动作> [key=value ...]");
                        continue;
                    }
                };
                let action = match router.outlet().action(name) {
                    Some(action) => action,
                    None => {
                        println!("当前页面没有动作：{}", name);
                        continue;
                    }
                };
                if let Err(e) = action(parse_fields(&args[1..])).await {
                    warn!("动作{}失败：{}", name, e);
                    alert.alert(&e.alert_text());
                }
            }
            "clear-cache" => {
                router.clear_cache();
                println!("页面缓存已清空");
            }
            "status" => {
                let outlet = router.outlet();
                let position = navigator.history_position();
                println!("== 路由器状态 ===");
                println!("当前地址: {}", navigator.current_url());
                println!(
                    "导航序号: 最新 {} / 已渲染 {}",
                    outlet.latest(),
                    outlet.committed()
                );
                println!("缓存条目: {}", router.cached_entries());
                println!("历史记录:");
                for (i, entry) in navigator.history().iter().enumerate() {
                    let marker = if i == position { '*' } else { ' ' };
                    println!(
                        " {} {} {}",
                        marker,
                        entry.at.format("%H:%M:%S"),
                        entry.url
                    );
                }
                println!("================");
            }
            "help" => {
                println!("== Carlot Help ==");
                println!("go key=value ...   - 导航，只保留 page 与给出的参数");
                println!("go+ key=value ...  - 导航，保留现有全部参数");
                println!("                     以 !key 删除参数");
                println!("back / forward     - 在历史记录中移动");
                println!("reload             - 重新渲染当前地址");
                println!("show               - 打印当前页面");
                println!("actions            - 列出当前页面的动作");
                println!("do <动作> k=v ...   - 执行页面动作");
                println!("clear-cache        - 清空页面缓存");
                println!("status             - 查看路由器状态");
                println!("stop               - 退出");
                println!("=================");
            }
            "stop" => {
                println!("正在退出...");
                break;
            }
            _ => println!("无效的命令：{}", cmd),
        }
    }

    // 中止事件循环，进行中的解析任务随之中止
    router_task.abort();
    let _ = router_task.await;
    info!("控制台已退出");
}

/// `key=value` 设置参数，`!key` 删除参数
fn parse_navigation(args: &[&str]) -> Vec<(String, Option<String>)> {
    args.iter()
        .filter_map(|arg| {
            if let Some(key) = arg.strip_prefix('!') {
                return Some((key.to_string(), None));
            }
            match arg.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    Some((key.to_string(), Some(value.to_string())))
                }
                _ => {
                    println!("忽略无法识别的参数：{}", arg);
                    None
                }
            }
        })
        .collect()
}

/// 动作参数，值中的 `_` 视为空格
fn parse_fields(args: &[&str]) -> BTreeMap<String, String> {
    args.iter()
        .filter_map(|arg| arg.split_once('='))
        .map(|(key, value)| (key.to_string(), value.replace('_', " ")))
        .collect()
}

fn init_logging(path: &str) {
    if let Err(e) = log4rs::init_file(path, Default::default()) {
        eprintln!("无法加载日志配置{}：{}，改用终端日志", path, e);
        let stderr = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {h({l})} {m}{n}")))
            .build();
        let config = LogConfig::builder()
            .appender(Appender::builder().build("stderr", Box::new(stderr)))
            .build(Root::builder().appender("stderr").build(LevelFilter::Warn));
        match config {
            Ok(config) => {
                if let Err(e) = log4rs::init_config(config) {
                    eprintln!("日志初始化失败：{}", e);
                }
            }
            Err(e) => eprintln!("日志配置无效：{}", e),
        }
    }
}

use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;
use std::time::Duration;

use crate::{exception::Exception, param::DEFAULT_PAGE};

/// 页面模板与脚本从哪里取
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PageSourceKind {
    Fs,
    Http,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_page_source")]
    page_source: PageSourceKind,
    #[serde(default = "default_www_root")]
    www_root: String,
    #[serde(default = "default_page_base_url")]
    page_base_url: String,
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_start_url")]
    start_url: String,
    #[serde(default = "default_page")]
    default_page: String,
    #[serde(default)]
    persistent_cache: bool,
    #[serde(default = "default_session_store")]
    session_store: String,
    #[serde(default = "default_request_timeout_ms")]
    request_timeout_ms: u64,
    #[serde(default)]
    error_template: Option<String>,
}

fn default_page_source() -> PageSourceKind {
    PageSourceKind::Fs
}

fn default_www_root() -> String {
    "static".to_string()
}

fn default_page_base_url() -> String {
    "http://127.0.0.1:7878/".to_string()
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:3000/api/".to_string()
}

fn default_start_url() -> String {
    "http://localhost/index.html".to_string()
}

fn default_page() -> String {
    DEFAULT_PAGE.to_string()
}

fn default_session_store() -> String {
    "session/router-cache.json".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000 // 5s
}

impl Config {
    pub fn new() -> Self {
        Self {
            page_source: default_page_source(),
            www_root: default_www_root(),
            page_base_url: default_page_base_url(),
            api_base_url: default_api_base_url(),
            start_url: default_start_url(),
            default_page: default_page(),
            persistent_cache: false,
            session_store: default_session_store(),
            request_timeout_ms: default_request_timeout_ms(),
            error_template: None,
        }
    }

    /// 从 TOML 文本构建配置，解析失败时退回默认配置
    pub fn from_toml_str(text: &str) -> Self {
        let mut raw_config: Config = match toml::from_str(text) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        if raw_config.request_timeout_ms == 0 {
            warn!("request_timeout_ms被设置为0，但目前尚不支持禁用超时，因此该值将被改为5000。");
            raw_config.request_timeout_ms = default_request_timeout_ms();
        }
        if raw_config.default_page.trim().is_empty() {
            warn!("default_page为空，将使用{}", DEFAULT_PAGE);
            raw_config.default_page = default_page();
        }
        raw_config
    }

    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename).map_err(|e| {
            error!("无法打开配置文件{}：{}", filename, e);
            Exception::ConfigUnreadable
        })?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val).map_err(|e| {
            error!("读取配置文件{}失败：{}", filename, e);
            Exception::ConfigUnreadable
        })?;
        Ok(Self::from_toml_str(&str_val))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn page_source(&self) -> PageSourceKind {
        self.page_source
    }

    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn page_base_url(&self) -> &str {
        &self.page_base_url
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    pub fn default_page(&self) -> &str {
        &self.default_page
    }

    pub fn persistent_cache(&self) -> bool {
        self.persistent_cache
    }

    pub fn session_store(&self) -> &str {
        &self.session_store
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn error_template(&self) -> Option<&str> {
        self.error_template.as_deref()
    }
}

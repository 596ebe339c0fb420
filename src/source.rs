// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 页面源
//!
//! 按页面名取回模板（`pages/<page>.html`）与伴随脚本（`scripts/<page>.js`）。
//! 提供两种实现：
//! - `FsSource`：从本地 `www_root` 目录读取；
//! - `HttpSource`：向远端发出 GET 请求。
//!
//! 模板取不到属于错误，由路由器替换为错误页面；脚本取不到是正常情况，返回 `Ok(None)`。

use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use url::Url;

use crate::{
    exception::Exception,
    http::{read_text, transport_error},
};

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_template(&self, page: &str) -> Result<String, Exception>;
    async fn fetch_script(&self, page: &str) -> Result<Option<String>, Exception>;
}

/// 页面名只允许字母、数字、`-` 与 `_`，以免拼接路径时越出根目录
pub fn is_valid_page_name(page: &str) -> bool {
    !page.is_empty()
        && page
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn template_path(page: &str) -> String {
    format!("pages/{}.html", page)
}

pub fn script_path(page: &str) -> String {
    format!("scripts/{}.js", page)
}

pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PageSource for FsSource {
    async fn fetch_template(&self, page: &str) -> Result<String, Exception> {
        if !is_valid_page_name(page) {
            warn!("非法的页面名：{}", page);
            return Err(Exception::TemplateNotFound);
        }
        let path = self.root.join(template_path(page));
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            warn!("无法读取模板{}：{}", path.display(), e);
            Exception::TemplateNotFound
        })
    }

    async fn fetch_script(&self, page: &str) -> Result<Option<String>, Exception> {
        if !is_valid_page_name(page) {
            return Ok(None);
        }
        let path = self.root.join(script_path(page));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(_) => {
                debug!("页面{}没有伴随脚本", page);
                Ok(None)
            }
        }
    }
}

pub struct HttpSource {
    client: Client,
    base: Url,
}

impl HttpSource {
    pub fn new(client: Client, base: &str) -> Result<Self, Exception> {
        let mut base = Url::parse(base).map_err(|_| Exception::InvalidUrl)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    fn resolve(&self, relative: &str) -> Result<Url, Exception> {
        self.base.join(relative).map_err(|_| Exception::InvalidUrl)
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch_template(&self, page: &str) -> Result<String, Exception> {
        if !is_valid_page_name(page) {
            warn!("非法的页面名：{}", page);
            return Err(Exception::TemplateNotFound);
        }
        let url = self.resolve(&template_path(page))?;
        let response = self.client.get(url.clone()).send().await.map_err(transport_error)?;
        let (status, text) = read_text(response).await?;
        if !status.is_success() {
            warn!("模板{}返回{}", url, status);
            return Err(Exception::HttpStatus(status.as_u16()));
        }
        Ok(text)
    }

    async fn fetch_script(&self, page: &str) -> Result<Option<String>, Exception> {
        if !is_valid_page_name(page) {
            return Ok(None);
        }
        let url = self.resolve(&script_path(page))?;
        let response = self.client.get(url.clone()).send().await.map_err(transport_error)?;
        let (status, text) = read_text(response).await?;
        if status.is_success() {
            Ok(Some(text))
        } else {
            debug!("脚本{}返回{}，视为没有脚本", url, status);
            Ok(None)
        }
    }
}

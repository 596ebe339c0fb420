// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 客户端模块
//!
//! 页面源和车辆 API 共用一个 `reqwest::Client`（自带连接池）。本模块负责：
//! 1. 按配置的超时构建客户端，附带 `User-Agent` 与默认 `Accept`。
//! 2. 把 `reqwest::Error` 映射为 `Exception`。
//! 3. 读取响应的状态码与正文文本。

use std::time::Duration;

use log::{debug, error, warn};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client, Response, StatusCode,
};

use crate::{exception::Exception, param::CLIENT_NAME};

/// 构建共享客户端。`timeout` 同时约束连接与整个请求。
pub fn build_client(timeout: Duration) -> Result<Client, Exception> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/html;q=0.9, */*;q=0.8"));
    Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .user_agent(CLIENT_NAME)
        .default_headers(headers)
        .build()
        .map_err(|e| {
            error!("无法构建HTTP客户端：{}", e);
            Exception::ConnectionFailed
        })
}

/// 把传输层错误映射为异常
pub fn transport_error(e: reqwest::Error) -> Exception {
    if e.is_timeout() {
        warn!("请求超时：{}", e);
        Exception::Timeout
    } else if e.is_builder() {
        warn!("无效的请求地址：{}", e);
        Exception::InvalidUrl
    } else if e.is_body() || e.is_decode() {
        warn!("响应正文无法读取：{}", e);
        Exception::MalformedResponse
    } else {
        warn!("请求失败：{}", e);
        Exception::ConnectionFailed
    }
}

/// 读取状态码与完整正文
pub async fn read_text(response: Response) -> Result<(StatusCode, String), Exception> {
    let status = response.status();
    let url = response.url().clone();
    let text = response.text().await.map_err(transport_error)?;
    debug!("{} -> {}，正文{}字节", url, status, text.len());
    Ok((status, text))
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 车辆 API 客户端
//!
//! 封装远端 REST 接口：
//!
//! | 方法 | 路径 | 作用 |
//! | --- | --- | --- |
//! | GET | `cars` | 列表 |
//! | GET | `cars/<id>` | 详情 |
//! | POST | `cars` | 新建 |
//! | PUT | `cars/<id>` | 更新 |
//! | DELETE | `cars/<id>` | 删除 |
//!
//! 状态码映射：2xx 成功；400 校验错误（取响应体中的 `message`）；401 未授权；404 不存在；
//! 其余一律视为通用失败。

use log::{debug, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::{
    exception::Exception,
    http::{read_text, transport_error},
};

/// 一条车辆记录
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Car {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub brand: String,
    pub model: String,
    pub year: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

pub struct CarApi {
    client: Client,
    base: Url,
}

impl CarApi {
    pub fn new(client: Client, base: &str) -> Result<Self, Exception> {
        let mut base = Url::parse(base).map_err(|_| Exception::InvalidUrl)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    pub fn collection_url(&self) -> Result<Url, Exception> {
        self.base.join("cars").map_err(|_| Exception::InvalidUrl)
    }

    pub fn item_url(&self, id: u64) -> Result<Url, Exception> {
        self.base
            .join(&format!("cars/{}", id))
            .map_err(|_| Exception::InvalidUrl)
    }

    pub async fn list(&self) -> Result<Vec<Car>, Exception> {
        let body = exchange(self.client.get(self.collection_url()?)).await?;
        parse_json(&body)
    }

    pub async fn get(&self, id: u64) -> Result<Car, Exception> {
        let body = exchange(self.client.get(self.item_url(id)?)).await?;
        parse_json(&body)
    }

    pub async fn create(&self, car: &Car) -> Result<Car, Exception> {
        let body = exchange(self.client.post(self.collection_url()?).json(car)).await?;
        parse_json(&body)
    }

    pub async fn update(&self, id: u64, car: &Car) -> Result<Car, Exception> {
        let body = exchange(self.client.put(self.item_url(id)?).json(car)).await?;
        // 部分服务端对 PUT 只返回 204
        if body.trim().is_empty() {
            let mut car = car.clone();
            car.id = Some(id);
            return Ok(car);
        }
        parse_json(&body)
    }

    pub async fn delete(&self, id: u64) -> Result<(), Exception> {
        exchange(self.client.delete(self.item_url(id)?)).await?;
        Ok(())
    }
}

// 发送请求，非 2xx 映射为异常，成功时返回正文
async fn exchange(request: RequestBuilder) -> Result<String, Exception> {
    let response = request.send().await.map_err(transport_error)?;
    let (status, body) = read_text(response).await?;
    check(status, &body)?;
    Ok(body)
}

/// 把非 2xx 状态码映射为对应的异常
pub fn check(status: StatusCode, body: &str) -> Result<(), Exception> {
    match status.as_u16() {
        200..=299 => Ok(()),
        400 => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| "invalid input".to_string());
            warn!("API校验失败：{}", message);
            Err(Exception::Validation(message))
        }
        401 => Err(Exception::Unauthorized),
        404 => Err(Exception::NotFound),
        code => {
            warn!("API返回未预期的状态码{}", status);
            Err(Exception::ApiFailure(code))
        }
    }
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, Exception> {
    serde_json::from_str(body).map_err(|e| {
        debug!("无法解析API响应：{}", e);
        Exception::MalformedResponse
    })
}

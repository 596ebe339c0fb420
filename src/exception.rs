// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了客户端在导航、取页、调用远程 API 过程中可能出现的各类异常。
//!
//! ## 分类
//! - **传输层**：URL 非法、连接失败、超时、响应报文损坏。
//! - **资源层**：页面模板或脚本取回失败（由路由器在本地恢复，不会向上抛出）。
//! - **业务层**：远程 API 返回的校验错误、授权错误、未找到等，最终以弹窗形式告知用户。

use std::fmt;

/// 客户端处理过程中发生的异常类型。
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// 无法解析的 URL，或使用了不支持的协议（目前只支持 `http://`）。
    InvalidUrl,
    /// 无法与远端建立 TCP 连接。
    ConnectionFailed,
    /// 请求在配置的超时时间内没有完成。
    Timeout,
    /// 响应报文无法解析（状态行缺失、分块编码错误、解压失败等）。
    MalformedResponse,
    /// 远端返回了非 2xx 状态码。
    HttpStatus(u16),
    /// 页面模板不存在。
    TemplateNotFound,
    /// 会话存储文件读写失败。
    StoreIo,
    /// API 返回 400，附带服务端给出的提示信息。
    Validation(String),
    /// API 返回 401。
    Unauthorized,
    /// API 返回 404。
    NotFound,
    /// 其它 API 错误，携带状态码（0 表示网络层错误）。
    ApiFailure(u16),
    /// 品牌不在已知品牌列表中。
    InvalidBrand,
    /// 配置文件无法读取。
    ConfigUnreadable,
}

use Exception::*;

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidUrl => write!(f, "Invalid or unsupported URL"),
            ConnectionFailed => write!(f, "Couldn't connect to remote host"),
            Timeout => write!(f, "Request timed out"),
            MalformedResponse => write!(f, "Malformed HTTP response"),
            HttpStatus(code) => write!(f, "Unexpected HTTP status {}", code),
            TemplateNotFound => write!(f, "Page template not found"),
            StoreIo => write!(f, "Session store I/O failed"),
            Validation(message) => write!(f, "Validation failed: {}", message),
            Unauthorized => write!(f, "Not authorized (401)"),
            NotFound => write!(f, "Resource not found (404)"),
            ApiFailure(code) => write!(f, "API request failed ({})", code),
            InvalidBrand => write!(f, "Unknown car brand"),
            ConfigUnreadable => write!(f, "Config file can't be read"),
        }
    }
}

impl std::error::Error for Exception {}

impl Exception {
    /// 生成面向用户的弹窗文案。
    pub fn alert_text(&self) -> String {
        match self {
            Validation(message) => format!("输入有误：{}", message),
            Unauthorized => "没有权限执行该操作，请检查登录状态".to_string(),
            NotFound => "请求的车辆记录不存在".to_string(),
            InvalidBrand => "品牌不在支持列表中".to_string(),
            other => format!("操作失败：{}", other),
        }
    }
}

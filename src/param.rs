// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块集中定义了客户端使用的常量和静态表，包括：
//! - 请求标识、默认页面、缓存前缀与兜底错误页面。
//! - 支持的车辆品牌列表。

use lazy_static::lazy_static;

/// 客户端名称标识，用于请求头的 `User-Agent` 字段
pub const CLIENT_NAME: &str = "carlot/0.1";

/// URL 中缺少 `page` 参数时使用的页面名
pub const DEFAULT_PAGE: &str = "home";

/// 持久化缓存键的命名空间前缀
pub const CACHE_PREFIX: &str = "RouterCache";

/// 模板取回失败时使用的兜底页面
pub const ERROR_TEMPLATE: &str = "<h1>Error</h1><p>Could not load page \"<< page >>\".</p>";

lazy_static! {
    /// 表单校验允许的车辆品牌。
    ///
    /// 比较时忽略大小写，返回值统一为此处的规范写法。
    pub static ref BRANDS: Vec<&'static str> = {
        vec![
            "Audi",
            "BMW",
            "BYD",
            "Chevrolet",
            "Ford",
            "Honda",
            "Hyundai",
            "Kia",
            "Mazda",
            "Mercedes-Benz",
            "Nissan",
            "Peugeot",
            "Renault",
            "Skoda",
            "Subaru",
            "Tesla",
            "Toyota",
            "Volkswagen",
            "Volvo",
        ]
    };
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模板引擎
//!
//! 一个纯字符串变换器，把参数注入 HTML 模板。支持三种语法：
//!
//! | 语法 | 含义 |
//! | --- | --- |
//! | `<loop key> ... <end loop>` | 对数组 `params[key]` 的每个元素渲染一次块体 |
//! | `<if key> ... <end if>` | `params[key]` 为真值时保留块体 |
//! | `<< key >>` | 替换为 HTML 转义后的 `params[key]` |
//!
//! 处理顺序固定为：循环 → 条件 → 变量，每一遍都作用于上一遍的输出。
//!
//! ## 已知限制
//! 循环块不支持嵌套：块体在遇到的第一个 `<end loop>` 处结束，
//! 因此内层循环会把外层循环提前截断。条件块同理。

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;

lazy_static! {
    static ref LOOP_BLOCK: Regex = Regex::new(r"(?s)<loop\s+([\w-]+)\s*>(.*?)<end loop>").unwrap();
    static ref IF_BLOCK: Regex = Regex::new(r"(?s)<if\s+([\w-]+)\s*>(.*?)<end if>").unwrap();
    static ref VARIABLE: Regex = Regex::new(r"<<\s*([\w-]+)\s*>>").unwrap();
}

/// 渲染模板。
///
/// 该函数是全函数：缺失的键按空值处理，永远不会失败。
///
/// 当 `params` 本身不是 JSON 对象时（例如循环遍历的是字符串数组），
/// 任意键都解析为 `params` 本身。
pub fn render(template: &str, params: &Value) -> String {
    let looped = LOOP_BLOCK.replace_all(template, |caps: &Captures| match lookup(params, &caps[1]) {
        Some(Value::Array(items)) => items.iter().map(|item| render(&caps[2], item)).collect::<String>(),
        _ => String::new(),
    });

    let conditioned = IF_BLOCK.replace_all(&looped, |caps: &Captures| {
        if lookup(params, &caps[1]).map_or(false, is_truthy) {
            caps[2].to_string()
        } else {
            String::new()
        }
    });

    VARIABLE
        .replace_all(&conditioned, |caps: &Captures| match lookup(params, &caps[1]) {
            Some(value) => escape_html(&to_text(value)),
            None => String::new(),
        })
        .into_owned()
}

/// 转义 `&`、`<`、`>`、`"`、`'` 五个字符
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 真值判定：非空字符串、非零数字、`true`、任意对象或数组
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn lookup<'a>(params: &'a Value, key: &str) -> Option<&'a Value> {
    match params {
        Value::Object(map) => map.get(key),
        Value::Null => None,
        scalar => Some(scalar),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

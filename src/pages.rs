// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 车辆管理页面
//!
//! 路由核心之外的页面层：三个页面处理器（列表、详情、编辑）和它们的水合逻辑，
//! 以及表单校验与弹窗提示。
//!
//! | 页面 | 处理器 | 绑定的动作 |
//! | --- | --- | --- |
//! | `home` | 拉取车辆列表 | `open id=<id>`、`new` |
//! | `car` | 拉取单条记录 | `edit`、`delete`、`back` |
//! | `edit` | 预填表单（有 `id` 时） | `save field=value ...`、`cancel` |

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{Datelike, Local};
use log::{info, warn};
use serde_json::Value;

use crate::{
    api::{Car, CarApi},
    exception::Exception,
    navigation::{NavigateOptions, Navigator},
    param::BRANDS,
    router::{PageContext, PageHandler, PageScript, Router, ScriptContext},
    template,
};

/// 阻塞式的用户提示
pub trait Alert: Send + Sync {
    fn alert(&self, message: &str);
}

/// 在终端打印醒目的提示框
pub struct ConsoleAlert;

impl Alert for ConsoleAlert {
    fn alert(&self, message: &str) {
        warn!("弹窗提示：{}", message);
        let width = message.chars().count() + 4;
        eprintln!("+{}+", "-".repeat(width));
        eprintln!("|  {}  |", message);
        eprintln!("+{}+", "-".repeat(width));
    }
}

/// 校验品牌（忽略大小写），返回规范写法
pub fn validate_brand(input: &str) -> Result<&'static str, Exception> {
    let input = input.trim();
    BRANDS
        .iter()
        .find(|brand| brand.eq_ignore_ascii_case(input))
        .copied()
        .ok_or(Exception::InvalidBrand)
}

/// 校验整条记录，返回品牌规范化后的副本
pub fn validate_car(car: &Car) -> Result<Car, Exception> {
    let brand = validate_brand(&car.brand)?;
    if car.model.trim().is_empty() {
        return Err(Exception::Validation("model is required".to_string()));
    }
    // 1886 年第一辆汽车问世，允许登记下一年款
    let latest = Local::now().year() as u16 + 1;
    if car.year < 1886 || car.year > latest {
        return Err(Exception::Validation(format!("year must be between 1886 and {}", latest)));
    }
    if let Some(price) = car.price {
        if price < 0.0 {
            return Err(Exception::Validation("price can't be negative".to_string()));
        }
    }
    Ok(Car {
        brand: brand.to_string(),
        model: car.model.trim().to_string(),
        ..car.clone()
    })
}

/// 把表单字段叠加到已有记录上
pub fn apply_form(mut car: Car, fields: &BTreeMap<String, String>) -> Result<Car, Exception> {
    for (key, value) in fields {
        match key.as_str() {
            "brand" => car.brand = value.clone(),
            "model" => car.model = value.clone(),
            "year" => {
                car.year = value
                    .trim()
                    .parse()
                    .map_err(|_| Exception::Validation("year must be a number".to_string()))?
            }
            "color" => car.color = Some(value.clone()).filter(|c| !c.trim().is_empty()),
            "price" if value.trim().is_empty() => car.price = None,
            "price" => {
                car.price = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| Exception::Validation("price must be a number".to_string()))?,
                )
            }
            _ => {}
        }
    }
    Ok(car)
}

fn parse_id(raw: Option<&str>) -> Result<u64, Exception> {
    raw.and_then(|id| id.trim().parse().ok()).ok_or(Exception::NotFound)
}

// 把记录的字段平铺到模板参数的顶层
fn merge_car(params: &mut Value, car: &Car) {
    if let (Value::Object(target), Ok(Value::Object(fields))) = (params, serde_json::to_value(car)) {
        for (k, v) in fields {
            target.insert(k, v);
        }
    }
}

fn finish(page: PageContext, params: &Value) {
    if page.frame.render(template::render(&page.template, params)) {
        page.hydrate.call();
    }
}

pub struct HomePage {
    api: Arc<CarApi>,
    alert: Arc<dyn Alert>,
}

#[async_trait]
impl PageHandler for HomePage {
    async fn handle(&self, page: PageContext) {
        if page.failed {
            page.frame.render(page.template);
            return;
        }
        let mut params = page.route.template_params();
        match self.api.list().await {
            Ok(cars) => {
                params["count"] = Value::from(cars.len());
                params["empty"] = Value::Bool(cars.is_empty());
                params["cars"] = serde_json::to_value(&cars).unwrap_or(Value::Null);
            }
            Err(e) => {
                self.alert.alert(&e.alert_text());
                params["error"] = Value::String(e.alert_text());
            }
        }
        finish(page, &params);
    }
}

pub struct CarPage {
    api: Arc<CarApi>,
    alert: Arc<dyn Alert>,
}

#[async_trait]
impl PageHandler for CarPage {
    async fn handle(&self, page: PageContext) {
        if page.failed {
            page.frame.render(page.template);
            return;
        }
        let mut params = page.route.template_params();
        let result = match parse_id(page.route.get("id")) {
            Ok(id) => self.api.get(id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(car) => merge_car(&mut params, &car),
            Err(e) => {
                self.alert.alert(&e.alert_text());
                params["error"] = Value::String(e.alert_text());
            }
        }
        finish(page, &params);
    }
}

pub struct EditPage {
    api: Arc<CarApi>,
    alert: Arc<dyn Alert>,
}

#[async_trait]
impl PageHandler for EditPage {
    async fn handle(&self, page: PageContext) {
        if page.failed {
            page.frame.render(page.template);
            return;
        }
        let mut params = page.route.template_params();
        params["brands"] = Value::from(BRANDS.clone());
        params["editing"] = Value::Bool(page.route.get("id").is_some());
        if page.route.get("id").is_some() {
            let result = match parse_id(page.route.get("id")) {
                Ok(id) => self.api.get(id).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(car) => merge_car(&mut params, &car),
                Err(e) => {
                    self.alert.alert(&e.alert_text());
                    params["error"] = Value::String(e.alert_text());
                }
            }
        }
        finish(page, &params);
    }
}

pub struct HomeScript {
    navigator: Arc<Navigator>,
}

impl PageScript for HomeScript {
    fn hydrate(&self, ctx: &ScriptContext<'_>) {
        let navigator = Arc::clone(&self.navigator);
        ctx.frame.bind("open", move |args| {
            let navigator = Arc::clone(&navigator);
            async move {
                let id = parse_id(args.get("id").map(String::as_str))?;
                let id = id.to_string();
                navigator.navigate(
                    &[("page", Some("car")), ("id", Some(id.as_str()))],
                    NavigateOptions::default(),
                );
                Ok::<(), Exception>(())
            }
        });

        let navigator = Arc::clone(&self.navigator);
        ctx.frame.bind("new", move |_| {
            let navigator = Arc::clone(&navigator);
            async move {
                navigator.navigate(&[("page", Some("edit"))], NavigateOptions::default());
                Ok(())
            }
        });
    }
}

pub struct CarScript {
    api: Arc<CarApi>,
    navigator: Arc<Navigator>,
}

impl PageScript for CarScript {
    fn hydrate(&self, ctx: &ScriptContext<'_>) {
        let id = match parse_id(ctx.route.get("id")) {
            Ok(id) => id,
            Err(_) => return,
        };

        let navigator = Arc::clone(&self.navigator);
        ctx.frame.bind("edit", move |_| {
            let navigator = Arc::clone(&navigator);
            async move {
                navigator.navigate(&[("page", Some("edit"))], NavigateOptions::preserve());
                Ok(())
            }
        });

        let api = Arc::clone(&self.api);
        let navigator = Arc::clone(&self.navigator);
        ctx.frame.bind("delete", move |_| {
            let api = Arc::clone(&api);
            let navigator = Arc::clone(&navigator);
            async move {
                api.delete(id).await?;
                info!("车辆记录{}已删除", id);
                navigator.navigate(&[("page", Some("home"))], NavigateOptions::default());
                Ok::<(), Exception>(())
            }
        });

        let navigator = Arc::clone(&self.navigator);
        ctx.frame.bind("back", move |_| {
            let navigator = Arc::clone(&navigator);
            async move {
                if !navigator.back() {
                    navigator.navigate(&[("page", Some("home"))], NavigateOptions::default());
                }
                Ok(())
            }
        });
    }
}

pub struct EditScript {
    api: Arc<CarApi>,
    navigator: Arc<Navigator>,
}

impl PageScript for EditScript {
    fn hydrate(&self, ctx: &ScriptContext<'_>) {
        let existing = ctx.route.get("id").map(|raw| parse_id(Some(raw)));

        let api = Arc::clone(&self.api);
        let navigator = Arc::clone(&self.navigator);
        ctx.frame.bind("save", move |fields| {
            let api = Arc::clone(&api);
            let navigator = Arc::clone(&navigator);
            let existing = existing.clone();
            async move {
                let saved = match existing {
                    Some(id) => {
                        let id = id?;
                        let current = api.get(id).await?;
                        let car = validate_car(&apply_form(current, &fields)?)?;
                        api.update(id, &car).await?
                    }
                    None => {
                        let car = validate_car(&apply_form(Car::default(), &fields)?)?;
                        api.create(&car).await?
                    }
                };
                info!("车辆记录已保存：{:?}", saved.id);
                match saved.id {
                    Some(id) => {
                        let id = id.to_string();
                        navigator.navigate(
                            &[("page", Some("car")), ("id", Some(id.as_str()))],
                            NavigateOptions::default(),
                        );
                    }
                    None => {
                        navigator.navigate(&[("page", Some("home"))], NavigateOptions::default());
                    }
                }
                Ok::<(), Exception>(())
            }
        });

        let navigator = Arc::clone(&self.navigator);
        ctx.frame.bind("cancel", move |_| {
            let navigator = Arc::clone(&navigator);
            async move {
                if !navigator.back() {
                    navigator.navigate(&[("page", Some("home"))], NavigateOptions::default());
                }
                Ok(())
            }
        });
    }
}

/// 注册三个页面的处理器与页面逻辑
pub fn register_pages(router: &Router, api: Arc<CarApi>, alert: Arc<dyn Alert>) {
    let navigator = Arc::clone(router.navigator());

    router.register_handler(
        "home",
        Arc::new(HomePage {
            api: Arc::clone(&api),
            alert: Arc::clone(&alert),
        }),
    );
    router.register_handler(
        "car",
        Arc::new(CarPage {
            api: Arc::clone(&api),
            alert: Arc::clone(&alert),
        }),
    );
    router.register_handler(
        "edit",
        Arc::new(EditPage {
            api: Arc::clone(&api),
            alert,
        }),
    );

    router.register_script(
        "home",
        Arc::new(HomeScript {
            navigator: Arc::clone(&navigator),
        }),
    );
    router.register_script(
        "car",
        Arc::new(CarScript {
            api: Arc::clone(&api),
            navigator: Arc::clone(&navigator),
        }),
    );
    router.register_script("edit", Arc::new(EditScript { api, navigator }));
}

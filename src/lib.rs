pub mod api;
pub mod cache;
pub mod config;
pub mod exception;
pub mod http;
pub mod navigation;
pub mod outlet;
pub mod pages;
pub mod param;
pub mod router;
pub mod source;
pub mod store;
pub mod template;

pub use api::{Car, CarApi};
pub use cache::{ContentKind, PageCache};
pub use config::Config;
pub use exception::Exception;
pub use http::build_client;
pub use navigation::{NavigateOptions, NavigationType, Navigator, Route, RouteChange};
pub use outlet::{Frame, Outlet};
pub use router::{Hydrate, PageContext, PageHandler, PageScript, Router, ScriptContext};
pub use source::{FsSource, HttpSource, PageSource};
pub use store::{KeyValueStore, MemoryStore, SessionStore};
pub use template::render;

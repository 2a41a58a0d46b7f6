//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP 请求经过会话闸门后委托给应用层的用例服务。

mod admin_routes;
mod cookie;
mod error;
mod extract;
mod routes;
mod state;

pub use cookie::SessionCookies;
pub use error::{ApiError, ErrorBody};
pub use extract::CurrentSession;
pub use routes::router;
pub use state::{AppState, WebSettings};

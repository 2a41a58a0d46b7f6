//! 端到端测试框架
//!
//! 基于内存仓储装配完整的应用状态，并提供直接驱动 axum 路由的工具。

pub mod test_environment;
pub mod test_utils;

// 重新导出常用类型
pub use test_environment::*;
pub use test_utils::*;

//! 交易网关公共模块
//!
//! 提供各服务共享的基础设施：
//! - 环境变量配置
//! - 错误类型与 HTTP 状态映射
//! - 请求 ID 中间件
//! - 存储过程结果集模型

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;

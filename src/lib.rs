//! AICU Bench - ComfyUI 基准测试编排
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - prompt: 工作流文件与编号回退
//! - job: 生成任务状态与输出
//! - manifest / summary: 模型清单与上报汇总
//!
//! 应用层 (application/):
//! - Ports: 端口定义（GenerationServer, ServerLauncher, Downloader, ResultSink, RunState）
//! - Commands: 基准流程、单任务、模型下载、结果上报
//! - Readiness / Lifecycle: 就绪探测与服务进程作用域
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: ComfyUI HTTP 客户端、下载器、上报端
//! - Process: 服务进程、依赖安装、外部脚本
//! - Persistence: 产物目录下的状态文件
//! - System: 主机与 GPU 信息

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};

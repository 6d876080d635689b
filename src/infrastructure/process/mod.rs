//! Process Adapters - 子进程管理
//!
//! - comfy_server: ComfyUI 服务进程启动与停止
//! - provisioner: 源码获取与依赖安装
//! - script_runner: 外部 bash 脚本

mod comfy_server;
mod provisioner;
mod script_runner;

pub use comfy_server::{ComfyServerConfig, ComfyServerLauncher};
pub use provisioner::{parse_python_version, ComfyProvisioner, ComfyProvisionerConfig, PythonVersion};
pub use script_runner::BashScriptRunner;

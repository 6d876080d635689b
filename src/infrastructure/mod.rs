//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod persistence;
pub mod process;
pub mod system;

pub use adapters::{FakeComfyClient, HttpComfyClient, HttpDownloader, HttpResultSink};
pub use persistence::FileRunStateStore;
pub use process::{BashScriptRunner, ComfyProvisioner, ComfyServerLauncher};
pub use system::SystemHostProbe;

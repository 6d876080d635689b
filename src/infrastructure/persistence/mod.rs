//! Persistence Layer - 本地状态持久化

mod file_state_store;

pub use file_state_store::FileRunStateStore;

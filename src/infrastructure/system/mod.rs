//! System Adapters - 主机信息采集

mod host_probe;

pub use host_probe::{parse_nvidia_smi, SystemHostProbe};

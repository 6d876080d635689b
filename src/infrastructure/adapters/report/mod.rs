//! Report Adapter - 汇总上报

mod http_result_sink;

pub use http_result_sink::*;

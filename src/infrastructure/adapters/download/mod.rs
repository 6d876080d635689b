//! Download Adapter - HTTP 文件下载

mod http_downloader;

pub use http_downloader::*;

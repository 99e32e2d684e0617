//! 错误类型
//!
//! 队列满、结果被丢弃、关闭竞争都不是错误, 只通过返回值与计数器体现。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置解析失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("配置无效: {0}")]
    InvalidConfig(String),

    #[error("工作线程启动失败: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

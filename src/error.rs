// error.rs — 错误类型定义
// 按流水线阶段划分：获取、合成、设置壁纸、定时任务、配置

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// APOD 数据源返回的错误
#[derive(Debug, Error)]
pub enum SourceError {
    /// 网络或协议层失败（连接、TLS、超时等）
    #[error("transport failure for {url}: {detail}")]
    Transport { url: String, detail: String },
    /// 服务端返回了非 2xx 状态码
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    /// 响应体不是预期的 JSON
    #[error("malformed APOD response from {url}: {detail}")]
    Decode { url: String, detail: String },
    #[error("writing download failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// 将 reqwest 错误归类为传输失败或状态码失败
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            },
            None if err.is_decode() => SourceError::Decode {
                url: url.to_string(),
                detail: err.to_string(),
            },
            None => SourceError::Transport {
                url: url.to_string(),
                detail: err.to_string(),
            },
        }
    }
}

/// 回溯下载策略的最终失败
#[derive(Debug, Error)]
pub enum FetchError {
    /// 致命错误，不重试
    #[error(transparent)]
    Source(#[from] SourceError),
    /// 回溯次数用尽仍未找到可用图片
    #[error("no usable image after {steps} backward steps (last probe {last_probe})")]
    Exhausted { steps: u32, last_probe: NaiveDate },
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("cannot read source image {path}: {detail}")]
    Decode { path: PathBuf, detail: String },
    #[error("cannot save composed image {path}: {detail}")]
    Save { path: PathBuf, detail: String },
}

#[derive(Debug, Error)]
#[error("setting wallpaper from {path} failed: {reason}")]
pub struct ApplyError {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("copying executable failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("neither $HOME nor $USERPROFILE is set")]
    NoHome,
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("config serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// 一次运行中可能出现的所有致命错误
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error("another run holds the lock at {0}")]
    Locked(PathBuf),
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

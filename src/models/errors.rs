use std::path::PathBuf;
use thiserror::Error;

/// 启动前的配置错误，任何一个都会直接终止程序
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("You should specify 'url' or 'file' option.")]
    MissingTarget,

    #[error("options 'url' and 'file' are mutually exclusive")]
    ConflictingTargets,

    #[error("options 'get' and 'post' are mutually exclusive")]
    ConflictingMethods,

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("total request count overflows: {repetitions} reps x {concurrency} users x {targets} targets")]
    RequestCountOverflow {
        repetitions: u64,
        concurrency: usize,
        targets: usize,
    },

    #[error("Cannot parse 'time' parameter '{value}': {source}")]
    InvalidTimeLimit {
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("invalid {name} value: '{value}'")]
    InvalidHeaderValue { name: &'static str, value: String },

    #[error("Cannot open file {}: {source}", .path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("no valid targets found in {}", .path.display())]
    NoTargets { path: PathBuf },
}

/// 单行目标解析失败，只会跳过当前行
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("malformed url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported scheme '{scheme}' in '{url}'")]
    UnsupportedScheme { url: String, scheme: String },
}

/// 传输层错误，没有拿到状态码
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

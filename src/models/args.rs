use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::header::HeaderValue;

use crate::engine::report::ReportFormat;
use crate::engine::targets::TargetSource;
use crate::models::errors::ConfigError;
use crate::models::request_spec::{HttpMethod, RequestOptions};
use crate::models::run_config::RunConfig;

#[derive(Parser, Debug)]
#[command(version, about = "Regression test and benchmark utility", long_about = None)]
pub struct Args {
    /// 并发用户数
    #[arg(short, long = "concurrent", default_value_t = 10)]
    pub concurrent: usize,

    /// 每个请求之后的随机延迟上限（秒），不计入统计
    #[arg(short, long, default_value_t = 1)]
    pub delay: u64,

    /// 每个用户重复的轮数，0 表示不限
    #[arg(short, long, default_value_t = 0)]
    pub reps: u64,

    /// 目标地址
    #[arg(short, long)]
    pub url: Option<String>,

    /// 目标文件，每行: <url>[ <METHOD>][ <body>]
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// 报告追加写入的日志文件
    #[arg(short, long)]
    pub log: Option<PathBuf>,

    /// 持续时间，例如 30s、5m、1h
    #[arg(short, long)]
    pub time: Option<String>,

    /// 附加请求头 "Name: Value"，可以多次传入
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// User-Agent
    #[arg(short = 'A', long)]
    pub user_agent: Option<String>,

    /// Content-Type
    #[arg(short = 'T', long)]
    pub content_type: Option<String>,

    /// 使用 GET
    #[arg(short, long, default_value_t = false)]
    pub get: bool,

    /// 使用 POST
    #[arg(short, long, default_value_t = false)]
    pub post: bool,

    /// 模拟用户随机访问，每轮打乱目标顺序
    #[arg(short, long, default_value_t = false)]
    pub internet: bool,

    /// 基准模式，请求之间没有延迟
    #[arg(short, long, default_value_t = false)]
    pub benchmark: bool,

    /// xml 格式输出
    #[arg(short, long, default_value_t = false, conflicts_with = "json")]
    pub xml: bool,

    /// json 格式输出
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// 单个请求超时时间（秒），0 表示不超时
    #[arg(long, default_value_t = 1)]
    pub timeout: u64,

    /// 打印详情
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// 不显示进度条
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}

/// 校验之后的完整配置
#[derive(Debug, Clone)]
pub struct Settings {
    pub run: RunConfig,
    pub source: TargetSource,
    pub request: RequestOptions,
    pub format: ReportFormat,
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let source = match (self.url, self.file) {
            (Some(url), None) => TargetSource::Url(url),
            (None, Some(file)) => TargetSource::File(file),
            (None, None) => return Err(ConfigError::MissingTarget),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingTargets),
        };

        let method = match (self.get, self.post) {
            (true, true) => return Err(ConfigError::ConflictingMethods),
            (_, true) => HttpMethod::Post,
            _ => HttpMethod::Get,
        };
        let mut request = RequestOptions::new(method).with_raw_headers(&self.headers);
        request.user_agent = header_value("User-Agent", self.user_agent)?;
        request.content_type = header_value("Content-Type", self.content_type)?;

        let mut run = RunConfig::new(self.concurrent)
            .with_delay(Duration::from_secs(self.delay))
            .with_benchmark(self.benchmark)
            .with_internet(self.internet)
            .with_repetitions(self.reps)
            .with_timeout(Some(Duration::from_secs(self.timeout)));
        if let Some(time) = self.time {
            run = run.with_time_limit(parse_time_limit(&time)?);
        }
        run.verbose = self.verbose;
        run.show_progress = !self.quiet && !self.verbose;
        // 目标文件还没有读，按每轮一个目标先检查
        run.validate(1)?;

        let format = if self.xml {
            ReportFormat::Xml
        } else if self.json {
            ReportFormat::Json
        } else {
            ReportFormat::Text
        };

        Ok(Settings {
            run,
            source,
            request,
            format,
            log_file: self.log,
        })
    }
}

pub fn parse_time_limit(value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|source| ConfigError::InvalidTimeLimit {
        value: value.to_string(),
        source,
    })
}

fn header_value(name: &'static str, value: Option<String>) -> Result<Option<HeaderValue>, ConfigError> {
    match value {
        None => Ok(None),
        Some(value) => HeaderValue::from_str(&value)
            .map(Some)
            .map_err(|_| ConfigError::InvalidHeaderValue { name, value }),
    }
}

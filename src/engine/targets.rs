use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;
use reqwest::Url;

use crate::models::errors::{ConfigError, TargetError};
use crate::models::request_spec::{HttpMethod, RequestOptions, RequestSpec};

/// 压测目标来源：单个url或者目标文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    Url(String),
    File(PathBuf),
}

/// 一轮要发出的请求序列
#[derive(Debug, Clone)]
pub enum Targets {
    // url模式，所有worker共享同一个请求
    Single(Arc<RequestSpec>),
    // 文件模式，每个worker持有自己的副本
    List(Vec<Arc<RequestSpec>>),
}

impl Targets {
    pub fn per_pass(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_pass() == 0
    }

    pub fn as_slice(&self) -> &[Arc<RequestSpec>] {
        match self {
            Targets::Single(spec) => std::slice::from_ref(spec),
            Targets::List(specs) => specs,
        }
    }

    /// internet模式下打乱顺序，单url没有可打乱的
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if let Targets::List(specs) = self {
            shuffle(specs, rng);
        }
    }
}

pub fn load_targets(source: &TargetSource, options: &RequestOptions) -> Result<Targets, ConfigError> {
    match source {
        TargetSource::Url(url) => single_target(url, options),
        TargetSource::File(path) => file_targets(path, options),
    }
}

pub fn single_target(url: &str, options: &RequestOptions) -> Result<Targets, ConfigError> {
    let url = parse_url(url.trim())?;
    let spec = RequestSpec::new(options.method, url, "", options);
    Ok(Targets::Single(Arc::new(spec)))
}

pub fn file_targets(path: &Path, options: &RequestOptions) -> Result<Targets, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    })?;
    let specs = parse_targets(&content, options);
    if specs.is_empty() {
        return Err(ConfigError::NoTargets {
            path: path.to_path_buf(),
        });
    }
    tracing::info!(path = %path.display(), targets = specs.len(), "loaded target file");
    Ok(Targets::List(specs))
}

/// 逐行解析目标文件，无法解析的行跳过，不计入总数
pub fn parse_targets(content: &str, options: &RequestOptions) -> Vec<Arc<RequestSpec>> {
    content
        .trim_matches(|c: char| matches!(c, '\r' | '\n' | '\t' | ' '))
        .lines()
        .map(str::trim)
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .filter_map(|(index, line)| match parse_line(line, options) {
            Ok(spec) => Some(Arc::new(spec)),
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping target line");
                None
            }
        })
        .collect()
}

/// 行格式: `<url>[ <METHOD>][ <body>]`
///
/// 第二段如果不是 GET/POST，就当作请求体的一部分。
pub fn parse_line(line: &str, options: &RequestOptions) -> Result<RequestSpec, TargetError> {
    let line = line.trim();
    let (raw_url, rest) = match line.split_once(char::is_whitespace) {
        Some((url, rest)) => (url, rest.trim_start()),
        None => (line, ""),
    };

    let mut method = options.method;
    let mut body = rest;
    if let Some(token) = rest.split_whitespace().next() {
        if let Some(m) = HttpMethod::from_token(token) {
            method = m;
            body = rest[token.len()..].trim_start();
        }
    }

    let url = parse_url(raw_url)?;
    Ok(RequestSpec::new(method, url, body, options))
}

fn parse_url(raw: &str) -> Result<Url, TargetError> {
    let url = Url::parse(raw).map_err(|e| TargetError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(TargetError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}

/// Fisher–Yates 原地洗牌
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

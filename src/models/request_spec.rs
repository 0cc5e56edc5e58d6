use std::fmt;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    /// 大小写不敏感，只认 GET/POST
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("GET") {
            Some(HttpMethod::Get)
        } else if token.eq_ignore_ascii_case("POST") {
            Some(HttpMethod::Post)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }
}

/// 所有请求共用的选项：默认方法、UA、Content-Type 以及附加请求头
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub user_agent: Option<HeaderValue>,
    pub content_type: Option<HeaderValue>,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl RequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        RequestOptions {
            method,
            ..Default::default()
        }
    }

    /// 解析 "Name: Value" 形式的请求头，格式不对的直接丢弃
    pub fn with_raw_headers<S: AsRef<str>>(mut self, raw_headers: &[S]) -> Self {
        self.headers = raw_headers
            .iter()
            .filter_map(|raw| parse_header_line(raw.as_ref()))
            .collect();
        self
    }
}

pub(crate) fn parse_header_line(raw: &str) -> Option<(HeaderName, HeaderValue)> {
    let (name, value) = raw.split_once(':')?;
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || value.is_empty() {
        tracing::debug!(header = raw, "dropping malformed header");
        return None;
    }
    match (name.parse::<HeaderName>(), HeaderValue::from_str(value)) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            tracing::debug!(header = raw, "dropping malformed header");
            None
        }
    }
}

/// 一次请求的完整描述，构建后不可变
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub url: Url,
    pub body: String,
    pub user_agent: Option<HeaderValue>,
    pub content_type: Option<HeaderValue>,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, url: Url, body: impl Into<String>, options: &RequestOptions) -> Self {
        RequestSpec {
            method,
            url,
            body: body.into(),
            user_agent: options.user_agent.clone(),
            content_type: options.content_type.clone(),
            headers: options.headers.clone(),
        }
    }
}

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;

use crate::models::errors::TransportError;
use crate::models::request_spec::RequestSpec;
use crate::models::result::RequestResult;

/// 发送请求的传输层，worker 之间共享
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> RequestResult;
}

/// 基于 reqwest 的实现，一个 client 供所有 worker 并发使用
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let client_builder = Client::builder().user_agent(default_user_agent());
        // 如果传入了超时时间，客户端添加超时时间
        let client = match timeout {
            Some(timeout) => client_builder
                .timeout(timeout)
                .build()
                .context("failed to build http client with timeout")?,
            None => client_builder.build().context("failed to build http client")?,
        };
        Ok(ReqwestTransport { client })
    }
}

/// 默认 UA: "包名 版本 (系统; 系统版本)"
pub fn default_user_agent() -> String {
    let info = os_info::get();
    format!(
        "{} {} ({}; {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        info.os_type(),
        info.version()
    )
}

pub(crate) fn build_headers(request: &RequestSpec) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(user_agent) = &request.user_agent {
        headers.insert(USER_AGENT, user_agent.clone());
    }
    if let Some(content_type) = &request.content_type {
        headers.insert(CONTENT_TYPE, content_type.clone());
    }
    // 附加请求头后写入，同名覆盖
    for (name, value) in &request.headers {
        headers.insert(name.clone(), value.clone());
    }
    headers
}

fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &RequestSpec) -> RequestResult {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.clone())
            .headers(build_headers(request));
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        // 计时只到拿到响应头为止
        let start = Instant::now();
        match builder.send().await {
            Ok(response) => {
                let duration = start.elapsed();
                let status = response.status().as_u16();
                // 响应体必须读完，避免连接泄漏
                let bytes = match response.bytes().await {
                    Ok(body) => body.len() as u64,
                    Err(e) => {
                        tracing::debug!(url = %request.url, error = %e, "failed to read response body");
                        0
                    }
                };
                RequestResult::response(duration, status, bytes)
            }
            Err(e) => RequestResult::failed(start.elapsed(), classify(&e)),
        }
    }
}

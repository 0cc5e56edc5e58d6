use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::errors::TransportError;

/// 单个请求的结果，由worker产生，通过通道交给聚合器
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResult {
    pub duration: Duration,
    pub status: Option<u16>,
    pub bytes: u64,
    pub error: Option<TransportError>,
}

impl RequestResult {
    pub fn response(duration: Duration, status: u16, bytes: u64) -> Self {
        RequestResult {
            duration,
            status: Some(status),
            bytes,
            error: None,
        }
    }

    pub fn failed(duration: Duration, error: TransportError) -> Self {
        RequestResult {
            duration,
            status: None,
            bytes: 0,
            error: Some(error),
        }
    }

    /// 没有传输错误且状态码小于500
    pub fn is_success(&self) -> bool {
        self.error.is_none() && matches!(self.status, Some(code) if code < 500)
    }

    /// 传输错误或者5xx
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || matches!(self.status, Some(code) if code >= 500)
    }
}

/// 运行期间每秒发布一次的快照，响应时间单位为毫秒
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    // 毫秒时间戳
    pub timestamp: i64,
    pub elapsed_secs: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rps: f64,
    pub total_data_kb: f64,
    pub median_response_time: u64,
    pub response_time_95: u64,
    pub response_time_99: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let ms = Duration::from_millis(1);
        assert!(RequestResult::response(ms, 200, 0).is_success());
        assert!(RequestResult::response(ms, 404, 0).is_success());
        assert!(!RequestResult::response(ms, 404, 0).is_failure());
        assert!(RequestResult::response(ms, 500, 0).is_failure());
        assert!(!RequestResult::response(ms, 503, 0).is_success());

        let timeout = RequestResult::failed(ms, TransportError::Timeout("1s".into()));
        assert!(timeout.is_failure());
        assert!(!timeout.is_success());
        assert_eq!(timeout.status, None);
    }
}

use std::time::Duration;

use crate::models::errors::ConfigError;

/// 一次压测的运行参数，校验之后不再修改
#[derive(Debug, Clone)]
pub struct RunConfig {
    // 并发数
    pub concurrency: usize,
    // 请求间随机延迟的上限，0 表示不延迟
    pub delay: Duration,
    // 基准模式，强制不延迟
    pub benchmark: bool,
    // 重复次数，0 表示不限
    pub repetitions: u64,
    // 持续时间
    pub time_limit: Option<Duration>,
    // 每轮打乱目标顺序
    pub internet: bool,
    // 单个请求超时时间
    pub timeout: Option<Duration>,
    pub show_progress: bool,
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            concurrency: 10,
            delay: Duration::from_secs(1),
            benchmark: false,
            repetitions: 0,
            time_limit: None,
            internet: false,
            timeout: Some(Duration::from_secs(1)),
            show_progress: false,
            verbose: false,
        }
    }
}

/// 运行的结束条件，启动前决定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Counted { expected: u64 },
    Timed(Duration),
    Unbounded,
}

impl RunConfig {
    pub fn new(concurrency: usize) -> Self {
        RunConfig {
            concurrency,
            ..Default::default()
        }
    }

    pub fn with_repetitions(mut self, repetitions: u64) -> Self {
        self.repetitions = if self.time_limit.is_some() { 0 } else { repetitions };
        self
    }

    /// 设置了持续时间之后重复次数会被清零
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        if time_limit.is_zero() {
            self.time_limit = None;
        } else {
            self.time_limit = Some(time_limit);
            self.repetitions = 0;
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_benchmark(mut self, benchmark: bool) -> Self {
        self.benchmark = benchmark;
        self
    }

    pub fn with_internet(mut self, internet: bool) -> Self {
        self.internet = internet;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// 计数模式下总请求数必须能用 u64 表示
    pub fn validate(&self, targets_per_pass: usize) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.time_limit.is_none() && self.expected_requests(targets_per_pass).is_none() {
            return Err(ConfigError::RequestCountOverflow {
                repetitions: self.repetitions,
                concurrency: self.concurrency,
                targets: targets_per_pass,
            });
        }
        Ok(())
    }

    /// reps * 并发数 * 每轮目标数，溢出时返回 None
    pub fn expected_requests(&self, targets_per_pass: usize) -> Option<u64> {
        self.repetitions
            .checked_mul(self.concurrency as u64)?
            .checked_mul(targets_per_pass as u64)
    }

    /// 实际使用的延迟上限，基准模式或者上限为0时没有延迟
    pub fn effective_delay(&self) -> Option<Duration> {
        if self.benchmark || self.delay.is_zero() {
            None
        } else {
            Some(self.delay)
        }
    }

    pub fn termination(&self, targets_per_pass: usize) -> Termination {
        if let Some(limit) = self.time_limit {
            return Termination::Timed(limit);
        }
        if self.repetitions > 0 {
            // validate 已经排除了溢出
            let expected = self.expected_requests(targets_per_pass).unwrap_or(u64::MAX);
            return Termination::Counted { expected };
        }
        Termination::Unbounded
    }
}

use std::time::{Duration, Instant};

use anyhow::anyhow;
use histogram::Histogram;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::progress::RunProgress;
use crate::engine::status_share;
use crate::models::result::{RequestResult, StatsSnapshot};
use crate::models::run_config::Termination;
use crate::models::status_code_stats::StatusCodeStats;

// 快照发布间隔
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);
// 实时统计桶的精度参数
const GROUPING_POWER: u8 = 7;
const MAX_VALUE_POWER: u8 = 32;

/// 运行期间的累计统计，只由聚合器修改
#[derive(Debug, Clone)]
pub struct AggregateStats {
    start: Instant,
    pub total: u64,
    // 所有请求耗时之和
    pub total_time: Duration,
    pub success: u64,
    pub fail: u64,
    pub bytes: u64,
    pub longest: Option<Duration>,
    pub shortest: Option<Duration>,
    pub codes: StatusCodeStats,
    // 每个请求的耗时（秒），只用于计算百分位
    pub times: Vec<f64>,
}

impl Default for AggregateStats {
    fn default() -> Self {
        AggregateStats::new()
    }
}

impl AggregateStats {
    pub fn new() -> Self {
        AggregateStats {
            start: Instant::now(),
            total: 0,
            total_time: Duration::ZERO,
            success: 0,
            fail: 0,
            bytes: 0,
            longest: None,
            shortest: None,
            codes: StatusCodeStats::new(),
            times: Vec::new(),
        }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn record(&mut self, result: &RequestResult) {
        let duration = result.duration;
        self.total += 1;
        self.total_time += duration;
        self.times.push(duration.as_secs_f64());
        self.bytes += result.bytes;

        // 5xx 不进状态码统计
        if result.is_success() {
            if let Some(code) = result.status {
                self.codes.increment(code);
            }
            self.success += 1;
        }
        if result.is_failure() {
            self.fail += 1;
        }

        self.longest = Some(self.longest.map_or(duration, |longest| longest.max(duration)));
        self.shortest = Some(self.shortest.map_or(duration, |shortest| shortest.min(duration)));
    }

    /// 未失败请求的占比，没有请求时为0
    pub fn availability(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.total - self.fail) as f64 / self.total as f64
    }
}

/// 结果通道唯一的消费者
pub struct Aggregator {
    stats: AggregateStats,
    // 毫秒级的实时统计桶，用于快照里的近似百分位
    histogram: Histogram,
    progress: RunProgress,
    verbose: bool,
}

impl Aggregator {
    pub fn new(progress: RunProgress, verbose: bool) -> anyhow::Result<Self> {
        let histogram = Histogram::new(GROUPING_POWER, MAX_VALUE_POWER)
            .map_err(|e| anyhow!("failed to build histogram: {:?}", e))?;
        Ok(Aggregator {
            stats: AggregateStats::new(),
            histogram,
            progress,
            verbose,
        })
    }

    pub fn stats(&self) -> &AggregateStats {
        &self.stats
    }

    pub fn record(&mut self, result: RequestResult) {
        if let Err(e) = self.histogram.increment(result.duration.as_millis() as u64) {
            tracing::debug!(error = ?e, "histogram increment failed");
        }
        self.stats.record(&result);
        self.progress.on_result(self.stats.total);
    }

    /// 消费结果直到满足结束条件：
    /// 计数模式消费满 expected 个，计时模式到时，通道关闭，或者被取消
    pub async fn consume(
        mut self,
        mut rx: mpsc::Receiver<RequestResult>,
        termination: Termination,
        cancel: CancellationToken,
    ) -> AggregateStats {
        let expected = match termination {
            Termination::Counted { expected } => Some(expected),
            _ => None,
        };
        let deadline = async move {
            match termination {
                Termination::Timed(limit) => sleep(limit).await,
                _ => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut ticker = interval(SNAPSHOT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次 tick 立即返回
        ticker.tick().await;

        loop {
            if let Some(expected) = expected {
                if self.stats.total >= expected {
                    tracing::debug!(expected, "expected result count reached");
                    break;
                }
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(total = self.stats.total, "run cancelled");
                    break;
                }
                _ = &mut deadline => {
                    tracing::info!(total = self.stats.total, "time limit reached");
                    break;
                }
                _ = ticker.tick() => {
                    self.progress.on_tick();
                    self.publish();
                }
                received = rx.recv() => match received {
                    Some(result) => self.record(result),
                    None => {
                        tracing::debug!("all workers finished");
                        break;
                    }
                },
            }
        }

        self.publish();
        self.progress.finish();
        self.stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let elapsed_secs = self.stats.elapsed().as_secs_f64();
        let percentile = |p: f64| match self.histogram.percentile(p) {
            Ok(bucket) => *bucket.range().start(),
            Err(_) => 0,
        };
        let rps = if elapsed_secs > 0.0 {
            self.stats.total as f64 / elapsed_secs
        } else {
            0.0
        };
        StatsSnapshot {
            timestamp: (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
            elapsed_secs,
            total_requests: self.stats.total,
            successful_requests: self.stats.success,
            failed_requests: self.stats.fail,
            rps,
            total_data_kb: self.stats.bytes as f64 / 1024.0,
            median_response_time: percentile(50.0),
            response_time_95: percentile(95.0),
            response_time_99: percentile(99.0),
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        if self.verbose {
            tracing::info!(
                total = snapshot.total_requests,
                success = snapshot.successful_requests,
                fail = snapshot.failed_requests,
                rps = %format!("{:.2}", snapshot.rps),
                p50_ms = snapshot.median_response_time,
                p95_ms = snapshot.response_time_95,
                p99_ms = snapshot.response_time_99,
                "progress"
            );
        }
        status_share::publish(snapshot);
    }
}

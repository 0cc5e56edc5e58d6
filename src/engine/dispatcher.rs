use std::sync::Arc;

use anyhow::Context;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::aggregator::{AggregateStats, Aggregator};
use crate::engine::progress::RunProgress;
use crate::engine::targets::Targets;
use crate::engine::transport::HttpTransport;
use crate::engine::worker::Worker;
use crate::models::result::RequestResult;
use crate::models::run_config::RunConfig;

// tokio 的通道不支持0容量，用1近似无缓冲
const RESULT_CHANNEL_CAPACITY: usize = 1;

/// 管理worker池和结果通道
pub struct Dispatcher {
    config: RunConfig,
    targets: Targets,
    transport: Arc<dyn HttpTransport>,
}

/// 运行中的压测，可以取消，也可以等待最终统计
pub struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<anyhow::Result<AggregateStats>>,
}

impl RunHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 立即结束运行，已经聚合的数据仍然会返回
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> anyhow::Result<AggregateStats> {
        self.task.await.context("run task stopped unexpectedly")?
    }
}

impl Dispatcher {
    pub fn new(config: RunConfig, targets: Targets, transport: Arc<dyn HttpTransport>) -> Self {
        Dispatcher {
            config,
            targets,
            transport,
        }
    }

    pub fn start(self) -> RunHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.execute(token).await });
        RunHandle { cancel, task }
    }

    async fn execute(self, cancel: CancellationToken) -> anyhow::Result<AggregateStats> {
        if self.targets.is_empty() {
            anyhow::bail!("no targets to run against");
        }
        self.config.validate(self.targets.per_pass())?;

        let termination = self.config.termination(self.targets.per_pass());
        // 统计的开始时间在这里确定
        let aggregator = Aggregator::new(
            RunProgress::new(termination, self.config.show_progress),
            self.config.verbose,
        )?;
        let (result_tx, result_rx) = mpsc::channel::<RequestResult>(RESULT_CHANNEL_CAPACITY);
        let workers_cancel = cancel.child_token();

        tracing::info!(
            concurrency = self.config.concurrency,
            targets = self.targets.per_pass(),
            ?termination,
            "run started"
        );

        let mut handles = Vec::with_capacity(self.config.concurrency);
        for id in 0..self.config.concurrency {
            let worker = Worker::new(
                id,
                self.targets.clone(),
                Arc::clone(&self.transport),
                result_tx.clone(),
                workers_cancel.clone(),
                &self.config,
            );
            handles.push(tokio::spawn(worker.run()));
        }
        // 所有worker结束后通道关闭，聚合器据此退出
        drop(result_tx);

        let stats = aggregator.consume(result_rx, termination, cancel).await;

        // 结束条件已满足，通知还在运行的worker退出并等待回收
        workers_cancel.cancel();
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "worker task failed");
            }
        }

        tracing::info!(
            total = stats.total,
            success = stats.success,
            fail = stats.fail,
            "run finished"
        );
        Ok(stats)
    }
}

/// 启动一次运行并等待结束
pub async fn run(
    config: RunConfig,
    targets: Targets,
    transport: Arc<dyn HttpTransport>,
) -> anyhow::Result<AggregateStats> {
    Dispatcher::new(config, targets, transport).start().wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::targets::{parse_targets, single_target};
    use crate::models::errors::TransportError;
    use crate::models::request_spec::{HttpMethod, RequestOptions, RequestSpec};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    /// 按路径返回预设的状态码，每次请求耗时固定
    struct ScriptedTransport {
        calls: AtomicU64,
        latency: Duration,
    }

    impl ScriptedTransport {
        fn new(latency: Duration) -> Arc<Self> {
            Arc::new(ScriptedTransport {
                calls: AtomicU64::new(0),
                latency,
            })
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: &RequestSpec) -> RequestResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            match request.url.path() {
                "/missing" => RequestResult::response(self.latency, 404, 9),
                "/broken" => RequestResult::response(self.latency, 500, 5),
                "/down" => RequestResult::failed(self.latency, TransportError::Connect("refused".into())),
                _ => RequestResult::response(self.latency, 200, 100),
            }
        }
    }

    fn config(concurrency: usize) -> RunConfig {
        RunConfig::new(concurrency).with_benchmark(true)
    }

    #[tokio::test]
    async fn test_counted_run_consumes_exact_count() {
        let transport = ScriptedTransport::new(Duration::ZERO);
        let targets = single_target("http://a/", &RequestOptions::default()).unwrap();
        let stats = run(config(2).with_repetitions(3), targets, transport.clone())
            .await
            .unwrap();
        assert_eq!(stats.total, 6);
        assert_eq!(stats.success, 6);
        assert_eq!(stats.codes.get(200), 6);
        assert_eq!(transport.calls(), 6);
    }

    #[tokio::test]
    async fn test_file_run_skips_malformed_line() {
        let transport = ScriptedTransport::new(Duration::ZERO);
        let specs = parse_targets(
            "http://a/one\nnot a url at all\nhttp://a/two POST x=1\n",
            &RequestOptions::new(HttpMethod::Get),
        );
        let stats = run(config(1).with_repetitions(1), Targets::List(specs), transport.clone())
            .await
            .unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_mixed_outcomes_are_classified() {
        let transport = ScriptedTransport::new(Duration::ZERO);
        let specs = parse_targets(
            "http://a/ok\nhttp://a/missing\nhttp://a/broken\nhttp://a/down\n",
            &RequestOptions::default(),
        );
        let stats = run(config(3).with_repetitions(2), Targets::List(specs), transport)
            .await
            .unwrap();
        assert_eq!(stats.total, 24);
        assert_eq!(stats.success, 12);
        assert_eq!(stats.fail, 12);
        assert_eq!(stats.codes.get(200), 6);
        assert_eq!(stats.codes.get(404), 6);
        assert_eq!(stats.codes.get(500), 0);
        assert_eq!(stats.bytes, 6 * (100 + 9 + 5));
    }

    #[tokio::test]
    async fn test_timed_run_stops_and_releases_workers() {
        let transport = ScriptedTransport::new(Duration::from_millis(5));
        let targets = single_target("http://a/", &RequestOptions::default()).unwrap();
        let started = Instant::now();
        let stats = run(
            config(4).with_time_limit(Duration::from_millis(200)),
            targets,
            transport.clone(),
        )
        .await
        .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(stats.total > 0);

        // worker 已经全部退出，不会再发请求
        let calls = transport.calls();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.calls(), calls);
    }

    #[tokio::test]
    async fn test_cancel_returns_partial_stats() {
        let transport = ScriptedTransport::new(Duration::from_millis(2));
        let targets = single_target("http://a/", &RequestOptions::default()).unwrap();
        let handle = Dispatcher::new(config(2), targets, transport).start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
        let stats = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("run did not stop after cancel")
            .unwrap();
        assert!(stats.total > 0);
        assert_eq!(stats.total, stats.success);
    }

    #[tokio::test]
    async fn test_invalid_concurrency_is_rejected() {
        let transport = ScriptedTransport::new(Duration::ZERO);
        let targets = single_target("http://a/", &RequestOptions::default()).unwrap();
        assert!(run(config(0).with_repetitions(1), targets, transport).await.is_err());
    }

    #[tokio::test]
    async fn test_overflowing_request_count_is_rejected() {
        let transport = ScriptedTransport::new(Duration::ZERO);
        let specs = parse_targets("http://a/1\nhttp://a/2\nhttp://a/3\n", &RequestOptions::default());
        let err = run(config(2).with_repetitions(u64::MAX / 4), Targets::List(specs), transport.clone())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("overflows"));
        assert_eq!(transport.calls(), 0);
    }
}

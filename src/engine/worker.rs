use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::targets::Targets;
use crate::engine::transport::HttpTransport;
use crate::models::request_spec::RequestSpec;
use crate::models::result::RequestResult;
use crate::models::run_config::{RunConfig, Termination};

/// 单个并发单元：发请求 -> 上报结果 -> 随机延迟 -> 下一个
pub struct Worker {
    id: usize,
    // 自己持有的目标副本，打乱顺序不影响其它worker
    targets: Targets,
    transport: Arc<dyn HttpTransport>,
    result_tx: mpsc::Sender<RequestResult>,
    cancel: CancellationToken,
    delay: Option<Duration>,
    internet: bool,
    // 计数模式下的轮数，None 表示一直跑到取消
    passes: Option<u64>,
    rng: StdRng,
}

impl Worker {
    pub fn new(
        id: usize,
        targets: Targets,
        transport: Arc<dyn HttpTransport>,
        result_tx: mpsc::Sender<RequestResult>,
        cancel: CancellationToken,
        config: &RunConfig,
    ) -> Self {
        let passes = match config.termination(targets.per_pass()) {
            Termination::Counted { .. } => Some(config.repetitions),
            _ => None,
        };
        Worker {
            id,
            targets,
            transport,
            result_tx,
            cancel,
            delay: config.effective_delay(),
            internet: config.internet,
            passes,
            rng: StdRng::from_entropy(),
        }
    }

    #[cfg(test)]
    fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// 返回发送出去的结果数量
    pub async fn run(mut self) -> u64 {
        let mut sent = 0u64;
        let mut pass = 0u64;

        tracing::debug!(worker_id = self.id, "worker started");
        'passes: loop {
            if let Some(passes) = self.passes {
                if pass >= passes {
                    break;
                }
            }
            pass += 1;

            if self.internet {
                self.targets.shuffle(&mut self.rng);
            }
            for index in 0..self.targets.per_pass() {
                let request = Arc::clone(&self.targets.as_slice()[index]);
                if !self.issue(&request).await {
                    break 'passes;
                }
                sent += 1;
                if let Some(bound) = self.delay {
                    if !self.pause(bound).await {
                        break 'passes;
                    }
                }
            }
        }
        tracing::debug!(worker_id = self.id, sent, passes = pass, "worker finished");
        sent
    }

    /// 发请求并上报，被取消或者通道关闭时返回 false
    async fn issue(&self, request: &RequestSpec) -> bool {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            result = self.transport.send(request) => result,
        };
        if let Some(error) = &result.error {
            tracing::debug!(worker_id = self.id, url = %request.url, error = %error, "request failed");
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.result_tx.send(result) => sent.is_ok(),
        }
    }

    /// 延迟不计入统计，被取消时返回 false
    async fn pause(&mut self, bound: Duration) -> bool {
        let delay = delay_for(bound, &mut self.rng);
        if delay.is_zero() {
            return true;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// [0, bound) 之间的随机延迟，毫秒精度
pub(crate) fn delay_for<R: Rng + ?Sized>(bound: Duration, rng: &mut R) -> Duration {
    let bound_ms = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX);
    if bound_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.gen_range(0..bound_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::targets::{parse_targets, single_target};
    use crate::models::request_spec::{HttpMethod, RequestOptions};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Instant;

    /// 记录请求路径，固定返回200
    #[derive(Default)]
    struct RecordingTransport {
        paths: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn send(&self, request: &RequestSpec) -> RequestResult {
            self.paths.lock().push(request.url.path().to_string());
            RequestResult::response(Duration::from_millis(1), 200, 2)
        }
    }

    /// 每个请求真实耗时约5ms，返回测得的耗时
    struct SlowTransport;

    #[async_trait]
    impl HttpTransport for SlowTransport {
        async fn send(&self, _request: &RequestSpec) -> RequestResult {
            let started = Instant::now();
            tokio::time::sleep(Duration::from_millis(5)).await;
            RequestResult::response(started.elapsed(), 200, 0)
        }
    }

    fn config() -> RunConfig {
        RunConfig::new(1).with_benchmark(true)
    }

    #[tokio::test]
    async fn test_counted_worker_runs_exact_passes() {
        let transport = Arc::new(RecordingTransport::default());
        let targets = single_target("http://a/x", &RequestOptions::default()).unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let worker = Worker::new(
            0,
            targets,
            transport.clone(),
            tx,
            CancellationToken::new(),
            &config().with_repetitions(3),
        );
        let sent = worker.run().await;
        assert_eq!(sent, 3);
        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 3);
        assert_eq!(transport.paths.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_internet_mode_visits_every_target_each_pass() {
        let transport = Arc::new(RecordingTransport::default());
        let specs = parse_targets("http://a/1\nhttp://a/2\nhttp://a/3\n", &RequestOptions::new(HttpMethod::Get));
        let (tx, mut rx) = mpsc::channel(16);
        let worker = Worker::new(
            0,
            Targets::List(specs),
            transport.clone(),
            tx,
            CancellationToken::new(),
            &config().with_repetitions(2).with_internet(true),
        );
        assert_eq!(worker.run().await, 6);
        while rx.recv().await.is_some() {}

        let paths = transport.paths.lock().clone();
        for pass in paths.chunks(3) {
            let mut pass = pass.to_vec();
            pass.sort();
            assert_eq!(pass, vec!["/1", "/2", "/3"]);
        }
    }

    #[tokio::test]
    async fn test_cancel_releases_blocked_worker() {
        let transport = Arc::new(RecordingTransport::default());
        let targets = single_target("http://a/x", &RequestOptions::default()).unwrap();
        // 没有人读通道，worker 会阻塞在发送上
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Worker::new(0, targets, transport, tx, cancel.clone(), &config()).run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        let sent = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
        assert_eq!(sent, 1);
    }

    #[tokio::test]
    async fn test_worker_stops_when_receiver_dropped() {
        let transport = Arc::new(RecordingTransport::default());
        let targets = single_target("http://a/x", &RequestOptions::default()).unwrap();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sent = Worker::new(0, targets, transport, tx, CancellationToken::new(), &config())
            .run()
            .await;
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_delay_is_bounded_and_cancellable() {
        let transport = Arc::new(RecordingTransport::default());
        let targets = single_target("http://a/x", &RequestOptions::default()).unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let config = RunConfig::new(1)
            .with_delay(Duration::from_secs(60))
            .with_repetitions(5);
        let handle = tokio::spawn(Worker::new(0, targets, transport, tx, cancel.clone(), &config).run());

        // 第一个结果在延迟之前就已经发出
        let started = Instant::now();
        assert!(rx.recv().await.is_some());
        cancel.cancel();
        let sent = handle.await.unwrap();
        assert!(sent >= 1);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[test]
    fn test_delay_for_stays_within_bound() {
        let mut rng = StdRng::seed_from_u64(11);
        let bound = Duration::from_millis(200);
        let delays: Vec<Duration> = (0..1000).map(|_| delay_for(bound, &mut rng)).collect();
        assert!(delays.iter().all(|d| *d < bound));
        assert!(delays.iter().any(|d| !d.is_zero()));
        assert!(delays.iter().any(|d| *d >= bound / 2));

        assert_eq!(delay_for(Duration::ZERO, &mut rng), Duration::ZERO);
        assert_eq!(delay_for(Duration::from_micros(900), &mut rng), Duration::ZERO);
        assert!(delay_for(Duration::MAX, &mut rng) < Duration::MAX);
    }

    #[tokio::test]
    async fn test_delay_applies_between_requests_but_not_to_durations() {
        let seed = 5;
        let reps = 5;
        let bound = Duration::from_millis(200);
        let mut rng = StdRng::seed_from_u64(seed);
        let expected_pause: Duration = (0..reps).map(|_| delay_for(bound, &mut rng)).sum();

        let targets = single_target("http://a/x", &RequestOptions::default()).unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let config = RunConfig::new(1).with_delay(bound).with_repetitions(reps);
        let worker = Worker::new(0, targets, Arc::new(SlowTransport), tx, CancellationToken::new(), &config)
            .with_seed(seed);

        let started = Instant::now();
        assert_eq!(worker.run().await, reps);
        let elapsed = started.elapsed();
        assert!(!expected_pause.is_zero());
        assert!(elapsed >= expected_pause, "{:?} < {:?}", elapsed, expected_pause);

        let mut durations = Vec::new();
        while let Some(result) = rx.recv().await {
            durations.push(result.duration);
        }
        assert_eq!(durations.len() as u64, reps);
        let measured: Duration = durations.iter().sum();
        // 请求耗时只有传输本身，不包含延迟
        assert!(durations.iter().all(|d| *d >= Duration::from_millis(5)));
        assert!(measured + expected_pause <= elapsed + Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_internet_mode_reshuffles_each_pass() {
        let transport = Arc::new(RecordingTransport::default());
        let content: String = (0..8).map(|i| format!("http://a/{}\n", i)).collect();
        let specs = parse_targets(&content, &RequestOptions::default());
        let (tx, mut rx) = mpsc::channel(64);
        let worker = Worker::new(
            0,
            Targets::List(specs),
            transport.clone(),
            tx,
            CancellationToken::new(),
            &config().with_repetitions(6).with_internet(true),
        )
        .with_seed(3);
        assert_eq!(worker.run().await, 48);
        while rx.recv().await.is_some() {}

        let paths = transport.paths.lock().clone();
        let passes: Vec<Vec<String>> = paths.chunks(8).map(|pass| pass.to_vec()).collect();
        assert_eq!(passes.len(), 6);
        let mut distinct = passes.clone();
        distinct.sort();
        distinct.dedup();
        assert!(distinct.len() > 1, "every pass used the same order");
        let file_order: Vec<String> = (0..8).map(|i| format!("/{}", i)).collect();
        assert!(passes.iter().any(|pass| *pass != file_order));
    }

    #[tokio::test]
    async fn test_without_internet_mode_order_is_fixed() {
        let transport = Arc::new(RecordingTransport::default());
        let content: String = (0..8).map(|i| format!("http://a/{}\n", i)).collect();
        let specs = parse_targets(&content, &RequestOptions::default());
        let (tx, mut rx) = mpsc::channel(64);
        let worker = Worker::new(
            0,
            Targets::List(specs),
            transport.clone(),
            tx,
            CancellationToken::new(),
            &config().with_repetitions(3),
        );
        assert_eq!(worker.run().await, 24);
        while rx.recv().await.is_some() {}

        let file_order: Vec<String> = (0..8).map(|i| format!("/{}", i)).collect();
        for pass in transport.paths.lock().chunks(8) {
            assert_eq!(pass, file_order.as_slice());
        }
    }
}

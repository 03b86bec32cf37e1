//! The monitor runtime.
//!
//! `Monitor` is a cheap-to-clone handle over shared state. One
//! instance owns one broker connection and one pluggable check, and
//! runs a single logical sequence of check cycles: no two cycles for
//! the same instance overlap, and a cycle's rearm always happens after
//! its publish has settled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vigil_broker::BrokerProducer;
use vigil_core::{BrokerResult, CheckReportList, CheckStatus, MonitorConfig, ReportList, RetryPolicy};

use crate::runner;

/// The pluggable check capability: one operation, evaluating the
/// monitored target and returning a draft report list.
///
/// A failure here never escapes the monitor; the run cycle absorbs it
/// into a synthesized `down` report.
#[async_trait]
pub trait Check: Send + Sync {
    async fn check(&self) -> anyhow::Result<ReportList>;
}

/// A connect or disconnect operation shared by concurrent callers.
type PendingOp = Shared<BoxFuture<'static, BrokerResult<()>>>;

/// Scheduler and cycle state, mutated only under one lock and never
/// across an await point.
struct SchedulerState {
    enabled: bool,
    /// Consecutive `down` counter driving the backoff.
    attempt: u32,
    last_run_ms: u64,
    next_run_ms: u64,
    last_report_list: Option<CheckReportList>,
    /// The single armed timer. Replaced on rearm, never stacked.
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    config: MonitorConfig,
    retry: RetryPolicy,
    interval: Duration,
    initial_interval: Duration,
    broker: Arc<dyn BrokerProducer>,
    check: Arc<dyn Check>,
    state: Mutex<SchedulerState>,
    connect_op: Mutex<Option<PendingOp>>,
    disconnect_op: Mutex<Option<PendingOp>>,
}

/// Health-check agent for a single monitored target.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    /// Build a monitor. Must be called inside a Tokio runtime: when
    /// `auto_start` is set, a background connect is spawned and the
    /// monitor enables itself once the broker reports ready. A failed
    /// auto-connect is logged, never propagated.
    pub fn new(
        config: MonitorConfig,
        broker: Arc<dyn BrokerProducer>,
        check: Arc<dyn Check>,
    ) -> Self {
        let retry = config.retry_policy();
        let interval = config.interval();
        let initial_interval = config.initial_interval();
        let auto_start = config.auto_start;

        let monitor = Self {
            inner: Arc::new(Inner {
                config,
                retry,
                interval,
                initial_interval,
                broker,
                check,
                state: Mutex::new(SchedulerState {
                    enabled: false,
                    attempt: 0,
                    last_run_ms: 0,
                    next_run_ms: 0,
                    last_report_list: None,
                    timer: None,
                }),
                connect_op: Mutex::new(None),
                disconnect_op: Mutex::new(None),
            }),
        };

        if auto_start {
            let this = monitor.clone();
            tokio::spawn(async move {
                if let Err(e) = this.connect().await {
                    error!(monitor = %this.inner.config.id, error = %e, "auto-connect failed");
                }
            });
        }

        monitor
    }

    /// Monitor identifier.
    pub fn id(&self) -> &str {
        &self.inner.config.id
    }

    /// Whether the broker connection reports connected.
    pub fn is_connected(&self) -> bool {
        self.inner.broker.is_connected()
    }

    /// Whether the scheduler loop is running.
    pub async fn is_enabled(&self) -> bool {
        self.inner.state.lock().await.enabled
    }

    /// The most recent published report list, if any cycle has run.
    pub async fn last_report_list(&self) -> Option<CheckReportList> {
        self.inner.state.lock().await.last_report_list.clone()
    }

    /// Epoch ms of the last completed cycle (0 before the first).
    pub async fn last_run_ms(&self) -> u64 {
        self.inner.state.lock().await.last_run_ms
    }

    /// Epoch ms the next cycle is scheduled for (0 while disabled).
    pub async fn next_run_ms(&self) -> u64 {
        self.inner.state.lock().await.next_run_ms
    }

    /// Connect to the broker and wait for readiness.
    ///
    /// Idempotent: already connected resolves immediately, and a
    /// connect already in flight is joined rather than duplicated —
    /// concurrent callers observe the same outcome. The pending slot
    /// is cleared on settlement so a later call can retry.
    pub async fn connect(&self) -> BrokerResult<()> {
        let op = {
            let mut slot = self.inner.connect_op.lock().await;
            if let Some(pending) = slot.as_ref() {
                pending.clone()
            } else if self.inner.broker.is_connected() {
                return Ok(());
            } else {
                let this = self.clone();
                let op: PendingOp = async move {
                    let result = this.inner.broker.connect().await;
                    match &result {
                        Ok(()) => {
                            info!(monitor = %this.inner.config.id, "broker connection ready");
                            if this.inner.config.auto_start {
                                this.enable().await;
                            }
                        }
                        Err(e) => {
                            warn!(monitor = %this.inner.config.id, error = %e, "connect failed");
                        }
                    }
                    *this.inner.connect_op.lock().await = None;
                    result
                }
                .boxed()
                .shared();
                *slot = Some(op.clone());
                op
            }
        };
        op.await
    }

    /// Flush and tear down the broker connection.
    ///
    /// Idempotent like `connect()`. The flush is bounded by the
    /// configured ceiling; a flush failure rejects without proceeding
    /// to teardown. Once teardown is attempted the scheduler is forced
    /// disabled regardless of the teardown outcome.
    pub async fn disconnect(&self) -> BrokerResult<()> {
        let op = {
            let mut slot = self.inner.disconnect_op.lock().await;
            if let Some(pending) = slot.as_ref() {
                pending.clone()
            } else if !self.inner.broker.is_connected() {
                return Ok(());
            } else {
                let this = self.clone();
                let op: PendingOp = async move {
                    let result = this.do_disconnect().await;
                    *this.inner.disconnect_op.lock().await = None;
                    result
                }
                .boxed()
                .shared();
                *slot = Some(op.clone());
                op
            }
        };
        op.await
    }

    async fn do_disconnect(&self) -> BrokerResult<()> {
        let flush_timeout = self.inner.config.broker.flush_timeout();
        if let Err(e) = self.inner.broker.flush(flush_timeout).await {
            warn!(monitor = %self.inner.config.id, error = %e, "flush failed, aborting disconnect");
            return Err(e);
        }

        let result = self.inner.broker.disconnect().await;
        self.disable().await;
        match &result {
            Ok(()) => info!(monitor = %self.inner.config.id, "disconnected"),
            Err(e) => {
                warn!(monitor = %self.inner.config.id, error = %e, "teardown failed")
            }
        }
        result
    }

    /// Start the check loop. No effect unless the connection reports
    /// connected; no-op if already enabled. The first cycle fires
    /// after the configured initial interval.
    pub async fn enable(&self) {
        if !self.inner.broker.is_connected() {
            debug!(monitor = %self.inner.config.id, "enable ignored while disconnected");
            return;
        }
        let mut state = self.inner.state.lock().await;
        if state.enabled {
            return;
        }
        state.enabled = true;
        self.arm(&mut state, self.inner.initial_interval);
        info!(
            monitor = %self.inner.config.id,
            initial_interval_ms = self.inner.initial_interval.as_millis() as u64,
            "monitor enabled"
        );
    }

    /// Stop the check loop: cancels the pending timer and zeroes the
    /// next-run time. An in-flight cycle is not aborted; it just
    /// doesn't rearm. No-op if already disabled.
    pub async fn disable(&self) {
        let mut state = self.inner.state.lock().await;
        if !state.enabled {
            return;
        }
        state.enabled = false;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.next_run_ms = 0;
        info!(monitor = %self.inner.config.id, "monitor disabled");
    }

    /// Arm the timer for one cycle after `delay`, replacing any
    /// previous timer. The fired cycle runs detached from the timer
    /// handle so cancelling the timer never aborts a running cycle.
    fn arm(&self, state: &mut SchedulerState, delay: Duration) {
        if let Some(old) = state.timer.take() {
            old.abort();
        }
        state.next_run_ms = epoch_ms() + delay.as_millis() as u64;
        let this = self.clone();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(async move {
                this.run().await;
            });
        }));
    }

    /// Execute one full cycle: check, normalize, publish, reschedule.
    ///
    /// Always resolves with a valid report list — check failures become
    /// a `down` report and publish failures are logged and swallowed.
    /// Rescheduling inspects only the first report's status, even when
    /// a cycle returns several reports; the first report is treated as
    /// the primary health signal.
    pub async fn run(&self) -> CheckReportList {
        let list = match self.inner.check.check().await {
            Ok(drafts) => runner::normalize(drafts, epoch_ms()),
            Err(error) => {
                warn!(monitor = %self.inner.config.id, error = %error, "check failed");
                runner::failure_list(
                    &self.inner.config.id,
                    &self.inner.config.name,
                    &error,
                    epoch_ms(),
                )
            }
        };

        {
            let mut state = self.inner.state.lock().await;
            state.last_report_list = Some(list.clone());
            state.last_run_ms = epoch_ms();
        }

        self.publish(&list);

        let mut state = self.inner.state.lock().await;
        if state.enabled {
            let delay = if list.reports[0].status != CheckStatus::Down {
                state.attempt = 0;
                self.inner.interval
            } else {
                let delay = self.inner.retry.next_delay(state.attempt);
                state.attempt += 1;
                debug!(
                    monitor = %self.inner.config.id,
                    attempt = state.attempt,
                    delay_ms = delay.as_millis() as u64,
                    "target down, backing off"
                );
                delay
            };
            self.arm(&mut state, delay);
        }

        list
    }

    /// Serialize and emit a report list. Failures are reported to the
    /// tracing sink and swallowed so the cycle always completes.
    fn publish(&self, list: &CheckReportList) {
        let payload = match serde_json::to_vec(list) {
            Ok(payload) => payload,
            Err(e) => {
                error!(monitor = %self.inner.config.id, error = %e, "report serialization failed");
                return;
            }
        };

        let (partition, key) = match &list.routing {
            Some(routing) => (routing.partition, routing.key.as_deref()),
            None => (None, None),
        };

        if let Err(e) = self.inner.broker.produce(
            &self.inner.config.broker.topic,
            partition,
            &payload,
            key,
        ) {
            error!(
                monitor = %self.inner.config.id,
                topic = %self.inner.config.broker.topic,
                error = %e,
                "failed to publish report list"
            );
        }
    }
}

fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

    use anyhow::anyhow;
    use vigil_core::{BrokerConfig, BrokerError, ReportDraft, Routing};

    #[derive(Default)]
    struct MockBroker {
        connected: AtomicBool,
        connect_calls: AtomicU32,
        flush_calls: AtomicU32,
        disconnect_calls: AtomicU32,
        connect_delay_ms: AtomicU64,
        fail_connect: AtomicBool,
        fail_flush: AtomicBool,
        fail_disconnect: AtomicBool,
        fail_produce: AtomicBool,
        produced: StdMutex<Vec<(String, Option<i32>, Vec<u8>, Option<String>)>>,
    }

    impl MockBroker {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn produced_count(&self) -> usize {
            self.produced.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl BrokerProducer for MockBroker {
        async fn connect(&self) -> BrokerResult<()> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.connect_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(BrokerError::Connect("broker unreachable".to_string()));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn produce(
            &self,
            topic: &str,
            partition: Option<i32>,
            payload: &[u8],
            key: Option<&str>,
        ) -> BrokerResult<()> {
            if self.fail_produce.load(Ordering::SeqCst) {
                return Err(BrokerError::Produce("queue full".to_string()));
            }
            self.produced.lock().unwrap().push((
                topic.to_string(),
                partition,
                payload.to_vec(),
                key.map(str::to_string),
            ));
            Ok(())
        }

        async fn flush(&self, _timeout: Duration) -> BrokerResult<()> {
            self.flush_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_flush.load(Ordering::SeqCst) {
                return Err(BrokerError::Flush("queue not drained".to_string()));
            }
            Ok(())
        }

        async fn disconnect(&self) -> BrokerResult<()> {
            self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
            self.connected.store(false, Ordering::SeqCst);
            if self.fail_disconnect.load(Ordering::SeqCst) {
                return Err(BrokerError::Disconnect("teardown failed".to_string()));
            }
            Ok(())
        }
    }

    struct StatusCheck {
        statuses: StdMutex<VecDeque<CheckStatus>>,
        last: CheckStatus,
        calls: AtomicU32,
    }

    impl StatusCheck {
        fn always(status: CheckStatus) -> Arc<Self> {
            Arc::new(Self {
                statuses: StdMutex::new(VecDeque::new()),
                last: status,
                calls: AtomicU32::new(0),
            })
        }

        fn sequence(statuses: &[CheckStatus], then: CheckStatus) -> Arc<Self> {
            Arc::new(Self {
                statuses: StdMutex::new(statuses.iter().copied().collect()),
                last: then,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Check for StatusCheck {
        async fn check(&self) -> anyhow::Result<ReportList> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.last);
            Ok(ReportList::single("m-1", "monitor one", status, "probe"))
        }
    }

    struct FailingCheck;

    #[async_trait]
    impl Check for FailingCheck {
        async fn check(&self) -> anyhow::Result<ReportList> {
            Err(anyhow!("timeout"))
        }
    }

    fn test_config(interval_ms: u64) -> MonitorConfig {
        MonitorConfig {
            id: "m-1".to_string(),
            name: "monitor one".to_string(),
            interval_ms,
            initial_interval_ms: Some(0),
            retry: None,
            broker: BrokerConfig {
                topic: "monitor.reports".to_string(),
                bootstrap_servers: "localhost:9092".to_string(),
                connect_timeout_ms: None,
                flush_timeout_ms: 1000,
                properties: HashMap::new(),
            },
            auto_start: false,
        }
    }

    #[tokio::test]
    async fn run_absorbs_check_failure() {
        let broker = MockBroker::new();
        let monitor = Monitor::new(test_config(1000), broker, Arc::new(FailingCheck));

        let list = monitor.run().await;
        assert_eq!(list.reports.len(), 1);
        assert_eq!(list.reports[0].status, CheckStatus::Down);
        assert_eq!(list.reports[0].message, "timeout");
        assert_eq!(monitor.last_report_list().await.unwrap(), list);
        assert!(monitor.last_run_ms().await > 0);
    }

    #[tokio::test]
    async fn run_publishes_normalized_payload() {
        let broker = MockBroker::new();
        let monitor = Monitor::new(
            test_config(1000),
            broker.clone(),
            StatusCheck::always(CheckStatus::Healthy),
        );

        monitor.run().await;

        let produced = broker.produced.lock().unwrap();
        assert_eq!(produced.len(), 1);
        let (topic, partition, payload, key) = &produced[0];
        assert_eq!(topic, "monitor.reports");
        assert_eq!(*partition, None);
        assert_eq!(*key, None);
        let json: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["id"], "m-1");
        assert_eq!(json["reports"][0]["status"], "healthy");
        assert!(json["time"].as_u64().unwrap() > 0);
    }

    struct RoutedCheck;

    #[async_trait]
    impl Check for RoutedCheck {
        async fn check(&self) -> anyhow::Result<ReportList> {
            let mut list =
                ReportList::single("m-1", "monitor one", CheckStatus::Healthy, "ok");
            list.routing = Some(Routing {
                partition: Some(3),
                key: Some("shard-a".to_string()),
            });
            Ok(list)
        }
    }

    #[tokio::test]
    async fn routing_hint_steers_produce_but_stays_out_of_payload() {
        let broker = MockBroker::new();
        let monitor = Monitor::new(test_config(1000), broker.clone(), Arc::new(RoutedCheck));

        monitor.run().await;

        let produced = broker.produced.lock().unwrap();
        let (_, partition, payload, key) = &produced[0];
        assert_eq!(*partition, Some(3));
        assert_eq!(key.as_deref(), Some("shard-a"));
        let json: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert!(json.get("routing").is_none());
        assert!(json.get("kafka").is_none());
    }

    struct DefectiveCheck;

    #[async_trait]
    impl Check for DefectiveCheck {
        async fn check(&self) -> anyhow::Result<ReportList> {
            Ok(ReportList {
                id: "m-1".to_string(),
                name: "monitor one".to_string(),
                time: None,
                reports: vec![ReportDraft {
                    status: None,
                    custom_status: None,
                    message: Some("half a report".to_string()),
                    name: None,
                }],
                routing: None,
            })
        }
    }

    #[tokio::test]
    async fn defective_report_is_replaced_with_broken() {
        let broker = MockBroker::new();
        let monitor = Monitor::new(test_config(1000), broker, Arc::new(DefectiveCheck));

        let list = monitor.run().await;
        assert_eq!(list.reports[0].status, CheckStatus::Broken);
        assert!(list.reports[0].message.contains("half a report"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_connects_share_one_operation() {
        let broker = MockBroker::new();
        broker.connect_delay_ms.store(50, Ordering::SeqCst);
        let monitor = Monitor::new(
            test_config(1000),
            broker.clone(),
            StatusCheck::always(CheckStatus::Healthy),
        );

        let (a, b) = tokio::join!(monitor.connect(), monitor.connect());
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(broker.connect_calls.load(Ordering::SeqCst), 1);

        // Already connected: resolves without another underlying connect.
        monitor.connect().await.unwrap();
        assert_eq!(broker.connect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_clears_slot_for_retry() {
        let broker = MockBroker::new();
        broker.fail_connect.store(true, Ordering::SeqCst);
        let monitor = Monitor::new(
            test_config(1000),
            broker.clone(),
            StatusCheck::always(CheckStatus::Healthy),
        );

        assert!(monitor.connect().await.is_err());
        assert_eq!(broker.connect_calls.load(Ordering::SeqCst), 1);

        broker.fail_connect.store(false, Ordering::SeqCst);
        assert!(monitor.connect().await.is_ok());
        assert_eq!(broker.connect_calls.load(Ordering::SeqCst), 2);
        assert!(monitor.is_connected());
    }

    #[tokio::test]
    async fn enable_has_no_effect_while_disconnected() {
        let broker = MockBroker::new();
        let monitor = Monitor::new(
            test_config(1000),
            broker,
            StatusCheck::always(CheckStatus::Healthy),
        );

        monitor.enable().await;
        assert!(!monitor.is_enabled().await);
        assert_eq!(monitor.next_run_ms().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disable_cancels_pending_timer() {
        let broker = MockBroker::new();
        let mut config = test_config(1000);
        config.initial_interval_ms = Some(100);
        let monitor = Monitor::new(
            config,
            broker.clone(),
            StatusCheck::always(CheckStatus::Healthy),
        );

        monitor.connect().await.unwrap();
        monitor.enable().await;
        assert!(monitor.is_enabled().await);
        assert!(monitor.next_run_ms().await > 0);

        monitor.disable().await;
        assert_eq!(monitor.next_run_ms().await, 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(broker.produced_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_cycles_reschedule_at_base_interval() {
        let broker = MockBroker::new();
        let monitor = Monitor::new(
            test_config(1000),
            broker.clone(),
            StatusCheck::always(CheckStatus::Healthy),
        );

        monitor.connect().await.unwrap();
        monitor.enable().await;

        // initial_interval = 0: first cycle fires immediately.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(broker.produced_count(), 1);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(broker.produced_count(), 2);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(broker.produced_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn down_with_flat_default_retry_reschedules_every_interval() {
        // interval=1000 → default retry min = max = 1000.
        let broker = MockBroker::new();
        let monitor = Monitor::new(
            test_config(1000),
            broker.clone(),
            StatusCheck::always(CheckStatus::Down),
        );

        monitor.connect().await.unwrap();
        monitor.enable().await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(broker.produced_count(), 1);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(broker.produced_count(), 2);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(broker.produced_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn down_streak_backs_off_exponentially() {
        let broker = MockBroker::new();
        let mut config = test_config(10_000);
        config.retry = Some(RetryPolicy {
            factor: 2.0,
            min_ms: 100,
            max_ms: 800,
        });
        let monitor = Monitor::new(
            config,
            broker.clone(),
            StatusCheck::always(CheckStatus::Down),
        );

        monitor.connect().await.unwrap();
        monitor.enable().await;

        // Cycles at t = 0, 100, 300, 700, 1500, 2300 (capped at 800).
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(broker.produced_count(), 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(broker.produced_count(), 2);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(broker.produced_count(), 3);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(broker.produced_count(), 4);
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(broker.produced_count(), 5);
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(broker.produced_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_resets_on_first_non_down_report() {
        let broker = MockBroker::new();
        let mut config = test_config(1000);
        config.retry = Some(RetryPolicy {
            factor: 2.0,
            min_ms: 100,
            max_ms: 800,
        });
        let monitor = Monitor::new(
            config,
            broker.clone(),
            StatusCheck::sequence(
                &[
                    CheckStatus::Down,
                    CheckStatus::Down,
                    CheckStatus::Healthy,
                    CheckStatus::Down,
                ],
                CheckStatus::Down,
            ),
        );

        monitor.connect().await.unwrap();
        monitor.enable().await;

        // t=0 down (next +100), t=100 down (next +200), t=300 healthy
        // (next +1000), t=1300 down — backoff restarts at min (+100).
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(broker.produced_count(), 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(broker.produced_count(), 2);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(broker.produced_count(), 3);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(broker.produced_count(), 4);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(broker.produced_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_does_not_stop_the_loop() {
        let broker = MockBroker::new();
        broker.fail_produce.store(true, Ordering::SeqCst);
        let check = StatusCheck::always(CheckStatus::Healthy);
        let monitor = Monitor::new(test_config(1000), broker.clone(), check.clone());

        monitor.connect().await.unwrap();
        monitor.enable().await;

        tokio::time::sleep(Duration::from_millis(2010)).await;
        assert!(check.calls.load(Ordering::SeqCst) >= 3);
        assert!(monitor.is_enabled().await);
        assert_eq!(broker.produced_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_start_enables_on_readiness() {
        let broker = MockBroker::new();
        let mut config = test_config(60_000);
        config.initial_interval_ms = Some(1000);
        config.auto_start = true;
        let monitor = Monitor::new(
            config,
            broker.clone(),
            StatusCheck::always(CheckStatus::Healthy),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(monitor.is_connected());
        assert!(monitor.is_enabled().await);
    }

    #[tokio::test]
    async fn manual_connect_does_not_enable_without_auto_start() {
        let broker = MockBroker::new();
        let monitor = Monitor::new(
            test_config(60_000),
            broker,
            StatusCheck::always(CheckStatus::Healthy),
        );

        monitor.connect().await.unwrap();
        assert!(monitor.is_connected());
        assert!(!monitor.is_enabled().await);
    }

    #[tokio::test]
    async fn disconnect_when_not_connected_short_circuits() {
        let broker = MockBroker::new();
        let monitor = Monitor::new(
            test_config(1000),
            broker.clone(),
            StatusCheck::always(CheckStatus::Healthy),
        );

        monitor.disconnect().await.unwrap();
        assert_eq!(broker.flush_calls.load(Ordering::SeqCst), 0);
        assert_eq!(broker.disconnect_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_failure_rejects_without_teardown() {
        let broker = MockBroker::new();
        broker.fail_flush.store(true, Ordering::SeqCst);
        let monitor = Monitor::new(
            test_config(1000),
            broker.clone(),
            StatusCheck::always(CheckStatus::Healthy),
        );

        monitor.connect().await.unwrap();
        monitor.enable().await;

        let err = monitor.disconnect().await.unwrap_err();
        assert!(matches!(err, BrokerError::Flush(_)));
        assert_eq!(broker.disconnect_calls.load(Ordering::SeqCst), 0);
        // Teardown never ran, so the scheduler was not forced off.
        assert!(monitor.is_enabled().await);

        // The slot is cleared: a later disconnect can succeed.
        broker.fail_flush.store(false, Ordering::SeqCst);
        monitor.disconnect().await.unwrap();
        assert_eq!(broker.disconnect_calls.load(Ordering::SeqCst), 1);
        assert!(!monitor.is_enabled().await);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_failure_still_forces_disabled() {
        let broker = MockBroker::new();
        broker.fail_disconnect.store(true, Ordering::SeqCst);
        let monitor = Monitor::new(
            test_config(1000),
            broker.clone(),
            StatusCheck::always(CheckStatus::Healthy),
        );

        monitor.connect().await.unwrap();
        monitor.enable().await;
        assert!(monitor.is_enabled().await);

        let err = monitor.disconnect().await.unwrap_err();
        assert!(matches!(err, BrokerError::Disconnect(_)));
        assert!(!monitor.is_enabled().await);
        assert_eq!(monitor.next_run_ms().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_disconnects_share_one_operation() {
        let broker = MockBroker::new();
        let monitor = Monitor::new(
            test_config(1000),
            broker.clone(),
            StatusCheck::always(CheckStatus::Healthy),
        );

        monitor.connect().await.unwrap();
        let (a, b) = tokio::join!(monitor.disconnect(), monitor.disconnect());
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(broker.flush_calls.load(Ordering::SeqCst), 1);
        assert_eq!(broker.disconnect_calls.load(Ordering::SeqCst), 1);
    }
}

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::CallbackConfig;
use crate::error::{CallbackError, Result};
use crate::infra::metrics;
use crate::model::InboundEvent;

/// 一条等待复查的消息
///
/// 从 `schedule` 到执行完毕始终由调度器独占。
#[derive(Debug)]
pub struct PendingRecheck {
    pub seq: u64,
    pub fire_at: Instant,
    pub event: InboundEvent,
}

// BinaryHeap 是大顶堆，反转比较让最早到期的排在堆顶
impl Ord for PendingRecheck {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PendingRecheck {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingRecheck {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for PendingRecheck {}

/// 复查到期后的处理逻辑
#[async_trait]
pub trait RecheckHandler: Send + Sync + 'static {
    async fn on_recheck(&self, event: InboundEvent);
}

/// 调度器配置
#[derive(Debug, Clone)]
pub struct RecheckSchedulerConfig {
    /// 复查延迟
    pub delay: Duration,
    /// 同时执行的复查上限
    pub max_concurrent: usize,
    /// 等待中的复查上限
    pub max_pending: usize,
}

impl Default for RecheckSchedulerConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(7),
            max_concurrent: 64,
            max_pending: 10_000,
        }
    }
}

impl From<&CallbackConfig> for RecheckSchedulerConfig {
    fn from(config: &CallbackConfig) -> Self {
        Self {
            delay: config.recheck_delay(),
            max_concurrent: config.max_concurrent_rechecks.max(1),
            max_pending: config.max_pending_rechecks.max(1),
        }
    }
}

/// 延迟复查调度器
///
/// 单个驱动任务持有按到期时间排序的小顶堆，到期后在信号量限制下派发执行；
/// `schedule` 只做一次 `try_send`，永远不阻塞调用方。
///
/// 等待中的复查（已登记、尚未开始执行）由共享计数限制，通道和堆里的合计不超过 `max_pending`。
pub struct RecheckScheduler {
    intake: Mutex<Option<mpsc::Sender<PendingRecheck>>>,
    shutdown: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
    max_pending: usize,
    delay: Duration,
    next_seq: AtomicU64,
}

impl RecheckScheduler {
    /// 创建调度器并在给定运行时上启动驱动任务
    pub fn start(
        config: RecheckSchedulerConfig,
        handler: Arc<dyn RecheckHandler>,
        runtime: &Handle,
    ) -> Self {
        let (intake_tx, intake_rx) = mpsc::channel(config.max_pending);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pending = Arc::new(AtomicUsize::new(0));

        let driver = RecheckDriver {
            intake: intake_rx,
            shutdown: shutdown_rx,
            queue: BinaryHeap::new(),
            limiter: Arc::new(Semaphore::new(config.max_concurrent)),
            pending: Arc::clone(&pending),
            handler,
        };

        info!(
            "[CALLBACK RECHECK] Started: delay={:?}, max_concurrent={}, max_pending={}",
            config.delay, config.max_concurrent, config.max_pending
        );

        Self {
            intake: Mutex::new(Some(intake_tx)),
            shutdown: shutdown_tx,
            driver: Mutex::new(Some(runtime.spawn(driver.run()))),
            pending,
            max_pending: config.max_pending,
            delay: config.delay,
            next_seq: AtomicU64::new(0),
        }
    }

    /// 登记一次复查（非阻塞）
    pub fn schedule(&self, event: InboundEvent) -> Result<()> {
        let intake = self.intake.lock();
        let sender = intake.as_ref().ok_or(CallbackError::ShuttingDown)?;

        let reserved = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < self.max_pending).then_some(count + 1)
            });
        if reserved.is_err() {
            metrics::record_recheck_rejected();
            return Err(CallbackError::RecheckRejected(format!(
                "{} rechecks already pending, dropping message for {}",
                self.max_pending,
                event.to.as_ref().map(|to| to.bare()).unwrap_or_default()
            )));
        }

        let unit = PendingRecheck {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            fire_at: Instant::now() + self.delay,
            event,
        };

        match sender.try_send(unit) {
            Ok(()) => {
                metrics::record_recheck_scheduled();
                Ok(())
            }
            Err(TrySendError::Full(unit)) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                metrics::record_recheck_rejected();
                Err(CallbackError::RecheckRejected(format!(
                    "recheck queue full, dropping message for {}",
                    unit.event.to.as_ref().map(|to| to.bare()).unwrap_or_default()
                )))
            }
            Err(TrySendError::Closed(_)) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                Err(CallbackError::ShuttingDown)
            }
        }
    }

    /// 停止接收新的复查；已登记的照常到期执行
    pub fn stop(&self) {
        if self.intake.lock().take().is_some() {
            info!("[CALLBACK RECHECK] Intake closed, pending rechecks will drain");
        }
    }

    /// 停止接收并等待已登记的复查全部执行完
    pub async fn drain(&self) {
        self.stop();
        self.join_driver().await;
    }

    /// 中断：等待中的复查直接丢弃，不再发送通知
    pub async fn shutdown(&self) {
        self.stop();
        let _ = self.shutdown.send(true);
        self.join_driver().await;
    }

    /// 已登记、尚未开始执行的复查数
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    async fn join_driver(&self) {
        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            if let Err(e) = driver.await {
                warn!("[CALLBACK RECHECK] Driver task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for RecheckScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

struct RecheckDriver {
    intake: mpsc::Receiver<PendingRecheck>,
    shutdown: watch::Receiver<bool>,
    queue: BinaryHeap<PendingRecheck>,
    limiter: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    handler: Arc<dyn RecheckHandler>,
}

impl RecheckDriver {
    async fn run(mut self) {
        let mut running = JoinSet::new();
        let mut intake_open = true;

        loop {
            metrics::record_recheck_pending(self.pending.load(Ordering::Acquire));
            if !intake_open && self.queue.is_empty() {
                break;
            }

            let next_fire = self.queue.peek().map(|unit| unit.fire_at);

            // 到期处理排在收件之前，持续的新消息不会推迟已到期的复查
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        self.interrupt();
                        break;
                    }
                }
                _ = sleep_until(next_fire.unwrap_or_else(Instant::now)), if next_fire.is_some() => {
                    if !self.fire_due(&mut running).await {
                        self.interrupt();
                        break;
                    }
                }
                unit = self.intake.recv(), if intake_open => {
                    match unit {
                        Some(unit) => self.queue.push(unit),
                        None => intake_open = false,
                    }
                }
                Some(finished) = running.join_next(), if !running.is_empty() => {
                    if let Err(e) = finished {
                        warn!("[CALLBACK RECHECK] Recheck task failed: {}", e);
                    }
                }
            }
        }

        // 已经开始执行的复查允许跑完
        while let Some(finished) = running.join_next().await {
            if let Err(e) = finished {
                warn!("[CALLBACK RECHECK] Recheck task failed: {}", e);
            }
        }
        metrics::record_recheck_pending(0);
        info!("[CALLBACK RECHECK] Stopped");
    }

    /// 派发所有已到期的复查；等待并发名额时收到中断信号返回 false
    async fn fire_due(&mut self, running: &mut JoinSet<()>) -> bool {
        let now = Instant::now();

        while self.queue.peek().is_some_and(|unit| unit.fire_at <= now) {
            let permit = tokio::select! {
                biased;
                _ = self.shutdown.changed() => return false,
                permit = Arc::clone(&self.limiter).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return false,
                },
            };
            let Some(unit) = self.queue.pop() else {
                break;
            };
            self.pending.fetch_sub(1, Ordering::AcqRel);

            let handler = Arc::clone(&self.handler);
            let shutdown = self.shutdown.clone();
            running.spawn(async move {
                let _permit = permit;
                if *shutdown.borrow() {
                    info!("[CALLBACK RECHECK] Recheck #{} interrupted before running", unit.seq);
                    return;
                }
                debug!("[CALLBACK RECHECK] Recheck #{} fired", unit.seq);
                handler.on_recheck(unit.event).await;
            });
        }

        true
    }

    fn interrupt(&mut self) {
        let mut dropped = self.queue.len();
        self.queue.clear();
        self.intake.close();
        while self.intake.try_recv().is_ok() {
            dropped += 1;
        }
        self.pending.fetch_sub(dropped, Ordering::AcqRel);

        if dropped > 0 {
            metrics::record_recheck_interrupted(dropped);
        }
        info!(
            "[CALLBACK RECHECK] Interrupted, {} pending recheck(s) dropped without notification",
            dropped
        );
    }
}

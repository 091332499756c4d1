//! 测速调度器
//!
//! 单个后台任务同时负责定时测速和手动触发的测速，所有测速串行执行。
//! 定时与手动两条路径共用同一个忙碌状态：
//! - 手动请求在测速进行中到达时直接丢弃（不排队、不报错）
//! - 定时触发在测速进行中到达时跳过本轮，等待下一个周期

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::results::model::{MeasurementRecord, TIMESTAMP_FORMAT};
use crate::runner::MeasurementRunner;

pub const IDLE_MESSAGE: &str = "Press 'Run Test' to start a speed test";
pub const RUNNING_MESSAGE: &str = "Running speed test...";
pub const COMPLETED_MESSAGE: &str = "Speed test completed!";
const STOPPED_MESSAGE: &str = "scheduler stopped";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Measuring,
}

/// 测速来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunSource {
    Periodic,
    Manual,
}

/// 当前状态快照（供控制面板展示）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub state: RunState,
    pub message: String,
    /// 已结束的测速次数（成功或失败），面板据此判断是否需要刷新表格
    pub finished_runs: u64,
    pub last_finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_record: Option<MeasurementRecord>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            message: IDLE_MESSAGE.to_string(),
            finished_runs: 0,
            last_finished_at: None,
            last_record: None,
        }
    }
}

/// 手动触发结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Accepted,
    /// 已有测速在进行，本次请求被丢弃
    AlreadyRunning,
    /// 调度器已停止
    Stopped,
}

struct Shared {
    status: RwLock<StatusSnapshot>,
    interval: Duration,
}

impl Shared {
    /// Idle -> Measuring，已在测速中时返回 false
    fn begin(&self, source: RunSource) -> bool {
        let mut status = self.status.write();
        if status.state == RunState::Measuring {
            return false;
        }
        status.state = RunState::Measuring;
        status.message = RUNNING_MESSAGE.to_string();
        tracing::debug!("开始测速 ({:?})", source);
        true
    }

    /// 无论成功失败都回到 Idle
    fn finish(&self, outcome: Result<MeasurementRecord, String>) {
        let mut status = self.status.write();
        match outcome {
            Ok(record) => {
                status.message = COMPLETED_MESSAGE.to_string();
                status.last_record = Some(record);
            }
            Err(message) => {
                status.message = format!("Error: {}", message);
            }
        }
        status.state = RunState::Idle;
        status.finished_runs += 1;
        status.last_finished_at = Some(Local::now().format(TIMESTAMP_FORMAT).to_string());
    }
}

/// 调度器句柄，可在 HTTP 处理器之间共享
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
    manual_tx: mpsc::Sender<()>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl SchedulerHandle {
    /// 请求一次手动测速
    pub fn trigger(&self) -> TriggerOutcome {
        if !self.shared.begin(RunSource::Manual) {
            tracing::debug!("测速进行中，忽略手动触发");
            return TriggerOutcome::AlreadyRunning;
        }
        match self.manual_tx.try_send(()) {
            Ok(()) => TriggerOutcome::Accepted,
            Err(mpsc::error::TrySendError::Full(())) => TriggerOutcome::AlreadyRunning,
            Err(mpsc::error::TrySendError::Closed(())) => {
                self.shared.finish(Err(STOPPED_MESSAGE.to_string()));
                TriggerOutcome::Stopped
            }
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        self.shared.status.read().clone()
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// 停止调度循环（进行中的测速会先完成）
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

pub struct Scheduler;

impl Scheduler {
    /// 启动调度任务，首次定时测速在一个周期之后
    pub fn spawn(
        runner: Arc<MeasurementRunner>,
        interval: Duration,
    ) -> (SchedulerHandle, JoinHandle<()>) {
        let shared = Arc::new(Shared {
            status: RwLock::new(StatusSnapshot::default()),
            interval,
        });
        let (manual_tx, manual_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_loop(shared.clone(), runner, manual_rx, shutdown_rx));

        let handle = SchedulerHandle {
            shared,
            manual_tx,
            shutdown_tx: Arc::new(shutdown_tx),
        };
        (handle, task)
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    runner: Arc<MeasurementRunner>,
    mut manual_rx: mpsc::Receiver<()>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + shared.interval, shared.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!("定时测速已启动，间隔 {} 秒", shared.interval.as_secs());

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                break;
            }
            _ = ticker.tick() => {
                if !shared.begin(RunSource::Periodic) {
                    tracing::info!("上一次测速尚未结束，跳过本轮定时测速");
                    continue;
                }
                execute(&shared, &runner).await;
            }
            Some(()) = manual_rx.recv() => {
                execute(&shared, &runner).await;
            }
        }
    }

    // 已接受但未执行的手动请求也要回到 Idle
    manual_rx.close();
    while manual_rx.try_recv().is_ok() {
        shared.finish(Err(STOPPED_MESSAGE.to_string()));
    }
    tracing::info!("定时测速已停止");
}

async fn execute(shared: &Shared, runner: &MeasurementRunner) {
    let outcome = runner.run().await.map_err(|e| e.message);
    shared.finish(outcome);
}

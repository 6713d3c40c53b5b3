//! 顺序任务队列
//!
//! 底层的 Telegram 客户端在同一个会话文件上不允许并发使用，
//! 所以所有网络流程都必须排队，一次只跑一个。
//! 队列本身就是互斥机制：单条派发循环从头到尾一个一个取任务，
//! 前一个彻底结束（成功或失败）之前绝不开始下一个。
//!
//! 任务失败会被捕获并通过事件通道上报，但绝不会卡住队列，
//! 后面不相关的任务照常执行。这是这里最重要的不变量。
//!
//! 没有优先级、没有取消、没有去重，纯 FIFO。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{error, info};

use crate::error::AppResult;

/// 被排队的操作：零参数异步调用，产出一段人类可读的结果摘要
pub type TaskOperation = Box<dyn FnOnce() -> BoxFuture<'static, AppResult<String>> + Send>;

/// 一个排队中的任务
pub struct QueuedTask {
    pub label: String,
    pub operation: TaskOperation,
}

impl QueuedTask {
    pub fn new(
        label: impl Into<String>,
        operation: impl FnOnce() -> BoxFuture<'static, AppResult<String>> + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            operation: Box::new(operation),
        }
    }
}

/// 队列对外上报的事件
///
/// 任务的成功/失败结果也走这条通道，由上层决定怎么呈现。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// 前面还有任务在跑，本任务已排队（depth 为排在它前面的数量）
    Queued { label: String, depth: usize },
    /// 任务开始执行
    Started { label: String },
    /// 任务成功结束
    Finished { label: String, summary: String },
    /// 任务失败结束
    Failed { label: String, error: String },
    /// 队列已清空，回到空闲状态
    Idle,
}

/// 顺序任务队列
///
/// `spawn` 时启动唯一的派发循环，之后只管往里 `enqueue`。
pub struct TaskQueue {
    tx: UnboundedSender<QueuedTask>,
    events: UnboundedSender<QueueEvent>,
    /// 排队中 + 执行中的任务数
    pending: Arc<AtomicUsize>,
}

impl TaskQueue {
    /// 启动队列和它的派发循环
    ///
    /// # 参数
    /// - `events`: 事件通道发送端，接收端由上层持有
    pub fn spawn(events: UnboundedSender<QueueEvent>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedTask>();
        let pending = Arc::new(AtomicUsize::new(0));

        let loop_events = events.clone();
        let loop_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            // 单条循环顺序取任务，任务体里的挂起（延迟、网络、退避）
            // 不会让下一个任务提前开始
            while let Some(task) = rx.recv().await {
                let label = task.label;
                info!("▶ 开始执行任务: {}", label);
                let _ = loop_events.send(QueueEvent::Started {
                    label: label.clone(),
                });

                match (task.operation)().await {
                    Ok(summary) => {
                        info!("✓ 任务完成: {}", label);
                        let _ = loop_events.send(QueueEvent::Finished {
                            label: label.clone(),
                            summary,
                        });
                    }
                    Err(err) => {
                        // 失败只影响当前任务，队列继续
                        error!("❌ 任务失败: {}: {}", label, err);
                        let _ = loop_events.send(QueueEvent::Failed {
                            label: label.clone(),
                            error: err.to_string(),
                        });
                    }
                }

                let remaining = loop_pending.fetch_sub(1, Ordering::SeqCst) - 1;
                if remaining == 0 {
                    info!("队列已清空，等待下一个操作");
                    let _ = loop_events.send(QueueEvent::Idle);
                }
            }
        });

        Self {
            tx,
            events,
            pending,
        }
    }

    /// 把任务追加到队尾
    ///
    /// 队列空闲时任务立刻开始；忙碌时先排队并上报当前深度。
    pub fn enqueue(&self, task: QueuedTask) {
        let ahead = self.pending.fetch_add(1, Ordering::SeqCst);
        if ahead > 0 {
            info!("任务已排队: {} (前面还有 {} 个)", task.label, ahead);
            let _ = self.events.send(QueueEvent::Queued {
                label: task.label.clone(),
                depth: ahead,
            });
        }
        if self.tx.send(task).is_err() {
            error!("派发循环已退出，任务被丢弃");
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// 排队中 + 执行中的任务数
    pub fn depth(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// 队列是否完全空闲
    pub fn is_idle(&self) -> bool {
        self.depth() == 0
    }
}

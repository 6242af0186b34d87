//! 会话监管：任务生命周期、中断管理
//!
//! 每个连接同一时刻最多一个运行中的任务；持有其 CancellationToken 与 JoinHandle，
//! 新指令或 STOP_AGENT 到达时先取消并等待旧任务退出。

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct RunningMission {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// 任务级生命周期管理：取消令牌与任务句柄
#[derive(Default)]
pub struct MissionSupervisor {
    current: Option<RunningMission>,
}

impl MissionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动新任务；调用方需保证此前已 cancel_and_wait
    pub fn start<F, Fut>(&mut self, mission: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(mission(cancel_token.clone()));
        self.current = Some(RunningMission {
            cancel_token,
            handle,
        });
    }

    /// 是否有尚未结束的任务
    pub fn is_running(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|m| !m.handle.is_finished())
    }

    /// 触发取消并等待任务退出；无任务时立即返回
    pub async fn cancel_and_wait(&mut self) {
        if let Some(mission) = self.current.take() {
            mission.cancel_token.cancel();
            if let Err(e) = mission.handle.await {
                if e.is_panic() {
                    tracing::error!("Mission task panicked: {}", e);
                }
            }
        }
    }
}

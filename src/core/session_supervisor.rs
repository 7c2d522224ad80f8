//! 任务监管：取消令牌
//!
//! 持有根 CancellationToken；每个任务领取一个子 token，可单独取消，Ctrl+C 时取消全部。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct TaskSupervisor {
    root: CancellationToken,
    tasks: Arc<RwLock<HashMap<String, CancellationToken>>>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为任务创建子 token
    pub async fn begin(&self, task_id: &str) -> CancellationToken {
        let token = self.root.child_token();
        self.tasks
            .write()
            .await
            .insert(task_id.to_string(), token.clone());
        token
    }

    /// 取消单个任务；任务不存在时返回 false
    pub async fn cancel_task(&self, task_id: &str) -> bool {
        match self.tasks.read().await.get(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn finish(&self, task_id: &str) {
        self.tasks.write().await.remove(task_id);
    }

    /// 取消全部任务（用户 Ctrl+C）
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    pub async fn active_tasks(&self) -> Vec<String> {
        self.tasks.read().await.keys().cloned().collect()
    }
}

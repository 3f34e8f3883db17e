//! 网络活动监听 - 基础设施层
//!
//! 订阅页面的 Network 事件，记录仍未完成的请求

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::error::AppResult;

/// 请求状态
#[derive(Debug)]
pub struct Activity {
    in_flight: HashSet<String>,
    last_change: Instant,
}

impl Activity {
    pub fn new() -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: Instant::now(),
        }
    }

    pub fn started(&mut self, request_id: &str) {
        self.in_flight.insert(request_id.to_string());
        self.last_change = Instant::now();
    }

    /// 连接之前发出的请求结束时也会收到事件，按未知 id 忽略
    pub fn finished(&mut self, request_id: &str) {
        if self.in_flight.remove(request_id) {
            self.last_change = Instant::now();
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// 没有未完成请求时返回已空闲的时长
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        self.in_flight
            .is_empty()
            .then(|| now.saturating_duration_since(self.last_change))
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

/// 单个页面的网络监听器，释放时停止监听
pub struct NetworkMonitor {
    activity: Arc<Mutex<Activity>>,
    task: JoinHandle<()>,
}

impl NetworkMonitor {
    pub async fn attach(page: &Page) -> AppResult<Self> {
        page.execute(EnableParams::default()).await?;

        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let mut finished = page.event_listener::<EventLoadingFinished>().await?;
        let mut failed = page.event_listener::<EventLoadingFailed>().await?;

        let activity = Arc::new(Mutex::new(Activity::new()));
        let state = activity.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(event) = requests.next() => {
                        state.lock().await.started(event.request_id.inner());
                    }
                    Some(event) = finished.next() => {
                        state.lock().await.finished(event.request_id.inner());
                    }
                    Some(event) = failed.next() => {
                        state.lock().await.finished(event.request_id.inner());
                    }
                    else => break,
                }
            }
            debug!("网络事件流已结束");
        });

        Ok(Self { activity, task })
    }

    /// 没有未完成请求时返回已空闲的时长
    pub async fn idle_for(&self) -> Option<Duration> {
        self.activity.lock().await.idle_for(Instant::now())
    }

    pub async fn in_flight(&self) -> usize {
        self.activity.lock().await.in_flight()
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

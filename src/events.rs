//! 事件源
//!
//! 对应 rulebook 的事件源插件：无限轮询，每轮每台主机发一个事件
//! 到异步队列，轮与轮之间协作式休眠。通过 watch 通道下发停止信号，
//! 等待中也能随时退出，不烧 CPU。

use crate::api::UyuniClient;
use crate::config::EventSourceArgs;
use crate::error::UyuniError;
use crate::helpers::configure_connection;
use crate::types::RebootEvent;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// 轮询 Uyuni、上报主机重启需求的事件源
pub struct RebootEventSource {
    client: UyuniClient,
    hosts: Vec<String>,
    delay: Duration,
}

impl RebootEventSource {
    pub fn new(client: UyuniClient, hosts: Vec<String>, delay: Duration) -> Self {
        Self {
            client,
            hosts,
            delay,
        }
    }

    /// 按事件源参数建立连接
    pub async fn connect(args: &EventSourceArgs) -> Result<Self, UyuniError> {
        let client = configure_connection(&args.connection()).await?;
        Ok(Self::new(
            client,
            args.hosts.clone(),
            Duration::from_secs(args.delay),
        ))
    }

    /// 轮询循环
    ///
    /// 队列接收端关闭或 shutdown 信号变化时退出。
    pub async fn run(
        &self,
        queue: mpsc::Sender<RebootEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), UyuniError> {
        info!(
            "Starting reboot event source for {} host(s), polling every {:?}",
            self.hosts.len(),
            self.delay
        );

        loop {
            let pending = self.client.get_hosts_by_required_reboot().await?;
            debug!("{} host(s) currently require a reboot", pending.len());

            for host in &self.hosts {
                let event = RebootEvent {
                    host: Some(host.clone()),
                    requires_reboot: pending.contains(host),
                };
                if queue.send(event).await.is_err() {
                    // 消费端没了，没必要继续轮询
                    return Ok(());
                }
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Reboot event source shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
    }
}

/// 测试用事件源：不访问服务器，发随机数据
pub struct MockRebootEventSource {
    delay: Duration,
}

impl MockRebootEventSource {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn run(
        &self,
        queue: mpsc::Sender<RebootEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), UyuniError> {
        loop {
            let event = RebootEvent {
                host: None,
                requires_reboot: rand::random::<bool>(),
            };
            if queue.send(event).await.is_err() {
                return Ok(());
            }

            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_event_source_emits_events() {
        let source = MockRebootEventSource::new(Duration::from_millis(1));
        let (tx, mut rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { source.run(tx, shutdown_rx).await });

        let first = rx.recv().await.expect("expected an event");
        assert!(first.host.is_none());
        let _ = rx.recv().await.expect("expected a second event");

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_mock_event_source_stops_when_queue_closes() {
        let source = MockRebootEventSource::new(Duration::from_millis(1));
        let (tx, rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        drop(rx);
        source.run(tx, shutdown_rx).await.unwrap();
    }
}

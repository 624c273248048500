use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tracing::info;

use crate::config::{CallbackConfig, PropertyStore};
use crate::error::Result;
use crate::gate::MessageGate;
use crate::infra::{AvailabilityOracle, PresenceDirectory};
use crate::interceptor::{InterceptorId, InterceptorRegistry, PacketInterceptor};
use crate::model::{InboundEvent, Packet};
use crate::offline::{OfflinePersister, OfflineStore};
use crate::pipeline::{Decision, DeferredCheck, NotificationPipeline};
use crate::recheck::{RecheckScheduler, RecheckSchedulerConfig};
use crate::webhook::{HttpWebhookTransport, NotificationDispatcher, WebhookTransport};

/// 宿主平台提供的协作方
#[derive(Clone)]
pub struct HostServices {
    pub presence: Arc<dyn PresenceDirectory>,
    pub offline_store: Arc<dyn OfflineStore>,
    pub interceptors: Arc<dyn InterceptorRegistry>,
}

/// 离线回调插件
///
/// `start` 加载配置并注册拦截器；`stop` 注销并停止接收复查，已登记的复查照常执行；
/// `shutdown` 在 `stop` 基础上中断全部等待中的复查。
pub struct OfflineCallbackPlugin {
    config: Arc<CallbackConfig>,
    pipeline: NotificationPipeline,
    scheduler: Arc<RecheckScheduler>,
    interceptors: Arc<dyn InterceptorRegistry>,
    registration: Mutex<Option<InterceptorId>>,
    /// 处理期间持有读锁，`stop` 取写锁，保证返回后不再处理新包
    running: RwLock<bool>,
}

impl OfflineCallbackPlugin {
    /// 从宿主配置启动，使用 HTTP 传输
    pub fn start(host: HostServices, properties: &dyn PropertyStore, runtime: Handle) -> Result<Arc<Self>> {
        let mut config = CallbackConfig::load(properties)?;
        config.merge_from_env()?;
        let transport = Arc::new(HttpWebhookTransport::new(&config)?);
        Ok(Self::start_with_transport(host, config, transport, runtime))
    }

    /// 使用自定义传输启动
    pub fn start_with_transport(
        host: HostServices,
        config: CallbackConfig,
        transport: Arc<dyn WebhookTransport>,
        runtime: Handle,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        // 未单独配置时只处理发往宿主本域的消息
        let local_domain = config
            .local_domain
            .clone()
            .unwrap_or_else(|| host.presence.server_domain().to_lowercase());
        let oracle = AvailabilityOracle::new(host.presence);

        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&config),
            oracle.clone(),
            transport,
            runtime.clone(),
        ));
        let handler = Arc::new(DeferredCheck::new(
            Arc::clone(&dispatcher),
            OfflinePersister::new(host.offline_store),
        ));
        let scheduler = Arc::new(RecheckScheduler::start(
            RecheckSchedulerConfig::from(config.as_ref()),
            handler,
            &runtime,
        ));
        let pipeline = NotificationPipeline::new(
            MessageGate::new(Some(local_domain)),
            oracle,
            dispatcher,
            Arc::clone(&scheduler),
        );

        let plugin = Arc::new(Self {
            config: Arc::clone(&config),
            pipeline,
            scheduler,
            interceptors: Arc::clone(&host.interceptors),
            registration: Mutex::new(None),
            running: RwLock::new(true),
        });

        let id = host
            .interceptors
            .add_interceptor(Arc::clone(&plugin) as Arc<dyn PacketInterceptor>);
        *plugin.registration.lock() = Some(id);

        info!(
            "[CALLBACK PLUGIN] Started: url={}, send_body={}, debug={}, recheck_delay={}s",
            config.url, config.send_body, config.debug, config.recheck_delay_secs
        );
        plugin
    }

    pub fn config(&self) -> &CallbackConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// 处理一个数据包并返回判定结果
    pub fn handle_packet(&self, packet: &Packet, incoming: bool, processed: bool) -> Option<Decision> {
        let running = self.running.read();
        if !*running {
            return None;
        }
        let event = InboundEvent::from_packet(packet, incoming, processed)?;
        Some(self.pipeline.process(event))
    }

    /// 注销拦截器并停止接收复查；已登记的复查照常执行
    pub fn stop(&self) {
        {
            let mut running = self.running.write();
            if !*running {
                return;
            }
            *running = false;
        }

        if let Some(id) = self.registration.lock().take() {
            self.interceptors.remove_interceptor(id);
        }
        self.scheduler.stop();
        info!("[CALLBACK PLUGIN] Stopped");
    }

    /// 停止并等待已登记的复查执行完
    pub async fn drain(&self) {
        self.stop();
        self.scheduler.drain().await;
    }

    /// 停止并中断全部等待中的复查
    pub async fn shutdown(&self) {
        self.stop();
        self.scheduler.shutdown().await;
        info!("[CALLBACK PLUGIN] Shut down");
    }
}

impl PacketInterceptor for OfflineCallbackPlugin {
    fn intercept_packet(&self, packet: &Packet, incoming: bool, processed: bool) {
        self.handle_packet(packet, incoming, processed);
    }
}

//! 在线状态感知的通知流程
//!
//! 过滤 → 首次判定 → 不可达立即通知；可达则登记延迟复查，
//! 复查时仍不可达才通知并写入离线存储。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::CallbackError;
use crate::gate::MessageGate;
use crate::infra::{metrics, AvailabilityOracle};
use crate::model::InboundEvent;
use crate::offline::OfflinePersister;
use crate::recheck::{RecheckHandler, RecheckScheduler};
use crate::webhook::{DispatchOutcome, DispatchPath, NotificationDispatcher};

/// 单条消息的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 未通过过滤
    Filtered,
    /// 发送方或接收方不是本地账号
    UnknownUser,
    /// 其他错误导致放弃（如负载序列化失败）
    Failed,
    /// 首次判定不可达，立即通知
    Notified(DispatchOutcome),
    /// 首次判定可达，已登记复查
    Deferred,
    /// 复查登记失败（队列满或正在停止）
    Dropped,
}

/// 即时路径
pub struct NotificationPipeline {
    gate: MessageGate,
    oracle: AvailabilityOracle,
    dispatcher: Arc<NotificationDispatcher>,
    scheduler: Arc<RecheckScheduler>,
}

impl NotificationPipeline {
    pub fn new(
        gate: MessageGate,
        oracle: AvailabilityOracle,
        dispatcher: Arc<NotificationDispatcher>,
        scheduler: Arc<RecheckScheduler>,
    ) -> Self {
        Self {
            gate,
            oracle,
            dispatcher,
            scheduler,
        }
    }

    /// 在宿主投递线程上同步执行，不等待网络
    pub fn process(&self, event: InboundEvent) -> Decision {
        if !self.gate.accepts(&event) {
            return Decision::Filtered;
        }
        let Some(to) = event.to.clone() else {
            return Decision::Filtered;
        };
        metrics::record_packet_accepted();

        let reachable = self
            .oracle
            .resolve(&event.from)
            .and_then(|_| self.oracle.is_reachable(&to));

        match reachable {
            Ok(false) => match self.dispatcher.dispatch(&event, DispatchPath::Inline) {
                Ok(outcome) => Decision::Notified(outcome),
                Err(e) => abandon(&event, e),
            },
            Ok(true) => match self.scheduler.schedule(event) {
                Ok(()) => {
                    debug!("[CALLBACK PIPELINE] {} is online, recheck scheduled", to.bare());
                    Decision::Deferred
                }
                Err(e) => {
                    warn!("[CALLBACK PIPELINE] recheck for {} not scheduled: {}", to.bare(), e);
                    Decision::Dropped
                }
            },
            Err(e) => abandon(&event, e),
        }
    }
}

fn abandon(event: &InboundEvent, error: CallbackError) -> Decision {
    if error.is_user_not_found() {
        debug!("[CALLBACK PIPELINE] can't find user: {}", error);
        return Decision::UnknownUser;
    }
    warn!(
        "[CALLBACK PIPELINE] message from {} abandoned: {}",
        event.from.bare(),
        error
    );
    Decision::Failed
}

/// 复查路径：仍不可达则通知，随后写入离线存储
pub struct DeferredCheck {
    dispatcher: Arc<NotificationDispatcher>,
    persister: OfflinePersister,
}

impl DeferredCheck {
    pub fn new(dispatcher: Arc<NotificationDispatcher>, persister: OfflinePersister) -> Self {
        Self {
            dispatcher,
            persister,
        }
    }
}

#[async_trait]
impl RecheckHandler for DeferredCheck {
    async fn on_recheck(&self, event: InboundEvent) {
        // dispatch 内部会重新查询在线状态
        match self.dispatcher.dispatch(&event, DispatchPath::Recheck) {
            Ok(DispatchOutcome::Sent) => {
                self.persister.store(&event).await;
            }
            Ok(DispatchOutcome::RecipientReachable) => {
                debug!(
                    "[CALLBACK PIPELINE] recipient of message from {} is still online",
                    event.from.bare()
                );
            }
            Err(e) => {
                abandon(&event, e);
            }
        }
    }
}

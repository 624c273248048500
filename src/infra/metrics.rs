//! 回调插件指标：数据包过滤、Webhook 调用、延迟复查、离线存储
//!
//! 只通过 `metrics` 门面记录，不安装 Recorder；是否导出由宿主决定。

/// 指标名称
const COUNTER_PACKETS_ACCEPTED: &str = "privchat_callback_packets_accepted_total";
const COUNTER_DISPATCH_SENT: &str = "privchat_callback_dispatch_sent_total";
const COUNTER_DISPATCH_SKIPPED: &str = "privchat_callback_dispatch_skipped_total";
const COUNTER_DISPATCH_FAILED: &str = "privchat_callback_dispatch_failed_total";
const COUNTER_RECHECK_SCHEDULED: &str = "privchat_callback_recheck_scheduled_total";
const COUNTER_RECHECK_REJECTED: &str = "privchat_callback_recheck_rejected_total";
const COUNTER_RECHECK_INTERRUPTED: &str = "privchat_callback_recheck_interrupted_total";
const GAUGE_RECHECK_PENDING: &str = "privchat_callback_recheck_pending";
const COUNTER_PERSIST_FAILED: &str = "privchat_callback_persist_failed_total";

/// 通过过滤的数据包 +1
pub fn record_packet_accepted() {
    metrics::counter!(COUNTER_PACKETS_ACCEPTED).increment(1);
}

/// Webhook 已发出，按路径区分（inline / recheck）
pub fn record_dispatch_sent(path: &'static str) {
    metrics::counter!(COUNTER_DISPATCH_SENT, "path" => path).increment(1);
}

/// 接收方可达，跳过发送
pub fn record_dispatch_skipped() {
    metrics::counter!(COUNTER_DISPATCH_SKIPPED).increment(1);
}

/// Webhook 调用失败（网络错误或非 2xx）
pub fn record_dispatch_failed() {
    metrics::counter!(COUNTER_DISPATCH_FAILED).increment(1);
}

pub fn record_recheck_scheduled() {
    metrics::counter!(COUNTER_RECHECK_SCHEDULED).increment(1);
}

pub fn record_recheck_rejected() {
    metrics::counter!(COUNTER_RECHECK_REJECTED).increment(1);
}

pub fn record_recheck_interrupted(count: usize) {
    metrics::counter!(COUNTER_RECHECK_INTERRUPTED).increment(count as u64);
}

/// 当前等待中的复查数（Gauge），由调度器驱动循环更新
pub fn record_recheck_pending(count: usize) {
    metrics::gauge!(GAUGE_RECHECK_PENDING).set(count as f64);
}

pub fn record_persist_failed() {
    metrics::counter!(COUNTER_PERSIST_FAILED).increment(1);
}

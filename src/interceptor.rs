use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::model::Packet;

/// 宿主拦截链上的处理者
///
/// 宿主投递线程同步调用；实现方不得阻塞，也不能向投递路径返回错误。
pub trait PacketInterceptor: Send + Sync {
    fn intercept_packet(&self, packet: &Packet, incoming: bool, processed: bool);
}

/// 注册句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptorId(u64);

/// 宿主提供的拦截器注册表
pub trait InterceptorRegistry: Send + Sync {
    fn add_interceptor(&self, interceptor: Arc<dyn PacketInterceptor>) -> InterceptorId;

    /// 注销；句柄不存在时返回 false
    fn remove_interceptor(&self, id: InterceptorId) -> bool;
}

/// 内存拦截链
///
/// 按注册顺序调用。供测试和嵌入式宿主使用。
#[derive(Default)]
pub struct InterceptorChain {
    interceptors: RwLock<Vec<(InterceptorId, Arc<dyn PacketInterceptor>)>>,
    next_id: AtomicU64,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把数据包交给所有拦截器
    pub fn fire(&self, packet: &Packet, incoming: bool, processed: bool) {
        // 先拍快照，拦截器内部可以安全地注销自己
        let snapshot: Vec<_> = self
            .interceptors
            .read()
            .iter()
            .map(|(_, interceptor)| Arc::clone(interceptor))
            .collect();

        for interceptor in snapshot {
            interceptor.intercept_packet(packet, incoming, processed);
        }
    }

    pub fn len(&self) -> usize {
        self.interceptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.read().is_empty()
    }
}

impl InterceptorRegistry for InterceptorChain {
    fn add_interceptor(&self, interceptor: Arc<dyn PacketInterceptor>) -> InterceptorId {
        let id = InterceptorId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.interceptors.write().push((id, interceptor));
        debug!("[CALLBACK INTERCEPTOR] registered #{}", id.0);
        id
    }

    fn remove_interceptor(&self, id: InterceptorId) -> bool {
        let mut interceptors = self.interceptors.write();
        let before = interceptors.len();
        interceptors.retain(|(registered, _)| *registered != id);
        let removed = interceptors.len() != before;
        if removed {
            debug!("[CALLBACK INTERCEPTOR] removed #{}", id.0);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl PacketInterceptor for Counter {
        fn intercept_packet(&self, _packet: &Packet, _incoming: bool, _processed: bool) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn packet() -> Packet {
        Packet::Message(Message::chat(
            "alice@example.com".parse().unwrap(),
            "bob@example.com".parse().unwrap(),
            "hi",
        ))
    }

    #[test]
    fn test_registered_interceptors_see_packets_until_removed() {
        let chain = InterceptorChain::new();
        let first = Arc::new(Counter::default());
        let second = Arc::new(Counter::default());

        let first_id = chain.add_interceptor(first.clone());
        chain.add_interceptor(second.clone());
        chain.fire(&packet(), true, true);

        assert!(chain.remove_interceptor(first_id));
        assert!(!chain.remove_interceptor(first_id));
        chain.fire(&packet(), true, true);

        assert_eq!(first.0.load(Ordering::SeqCst), 1);
        assert_eq!(second.0.load(Ordering::SeqCst), 2);
        assert_eq!(chain.len(), 1);
    }
}

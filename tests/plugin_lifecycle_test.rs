use std::sync::Arc;
use std::time::Duration;

use privchat_offline_callback::{
    CallbackConfig, CallbackError, Decision, DispatchOutcome, HostServices, InterceptorChain,
    MemoryOfflineStore, MemoryPresenceDirectory, MemoryPropertyStore, Message, MessageKind,
    MockWebhookTransport, OfflineCallbackPlugin, Packet, PropertyStore,
};
use tokio::runtime::Handle;

struct Host {
    directory: Arc<MemoryPresenceDirectory>,
    store: Arc<MemoryOfflineStore>,
    chain: Arc<InterceptorChain>,
    transport: Arc<MockWebhookTransport>,
    plugin: Arc<OfflineCallbackPlugin>,
}

impl Host {
    fn start(config: CallbackConfig) -> Self {
        let directory = Arc::new(MemoryPresenceDirectory::new("example.com"));
        directory.add_user("alice");
        directory.add_user("bob");
        let store = Arc::new(MemoryOfflineStore::new());
        let chain = Arc::new(InterceptorChain::new());
        let transport = Arc::new(MockWebhookTransport::new());

        let plugin = OfflineCallbackPlugin::start_with_transport(
            HostServices {
                presence: directory.clone(),
                offline_store: store.clone(),
                interceptors: chain.clone(),
            },
            config,
            transport.clone(),
            Handle::current(),
        );

        Self {
            directory,
            store,
            chain,
            transport,
            plugin,
        }
    }

    fn deliver(&self, message: Message) {
        self.chain.fire(&Packet::Message(message), true, true);
    }
}

fn config() -> CallbackConfig {
    CallbackConfig::new("http://hook.test/offline", "secret")
}

fn hello() -> Message {
    Message::chat(
        "alice@example.com/laptop".parse().unwrap(),
        "bob@example.com/phone".parse().unwrap(),
        "hello",
    )
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_offline_recipient_gets_one_inline_notification() {
    let host = Host::start(config());

    host.deliver(hello());
    advance(30).await;

    let sent = host.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, "alice@example.com");
    assert_eq!(sent[0].to, "bob@example.com");
    assert_eq!(sent[0].body.as_deref(), Some("hello"));
    // 即时路径不写离线存储
    assert_eq!(host.store.total().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_recipient_going_offline_in_grace_window() {
    let host = Host::start(config());
    host.directory.set_online("bob", true);

    host.deliver(hello());
    advance(3).await;
    host.directory.set_online("bob", false);
    advance(3).await;
    assert_eq!(host.transport.sent_count(), 0);

    advance(2).await;
    assert_eq!(host.transport.sent_count(), 1);
    let stored = host.store.messages_for("bob@example.com").await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].body, "hello");
}

#[tokio::test(start_paused = true)]
async fn test_recipient_still_online_after_grace_window() {
    let host = Host::start(config());
    host.directory.set_online("bob", true);

    host.deliver(hello());
    advance(30).await;

    assert_eq!(host.transport.sent_count(), 0);
    assert_eq!(host.store.total().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_filtered_packets_have_no_side_effects() {
    let host = Host::start(config());
    host.directory.set_online("bob", true);

    let mut no_recipient = hello();
    no_recipient.to = None;
    let packets = vec![
        (Packet::Message(hello().with_kind(MessageKind::GroupChat)), true, true),
        (Packet::Message(hello().with_kind(MessageKind::Headline)), true, true),
        (Packet::Message(Message::chat(
            "alice@example.com".parse().unwrap(),
            "bob@example.com".parse().unwrap(),
            "",
        )), true, true),
        (Packet::Message(no_recipient), true, true),
        (Packet::Message(hello()), false, true),
        (Packet::Message(hello()), true, false),
        (
            Packet::Presence {
                from: "alice@example.com".parse().unwrap(),
                to: None,
            },
            true,
            true,
        ),
    ];

    for (packet, incoming, processed) in &packets {
        assert!(matches!(
            host.plugin.handle_packet(packet, *incoming, *processed),
            Some(Decision::Filtered) | None
        ));
    }
    host.directory.set_online("bob", false);
    advance(30).await;

    assert_eq!(host.transport.sent_count(), 0);
    assert_eq!(host.store.total().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_send_body_disabled_omits_body() {
    let mut config = config();
    config.send_body = false;
    let host = Host::start(config);

    assert_eq!(
        host.plugin.handle_packet(&Packet::Message(hello()), true, true),
        Some(Decision::Notified(DispatchOutcome::Sent))
    );
    advance(1).await;
    assert_eq!(host.transport.sent()[0].body, None);
}

#[tokio::test(start_paused = true)]
async fn test_local_domain_excludes_remote_recipients() {
    let mut config = config();
    config.local_domain = Some("example.com".to_string());
    let host = Host::start(config);

    let remote = Message::chat(
        "alice@example.com".parse().unwrap(),
        "bob@remote.example.org".parse().unwrap(),
        "hello",
    );
    assert_eq!(
        host.plugin.handle_packet(&Packet::Message(remote), true, true),
        Some(Decision::Filtered)
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_unregisters_and_drains_pending_rechecks() {
    let host = Host::start(config());
    host.directory.set_online("bob", true);

    host.deliver(hello());
    host.plugin.stop();
    assert!(!host.plugin.is_running());
    assert!(host.chain.is_empty());
    assert_eq!(host.plugin.handle_packet(&Packet::Message(hello()), true, true), None);

    host.directory.set_online("bob", false);
    host.plugin.drain().await;
    advance(1).await;

    // 停止前登记的复查照常执行
    assert_eq!(host.transport.sent_count(), 1);
    assert_eq!(host.store.total().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_pending_rechecks() {
    let host = Host::start(config());
    host.directory.set_online("bob", true);

    host.deliver(hello());
    advance(2).await;
    host.directory.set_online("bob", false);
    host.plugin.shutdown().await;
    advance(30).await;

    assert_eq!(host.transport.sent_count(), 0);
    assert_eq!(host.store.total().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_remote_recipient_ignored_with_default_config() {
    let host = Host::start(config());

    let remote = Message::chat(
        "alice@example.com/laptop".parse().unwrap(),
        "bob@remote.example.org".parse().unwrap(),
        "hi",
    );
    assert_eq!(
        host.plugin.handle_packet(&Packet::Message(remote), true, true),
        Some(Decision::Filtered)
    );
    advance(30).await;

    assert_eq!(host.transport.sent_count(), 0);
    assert_eq!(host.store.total().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pending_limit_holds_across_driver_turns() {
    let mut config = config();
    config.max_pending_rechecks = 2;
    let host = Host::start(config);
    host.directory.set_online("bob", true);

    let packet = Packet::Message(hello());
    let mut deferred = 0;
    for _ in 0..10 {
        if host.plugin.handle_packet(&packet, true, true) == Some(Decision::Deferred) {
            deferred += 1;
        }
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(deferred, 2);

    host.directory.set_online("bob", false);
    advance(10).await;
    assert_eq!(host.transport.sent_count(), 2);
    assert_eq!(host.store.total().await, 2);
}

#[tokio::test(start_paused = true)]
async fn test_full_recheck_queue_drops_new_messages() {
    let mut config = config();
    config.max_pending_rechecks = 1;
    let host = Host::start(config);
    host.directory.set_online("bob", true);

    let packet = Packet::Message(hello());
    assert_eq!(host.plugin.handle_packet(&packet, true, true), Some(Decision::Deferred));
    assert_eq!(host.plugin.handle_packet(&packet, true, true), Some(Decision::Dropped));
}

#[tokio::test]
async fn test_start_loads_and_persists_properties() {
    let properties = MemoryPropertyStore::new()
        .with_property("callback_on_offline.url", "https://push.example.com/offline")
        .with_property("callback_on_offline.send_body", "false");
    let chain = Arc::new(InterceptorChain::new());

    let plugin = OfflineCallbackPlugin::start(
        HostServices {
            presence: Arc::new(MemoryPresenceDirectory::new("example.com")),
            offline_store: Arc::new(MemoryOfflineStore::new()),
            interceptors: chain.clone(),
        },
        &properties,
        Handle::current(),
    )
    .expect("start");

    assert_eq!(plugin.config().url, "https://push.example.com/offline");
    assert!(!plugin.config().send_body);
    assert_eq!(chain.len(), 1);
    assert!(properties.get_property("callback_on_offline.token").is_some());

    plugin.shutdown().await;
    assert!(chain.is_empty());
}

#[tokio::test]
async fn test_start_rejects_invalid_url() {
    let properties = MemoryPropertyStore::new().with_property("callback_on_offline.url", "ftp://nope");

    let result = OfflineCallbackPlugin::start(
        HostServices {
            presence: Arc::new(MemoryPresenceDirectory::new("example.com")),
            offline_store: Arc::new(MemoryOfflineStore::new()),
            interceptors: Arc::new(InterceptorChain::new()),
        },
        &properties,
        Handle::current(),
    );

    assert!(matches!(result, Err(CallbackError::Configuration(_))));
}

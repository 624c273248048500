use privchat_offline_callback::{
    CallbackConfig, InboundEvent, Message, OfflineMessage, OfflineStore, Packet, PropertyStore,
    SledOfflineStore, TomlPropertyStore,
};
use tempfile::tempdir;

fn event(to: &str, body: &str, id: &str) -> InboundEvent {
    let message = Message::chat(
        "alice@example.com/laptop".parse().unwrap(),
        to.parse().unwrap(),
        body,
    )
    .with_id(id);
    InboundEvent::from_packet(&Packet::Message(message), true, true).unwrap()
}

#[tokio::test]
async fn test_sled_store_keeps_messages_per_recipient() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("offline.sled");
    let store = SledOfflineStore::open(path.to_str().unwrap()).expect("open sled");

    let first = OfflineMessage::from_event(&event("bob@example.com/phone", "first", "m1")).unwrap();
    let second = OfflineMessage::from_event(&event("bob@example.com", "second", "m2")).unwrap();
    let other = OfflineMessage::from_event(&event("carol@example.com", "other", "m3")).unwrap();

    store.store(&first).await.expect("store first");
    store.store(&second).await.expect("store second");
    store.store(&other).await.expect("store other");

    let for_bob = store.messages_for("bob@example.com").expect("scan");
    let bodies: Vec<_> = for_bob.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second"]);
    assert_eq!(for_bob[0].from, "alice@example.com/laptop");
    assert_eq!(store.len(), 3);
}

#[test]
fn test_generated_token_is_persisted_once() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("callback.toml");

    let first = {
        let store = TomlPropertyStore::open(&path).expect("open");
        CallbackConfig::load(&store).expect("load")
    };
    let second = {
        let store = TomlPropertyStore::open(&path).expect("reopen");
        assert_eq!(
            store.get_property("callback_on_offline.token").as_deref(),
            Some(first.token.as_str())
        );
        CallbackConfig::load(&store).expect("reload")
    };

    assert_eq!(first.token, second.token);
    assert_eq!(first.url, "http://localhost/user/offline/callback/url");
    assert_eq!(second.url, first.url);
}

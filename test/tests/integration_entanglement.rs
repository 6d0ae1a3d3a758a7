/// End-to-end entanglement between two instances
///
/// Each test connects a client and a server over a queued local link, starts
/// a sync from the client and moves messages until the link is quiet:
/// 1. Downstream: the server's document appears on the client and follows it
/// 2. Upstream: the client's document appears on the server
/// 3. Bidirectional: changes flow both ways and settle
/// 4. Snapshot: a one-off copy, after which both sides go inactive
/// 5. Closing one side, removing the root or losing the link ends the sync
/// 6. Collections and attributes can be entangled as roots
/// 7. A record that does not fit the receiving tree ends the sync

use meshnet_shared::{EntangledObject, Sid, SyncConfig, SyncDirection};
use meshnet_test::{
    assert_absent, assert_attribute, assert_inactive, exchange_messages, oid, LocalLink,
    TestInstance,
};

const PROFILE: &str = "/profile(alice)";
const NAME: &str = "/profile(alice)/name";
const VERSION: &str = "/profile(alice)/client/version";

struct Pair {
    server: TestInstance,
    client: TestInstance,
    link: LocalLink,
}

impl Pair {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let server = TestInstance::new(Sid::from_raw(0x105));
        let client = TestInstance::new(Sid::from_raw(0x002));
        let link = LocalLink::new(client.sid, server.sid);
        client.connect(&link.a);
        server.connect(&link.b);
        Self {
            server,
            client,
            link,
        }
    }

    fn entangle(&self, direction: SyncDirection) -> EntangledObject {
        self.client.entangle(
            &self.link.a,
            PROFILE,
            SyncConfig {
                direction,
                ..SyncConfig::default()
            },
        )
    }

    fn exchange(&mut self) -> usize {
        exchange_messages(&mut self.client, &mut self.server, &self.link)
    }
}

#[test]
fn downstream_copies_and_follows_the_server() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);
    pair.server.set(VERSION, "1.0", 10);

    let object = pair.entangle(SyncDirection::Downstream);
    assert!(object.has_sink() && !object.has_source());
    pair.exchange();

    assert_eq!(pair.server.entangled.len(), 1);
    assert!(pair.server.entangled[0].has_source());
    assert_attribute!(pair.client, NAME, "Alice");
    assert_attribute!(pair.client, VERSION, "1.0");

    pair.server.set(NAME, "Alicia", 20);
    pair.exchange();
    assert_attribute!(pair.client, NAME, "Alicia");

    // nothing flows back upstream
    pair.client.set(NAME, "Mallory", 30);
    assert_eq!(pair.exchange(), 0);
    assert_attribute!(pair.server, NAME, "Alicia");
}

#[test]
fn upstream_publishes_the_client_document() {
    let mut pair = Pair::new();
    pair.client.set(NAME, "Alice", 10);

    let object = pair.entangle(SyncDirection::Upstream);
    assert!(object.has_source() && !object.has_sink());
    pair.exchange();
    assert_attribute!(pair.server, NAME, "Alice");

    pair.client.set(VERSION, "2.0", 11);
    pair.exchange();
    assert_attribute!(pair.server, VERSION, "2.0");

    pair.server.set(NAME, "Bob", 12);
    assert_eq!(pair.exchange(), 0);
    assert_attribute!(pair.client, NAME, "Alice");
}

#[test]
fn bidirectional_changes_settle_on_both_sides() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);
    pair.client.set(VERSION, "1.0", 10);

    let _object = pair.entangle(SyncDirection::Bidirectional);
    pair.exchange();
    assert_attribute!(pair.client, NAME, "Alice");
    assert_attribute!(pair.server, VERSION, "1.0");

    pair.client.set(NAME, "Alicia", 20);
    pair.exchange();
    assert_attribute!(pair.server, NAME, "Alicia");

    pair.server.set(VERSION, "1.1", 21);
    pair.exchange();
    assert_attribute!(pair.client, VERSION, "1.1");
}

#[test]
fn stale_values_do_not_overwrite_newer_ones() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "old", 5);
    pair.client.set(NAME, "new", 50);

    let _object = pair.entangle(SyncDirection::Bidirectional);
    pair.exchange();

    assert_attribute!(pair.client, NAME, "new");
    assert_attribute!(pair.server, NAME, "new");
}

#[test]
fn removals_are_mirrored() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);
    pair.server.set(VERSION, "1.0", 10);

    let _object = pair.entangle(SyncDirection::Downstream);
    pair.exchange();
    assert_attribute!(pair.client, VERSION, "1.0");

    pair.server.remove("/profile(alice)/client");
    pair.exchange();
    assert_absent!(pair.client, "/profile(alice)/client");
    assert_attribute!(pair.client, NAME, "Alice");
}

#[test]
fn whitelist_limits_what_is_synced() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);
    pair.server.set(VERSION, "1.0", 10);

    let _object = pair.client.entangle(
        &pair.link.a,
        PROFILE,
        SyncConfig {
            whitelist: vec![oid("/profile(alice)/client")],
            ..SyncConfig::default()
        },
    );
    pair.exchange();
    assert_attribute!(pair.client, VERSION, "1.0");
    assert_absent!(pair.client, NAME);

    pair.server.set(NAME, "Alicia", 20);
    pair.server.set(VERSION, "1.1", 20);
    pair.exchange();
    assert_attribute!(pair.client, VERSION, "1.1");
    assert_absent!(pair.client, NAME);
}

#[test]
fn snapshot_copies_once_and_goes_inactive() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);

    let object = EntangledObject::snapshot(
        &pair.client.tree,
        &oid(PROFILE),
        pair.link.a.clone(),
        &pair.client.streams,
        Vec::new(),
    )
    .unwrap();
    assert!(!object.is_inactive());
    pair.exchange();

    assert_attribute!(pair.client, NAME, "Alice");
    assert_inactive!(object);
    assert_inactive!(pair.server.entangled[0]);

    // later changes are not followed
    pair.server.set(NAME, "Alicia", 20);
    assert_eq!(pair.exchange(), 0);
    assert_attribute!(pair.client, NAME, "Alice");
    assert_eq!(pair.client.streams.sink_count(), 0);
    assert_eq!(pair.server.streams.source_count(), 0);
}

#[tokio::test]
async fn inactive_resolves_after_the_snapshot() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);

    let object = EntangledObject::snapshot(
        &pair.client.tree,
        &oid(PROFILE),
        pair.link.a.clone(),
        &pair.client.streams,
        Vec::new(),
    )
    .unwrap();
    pair.exchange();
    object.inactive().await;
    assert_attribute!(pair.client, NAME, "Alice");
}

#[test]
fn dropping_the_initiator_ends_the_sync_on_both_sides() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);

    let object = pair.entangle(SyncDirection::Bidirectional);
    pair.exchange();
    assert!(!pair.server.entangled[0].is_inactive());

    drop(object);
    pair.exchange();
    assert_inactive!(pair.server.entangled[0]);
    assert_eq!(pair.server.streams.outbound_count(), 0);
    assert_eq!(pair.server.streams.inbound_count(), 0);

    pair.server.set(NAME, "Alicia", 20);
    assert_eq!(pair.exchange(), 0);
}

#[test]
fn closing_the_sink_stops_the_remote_source() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);

    let mut object = pair.entangle(SyncDirection::Downstream);
    pair.exchange();

    object.close_sink();
    assert_inactive!(object);
    pair.exchange();
    assert_inactive!(pair.server.entangled[0]);
}

#[test]
fn removing_the_root_closes_the_source() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);

    let object = pair.entangle(SyncDirection::Downstream);
    pair.exchange();

    pair.server.remove(PROFILE);
    pair.exchange();
    assert_inactive!(pair.server.entangled[0]);
    assert_inactive!(object);
}

#[test]
fn losing_the_link_tears_down_every_stream() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);

    let object = pair.entangle(SyncDirection::Bidirectional);
    pair.exchange();

    pair.link.close();
    pair.client.disconnect(&pair.link.a);
    pair.server.disconnect(&pair.link.b);

    assert_inactive!(object);
    assert_inactive!(pair.server.entangled[0]);
    for instance in [&pair.client, &pair.server] {
        assert_eq!(instance.streams.source_count(), 0);
        assert_eq!(instance.streams.sink_count(), 0);
        assert_eq!(instance.streams.inbound_count(), 0);
        assert_eq!(instance.streams.outbound_count(), 0);
    }
}

#[test]
fn collection_root_follows_every_member() {
    let mut pair = Pair::new();
    pair.server.set(NAME, "Alice", 10);
    pair.server.set("/profile(bob)/name", "Bob", 10);

    let object = pair.client.entangle(&pair.link.a, "/profile()", SyncConfig::default());
    pair.exchange();
    assert_attribute!(pair.client, NAME, "Alice");
    assert_attribute!(pair.client, "/profile(bob)/name", "Bob");

    pair.server.set("/profile(carol)/name", "Carol", 11);
    pair.server.remove("/profile(bob)");
    pair.exchange();
    assert_attribute!(pair.client, "/profile(carol)/name", "Carol");
    assert_absent!(pair.client, "/profile(bob)");
    assert!(!object.is_inactive());
    assert!(!pair.server.entangled[0].is_inactive());
}

#[test]
fn attribute_root_syncs_both_ways() {
    let mut pair = Pair::new();
    pair.server.set("/motd", "hello", 10);
    pair.client.set("/motd", "stale", 5);

    let _object = pair.client.entangle(
        &pair.link.a,
        "/motd",
        SyncConfig {
            direction: SyncDirection::Bidirectional,
            ..SyncConfig::default()
        },
    );
    pair.exchange();
    assert_attribute!(pair.client, "/motd", "hello");

    pair.client.set("/motd", "bye", 20);
    pair.exchange();
    assert_attribute!(pair.server, "/motd", "bye");
}

#[test]
fn record_of_the_wrong_kind_ends_the_sync() {
    let mut pair = Pair::new();
    pair.server.set(VERSION, "1.0", 10);
    // the client holds an attribute where the server has a document
    pair.client.set("/profile(alice)/client", "desktop", 1);

    let object = pair.entangle(SyncDirection::Downstream);
    pair.exchange();

    assert_inactive!(object);
    assert_inactive!(pair.server.entangled[0]);
    assert_attribute!(pair.client, "/profile(alice)/client", "desktop");
    assert_eq!(pair.client.streams.inbound_count(), 0);
    assert_eq!(pair.server.streams.outbound_count(), 0);
}

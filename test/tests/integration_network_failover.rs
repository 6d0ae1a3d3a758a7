/// Network view of clients attached to servers
///
/// Covers the lifecycle a client goes through with its server:
/// 1. Client (0x002) connects to server (0x105)
/// 2. Both see each other as their only neighbour
/// 3. Client prefers the server and is told a server is reachable
/// 4. Link drops, client sees an empty network and is told the server is lost
///
/// Messages travel over queued local connections, so every hop is explicit.

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use meshnet_instance::{NetworkError, NetworkEvent};
use meshnet_shared::{Codec, CodecError, Connection, Message, Payload, Sid};
use meshnet_test::{assert_direct, LocalLink, TestInstance};

const SERVER: u32 = 0x105;
const BACKUP: u32 = 0x205;
const CLIENT: u32 = 0x002;
const PEER: u32 = 0x102;

#[derive(Debug, PartialEq)]
struct Ping(u32);

impl Codec for Ping {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.0);
    }

    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        if buf.remaining() < 4 {
            return Err(CodecError::UnexpectedEnd {
                field: "ping",
                needed: 4,
                remaining: buf.remaining(),
            });
        }
        Ok(Ping(buf.get_u32()))
    }
}

impl Payload for Ping {
    const NAME: &'static str = "test.ping";
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn attach(a: &TestInstance, b: &TestInstance) -> LocalLink {
    let link = LocalLink::new(a.sid, b.sid);
    a.connect(&link.a);
    b.connect(&link.b);
    link
}

fn detach(a: &TestInstance, b: &TestInstance, link: &LocalLink) {
    link.close();
    a.disconnect(&link.a);
    b.disconnect(&link.b);
}

#[test]
fn client_loses_its_only_server() {
    init_logging();
    let server = TestInstance::new(Sid::from_raw(SERVER));
    let client = TestInstance::new(Sid::from_raw(CLIENT));

    let link = attach(&client, &server);

    assert_direct!(client, CLIENT, [SERVER]);
    assert_direct!(server, SERVER, [CLIENT]);
    assert_eq!(client.network.preferred_server(), Some(server.sid));
    assert_eq!(
        client.network_events(),
        vec![NetworkEvent::ServerEstablished { server: server.sid }]
    );
    // servers are not told about other servers or clients
    assert!(server.network_events().is_empty());

    detach(&client, &server, &link);

    assert_direct!(client, CLIENT, []);
    assert_eq!(client.network.nodes(), vec![client.sid]);
    assert_eq!(client.network.preferred_server(), None);
    assert_eq!(
        client.network_events().last(),
        Some(&NetworkEvent::ServerLost { server: server.sid })
    );
    assert!(server.network_events().is_empty());
}

#[test]
fn client_fails_over_to_a_remaining_server() {
    init_logging();
    let server = TestInstance::new(Sid::from_raw(SERVER));
    let backup = TestInstance::new(Sid::from_raw(BACKUP));
    let client = TestInstance::new(Sid::from_raw(CLIENT));

    let primary = attach(&client, &server);
    let _secondary = attach(&client, &backup);
    client.network.set_preferred_server(Some(server.sid));
    assert_direct!(client, CLIENT, [SERVER, BACKUP]);
    assert_eq!(client.network.preferred_server(), Some(server.sid));

    client.clear_network_events();
    detach(&client, &server, &primary);

    assert_direct!(client, CLIENT, [BACKUP]);
    assert_eq!(client.network.preferred_server(), Some(backup.sid));
    // a server is still adjacent, so nothing was lost
    assert!(client.network_events().is_empty());
}

#[test]
fn parallel_links_keep_the_neighbour() {
    init_logging();
    let server = TestInstance::new(Sid::from_raw(SERVER));
    let client = TestInstance::new(Sid::from_raw(CLIENT));

    let first = attach(&client, &server);
    let second = LocalLink::new(client.sid, server.sid);
    client.network.on_connection_established(second.a.as_ref()).unwrap();
    assert_eq!(client.network.direct_links_between(client.sid, server.sid).len(), 2);

    client.clear_network_events();
    client.network.on_connection_lost(first.id(), server.sid);

    assert_direct!(client, CLIENT, [SERVER]);
    assert_eq!(client.network.direct_links(client.sid).len(), 1);
    assert!(client.network_events().is_empty());
}

#[test]
fn messages_to_non_neighbours_go_through_the_server() {
    init_logging();
    let mut server = TestInstance::new(Sid::from_raw(SERVER));
    let client = TestInstance::new(Sid::from_raw(CLIENT));
    let link = attach(&client, &server);

    let message = Message::request(client.sid, Sid::from_raw(PEER), &Ping(7));
    let hop = client.network.route(message.clone()).unwrap();
    assert_eq!(hop, server.sid);
    assert_eq!(client.network.deliver(message.clone()), Ok(hop));

    let relayed = link.take_for_b();
    assert_eq!(relayed, vec![message.clone(), message]);
    server.handle(&link.b, relayed[0].clone());
    assert_eq!(server.inbox.len(), 1);
    assert_eq!(server.inbox[0].payload::<Ping>().unwrap(), Ping(7));
}

#[test]
fn routing_without_a_server_fails() {
    init_logging();
    let client = TestInstance::new(Sid::from_raw(CLIENT));
    let peer = Sid::from_raw(PEER);

    let result = client
        .network
        .route(Message::request(client.sid, peer, &Ping(1)));
    assert_eq!(result, Err(NetworkError::NoRoute { to: peer }));

    let result = client
        .network
        .route(Message::request(client.sid, client.sid, &Ping(1)));
    assert_eq!(result, Err(NetworkError::RouteToSelf { sid: client.sid }));
}

#[tokio::test]
async fn request_response_round_trip() {
    init_logging();
    let server = TestInstance::new(Sid::from_raw(SERVER));
    let client = TestInstance::new(Sid::from_raw(CLIENT));
    let link = attach(&client, &server);

    let request = Message::request(client.sid, server.sid, &Ping(41));
    let responder = async {
        // let the request go out first
        tokio::task::yield_now().await;
        for received in link.take_for_b() {
            let ping: Ping = received.payload().unwrap();
            link.b
                .send(Message::response(&received, &Ping(ping.0 + 1)))
                .unwrap();
        }
        for reply in link.take_for_a() {
            assert!(link.a.complete(reply).is_none());
        }
    };

    let (response, _) = tokio::join!(
        client
            .network
            .route_with_response(request.clone(), Duration::from_secs(1)),
        responder
    );
    let response = response.unwrap();
    assert_eq!(response.id, request.id);
    assert_eq!(response.from, server.sid);
    assert_eq!(response.payload::<Ping>().unwrap(), Ping(42));
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out() {
    init_logging();
    let server = TestInstance::new(Sid::from_raw(SERVER));
    let client = TestInstance::new(Sid::from_raw(CLIENT));
    let _link = attach(&client, &server);

    let request = Message::request(client.sid, server.sid, &Ping(1));
    let result = client
        .network
        .route_with_response(request.clone(), Duration::from_millis(500))
        .await;
    assert_eq!(
        result,
        Err(NetworkError::ResponseTimeout {
            id: request.id,
            after: Duration::from_millis(500)
        })
    );
}

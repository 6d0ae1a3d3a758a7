/// Hole punching between two peers over lossy in-memory datagrams
///
/// Time is paused, so the request spacing and the quiet period are exact:
/// 1. With the first datagram of each side lost, the second round succeeds
/// 2. With everything one side sends lost, both sides give up
/// 3. Anything that is not part of the handshake aborts it
/// 4. Over real UDP, a peer that binds late is only a lost datagram

use std::{net::SocketAddr, time::Duration};

use tokio::{net::UdpSocket, time::Instant};

use meshnet_instance::{punch, transport::UdpChannel, HolePunchConfig, HolePunchError};
use meshnet_test::LocalDatagramPair;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[tokio::test(start_paused = true)]
async fn both_sides_succeed_after_losing_their_first_request() {
    init_logging();
    let config = HolePunchConfig::default();
    let pair = LocalDatagramPair::lossy(1, 1);
    let start = Instant::now();

    let (a, b) = tokio::join!(punch(pair.a, &config), punch(pair.b, &config));

    let a = a.unwrap().expect("a should get through");
    let b = b.unwrap().expect("b should get through");
    // the second request round is answered, then both stay quiet
    let elapsed = start.elapsed();
    assert!(elapsed >= config.request_timeout + config.silent_time);
    assert!(elapsed < config.request_timeout * config.request_max);
    // two requests and one response each
    assert_eq!(a.sent(), 3);
    assert_eq!(b.sent(), 3);
}

#[tokio::test(start_paused = true)]
async fn lossless_punch_finishes_after_one_quiet_period() {
    init_logging();
    let config = HolePunchConfig::default();
    let pair = LocalDatagramPair::new();
    let start = Instant::now();

    let (a, b) = tokio::join!(punch(pair.a, &config), punch(pair.b, &config));

    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());
    assert_eq!(start.elapsed(), config.silent_time);
}

#[tokio::test(start_paused = true)]
async fn one_way_loss_gives_up_on_both_sides() {
    init_logging();
    let config = HolePunchConfig::default();
    let pair = LocalDatagramPair::lossy(usize::MAX, 0);
    let start = Instant::now();

    let (a, b) = tokio::join!(punch(pair.a, &config), punch(pair.b, &config));

    assert!(a.unwrap().is_none());
    assert!(b.unwrap().is_none());
    assert_eq!(start.elapsed(), config.request_timeout * config.request_max);
}

#[tokio::test(start_paused = true)]
async fn garbage_aborts_the_handshake() {
    init_logging();
    let pair = LocalDatagramPair::new();
    pair.b.inject(&[0xde, 0xad, 0xbe, 0xef]);

    let result = punch(pair.a, &HolePunchConfig::default()).await;
    assert!(matches!(result, Err(HolePunchError::Protocol { .. })));
}

/// A loopback address nothing is bound to
async fn free_port() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.local_addr().unwrap()
}

#[tokio::test]
async fn udp_peer_binding_late_still_punches_through() {
    init_logging();
    let config = HolePunchConfig::default();
    let b_addr = free_port().await;
    let a = UdpChannel::connect("127.0.0.1:0".parse().unwrap(), b_addr)
        .await
        .unwrap();
    let a_addr = a.local_addr().unwrap();

    let early = tokio::spawn({
        let config = config.clone();
        async move { punch(a, &config).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let b = UdpChannel::connect(b_addr, a_addr).await.unwrap();
    let late = punch(b, &config).await;

    assert!(late.unwrap().is_some());
    assert!(early.await.unwrap().unwrap().is_some());
}

#[tokio::test]
async fn udp_peer_that_never_binds_gives_none() {
    init_logging();
    let config = HolePunchConfig {
        request_timeout: Duration::from_millis(50),
        silent_time: Duration::from_millis(50),
        ..HolePunchConfig::default()
    };
    let a = UdpChannel::connect("127.0.0.1:0".parse().unwrap(), free_port().await)
        .await
        .unwrap();

    let result = punch(a, &config).await;
    assert!(matches!(result, Ok(None)));
}

/// Connection loop termination and back-off
///
/// Scripted connectors run on paused time so every cooldown is exact; the
/// TCP tests run against real loopback sockets.

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{net::TcpListener, time::Instant};

use meshnet_instance::{
    transport::TcpConnector, AttemptError, ConnectionLoop, ConnectionLoopConfig,
    ConnectionLoopError, Connector, Target,
};

/// Fails every attempt immediately, or hangs when `hang` is set
#[derive(Clone, Default)]
struct Refusing {
    attempts: Arc<AtomicU32>,
    hang: bool,
}

#[async_trait]
impl Connector for Refusing {
    type Connection = ();

    async fn connect(&self, _target: &Target) -> Result<(), AttemptError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        Err(AttemptError::Transient("connection refused".to_string()))
    }
}

fn config(targets: &[&str], limit: u32) -> ConnectionLoopConfig {
    ConnectionLoopConfig {
        iteration_limit: limit,
        cooldown: Duration::from_millis(100),
        ..ConnectionLoopConfig::with_targets(targets).unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn growing_cooldown_is_capped() {
    let connector = Refusing::default();
    let config = ConnectionLoopConfig {
        growth: 2.0,
        ceiling: Duration::from_millis(300),
        ..config(&["alpha", "beta:9000"], 4)
    };
    let start = Instant::now();

    let result = ConnectionLoop::new(config, connector.clone())
        .unwrap()
        .run()
        .await;

    assert_eq!(result, Ok(None));
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 8);
    // 100 + 200 + 300 (capped from 400), none after the last pass
    assert_eq!(start.elapsed(), Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn hanging_attempts_time_out() {
    let connector = Refusing {
        hang: true,
        ..Refusing::default()
    };
    let config = ConnectionLoopConfig {
        timeout: Duration::from_millis(50),
        ..config(&["alpha"], 2)
    };
    let start = Instant::now();

    let result = ConnectionLoop::new(config, connector.clone())
        .unwrap()
        .run()
        .await;

    assert_eq!(result, Ok(None));
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(start.elapsed(), Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn aborted_handle_reports_cancellation() {
    let handle = ConnectionLoop::new(config(&["alpha"], 0), Refusing::default())
        .unwrap()
        .spawn();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!handle.is_finished());

    handle.abort();
    assert_eq!(handle.result().await, Err(ConnectionLoopError::Cancelled));
}

#[test]
fn bad_configs_are_rejected() {
    assert!(matches!(
        ConnectionLoop::new(ConnectionLoopConfig::default(), Refusing::default()),
        Err(ConnectionLoopError::InvalidConfig { .. })
    ));
    assert!(matches!(
        ConnectionLoopConfig::with_targets(&["alpha:0"]),
        Err(ConnectionLoopError::InvalidTarget { .. })
    ));
}

#[tokio::test]
async fn tcp_loop_reaches_a_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ConnectionLoopConfig {
        targets: vec![Target::new("127.0.0.1", port)],
        iteration_limit: 1,
        ..ConnectionLoopConfig::default()
    };

    let handle = ConnectionLoop::new(config, TcpConnector { nodelay: true })
        .unwrap()
        .spawn();
    let (accepted, _) = listener.accept().await.unwrap();
    let stream = handle.result().await.unwrap().expect("loop should connect");

    assert_eq!(stream.peer_addr().unwrap(), accepted.local_addr().unwrap());
    assert!(stream.nodelay().unwrap());
}

#[tokio::test]
async fn tcp_loop_gives_up_on_a_closed_port() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ConnectionLoopConfig {
        targets: vec![Target::new("127.0.0.1", port)],
        cooldown: Duration::from_millis(10),
        iteration_limit: 2,
        ..ConnectionLoopConfig::default()
    };

    let result = ConnectionLoop::new(config, TcpConnector::default())
        .unwrap()
        .run()
        .await;
    assert!(matches!(result, Ok(None)));
}

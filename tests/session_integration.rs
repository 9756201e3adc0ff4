//! End-to-end session tests against stub in-process servers.

use std::time::Duration;

use horde::{
    config::HordeConfig,
    orchestrator::Horde,
    proto::{
        encode_packet, HandshakeC2s, HandshakeNextState, LoginStartC2s, PacketDecode,
        PacketDecoder, PacketFrame, StatusPongS2c, StatusResponseS2c,
    },
    proxy::{ProxyEndpoint, ProxyPool},
    session::Session,
    socks,
    utils::leak,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::{broadcast, mpsc},
    time::timeout,
};

const TEST_DEADLINE: Duration = Duration::from_secs(10);

async fn read_frame(dec: &mut PacketDecoder, stream: &mut TcpStream) -> PacketFrame {
    loop {
        if let Some(frame) = dec.try_next_packet().unwrap() {
            return frame;
        }
        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "client closed before a full frame arrived");
        dec.queue_slice(&buf[..n]);
    }
}

/// Serves one status probe: handshake, request, response, ping, pong.
/// Panics if the client's ping is not id 0x01 with an 8-byte zero payload.
async fn serve_status_probe(stream: &mut TcpStream, motd_json: &str) {
    let mut dec = PacketDecoder::new();

    let handshake = read_frame(&mut dec, stream).await;
    let mut body = handshake.body.as_slice();
    let handshake = HandshakeC2s::decode_body(&mut body).unwrap();
    assert_eq!(handshake.protocol_version, 47);
    assert_eq!(handshake.next_state, HandshakeNextState::Status);

    let request = read_frame(&mut dec, stream).await;
    assert_eq!(request.id, 0x00);
    assert!(request.body.is_empty());

    let mut wire = Vec::new();
    encode_packet(
        &mut wire,
        &StatusResponseS2c {
            json: motd_json.to_owned(),
        },
    )
    .unwrap();
    stream.write_all(&wire).await.unwrap();

    let ping = read_frame(&mut dec, stream).await;
    assert_eq!(ping.id, 0x01);
    assert_eq!(ping.body, vec![0u8; 8]);

    let mut wire = Vec::new();
    encode_packet(&mut wire, &StatusPongS2c { payload: 0 }).unwrap();
    stream.write_all(&wire).await.unwrap();
}

/// Serves one login: handshake, login start. Returns the username.
async fn serve_login_start(stream: &mut TcpStream) -> String {
    let mut dec = PacketDecoder::new();

    let handshake = read_frame(&mut dec, stream).await;
    let mut body = handshake.body.as_slice();
    let handshake = HandshakeC2s::decode_body(&mut body).unwrap();
    assert_eq!(handshake.next_state, HandshakeNextState::Login);

    let login = read_frame(&mut dec, stream).await;
    assert_eq!(login.id, 0x00);
    let mut body = login.body.as_slice();
    LoginStartC2s::decode_body(&mut body).unwrap().username.to_owned()
}

#[tokio::test]
async fn probe_reports_motd_and_pings() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        serve_status_probe(&mut stream, r#"{"description":{"text":"A Server"}}"#).await;
    });

    let mut session = Session::new(
        "Probe1".to_string(),
        "127.0.0.1".to_string(),
        port,
        None,
        TEST_DEADLINE,
    );
    let motd = timeout(TEST_DEADLINE, session.probe()).await.unwrap().unwrap();
    assert_eq!(motd.as_deref(), Some("A Server"));

    timeout(TEST_DEADLINE, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn probe_survives_unparseable_motd() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        // Not JSON at all; the probe must still ping and complete.
        serve_status_probe(&mut stream, "§6not json at all").await;
    });

    let mut session = Session::new(
        "Probe2".to_string(),
        "127.0.0.1".to_string(),
        port,
        None,
        TEST_DEADLINE,
    );
    let motd = timeout(TEST_DEADLINE, session.probe()).await.unwrap().unwrap();
    assert_eq!(motd, None);

    timeout(TEST_DEADLINE, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn login_session_echoes_keep_alive_bytes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    // length=6, id=0x00, five body bytes: the 1.8 keep-alive shape.
    let keep_alive = [0x06u8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let username = serve_login_start(&mut stream).await;
        assert_eq!(username, "KeepMe");

        stream.write_all(&keep_alive).await.unwrap();

        let mut echoed = [0u8; 7];
        stream.read_exact(&mut echoed).await.unwrap();
        assert_eq!(echoed, keep_alive);
        // Closing the stream ends the session cleanly.
    });

    let mut session = Session::new(
        "KeepMe".to_string(),
        "127.0.0.1".to_string(),
        port,
        None,
        TEST_DEADLINE,
    );
    timeout(TEST_DEADLINE, session.login()).await.unwrap().unwrap();

    timeout(TEST_DEADLINE, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn login_session_survives_malformed_framing() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let keep_alive = [0x06u8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let username = serve_login_start(&mut stream).await;
        assert_eq!(username, "Resync");

        // Six continuation bytes can never terminate as a length varint.
        stream.write_all(&[0x80u8; 6]).await.unwrap();
        // Separate write so the client rejects the garbage on its own
        // before the real frame lands.
        tokio::time::sleep(Duration::from_millis(300)).await;
        stream.write_all(&keep_alive).await.unwrap();

        // The session must still be alive and echoing.
        let mut echoed = [0u8; 7];
        stream.read_exact(&mut echoed).await.unwrap();
        assert_eq!(echoed, keep_alive);
    });

    let mut session = Session::new(
        "Resync".to_string(),
        "127.0.0.1".to_string(),
        port,
        None,
        TEST_DEADLINE,
    );
    timeout(TEST_DEADLINE, session.login()).await.unwrap().unwrap();

    timeout(TEST_DEADLINE, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn probe_survives_malformed_framing() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut dec = PacketDecoder::new();

        let handshake = read_frame(&mut dec, &mut stream).await;
        let mut body = handshake.body.as_slice();
        let handshake = HandshakeC2s::decode_body(&mut body).unwrap();
        assert_eq!(handshake.next_state, HandshakeNextState::Status);

        let request = read_frame(&mut dec, &mut stream).await;
        assert_eq!(request.id, 0x00);

        // Garbage ahead of the response; the probe must shrug it off.
        stream.write_all(&[0x80u8; 6]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let mut wire = Vec::new();
        encode_packet(
            &mut wire,
            &StatusResponseS2c {
                json: r#"{"description":{"text":"A Server"}}"#.to_owned(),
            },
        )
        .unwrap();
        stream.write_all(&wire).await.unwrap();

        let ping = read_frame(&mut dec, &mut stream).await;
        assert_eq!(ping.id, 0x01);
        let mut wire = Vec::new();
        encode_packet(&mut wire, &StatusPongS2c { payload: 0 }).unwrap();
        stream.write_all(&wire).await.unwrap();
    });

    let mut session = Session::new(
        "Resync2".to_string(),
        "127.0.0.1".to_string(),
        port,
        None,
        TEST_DEADLINE,
    );
    let motd = timeout(TEST_DEADLINE, session.probe()).await.unwrap().unwrap();
    assert_eq!(motd.as_deref(), Some("A Server"));

    timeout(TEST_DEADLINE, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn one_shot_flood_dispatches_exactly_the_requested_count() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (logins_tx, mut logins_rx) = mpsc::unbounded_channel::<String>();

    // Stub target: answers probes, records login usernames, then hangs up.
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            let logins_tx = logins_tx.clone();
            tokio::spawn(async move {
                let mut dec = PacketDecoder::new();
                let handshake = read_frame(&mut dec, &mut stream).await;
                let mut body = handshake.body.as_slice();
                let handshake = HandshakeC2s::decode_body(&mut body).unwrap();
                match handshake.next_state {
                    HandshakeNextState::Status => {
                        let request = read_frame(&mut dec, &mut stream).await;
                        assert_eq!(request.id, 0x00);
                        let mut wire = Vec::new();
                        encode_packet(
                            &mut wire,
                            &StatusResponseS2c {
                                json: r#"{"description":"stub"}"#.to_owned(),
                            },
                        )
                        .unwrap();
                        stream.write_all(&wire).await.unwrap();

                        let ping = read_frame(&mut dec, &mut stream).await;
                        assert_eq!(ping.id, 0x01);
                        let mut wire = Vec::new();
                        encode_packet(&mut wire, &StatusPongS2c { payload: 0 }).unwrap();
                        stream.write_all(&wire).await.unwrap();
                    }
                    HandshakeNextState::Login => {
                        let login = read_frame(&mut dec, &mut stream).await;
                        let mut body = login.body.as_slice();
                        let username =
                            LoginStartC2s::decode_body(&mut body).unwrap().username.to_owned();
                        let _ = logins_tx.send(username);
                    }
                }
            });
        }
    });

    let config = HordeConfig {
        target_host: "127.0.0.1".to_string(),
        target_port: port,
        bots_per_second: 3,
        bot_count: Some(3),
        ..HordeConfig::default()
    };

    let stop = leak(broadcast::channel(1).0);
    let horde = leak(Horde::new(config, ProxyPool::empty(), stop));
    let runner = tokio::spawn(async move { horde.start().await });

    // The dispatch count, not session completion, gates the stop.
    timeout(TEST_DEADLINE, runner).await.unwrap().unwrap().unwrap();

    let mut usernames = Vec::new();
    for _ in 0..3 {
        let name = timeout(TEST_DEADLINE, logins_rx.recv()).await.unwrap().unwrap();
        assert!((5..=7).contains(&name.len()));
        usernames.push(name);
    }

    // No fourth session shows up after the one-shot budget is spent.
    assert!(
        timeout(Duration::from_millis(1500), logins_rx.recv()).await.is_err(),
        "dispatched more sessions than requested"
    );
}

#[tokio::test]
async fn flood_with_empty_pool_skips_and_keeps_ticking() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (conn_tx, mut conn_rx) = mpsc::unbounded_channel::<()>();
    tokio::spawn(async move {
        loop {
            let _ = listener.accept().await.unwrap();
            let _ = conn_tx.send(());
        }
    });

    let config = HordeConfig {
        target_host: "127.0.0.1".to_string(),
        target_port: port,
        bots_per_second: 2,
        bot_count: Some(2),
        proxy_url: Some("http://unused.invalid/socks4.txt".to_string()),
        ..HordeConfig::default()
    };

    let stop = leak(broadcast::channel(1).0);
    let horde = leak(Horde::new(config, ProxyPool::empty(), stop));
    let runner = tokio::spawn(async move { horde.start().await });

    // A couple of ticks pass: every attempt is skipped, nothing reaches the
    // target, and the count never fills so the loop is still alive.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(
        conn_rx.try_recv().is_err(),
        "dispatched a session with no proxy available"
    );

    stop.send(()).unwrap();
    let result = timeout(TEST_DEADLINE, runner).await.unwrap().unwrap();
    assert!(result.is_ok(), "tick loop did not survive the empty pool");
}

#[tokio::test]
async fn debug_mode_reports_empty_proxy_pool() {
    let config = HordeConfig {
        debug: true,
        proxy_url: Some("http://unused.invalid/socks4.txt".to_string()),
        ..HordeConfig::default()
    };

    let stop = leak(broadcast::channel(1).0);
    let horde = leak(Horde::new(config, ProxyPool::empty(), stop));
    let result = timeout(TEST_DEADLINE, horde.start()).await.unwrap();
    assert!(result.is_err(), "empty pool must fail the debug session");
}

#[tokio::test]
async fn socks4_relay_grants_and_refuses() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut request = [0u8; 9];
                stream.read_exact(&mut request).await.unwrap();
                assert_eq!(request[0], 0x04);
                assert_eq!(request[1], 0x01);
                // Grant for port 25565, refuse everything else.
                let dest_port = u16::from_be_bytes([request[2], request[3]]);
                let code = if dest_port == 25565 { 0x5a } else { 0x5b };
                stream
                    .write_all(&[0x00, code, 0, 0, 0, 0, 0, 0])
                    .await
                    .unwrap();
            });
        }
    });

    let proxy = ProxyEndpoint {
        host: "127.0.0.1".to_string(),
        port,
    };

    let granted = socks::connect(&proxy, "192.0.2.10", 25565, TEST_DEADLINE).await;
    assert!(granted.is_ok());

    let refused = socks::connect(&proxy, "192.0.2.10", 25566, TEST_DEADLINE).await;
    assert!(matches!(
        refused,
        Err(horde::error::SessionError::ProxyConnect { code: 0x5b })
    ));
}

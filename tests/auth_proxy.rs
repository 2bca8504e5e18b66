//! Server challenges and proxy routing through the reqwest transport.

use outbound_dispatcher::config::{ProxyConfig, ProxyKind};
use outbound_dispatcher::{DispatchEvent, Dispatcher, DispatcherConfig, ErrorKind, RequestHeaders};

mod common;

use common::{next_terminal, start_server, Reply};

// base64("user:pw")
const USER_PW: &str = "Basic dXNlcjpwdw==";
// base64("puser:ppass")
const PROXY_USER_PW: &str = "Basic cHVzZXI6cHBhc3M=";

async fn challenging_server() -> common::MockServer {
    start_server(|req| match req.header("authorization") {
        Some(USER_PW) => Reply::new(200, "welcome"),
        _ => Reply::new(401, "who are you").header("WWW-Authenticate", r#"Basic realm="test""#),
    })
    .await
}

#[tokio::test]
async fn test_basic_challenge_answered_with_credentials() {
    let server = challenging_server().await;
    let (dispatcher, mut events) = Dispatcher::builder(DispatcherConfig::default()).build().unwrap();
    dispatcher.set_credentials("user", "pw");

    let id = dispatcher.get(server.url("/private"), RequestHeaders::new());
    assert_eq!(
        next_terminal(&mut events).await,
        DispatchEvent::Success {
            id,
            body: "welcome".into()
        }
    );

    let seen = server.requests();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].header("authorization"), None);
    assert_eq!(seen[1].header("authorization"), Some(USER_PW));
}

#[tokio::test]
async fn test_challenge_without_credentials_fails() {
    let server = challenging_server().await;
    let (dispatcher, mut events) = Dispatcher::builder(DispatcherConfig::default()).build().unwrap();

    dispatcher.get(server.url("/private"), RequestHeaders::new());
    match next_terminal(&mut events).await {
        DispatchEvent::Failure {
            kind,
            upstream_status,
            message,
            ..
        } => {
            assert_eq!(kind, ErrorKind::Authentication);
            assert_eq!(upstream_status, Some(401));
            assert!(message.ends_with("Answer: who are you"), "{}", message);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_caller_authorization_is_not_overridden() {
    let server = challenging_server().await;
    let (dispatcher, mut events) = Dispatcher::builder(DispatcherConfig::default()).build().unwrap();
    dispatcher.set_credentials("user", "pw");

    dispatcher.get(
        server.url("/private"),
        RequestHeaders::from([("Authorization", "Bearer stale")]),
    );
    assert!(matches!(
        next_terminal(&mut events).await,
        DispatchEvent::Failure { kind: ErrorKind::Authentication, .. }
    ));
    assert_eq!(server.requests().len(), 1);
}

fn proxied_config(port: u16) -> DispatcherConfig {
    let mut config = DispatcherConfig::default();
    config.proxies.push(ProxyConfig {
        host: "127.0.0.1".into(),
        port,
        kind: ProxyKind::Http,
        username: Some("puser".into()),
        password: Some("ppass".into()),
    });
    config
}

#[tokio::test]
async fn test_requests_go_through_proxy_with_credentials() {
    let proxy = start_server(|_| Reply::new(200, "via proxy")).await;
    let (dispatcher, mut events) = Dispatcher::builder(proxied_config(proxy.addr.port()))
        .build()
        .unwrap();

    let url = url::Url::parse("http://upstream.test/resource?q=1").unwrap();
    let id = dispatcher.get(url, RequestHeaders::new());
    assert_eq!(
        next_terminal(&mut events).await,
        DispatchEvent::Success {
            id,
            body: "via proxy".into()
        }
    );

    let seen = proxy.requests();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].target, "http://upstream.test/resource?q=1");
    assert_eq!(seen[0].header("proxy-authorization"), Some(PROXY_USER_PW));
}

#[tokio::test]
async fn test_proxy_failure_names_the_proxy() {
    let proxy = start_server(|_| Reply::new(502, "no route")).await;
    let port = proxy.addr.port();
    let (dispatcher, mut events) = Dispatcher::builder(proxied_config(port)).build().unwrap();

    let url = url::Url::parse("http://upstream.test/").unwrap();
    dispatcher.get(url, RequestHeaders::new());
    match next_terminal(&mut events).await {
        DispatchEvent::Failure {
            kind,
            upstream_status,
            message,
            ..
        } => {
            assert_eq!(kind, ErrorKind::HttpStatus);
            assert_eq!(upstream_status, Some(502));
            assert!(message.contains(&format!("Proxy: 127.0.0.1:{}.", port)), "{}", message);
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

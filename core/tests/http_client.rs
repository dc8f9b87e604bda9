/*
 * http_client.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration tests for the HTTP client over real sockets: chunked
 * bodies with trailers, connection reuse, close-delineated framing, and
 * idle expiry.
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use sigillo_core::net;
use sigillo_core::protocol::http::{
    HttpClient, HttpClientConfig, HttpRequest, Method, Pair,
};
use sigillo_core::web::url::Url;

/// One raw response per request; responses are handed out in order no
/// matter how many connections the client opens. `conns` counts accepted
/// connections.
async fn raw_server(
    listener: TcpListener,
    responses: Vec<Vec<u8>>,
    conns: Arc<AtomicUsize>,
    close_after_each: bool,
) {
    let responses = Arc::new(Mutex::new(responses.into_iter()));
    loop {
        let Ok((mut sock, _)) = listener.accept().await else {
            return;
        };
        conns.fetch_add(1, Ordering::SeqCst);
        let responses = responses.clone();
        loop {
            // read one request head (none of these tests send bodies)
            let mut buf = Vec::new();
            let mut tmp = [0u8; 4096];
            let head_ok = loop {
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break true;
                }
                match sock.read(&mut tmp).await {
                    Ok(0) | Err(_) => break false,
                    Ok(n) => buf.extend_from_slice(&tmp[..n]),
                }
            };
            if !head_ok {
                break;
            }
            let Some(resp) = responses.lock().unwrap().next() else {
                return;
            };
            if sock.write_all(&resp).await.is_err() {
                break;
            }
            if close_after_each {
                break;
            }
        }
    }
}

fn client() -> HttpClient {
    let tls = net::client_config(None, false).unwrap();
    HttpClient::new(HttpClientConfig::new(tls))
}

fn client_with_idle(idle: Duration) -> HttpClient {
    let tls = net::client_config(None, false).unwrap();
    let mut config = HttpClientConfig::new(tls);
    config.idle_timeout = idle;
    HttpClient::new(config)
}

async fn get(http: &mut HttpClient, url: &str) -> sigillo_core::protocol::http::HttpResponse {
    let url = Url::parse(url).unwrap();
    http.request(HttpRequest::new(Method::Get, &url)).await.unwrap()
}

#[tokio::test]
async fn chunked_with_trailers_and_reuse() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let conns = Arc::new(AtomicUsize::new(0));

    let chunked: Vec<u8> = b"HTTP/1.1 200 OK\r\n\
Transfer-Encoding: chunked\r\n\
\r\n\
4\r\nWiki\r\n5\r\npedia\r\n0\r\nExpires-Checksum: abc\r\n\r\n"
        .to_vec();
    let plain: Vec<u8> = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec();
    let server = tokio::spawn(raw_server(
        listener,
        vec![chunked, plain],
        conns.clone(),
        false,
    ));

    let mut http = client();
    let first = get(&mut http, &format!("{}/a", base)).await;
    assert_eq!(first.status, 200);
    assert_eq!(first.body, b"Wikipedia");
    assert_eq!(
        first.trailers,
        vec![Pair::new("Expires-Checksum", "abc")]
    );

    // the chunked message ended on a clean boundary; the same
    // connection serves the next request
    let second = get(&mut http, &format!("{}/b", base)).await;
    assert_eq!(second.body, b"hello");
    assert_eq!(conns.load(Ordering::SeqCst), 1);

    server.abort();
}

#[tokio::test]
async fn close_delineated_body_consumes_the_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let conns = Arc::new(AtomicUsize::new(0));

    // no Content-Length, no chunking: the body ends when the server
    // hangs up
    let closey: Vec<u8> = b"HTTP/1.1 200 OK\r\n\r\nall the way to eof".to_vec();
    let after: Vec<u8> = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec();
    let server = tokio::spawn(raw_server(
        listener,
        vec![closey, after],
        conns.clone(),
        true,
    ));

    let mut http = client();
    let first = get(&mut http, &format!("{}/x", base)).await;
    assert_eq!(first.body, b"all the way to eof");

    let second = get(&mut http, &format!("{}/y", base)).await;
    assert_eq!(second.body, b"ok");
    // two requests, two connections
    assert_eq!(conns.load(Ordering::SeqCst), 2);

    server.abort();
}

#[tokio::test]
async fn idle_connections_expire() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let conns = Arc::new(AtomicUsize::new(0));

    let resp = |body: &str| {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    };
    let server = tokio::spawn(raw_server(
        listener,
        vec![resp("one"), resp("two"), resp("three")],
        conns.clone(),
        false,
    ));

    let mut http = client_with_idle(Duration::from_millis(50));
    get(&mut http, &format!("{}/1", base)).await;
    // well inside the idle window: reuse
    get(&mut http, &format!("{}/2", base)).await;
    assert_eq!(conns.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(120)).await;
    let third = get(&mut http, &format!("{}/3", base)).await;
    assert_eq!(third.body, b"three");
    assert_eq!(conns.load(Ordering::SeqCst), 2);

    server.abort();
}

#[tokio::test]
async fn connection_close_header_is_honored() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let conns = Arc::new(AtomicUsize::new(0));

    let with_close: Vec<u8> =
        b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\nConnection: close\r\n\r\nbye".to_vec();
    let after: Vec<u8> = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec();
    let server = tokio::spawn(raw_server(
        listener,
        vec![with_close, after],
        conns.clone(),
        true,
    ));

    let mut http = client();
    let first = get(&mut http, &format!("{}/x", base)).await;
    assert_eq!(first.body, b"bye");
    let second = get(&mut http, &format!("{}/y", base)).await;
    assert_eq!(second.body, b"ok");
    assert_eq!(conns.load(Ordering::SeqCst), 2);

    server.abort();
}

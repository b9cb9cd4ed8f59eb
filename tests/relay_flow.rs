//! End-to-end relay tests against a mock upstream.

use std::time::Duration;

use axum::http::StatusCode;
use m3u8_relay::config::RelayConfig;

mod common;

use common::{client, enc, start_programmable_backend, start_relay, Reply};

#[tokio::test]
async fn playlist_chain_is_rewritten_and_carries_cookies() {
    let (upstream, seen) = start_programmable_backend(|req| async move {
        match req.path.as_str() {
            "/live/master.m3u8" => Reply::new(200, "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nlow/index.m3u8\n")
                .header("Content-Type", "application/vnd.apple.mpegurl")
                .header("Set-Cookie", "sid=xyz; Path=/; HttpOnly"),
            "/live/low/index.m3u8" => Reply::new(
                200,
                "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"../key.bin\"\n#EXTINF:4.0,\nseg0.ts\n",
            ),
            _ => Reply::new(404, "nope"),
        }
    })
    .await;
    let relay = start_relay(RelayConfig::default()).await;
    let http = client();

    let master = format!("http://{upstream}/live/master.m3u8");
    let res = http
        .get(relay.url(&format!("/proxy?url={}", enc(&master))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/vnd.apple.mpegurl");
    assert_eq!(res.headers()["x-proxy-by"], "m3u8-relay");
    assert!(res.headers().contains_key("x-request-id"));

    let variant = format!("http://{upstream}/live/low/index.m3u8");
    let body = res.text().await.unwrap();
    assert_eq!(
        body,
        format!(
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\n/proxy?url={}\n",
            enc(&variant)
        )
    );

    let res = http
        .get(relay.url(&format!("/proxy?url={}", enc(&variant))))
        .send()
        .await
        .unwrap();
    let body = res.text().await.unwrap();
    let key = format!("http://{upstream}/live/key.bin");
    let segment = format!("http://{upstream}/live/low/seg0.ts");
    assert_eq!(
        body,
        format!(
            "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"/proxy?url={}\"\n#EXTINF:4.0,\n/proxy?url={}\n",
            enc(&key),
            enc(&segment)
        )
    );

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].header("cookie"), None);
    assert_eq!(seen[1].header("cookie"), Some("sid=xyz"));
}

#[tokio::test]
async fn upstream_sees_browser_shaped_headers() {
    let (upstream, seen) = start_programmable_backend(|_| async { Reply::new(200, "#EXTM3U\n") }).await;
    let relay = start_relay(RelayConfig::default()).await;

    let target = format!("http://{upstream}/master.m3u8");
    let overrides = r#"{"Referer":"https://site.example/watch/1","X-Custom":"yes"}"#;
    let res = client()
        .get(relay.url(&format!("/proxy?url={}&headers={}", enc(&target), enc(overrides))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let seen = seen.lock().unwrap();
    let request = &seen[0];
    assert!(request.header("user-agent").unwrap().contains("Chrome/"));
    assert_eq!(request.header("accept"), Some("*/*"));
    assert_eq!(request.header("referer"), Some("https://site.example/watch/1"));
    assert_eq!(request.header("origin"), Some("https://site.example"));
    assert_eq!(request.header("x-custom"), Some("yes"));
}

#[tokio::test]
async fn binary_segment_streams_with_curated_headers() {
    let payload: Vec<u8> = (0..6000u32).map(|i| (i % 251) as u8).collect();
    let body = payload.clone();
    let (upstream, _) = start_programmable_backend(move |_| {
        let body = body.clone();
        async move {
            Reply::new(200, body)
                .header("Content-Type", "video/mp2t")
                .header("ETag", "\"v1\"")
                .header("Server", "edge-42")
        }
    })
    .await;
    let relay = start_relay(RelayConfig::default()).await;

    let target = format!("http://{upstream}/seg0.ts");
    let res = client()
        .get(relay.url(&format!("/proxy?url={}", enc(&target))))
        .header("Origin", "https://player.example")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "video/mp2t");
    assert_eq!(res.headers()["etag"], "\"v1\"");
    assert_eq!(res.headers()["access-control-allow-origin"], "https://player.example");
    assert_eq!(res.headers()["cache-control"], "no-store, no-cache, must-revalidate, proxy-revalidate");
    assert!(res.headers().get("server").map_or(true, |v| v != "edge-42"));
    assert_eq!(res.bytes().await.unwrap().to_vec(), payload);
}

#[tokio::test]
async fn range_requests_pass_through() {
    let (upstream, seen) = start_programmable_backend(|_| async {
        Reply::new(206, "0123456789")
            .header("Content-Type", "video/mp4")
            .header("Content-Range", "bytes 0-9/50000")
            .header("Accept-Ranges", "bytes")
    })
    .await;
    let relay = start_relay(RelayConfig::default()).await;

    let target = format!("http://{upstream}/movie.mp4");
    let res = client()
        .get(relay.url(&format!("/proxy?url={}", enc(&target))))
        .header("Range", "bytes=0-9")
        .send()
        .await
        .unwrap();

    // Small declared length routes through the error-page check first.
    assert_eq!(res.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(res.headers()["content-range"], "bytes 0-9/50000");
    assert_eq!(res.text().await.unwrap(), "0123456789");
    assert_eq!(seen.lock().unwrap()[0].header("range"), Some("bytes=0-9"));
}

#[tokio::test]
async fn disguised_error_page_is_bad_gateway() {
    let (upstream, _) = start_programmable_backend(|_| async {
        Reply::new(200, "<!DOCTYPE html><html><body>Just a moment...</body></html>")
            .header("Content-Type", "text/html; charset=UTF-8")
    })
    .await;
    let relay = start_relay(RelayConfig::default()).await;

    let target = format!("http://{upstream}/seg0.ts");
    let res = client()
        .get(relay.url(&format!("/proxy?url={}", enc(&target))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.headers()["x-proxy-by"], "m3u8-relay");

    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["message"], "upstream returned error page");
    assert_eq!(json["status"], 200);
    assert!(json["body"].as_str().unwrap().contains("Just a moment"));
}

#[tokio::test]
async fn upstream_error_status_is_bad_gateway() {
    let (upstream, _) = start_programmable_backend(|_| async { Reply::new(404, "no such segment") }).await;
    let relay = start_relay(RelayConfig::default()).await;

    let target = format!("http://{upstream}/gone.ts");
    let res = client()
        .get(relay.url(&format!("/proxy?url={}", enc(&target))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["status"], 404);
    assert_eq!(json["body"], "no such segment");
}

#[tokio::test]
async fn unreachable_upstream_is_server_error() {
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);

    let relay = start_relay(RelayConfig::default()).await;
    let target = format!("http://{addr}/master.m3u8");
    let res = client()
        .get(relay.url(&format!("/proxy?url={}", enc(&target))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = res.json().await.unwrap();
    assert!(json["message"].as_str().unwrap().starts_with("upstream request failed"));
}

#[tokio::test]
async fn bad_input_is_rejected_before_fetch() {
    let relay = start_relay(RelayConfig::default()).await;
    let http = client();

    let res = http.get(relay.url("/proxy")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let json: serde_json::Value = res.json().await.unwrap();
    assert_eq!(json["message"], "URL is required");

    let res = http
        .get(relay.url(&format!("/proxy?url={}", enc("ftp://example.com/a.m3u8"))))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = http.get(relay.url("/proxy?url=not%20a%20url")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn origin_allow_list_and_hot_reload() {
    let (upstream, seen) = start_programmable_backend(|_| async { Reply::new(200, "#EXTM3U\n") }).await;
    let relay = start_relay(RelayConfig::default()).await;
    let http = client();
    let target = format!("http://{upstream}/master.m3u8");
    let url = relay.url(&format!("/proxy?url={}", enc(&target)));

    let res = http.get(&url).header("Origin", "https://evil.example").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let mut config = RelayConfig::default();
    config.relay.allowed_origins = vec!["https://app.example".into()];
    relay.config_updates.send(config).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let res = http.get(&url).header("Origin", "https://evil.example").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(seen.lock().unwrap().len(), 1);

    let res = http.get(&url).header("Origin", "https://app.example").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = http.get(relay.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    relay.shutdown.trigger();
}

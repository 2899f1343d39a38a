//! Live capture smoke test against a local HTTP server.
//!
//! Requires Chrome to be installed; run with `cargo test -- --ignored`.

#![cfg(feature = "cdp")]

use std::sync::Once;
use tiny_http::{Response, Server};
use webshot::{CaptureTarget, CaptureTask, Service, ServiceConfig};

static INIT: Once = Once::new();

fn start_test_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18091").unwrap();
            for request in server.incoming_requests() {
                let response = Response::from_string(
                    r#"<!DOCTYPE html>
<html>
<head><title>Capture Target</title></head>
<body>
<h1 id="headline">Hello from the capture test</h1>
</body>
</html>"#,
                )
                .with_header(
                    "Content-Type: text/html; charset=utf-8"
                        .parse::<tiny_http::Header>()
                        .unwrap(),
                );
                let _ = request.respond(response);
            }
        });
        // Give the server time to start
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    "http://127.0.0.1:18091".to_string()
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Chrome to be installed
async fn test_live_page_capture_is_png() {
    let base_url = start_test_server();
    let service = Service::with_cdp(ServiceConfig::default());

    let png = service
        .queue
        .submit(CaptureTask::page(CaptureTarget::new(base_url)))
        .await
        .expect("capture failed");

    assert!(png.len() > 8);
    assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // Requires Chrome to be installed
async fn test_live_element_capture() {
    let base_url = start_test_server();
    let service = Service::with_cdp(ServiceConfig::default());

    let mut target = CaptureTarget::new(base_url);
    target.selector = Some("#headline".to_string());

    let png = service
        .queue
        .submit(CaptureTask::page(target))
        .await
        .expect("element capture failed");
    assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
}

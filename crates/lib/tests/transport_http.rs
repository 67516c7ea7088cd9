//! Integration test: start the transport on a free port, GET /, then drive
//! the inbound endpoint. Does not require the vendor to be reachable (no
//! outbound send is attempted). The server task is left running when the
//! test ends.

use lib::bus::LogBus;
use lib::config::Config;
use lib::server;
use std::sync::Arc;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn test_config(port: u16) -> Config {
    let mut config = Config {
        outbound_url: Some("http://127.0.0.1:1/send".to_string()),
        username: Some("user".to_string()),
        password: Some("pass".to_string()),
        ..Config::default()
    };
    config.server.port = port;
    config.server.bind = "127.0.0.1".to_string();
    config
}

async fn wait_for_health(client: &reqwest::Client, url: &str) {
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse JSON");
                assert_eq!(
                    json.get("runtime").and_then(|v| v.as_str()),
                    Some("running")
                );
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "GET {} did not return 200 with health JSON within 5s; last error: {:?}",
        url, last_err
    );
}

#[tokio::test]
async fn transport_serves_health_and_inbound_endpoints() {
    let port = free_port();
    let config = test_config(port);

    let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel(1);
    drop(outbound_tx);
    tokio::spawn(async move {
        let _ = server::run_transport(config, Arc::new(LogBus), outbound_rx).await;
    });

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);
    wait_for_health(&client, &format!("{}/", base)).await;

    // Complete notification: accepted with an empty JSON object.
    let url = format!(
        "{}/sms/inbound?sender=%2B2341234&receiver=4321&msgdata=hello\
&recvtime=2012.09.05+20%3A58%3A02&msgid=abc123&operator=MTN",
        base
    );
    let resp = client.get(&url).send().await.expect("inbound request");
    assert_eq!(resp.status().as_u16(), 200);
    let json: serde_json::Value = resp.json().await.expect("parse JSON");
    assert_eq!(json, serde_json::json!({}));

    // Incomplete notification: 400 naming the missing fields.
    let url = format!("{}/sms/inbound?sender=%2B2341234&msgid=abc123", base);
    let resp = client.get(&url).send().await.expect("inbound request");
    assert_eq!(resp.status().as_u16(), 400);
    let json: serde_json::Value = resp.json().await.expect("parse JSON");
    assert_eq!(
        json["missing_parameter"],
        serde_json::json!(["msgdata", "operator", "receiver", "recvtime"])
    );
}

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;

use action_gateway::transport::clients::{DELIVERY_TIMEOUT, MAILBOX_CAPACITY};
use action_gateway::transport::sse::{SseState, configure};
use action_gateway::{GatewayConfig, actions, build_server};
use actix_web::body::MessageBody;
use actix_web::http::StatusCode;
use actix_web::{App, test};
use bytes::Bytes;
use serde_json::{Value, json};

fn state() -> SseState {
    let config = GatewayConfig::default();
    let server = build_server(&config, actions::registry(), |_| None).expect("server");
    SseState::new(Arc::new(server))
}

/// Read the next SSE frame and split it into event name and data.
async fn next_event<B: MessageBody>(body: &mut Pin<Box<B>>) -> (String, String) {
    let chunk = poll_fn(|cx| body.as_mut().poll_next(cx))
        .await
        .expect("stream ended")
        .ok()
        .expect("body error");
    let frame = String::from_utf8(chunk.to_vec()).expect("utf-8 frame");

    let mut event = String::new();
    let mut data = String::new();
    for line in frame.lines() {
        if let Some(name) = line.strip_prefix("event: ") {
            event = name.to_string();
        } else if let Some(payload) = line.strip_prefix("data: ") {
            data = payload.to_string();
        }
    }
    (event, data)
}

#[actix_rt::test]
async fn response_is_pushed_to_the_subscribed_stream() {
    let state = state();
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/sse?client_id=c1").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
    let mut events = Box::pin(resp.into_body());

    let (event, data) = next_event(&mut events).await;
    assert_eq!(event, "connected");
    assert_eq!(serde_json::from_str::<Value>(&data).unwrap(), json!({ "client_id": "c1" }));

    let req = test::TestRequest::post()
        .uri("/message?client_id=c1")
        .set_payload(r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#)
        .to_request();
    let ack: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(ack, json!({ "status": "sent" }));

    let (event, data) = next_event(&mut events).await;
    assert_eq!(event, "message");
    let response: Value = serde_json::from_str(&data).unwrap();
    assert_eq!(response["id"], 7);
    let names: Vec<_> = response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["calc", "echo", "whoami"]);
}

#[actix_rt::test]
async fn unknown_client_gets_the_response_directly() {
    let app = test::init_service(App::new().configure(configure(state()))).await;

    let req = test::TestRequest::post()
        .uri("/message?client_id=c2")
        .set_payload(r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"calc","arguments":{"a":2,"b":3,"op":"mul"}}}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["result"]["isError"], false);
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert_eq!(serde_json::from_str::<Value>(text).unwrap(), json!({ "result": 6.0 }));
}

#[actix_rt::test]
async fn protocol_errors_are_still_json_rpc_responses() {
    let app = test::init_service(App::new().configure(configure(state()))).await;

    let req = test::TestRequest::post()
        .uri("/message?client_id=nobody")
        .set_payload("{not json")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["error"]["code"], -32700);
}

#[actix_rt::test]
async fn message_without_client_id_is_rejected() {
    let app = test::init_service(App::new().configure(configure(state()))).await;

    for uri in ["/message", "/message?client_id="] {
        let req = test::TestRequest::post()
            .uri(uri)
            .set_payload(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "client_id required" }));
    }
}

#[actix_rt::test]
async fn full_mailbox_times_out_with_408() {
    let state = state();
    let app = test::init_service(App::new().configure(configure(state.clone()))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/sse?client_id=slow").to_request()).await;
    let mut events = Box::pin(resp.into_body());
    let _ = next_event(&mut events).await;

    for _ in 0..MAILBOX_CAPACITY {
        let delivered = state.clients.deliver("slow", Bytes::from_static(b"{}"), DELIVERY_TIMEOUT).await;
        assert_eq!(delivered, action_gateway::transport::Delivery::Sent);
    }

    tokio::time::pause();
    let req = test::TestRequest::post()
        .uri("/message?client_id=slow")
        .set_payload(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::REQUEST_TIMEOUT);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "timeout" }));
}

#[actix_rt::test]
async fn generated_client_ids_are_announced() {
    let app = test::init_service(App::new().configure(configure(state()))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/sse").to_request()).await;
    let mut events = Box::pin(resp.into_body());

    let (event, data) = next_event(&mut events).await;
    assert_eq!(event, "connected");
    let announced: Value = serde_json::from_str(&data).unwrap();
    assert!(announced["client_id"].as_str().unwrap().starts_with("client-"));
}

#[actix_rt::test]
async fn health_reports_ok() {
    let app = test::init_service(App::new().configure(configure(state()))).await;

    let body: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(body, json!({ "status": "ok" }));
}

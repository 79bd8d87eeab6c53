//! Integration tests for the delivery side.
//!
//! The broker is the in-process one and the Telegram Bot API is served by a
//! local Axum router, so no external services are needed:
//!
//! ```bash
//! cargo test -p pigeon-notifier --test integration
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use pigeon_bus::memory::MemoryBroker;
use pigeon_bus::{EventPublisher, EventRouter, EventSubscriber};
use pigeon_common::error::{AppError, Result};
use pigeon_common::types::BOT_NOTIFY_CHANNEL;
use pigeon_notifier::gateway::{MessengerGateway, TelegramGateway};
use pigeon_notifier::handler::NotifyHandler;

// ============================================================
// Helpers
// ============================================================

#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<(String, String)>>,
    fail_for: Option<&'static str>,
}

impl RecordingGateway {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessengerGateway for RecordingGateway {
    async fn send(&self, recipient_id: &str, text: &str) -> Result<()> {
        if self.fail_for == Some(recipient_id) {
            return Err(AppError::Delivery("Forbidden: bot was blocked by the user".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient_id.to_string(), text.to_string()));
        Ok(())
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn pipeline(gateway: Arc<RecordingGateway>) -> (EventPublisher, EventSubscriber) {
    let broker = Arc::new(MemoryBroker::new());
    let router =
        EventRouter::new().with_handler(BOT_NOTIFY_CHANNEL, Arc::new(NotifyHandler::new(gateway)));

    let subscriber = EventSubscriber::new(broker.clone(), router);
    subscriber.start().await;

    let publisher = EventPublisher::new(broker);
    publisher.start().await;
    (publisher, subscriber)
}

/// Serve `app` on an ephemeral local port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============================================================
// Publish → subscriber → gateway
// ============================================================

#[tokio::test]
async fn test_publish_results_in_exactly_one_send() {
    let gateway = Arc::new(RecordingGateway::default());
    let (publisher, subscriber) = pipeline(gateway.clone()).await;

    publisher.publish_notify("123456", "У вас новое сообщение").await;

    wait_until(|| gateway.sent().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        gateway.sent(),
        vec![("123456".to_string(), "У вас новое сообщение".to_string())]
    );

    subscriber.stop().await;
    publisher.stop().await;
}

#[tokio::test]
async fn test_non_json_and_invalid_payloads_never_reach_gateway() {
    let gateway = Arc::new(RecordingGateway::default());
    let (publisher, subscriber) = pipeline(gateway.clone()).await;

    publisher.publish(BOT_NOTIFY_CHANNEL, "<<garbage>>").await;
    publisher
        .publish(BOT_NOTIFY_CHANNEL, &json!({"telegramId": "", "text": "x"}))
        .await;
    publisher
        .publish(BOT_NOTIFY_CHANNEL, &json!({"telegramId": "1"}))
        .await;
    publisher.publish_notify("marker", "done").await;

    wait_until(|| !gateway.sent().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(gateway.sent(), vec![("marker".to_string(), "done".to_string())]);
    assert!(subscriber.is_running().await);

    subscriber.stop().await;
}

#[tokio::test]
async fn test_failed_delivery_does_not_affect_next_message() {
    let gateway = Arc::new(RecordingGateway {
        fail_for: Some("blocked"),
        ..Default::default()
    });
    let (publisher, subscriber) = pipeline(gateway.clone()).await;

    publisher.publish_notify("blocked", "first").await;
    publisher.publish_notify("open", "second").await;

    wait_until(|| gateway.sent().len() == 1).await;
    assert_eq!(gateway.sent()[0].0, "open");

    subscriber.stop().await;
}

// ============================================================
// Telegram gateway over HTTP
// ============================================================

type Captured = Arc<Mutex<Vec<Value>>>;

async fn accept(State(captured): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
    captured.lock().unwrap().push(body);
    Json(json!({"ok": true, "result": {"message_id": 1}}))
}

async fn reject() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"})),
    )
}

#[tokio::test]
async fn test_telegram_gateway_posts_send_message() {
    let captured: Captured = Arc::default();
    let app = Router::new()
        .route("/bottest-token/sendMessage", post(accept))
        .with_state(captured.clone());
    let base = serve(app).await;

    let gateway = TelegramGateway::new(base, "test-token");
    gateway.send("98765", "hello").await.unwrap();

    let bodies = captured.lock().unwrap().clone();
    assert_eq!(bodies, vec![json!({"chat_id": "98765", "text": "hello"})]);
}

#[tokio::test]
async fn test_telegram_gateway_reports_api_error() {
    let app = Router::new().route("/bottest-token/sendMessage", post(reject));
    let base = serve(app).await;

    let gateway = TelegramGateway::new(base, "test-token");
    let err = gateway.send("0", "hello").await.unwrap_err();

    match err {
        AppError::Delivery(msg) => assert!(msg.contains("chat not found")),
        other => panic!("expected delivery error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_telegram_gateway_unreachable_host() {
    // Nothing listens on port 9 locally.
    let gateway = TelegramGateway::new("http://127.0.0.1:9", "test-token");
    assert!(matches!(
        gateway.send("1", "x").await,
        Err(AppError::Delivery(_))
    ));
}

//! Integration tests for the Socket.IO push channel.

use std::sync::Mutex;

use serde_json::json;
use till_core::{CategoryId, LowStockAlert, ProductId, StockUpdate};
use till_integration_tests::{
    FakePushServer, FakeSalesServer, RecordingHost, SESSION_COOKIE, wait_until,
};
use till_register::Register;
use till_register::backend::HttpBackend;
use till_register::push::{PushError, PushHandler, PushSubscriber};

#[derive(Default)]
struct Recorder {
    updates: Mutex<Vec<StockUpdate>>,
    alerts: Mutex<Vec<LowStockAlert>>,
}

impl PushHandler for Recorder {
    fn on_stock_updated(&self, update: StockUpdate) {
        self.updates.lock().unwrap().push(update);
    }

    fn on_low_stock_alert(&self, alert: LowStockAlert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

fn frames(frames: &[&str]) -> Vec<String> {
    frames.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn test_events_reach_handler_until_server_closes() {
    let server = FakePushServer::start(frames(&[
        r#"42["stock_updated",{"id":1,"name":"Milk","stock":0}]"#,
        r#"42["new_order",{"id":5}]"#,
        r#"42["low_stock_alert",{"product_name":"Milk","stock":2}]"#,
        "1",
    ]))
    .await;
    let subscriber = PushSubscriber::new(&server.config()).unwrap();
    let recorder = Recorder::default();

    subscriber.run(&recorder).await.unwrap();

    assert_eq!(
        recorder.updates.lock().unwrap().as_slice(),
        &[StockUpdate {
            id: ProductId::new(1),
            stock: 0,
            name: Some("Milk".to_string()),
        }]
    );
    assert_eq!(
        recorder.alerts.lock().unwrap().as_slice(),
        &[LowStockAlert {
            product_name: "Milk".to_string(),
            stock: 2,
        }]
    );
}

#[tokio::test]
async fn test_handshake_path_cookie_and_namespace_connect() {
    let server = FakePushServer::start(frames(&["1"])).await;
    let subscriber = PushSubscriber::new(&server.config()).unwrap();

    subscriber.run(&Recorder::default()).await.unwrap();

    let upgrades = server.upgrades();
    assert_eq!(upgrades.len(), 1);
    assert_eq!(upgrades[0].0, "/socket.io/?EIO=4&transport=websocket");
    assert_eq!(upgrades[0].1.as_deref(), Some(SESSION_COOKIE));
    assert_eq!(server.received().first().map(String::as_str), Some("40"));
}

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let server = FakePushServer::start(frames(&["2", "1"])).await;
    let subscriber = PushSubscriber::new(&server.config()).unwrap();

    subscriber.run(&Recorder::default()).await.unwrap();

    wait_until(|| server.received().iter().any(|f| f == "3")).await;
}

#[tokio::test]
async fn test_rejected_namespace_is_an_error() {
    let server = FakePushServer::start(frames(&[r#"44{"message":"Not authorized"}"#])).await;
    let subscriber = PushSubscriber::new(&server.config()).unwrap();

    let err = subscriber.run(&Recorder::default()).await.unwrap_err();

    assert!(matches!(err, PushError::ConnectRejected(reason) if reason == "Not authorized"));
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let server = FakePushServer::start(frames(&[
        "9garbage",
        r#"42["stock_updated",{"id":"one"}]"#,
        r#"42["stock_updated",{"id":2,"stock":4}]"#,
        "1",
    ]))
    .await;
    let subscriber = PushSubscriber::new(&server.config()).unwrap();
    let recorder = Recorder::default();

    subscriber.run(&recorder).await.unwrap();

    let updates = recorder.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].id, ProductId::new(2));
}

#[tokio::test]
async fn test_push_updates_patch_the_register() {
    let sales = FakeSalesServer::start().await;
    sales.stock(
        1,
        json!([
            {"id": 1, "name": "Milk", "price": 60.0, "stock": 5},
            {"id": 2, "name": "Bread", "price": 55.0, "stock": 8}
        ]),
    );
    let register = Register::new(
        HttpBackend::new(&sales.config()).unwrap(),
        RecordingHost::default(),
    );
    register.filter_category(CategoryId::new(1)).await.unwrap();

    let push = FakePushServer::start(frames(&[
        r#"42["stock_updated",{"id":1,"name":"Milk","stock":0}]"#,
        r#"42["stock_updated",{"id":99,"name":"Soap","stock":3}]"#,
        r#"42["low_stock_alert",{"product_name":"Milk","stock":0}]"#,
        "1",
    ]))
    .await;
    PushSubscriber::new(&push.config())
        .unwrap()
        .run(&register)
        .await
        .unwrap();

    let screen = register.screen();
    let milk = screen.product(ProductId::new(1)).unwrap();
    assert_eq!(milk.label, "Milk - Ksh 60 (0 left)");
    assert!(!milk.add_enabled);
    assert_eq!(screen.product(ProductId::new(2)).unwrap().stock, 8);
    assert!(screen.product(ProductId::new(99)).is_none());
    assert!(register.cart().is_empty());
    assert_eq!(
        register.host().alerts(),
        vec!["Low stock alert for Milk: Only 0 left!"]
    );
}

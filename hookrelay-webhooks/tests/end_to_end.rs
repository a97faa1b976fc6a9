//! Full round trip: lifecycle hook -> signed delivery -> HTTP receiver ->
//! subscription filter -> record sink.

use hookrelay_webhooks::{
    Attributes, ChannelSink, DeliveryClient, EmitterConfig, EntitySnapshot, EventSource, EventType,
    LifecycleHooks, NormalizedRecord, ReceiverConfig, RetryPolicy, Subscription, WebhookError,
    serve_listener,
};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

const API_KEY: &str = "e2e-api-key";
const SECRET: &str = "e2e-secret";

struct Harness {
    addr: SocketAddr,
    records: mpsc::Receiver<NormalizedRecord>,
    shutdown: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<hookrelay_webhooks::Result<()>>,
}

async fn start_receiver(secret: &str) -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (sink, records) = ChannelSink::channel(16);
    let (shutdown, signal) = oneshot::channel::<()>();

    let config = ReceiverConfig::builder()
        .api_key(API_KEY)
        .secret(secret)
        .subscription(
            Subscription::new("Order", [EventType::Updated, EventType::Deleted])
                .unwrap()
                .named("orders"),
        )
        .subscription(
            Subscription::new("Invoice", [EventType::Created])
                .unwrap()
                .named("invoices"),
        )
        .build();

    let server = tokio::spawn(serve_listener(listener, config, sink, async {
        let _ = signal.await;
    }));

    Harness {
        addr,
        records,
        shutdown,
        server,
    }
}

fn emitter(addr: SocketAddr, secret: &str) -> EmitterConfig {
    EmitterConfig::builder(format!("http://{addr}"), API_KEY)
        .secret(secret)
        .retry_policy(RetryPolicy::fixed(2, Duration::from_millis(10)))
        .build()
}

async fn stop(harness: Harness) -> mpsc::Receiver<NormalizedRecord> {
    harness.shutdown.send(()).unwrap();
    harness.server.await.unwrap().unwrap();
    harness.records
}

#[tokio::test]
async fn test_update_flows_from_hook_to_sink() {
    let mut harness = start_receiver(SECRET).await;
    let source = EventSource::new(DeliveryClient::new(emitter(harness.addr, SECRET)).unwrap())
        .unwrap();

    let order = EntitySnapshot::new(
        "Order",
        [("id".to_string(), json!(7)), ("status".to_string(), json!("shipped"))].into(),
    )
    .with_original(
        [("id".to_string(), json!(7)), ("status".to_string(), json!("pending"))].into(),
    );

    let receipt = source.emit(&order, EventType::Updated).await.unwrap();
    assert_eq!(receipt.status, 200);
    assert_eq!(receipt.attempts, 1);

    let record = harness.records.recv().await.unwrap();
    assert_eq!(record.subscription, "orders");
    assert_eq!(record.event.event_id(), receipt.event_id);
    assert_eq!(record.event.entity_class(), "Order");
    assert_eq!(record.event.attributes()["status"], "shipped");
    assert_eq!(
        record.event.previous_attributes(),
        Some(&Attributes::from([("status".to_string(), json!("pending"))]))
    );
    assert_eq!(record.headers["x-api-key"], "<redacted>");

    stop(harness).await;
}

#[tokio::test]
async fn test_hooks_dispatch_in_background() {
    let mut harness = start_receiver(SECRET).await;
    let config = EmitterConfig {
        events: [EventType::Deleted].into(),
        ..emitter(harness.addr, SECRET)
    };
    let source = EventSource::new(DeliveryClient::new(config).unwrap()).unwrap();

    let mut hooks = LifecycleHooks::new();
    source.attach(&mut hooks, "Order");
    assert_eq!(hooks.count(), 1);

    let order = EntitySnapshot::new("Order", [("id".to_string(), json!(9))].into());
    assert_eq!(hooks.fire(&order, EventType::Created), 0);
    assert_eq!(hooks.fire(&order, EventType::Deleted), 1);

    let record = tokio::time::timeout(Duration::from_secs(5), harness.records.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.event.event_type(), EventType::Deleted);

    stop(harness).await;
}

#[tokio::test]
async fn test_uninteresting_event_acknowledged_but_dropped() {
    let harness = start_receiver(SECRET).await;
    let client = DeliveryClient::new(emitter(harness.addr, SECRET)).unwrap();

    let invoice = hookrelay_webhooks::capture(
        &EntitySnapshot::new("Invoice", Default::default()),
        EventType::Deleted,
    )
    .unwrap();
    let receipt = client.deliver_configured(&invoice).await.unwrap();
    assert_eq!(receipt.status, 200);

    let mut records = stop(harness).await;
    assert!(records.try_recv().is_err());
}

#[tokio::test]
async fn test_wrong_secret_is_rejected_without_retry() {
    let harness = start_receiver(SECRET).await;
    let client = DeliveryClient::new(emitter(harness.addr, "not-the-secret")).unwrap();

    let order = hookrelay_webhooks::capture(
        &EntitySnapshot::new("Order", Default::default()),
        EventType::Deleted,
    )
    .unwrap();
    let err = client.deliver_configured(&order).await.unwrap_err();

    assert!(matches!(
        err,
        WebhookError::RejectedDelivery {
            status: 401,
            attempts: 1,
            ..
        }
    ));

    let mut records = stop(harness).await;
    assert!(records.try_recv().is_err());
}

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use jobrail_codec::Codec;

use crate::error::GatewayError;
use crate::record::{Delivery, Record};
use crate::traits::{LogConsumer, LogProducer, Ticket};

/// How long `close` waits for the producer to drain before declaring
/// the remainder lost.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Invoked exactly once per sent record, with where it landed or why it
/// did not.
pub type DeliveryCallback = Box<dyn FnOnce(Result<Delivery, GatewayError>) + Send>;

type ListenerFn = Arc<dyn Fn(Record) -> BoxFuture<'static, Result<(), GatewayError>> + Send + Sync>;

/// A plain data record pairing a topic set with a codec-bound notify
/// function. Built once, handed to [`Gateway::set_consumers`].
pub struct Subscription {
    topics: Vec<String>,
    listener: ListenerFn,
}

impl Subscription {
    /// Bind `notify` to codec `C` over an explicit topic list.
    pub fn new<C, F, Fut>(topics: Vec<String>, notify: F) -> Self
    where
        C: Codec,
        F: Fn(C::Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), GatewayError>> + Send + 'static,
    {
        let notify = Arc::new(notify);
        let listener: ListenerFn = Arc::new(move |record: Record| {
            let notify = notify.clone();
            async move {
                let message = C::deserialize(&record.value)?;
                (*notify)(message).await
            }
            .boxed()
        });
        Self { topics, listener }
    }

    /// Bind `notify` to codec `C` on the codec's own topic.
    pub fn on_topic<C, F, Fut>(notify: F) -> Self
    where
        C: Codec,
        F: Fn(C::Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), GatewayError>> + Send + 'static,
    {
        Self::new::<C, F, Fut>(vec![C::TOPIC.to_string()], notify)
    }
}

/// Thin facade over the message log: send, subscribe, poll, emit, close.
///
/// Owns zero-or-one producer and zero-or-one consumer. All routing state
/// is rebuilt wholesale on every `set_consumers` call; a topic may fan
/// out to multiple listeners, invoked synchronously in registration
/// order.
pub struct Gateway {
    producer: Option<Arc<dyn LogProducer>>,
    consumer: Option<Arc<dyn LogConsumer>>,
    routing: Mutex<HashMap<String, Vec<ListenerFn>>>,
    pending: Mutex<HashMap<Ticket, DeliveryCallback>>,
    dead_letters: AtomicU64,
    closed: AtomicBool,
}

impl Gateway {
    pub fn new(
        producer: Option<Arc<dyn LogProducer>>,
        consumer: Option<Arc<dyn LogConsumer>>,
    ) -> Self {
        Self {
            producer,
            consumer,
            routing: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            dead_letters: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Records dropped because their bytes would not decode.
    pub fn dead_letter_count(&self) -> u64 {
        self.dead_letters.load(Ordering::SeqCst)
    }

    /// Serialize `message` with codec `C` and enqueue it on `C::TOPIC`.
    /// Fails fast when no producer is configured.
    pub async fn send<C: Codec>(
        &self,
        message: &C::Message,
        key: Option<&[u8]>,
        on_delivery: Option<DeliveryCallback>,
    ) -> Result<(), GatewayError> {
        let producer = self.producer.as_ref().ok_or(GatewayError::NoProducer)?;
        let value = C::serialize(message)?;
        let ticket = producer.enqueue(C::TOPIC, key, value).await?;
        if let Some(callback) = on_delivery {
            self.pending.lock().unwrap().insert(ticket, callback);
        }
        debug!(topic = C::TOPIC, "enqueued message");
        Ok(())
    }

    /// Replace the subscription set. Subscribes the union of all topics
    /// and rebuilds the topic → listeners routing table.
    pub async fn set_consumers(
        &self,
        subscriptions: Vec<Subscription>,
    ) -> Result<(), GatewayError> {
        let consumer = self.consumer.as_ref().ok_or(GatewayError::NoConsumer)?;
        let mut table: HashMap<String, Vec<ListenerFn>> = HashMap::new();
        for subscription in subscriptions {
            for topic in &subscription.topics {
                table
                    .entry(topic.clone())
                    .or_default()
                    .push(subscription.listener.clone());
            }
        }
        let topics: Vec<String> = table.keys().cloned().collect();
        consumer.subscribe(&topics).await?;
        *self.routing.lock().unwrap() = table;
        Ok(())
    }

    /// Wait up to `timeout` for one record and dispatch it.
    ///
    /// Undecodable records are counted as dead letters and dropped;
    /// listener errors propagate untouched; broker errors raise.
    pub async fn poll(&self, timeout: Duration) -> Result<(), GatewayError> {
        if self.is_closed() {
            return Err(GatewayError::Closed);
        }
        let consumer = self.consumer.as_ref().ok_or(GatewayError::NoConsumer)?;
        let Some(record) = consumer.poll(timeout).await? else {
            return Ok(());
        };
        let listeners: Vec<ListenerFn> = self
            .routing
            .lock()
            .unwrap()
            .get(&record.topic)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            match listener(record.clone()).await {
                Ok(()) => {}
                Err(GatewayError::Codec(err)) => {
                    self.dead_letters.fetch_add(1, Ordering::SeqCst);
                    warn!(topic = %record.topic, error = %err, "undecodable record dropped");
                }
                Err(other) => return Err(other),
            }
        }
        Ok(())
    }

    /// Service producer callbacks: drain delivery reports without
    /// blocking and fire the matching `on_delivery` hooks.
    pub async fn emit(&self) {
        let Some(producer) = self.producer.as_ref() else {
            return;
        };
        for (ticket, outcome) in producer.drain_reports().await {
            let callback = self.pending.lock().unwrap().remove(&ticket);
            if let Some(callback) = callback {
                callback(outcome);
            }
        }
    }

    /// Flush the producer (bounded wait), close the consumer, and mark
    /// the gateway closed. Idempotent; `poll` must not be called after.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(producer) = self.producer.as_ref() {
            let remaining = producer.flush(CLOSE_FLUSH_TIMEOUT).await;
            if remaining != 0 {
                warn!(
                    remaining,
                    "producer flush timed out; undelivered records were lost"
                );
            }
        }
        self.emit().await;
        if let Some(consumer) = self.consumer.as_ref() {
            consumer.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use jobrail_codec::{ListingExtractCmd, ListingExtractCodec, ListingPage, ListingPageCodec};

    use crate::memory::MemoryLog;

    fn gateway_over(log: &MemoryLog) -> Gateway {
        Gateway::new(Some(log.producer()), Some(log.consumer()))
    }

    #[tokio::test]
    async fn send_without_producer_fails_fast() {
        let log = MemoryLog::new();
        let gateway = Gateway::new(None, Some(log.consumer()));
        let cmd = ListingExtractCmd::new(1, 1, 1);
        let err = gateway
            .send::<ListingExtractCodec>(&cmd, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoProducer));
    }

    #[tokio::test]
    async fn poll_routes_to_listener() {
        let log = MemoryLog::new();
        let gateway = gateway_over(&log);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        gateway
            .set_consumers(vec![Subscription::on_topic::<ListingExtractCodec, _, _>(
                move |cmd: ListingExtractCmd| {
                    let sink = sink.clone();
                    async move {
                        sink.lock().unwrap().push(cmd);
                        Ok(())
                    }
                },
            )])
            .await
            .unwrap();

        let cmd = ListingExtractCmd::new(2, 4, 10);
        gateway
            .send::<ListingExtractCodec>(&cmd, None, None)
            .await
            .unwrap();
        gateway.poll(Duration::from_millis(200)).await.unwrap();

        assert_eq!(seen.lock().unwrap().as_slice(), &[cmd]);
    }

    #[tokio::test]
    async fn topic_fans_out_to_every_listener_in_order() {
        let log = MemoryLog::new();
        let gateway = gateway_over(&log);
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = order.clone();
        let second = order.clone();
        gateway
            .set_consumers(vec![
                Subscription::on_topic::<ListingPageCodec, _, _>(move |_: ListingPage| {
                    let first = first.clone();
                    async move {
                        first.lock().unwrap().push("first");
                        Ok(())
                    }
                }),
                Subscription::on_topic::<ListingPageCodec, _, _>(move |_: ListingPage| {
                    let second = second.clone();
                    async move {
                        second.lock().unwrap().push("second");
                        Ok(())
                    }
                }),
            ])
            .await
            .unwrap();

        gateway
            .send::<ListingPageCodec>(&ListingPage::new("<main/>"), None, None)
            .await
            .unwrap();
        gateway.poll(Duration::from_millis(200)).await.unwrap();

        assert_eq!(order.lock().unwrap().as_slice(), &["first", "second"]);
    }

    #[tokio::test]
    async fn undecodable_record_is_a_dead_letter() {
        let log = MemoryLog::new();
        let gateway = gateway_over(&log);
        gateway
            .set_consumers(vec![Subscription::on_topic::<ListingExtractCodec, _, _>(
                |_: ListingExtractCmd| async { Ok(()) },
            )])
            .await
            .unwrap();

        log.producer()
            .enqueue("extract.handshake.job.stage1.v1", None, b"{broken".to_vec())
            .await
            .unwrap();
        gateway.poll(Duration::from_millis(200)).await.unwrap();

        assert_eq!(gateway.dead_letter_count(), 1);
    }

    #[tokio::test]
    async fn listener_errors_propagate() {
        let log = MemoryLog::new();
        let gateway = gateway_over(&log);
        gateway
            .set_consumers(vec![Subscription::on_topic::<ListingExtractCodec, _, _>(
                |_: ListingExtractCmd| async { Err(GatewayError::listener("stage exploded")) },
            )])
            .await
            .unwrap();

        gateway
            .send::<ListingExtractCodec>(&ListingExtractCmd::new(1, 1, 1), None, None)
            .await
            .unwrap();
        let err = gateway.poll(Duration::from_millis(200)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Listener(_)));
    }

    #[tokio::test]
    async fn poll_timeout_is_a_no_op() {
        let log = MemoryLog::new();
        let gateway = gateway_over(&log);
        gateway.set_consumers(vec![]).await.unwrap();
        gateway.poll(Duration::from_millis(20)).await.unwrap();
    }

    #[tokio::test]
    async fn delivery_callback_fires_on_emit() {
        let log = MemoryLog::new();
        let gateway = gateway_over(&log);
        let delivered = Arc::new(Mutex::new(None));

        let slot = delivered.clone();
        gateway
            .send::<ListingExtractCodec>(
                &ListingExtractCmd::new(1, 1, 1),
                Some(b"key"),
                Some(Box::new(move |outcome| {
                    *slot.lock().unwrap() = Some(outcome);
                })),
            )
            .await
            .unwrap();
        gateway.emit().await;

        let outcome = delivered.lock().unwrap().take().expect("callback fired");
        let delivery = outcome.expect("delivered");
        assert_eq!(delivery.topic, "extract.handshake.job.stage1.v1");
        assert_eq!(delivery.offset, 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_poll_after_close_errors() {
        let log = MemoryLog::new();
        let gateway = gateway_over(&log);
        gateway.close().await;
        gateway.close().await;
        assert!(gateway.is_closed());
        let err = gateway.poll(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Closed));
    }

    #[tokio::test]
    async fn set_consumers_replaces_previous_routing() {
        let log = MemoryLog::new();
        let gateway = gateway_over(&log);
        let stale_hits = Arc::new(AtomicUsize::new(0));

        let stale = stale_hits.clone();
        gateway
            .set_consumers(vec![Subscription::on_topic::<ListingExtractCodec, _, _>(
                move |_: ListingExtractCmd| {
                    let stale = stale.clone();
                    async move {
                        stale.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )])
            .await
            .unwrap();
        gateway
            .set_consumers(vec![Subscription::on_topic::<ListingPageCodec, _, _>(
                |_: ListingPage| async { Ok(()) },
            )])
            .await
            .unwrap();

        gateway
            .send::<ListingExtractCodec>(&ListingExtractCmd::new(1, 1, 1), None, None)
            .await
            .unwrap();
        gateway.poll(Duration::from_millis(50)).await.unwrap();

        assert_eq!(stale_hits.load(Ordering::SeqCst), 0);
    }
}

//! Kafka-backed log client (`kafka` feature).
//!
//! Producer deliveries are reported through a [`ProducerContext`] that
//! carries the gateway ticket as the per-record opaque; `drain_reports`
//! services the librdkafka callback queue and hands the collected
//! outcomes back to the gateway.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext};
use rdkafka::ClientContext;
use tracing::debug;

use jobrail_core::BrokerConfig;

use crate::error::GatewayError;
use crate::record::{Delivery, Record};
use crate::traits::{LogConsumer, LogProducer, Ticket};

type ReportQueue = Arc<Mutex<VecDeque<(Ticket, Result<Delivery, GatewayError>)>>>;

struct ReportContext {
    reports: ReportQueue,
}

impl ClientContext for ReportContext {}

impl ProducerContext for ReportContext {
    type DeliveryOpaque = Box<Ticket>;

    fn delivery(&self, result: &DeliveryResult<'_>, ticket: Self::DeliveryOpaque) {
        let outcome = match result {
            Ok(message) => Ok(Delivery {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
            }),
            Err((err, _)) => Err(GatewayError::Broker(err.to_string())),
        };
        self.reports.lock().unwrap().push_back((*ticket, outcome));
    }
}

/// Kafka producer behind [`LogProducer`].
pub struct KafkaLogProducer {
    producer: BaseProducer<ReportContext>,
    reports: ReportQueue,
    next_ticket: AtomicU64,
}

impl KafkaLogProducer {
    pub fn from_config(config: &BrokerConfig) -> Result<Self, GatewayError> {
        let reports: ReportQueue = Arc::new(Mutex::new(VecDeque::new()));
        let mut client = ClientConfig::new();
        client.set("bootstrap.servers", &config.bootstrap_servers);
        if let Some(client_id) = &config.client_id {
            client.set("client.id", client_id);
        }
        let producer = client
            .create_with_context(ReportContext {
                reports: reports.clone(),
            })
            .map_err(|e| GatewayError::Broker(e.to_string()))?;
        Ok(Self {
            producer,
            reports,
            next_ticket: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl LogProducer for KafkaLogProducer {
    async fn enqueue(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<Ticket, GatewayError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let mut record: BaseRecord<'_, [u8], [u8], Box<Ticket>> =
            BaseRecord::with_opaque_to(topic, Box::new(ticket)).payload(value.as_slice());
        if let Some(key) = key {
            record = record.key(key);
        }
        self.producer
            .send(record)
            .map_err(|(err, _)| GatewayError::Broker(err.to_string()))?;
        debug!(topic, ticket, "record handed to librdkafka");
        Ok(ticket)
    }

    async fn drain_reports(&self) -> Vec<(Ticket, Result<Delivery, GatewayError>)> {
        self.producer.poll(Duration::ZERO);
        self.reports.lock().unwrap().drain(..).collect()
    }

    async fn flush(&self, timeout: Duration) -> usize {
        let _ = self.producer.flush(timeout);
        self.producer.in_flight_count() as usize
    }
}

/// Kafka consumer behind [`LogConsumer`].
pub struct KafkaLogConsumer {
    consumer: StreamConsumer,
}

impl KafkaLogConsumer {
    pub fn from_config(config: &BrokerConfig) -> Result<Self, GatewayError> {
        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("enable.auto.commit", "true");
        if let Some(client_id) = &config.client_id {
            client.set("client.id", client_id);
        }
        let consumer = client
            .create()
            .map_err(|e| GatewayError::Broker(e.to_string()))?;
        Ok(Self { consumer })
    }
}

#[async_trait]
impl LogConsumer for KafkaLogConsumer {
    async fn subscribe(&self, topics: &[String]) -> Result<(), GatewayError> {
        let refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer
            .subscribe(&refs)
            .map_err(|e| GatewayError::Broker(e.to_string()))
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<Record>, GatewayError> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Err(err)) => Err(GatewayError::Broker(err.to_string())),
            Ok(Ok(message)) => Ok(Some(Record {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(|k| k.to_vec()),
                value: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
            })),
        }
    }

    async fn close(&self) {
        self.consumer.unsubscribe();
    }
}

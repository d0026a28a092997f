//! In-process message log used by tests and single-process development.
//!
//! Faithful to the external log's contract: partitioned topics,
//! broker-assigned offsets, key-hash partition assignment, blocking
//! poll with timeout, and at-least-once reads (each consumer tracks its
//! own positions; a fresh consumer starts from the earliest offset).

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::error::GatewayError;
use crate::record::{Delivery, Record};
use crate::traits::{LogConsumer, LogProducer, Ticket};

const PARTITIONS: usize = 3;

struct StoredRecord {
    key: Option<Vec<u8>>,
    value: Vec<u8>,
}

struct Shared {
    topics: Mutex<HashMap<String, Vec<Vec<StoredRecord>>>>,
    wakeup: Notify,
    round_robin: AtomicUsize,
}

/// Handle to one in-process log. Producers and consumers created from
/// the same `MemoryLog` see the same topics.
#[derive(Clone)]
pub struct MemoryLog {
    shared: Arc<Shared>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                topics: Mutex::new(HashMap::new()),
                wakeup: Notify::new(),
                round_robin: AtomicUsize::new(0),
            }),
        }
    }

    pub fn producer(&self) -> Arc<MemoryProducer> {
        Arc::new(MemoryProducer {
            shared: self.shared.clone(),
            next_ticket: AtomicU64::new(0),
            reports: Mutex::new(VecDeque::new()),
        })
    }

    pub fn consumer(&self) -> Arc<MemoryConsumer> {
        Arc::new(MemoryConsumer {
            shared: self.shared.clone(),
            subscriptions: Mutex::new(Vec::new()),
            positions: Mutex::new(HashMap::new()),
        })
    }

    /// Records currently stored on `topic`, across all partitions.
    pub fn record_count(&self, topic: &str) -> usize {
        self.shared
            .topics
            .lock()
            .unwrap()
            .get(topic)
            .map(|partitions| partitions.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryProducer {
    shared: Arc<Shared>,
    next_ticket: AtomicU64,
    reports: Mutex<VecDeque<(Ticket, Result<Delivery, GatewayError>)>>,
}

#[async_trait]
impl LogProducer for MemoryProducer {
    async fn enqueue(
        &self,
        topic: &str,
        key: Option<&[u8]>,
        value: Vec<u8>,
    ) -> Result<Ticket, GatewayError> {
        let partition = match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() as usize) % PARTITIONS
            }
            None => self.shared.round_robin.fetch_add(1, Ordering::Relaxed) % PARTITIONS,
        };

        let offset = {
            let mut topics = self.shared.topics.lock().unwrap();
            let partitions = topics
                .entry(topic.to_string())
                .or_insert_with(|| (0..PARTITIONS).map(|_| Vec::new()).collect());
            partitions[partition].push(StoredRecord {
                key: key.map(|k| k.to_vec()),
                value,
            });
            partitions[partition].len() as i64 - 1
        };

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.reports.lock().unwrap().push_back((
            ticket,
            Ok(Delivery {
                topic: topic.to_string(),
                partition: partition as i32,
                offset,
            }),
        ));
        self.shared.wakeup.notify_waiters();
        Ok(ticket)
    }

    async fn drain_reports(&self) -> Vec<(Ticket, Result<Delivery, GatewayError>)> {
        self.reports.lock().unwrap().drain(..).collect()
    }

    async fn flush(&self, _timeout: Duration) -> usize {
        // Appends land synchronously; nothing is ever in flight.
        0
    }
}

pub struct MemoryConsumer {
    shared: Arc<Shared>,
    subscriptions: Mutex<Vec<String>>,
    positions: Mutex<HashMap<(String, usize), usize>>,
}

impl MemoryConsumer {
    fn try_next(&self) -> Option<Record> {
        let subscriptions = self.subscriptions.lock().unwrap().clone();
        let topics = self.shared.topics.lock().unwrap();
        let mut positions = self.positions.lock().unwrap();
        for topic in &subscriptions {
            let Some(partitions) = topics.get(topic) else {
                continue;
            };
            for (partition, records) in partitions.iter().enumerate() {
                let position = positions.entry((topic.clone(), partition)).or_insert(0);
                if *position < records.len() {
                    let stored = &records[*position];
                    let record = Record {
                        topic: topic.clone(),
                        partition: partition as i32,
                        offset: *position as i64,
                        key: stored.key.clone(),
                        value: stored.value.clone(),
                    };
                    *position += 1;
                    return Some(record);
                }
            }
        }
        None
    }
}

#[async_trait]
impl LogConsumer for MemoryConsumer {
    async fn subscribe(&self, topics: &[String]) -> Result<(), GatewayError> {
        *self.subscriptions.lock().unwrap() = topics.to_vec();
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<Record>, GatewayError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Arm the notification before the check so an append between
            // check and await cannot be missed.
            let notified = self.shared.wakeup.notified();
            if let Some(record) = self.try_next() {
                return Ok(Some(record));
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }

    async fn close(&self) {
        self.subscriptions.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offsets_increase_per_partition() {
        let log = MemoryLog::new();
        let producer = log.producer();
        // Same key lands on the same partition with increasing offsets.
        for _ in 0..3 {
            producer
                .enqueue("t", Some(b"key"), b"v".to_vec())
                .await
                .unwrap();
        }
        let reports = producer.drain_reports().await;
        let offsets: Vec<i64> = reports
            .iter()
            .map(|(_, r)| r.as_ref().unwrap().offset)
            .collect();
        assert_eq!(offsets, vec![0, 1, 2]);
        let partitions: Vec<i32> = reports
            .iter()
            .map(|(_, r)| r.as_ref().unwrap().partition)
            .collect();
        assert!(partitions.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn consumer_reads_in_partition_order() {
        let log = MemoryLog::new();
        let producer = log.producer();
        let consumer = log.consumer();
        consumer.subscribe(&["t".to_string()]).await.unwrap();

        for i in 0..5u8 {
            producer
                .enqueue("t", Some(b"k"), vec![i])
                .await
                .unwrap();
        }
        let mut seen = Vec::new();
        while let Some(record) = consumer.poll(Duration::from_millis(20)).await.unwrap() {
            seen.push(record.value[0]);
        }
        // One partition (single key), so arrival order is preserved.
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn poll_times_out_when_empty() {
        let log = MemoryLog::new();
        let consumer = log.consumer();
        consumer.subscribe(&["t".to_string()]).await.unwrap();
        let started = std::time::Instant::now();
        let polled = consumer.poll(Duration::from_millis(30)).await.unwrap();
        assert!(polled.is_none());
        assert!(started.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn poll_wakes_on_append() {
        let log = MemoryLog::new();
        let producer = log.producer();
        let consumer = log.consumer();
        consumer.subscribe(&["t".to_string()]).await.unwrap();

        let poller = tokio::spawn(async move { consumer.poll(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        producer.enqueue("t", None, b"x".to_vec()).await.unwrap();

        let record = poller.await.unwrap().unwrap().expect("woken by append");
        assert_eq!(record.value, b"x");
    }

    #[tokio::test]
    async fn unsubscribed_topics_are_invisible() {
        let log = MemoryLog::new();
        let producer = log.producer();
        let consumer = log.consumer();
        consumer.subscribe(&["a".to_string()]).await.unwrap();
        producer.enqueue("b", None, b"x".to_vec()).await.unwrap();
        assert!(consumer
            .poll(Duration::from_millis(20))
            .await
            .unwrap()
            .is_none());
    }
}

//! Partitioned pub/sub, standing in for the upstream Kafka-compatible broker (§4.1).
//!
//! Each partition is a bounded `mpsc` channel; a key always hashes to the same partition
//! (see [`crate::partition::partition_for`]), and the single `tokio::task` draining a
//! partition's receiver is the only writer that will ever see that key: this is what gives
//! handlers their per-key FIFO / at-most-one-in-flight guarantee (§5).

use tokio::sync::mpsc;

use crate::error::BrokerError;
use crate::partition::partition_for;

/// A message delivered to a topic partition: the routing key plus its value.
pub type Envelope<T> = (String, T);

pub struct PartitionedTopic<T> {
    senders: Vec<mpsc::Sender<Envelope<T>>>,
}

impl<T: Send + 'static> PartitionedTopic<T> {
    /// `buffer` bounds in-flight messages per partition (mirrors `STREAM_BUFFER_MAXSIZE`);
    /// `send` awaits capacity rather than dropping, giving the backpressure §5 describes.
    pub fn new(partitions: u32, buffer: usize) -> (Self, Vec<mpsc::Receiver<Envelope<T>>>) {
        let mut senders = Vec::with_capacity(partitions as usize);
        let mut receivers = Vec::with_capacity(partitions as usize);
        for _ in 0..partitions {
            let (tx, rx) = mpsc::channel(buffer);
            senders.push(tx);
            receivers.push(rx);
        }
        (Self { senders }, receivers)
    }

    pub fn partitions(&self) -> u32 {
        self.senders.len() as u32
    }

    pub async fn send(&self, key: impl Into<String>, value: T) -> Result<(), BrokerError> {
        let key = key.into();
        let partition = partition_for(&key, self.partitions());
        self.senders[partition as usize]
            .send((key, value))
            .await
            .map_err(|_| BrokerError::Closed(partition))
    }
}

impl<T> Clone for PartitionedTopic<T> {
    fn clone(&self) -> Self {
        Self {
            senders: self.senders.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_routes_same_key_to_same_partition_receiver() {
        let (topic, mut receivers) = PartitionedTopic::new(4, 8);
        topic.send("203.0.113.9", 1u32).await.unwrap();
        topic.send("203.0.113.9", 2u32).await.unwrap();

        let target = partition_for("203.0.113.9", 4) as usize;
        let (k1, v1) = receivers[target].recv().await.unwrap();
        let (k2, v2) = receivers[target].recv().await.unwrap();
        assert_eq!((k1.as_str(), v1), ("203.0.113.9", 1));
        assert_eq!((k2.as_str(), v2), ("203.0.113.9", 2));
    }
}

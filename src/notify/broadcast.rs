use std::pin::Pin;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::trip::TripStatus;
use crate::notify::{Channel, Publisher, TripUpdate};

#[derive(Debug, Clone, Serialize)]
pub struct BusMessage {
    pub channel: Channel,
    pub payload: serde_json::Value,
}

pub type UpdateStream = Pin<Box<dyn Stream<Item = TripUpdate> + Send>>;

/// In-process pub/sub over a tokio broadcast channel. Subscribers that lag
/// behind lose messages rather than block publishers.
pub struct BroadcastBus {
    tx: broadcast::Sender<BusMessage>,
}

impl BroadcastBus {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Trip-updates feed for a single trip.
    pub fn subscribe_trip_updates(&self, trip_id: Uuid) -> UpdateStream {
        self.filtered(Channel::TripUpdates, move |update| update.trip_id == trip_id)
    }

    /// Assignment feed for a single courier. Pre-assignment cancellations carry
    /// no courier id and are delivered to every courier feed.
    pub fn subscribe_assignments(&self, courier_id: Uuid) -> UpdateStream {
        self.filtered(Channel::Assignment, move |update| {
            update.courier_id == Some(courier_id)
                || (update.status == TripStatus::Cancelled && update.courier_id.is_none())
        })
    }

    fn filtered<F>(&self, channel: Channel, keep: F) -> UpdateStream
    where
        F: Fn(&TripUpdate) -> bool + Send + 'static,
    {
        let stream = BroadcastStream::new(self.tx.subscribe()).filter_map(move |result| {
            let message = result.ok()?;
            if message.channel != channel {
                return None;
            }
            let update: TripUpdate = serde_json::from_value(message.payload).ok()?;
            keep(&update).then_some(update)
        });

        Box::pin(stream)
    }
}

#[async_trait]
impl Publisher for BroadcastBus {
    async fn publish(
        &self,
        channel: Channel,
        payload: serde_json::Value,
    ) -> Result<(), DispatchError> {
        // No receivers is not an error: subscribers connect independently.
        if self.tx.send(BusMessage { channel, payload }).is_err() {
            debug!(channel = channel.as_str(), "published with no subscribers");
        }
        Ok(())
    }
}

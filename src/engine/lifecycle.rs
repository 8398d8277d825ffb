use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::geocode::GeoPoint;
use crate::models::trip::{Trip, TripStatus};
use crate::notify::{channels_for, Channel, Publisher, TripUpdate};
use crate::observability::metrics::Metrics;
use crate::store::GeoStore;

/// Pause after every reported transition. Dampens re-subscription races in
/// downstream consumers.
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Owns trip status writes and the fan-out that follows them.
pub struct TripStateMachine {
    store: Arc<dyn GeoStore>,
    publisher: Arc<dyn Publisher>,
    settle_delay: Duration,
    metrics: Metrics,
}

impl TripStateMachine {
    pub fn new(
        store: Arc<dyn GeoStore>,
        publisher: Arc<dyn Publisher>,
        settle_delay: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            publisher,
            settle_delay,
            metrics,
        }
    }

    /// Persists `status` and publishes it. The write is authoritative: a
    /// failed write is returned, a failed publish is only logged. Returns
    /// after the settle delay.
    pub async fn report_status(
        &self,
        trip_id: Uuid,
        status: TripStatus,
    ) -> Result<Trip, DispatchError> {
        let trip = self.store.set_trip_status(trip_id, status).await?;
        self.metrics
            .status_transitions_total
            .with_label_values(&[status.as_str()])
            .inc();

        if status == TripStatus::Cancelled && trip.courier_id.is_some() {
            info!(
                trip_id = %trip_id,
                courier_id = ?trip.courier_id,
                "trip cancelled after assignment; not broadcast"
            );
        } else {
            let channels = channels_for(status);
            if !channels.is_empty() {
                let update = self.build_update(&trip).await;
                for channel in channels {
                    self.publish(*channel, &update).await;
                }
            }
            info!(trip_id = %trip_id, status = status.as_str(), "trip status reported");
        }

        sleep(self.settle_delay).await;
        Ok(trip)
    }

    async fn build_update(&self, trip: &Trip) -> TripUpdate {
        let mut update = TripUpdate {
            trip_id: trip.id,
            status: trip.status,
            courier_id: None,
            courier_location: None,
        };

        match trip.status {
            TripStatus::CourierAssigned => update.courier_id = trip.courier_id,
            TripStatus::CourierArriving | TripStatus::CourierEnRoute => {
                update.courier_location = self.courier_location(trip).await;
            }
            _ => {}
        }

        update
    }

    async fn courier_location(&self, trip: &Trip) -> Option<GeoPoint> {
        let courier_id = trip.courier_id?;
        match self.store.get_courier(courier_id).await {
            Ok(Some(courier)) => courier.location,
            Ok(None) => None,
            Err(err) => {
                warn!(trip_id = %trip.id, courier_id = %courier_id, error = %err, "courier lookup failed");
                None
            }
        }
    }

    async fn publish(&self, channel: Channel, update: &TripUpdate) {
        let payload = match serde_json::to_value(update) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(trip_id = %update.trip_id, error = %err, "failed to serialize trip update");
                return;
            }
        };

        if let Err(err) = self.publisher.publish(channel, payload).await {
            warn!(
                trip_id = %update.trip_id,
                channel = channel.as_str(),
                error = %err,
                "trip update publish failed"
            );
        }
    }
}

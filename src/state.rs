use std::sync::Arc;

use crate::cache::memory::InMemoryRouteCache;
use crate::config::Config;
use crate::engine::dispatch::{Collaborators, Dispatcher};
use crate::notify::broadcast::BroadcastBus;
use crate::observability::metrics::Metrics;
use crate::providers::google::GoogleMapsClient;
use crate::providers::{DirectionsApi, PlaceResolver};
use crate::store::memory::InMemoryStore;

pub struct AppState {
    pub dispatcher: Dispatcher,
    pub store: Arc<InMemoryStore>,
    pub bus: Arc<BroadcastBus>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let google = Arc::new(GoogleMapsClient::with_base_urls(
            config.google_maps_api_key.clone(),
            config.routes_api_url.clone(),
            config.places_api_url.clone(),
        ));
        Self::with_providers(config, google.clone(), google)
    }

    pub fn with_providers(
        config: &Config,
        directions: Arc<dyn DirectionsApi>,
        places: Arc<dyn PlaceResolver>,
    ) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(BroadcastBus::new(config.event_buffer_size));
        let metrics = Metrics::new();

        let dispatcher = Dispatcher::new(
            config,
            Collaborators {
                store: store.clone(),
                directions,
                places,
                cache: Arc::new(InMemoryRouteCache::new()),
                publisher: bus.clone(),
            },
            metrics.clone(),
        );

        Self {
            dispatcher,
            store,
            bus,
            metrics,
        }
    }
}

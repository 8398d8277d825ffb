use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::cache::RouteCache;
use crate::error::DispatchError;
use crate::models::route::DirectionsRoute;

#[derive(Debug, Clone)]
struct Entry {
    route: DirectionsRoute,
    expires_at: Instant,
}

/// Process-local route cache. Expired entries are dropped lazily on read.
#[derive(Default)]
pub struct InMemoryRouteCache {
    entries: DashMap<String, Entry>,
}

impl InMemoryRouteCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RouteCache for InMemoryRouteCache {
    async fn get(&self, key: &str) -> Result<Option<DirectionsRoute>, DispatchError> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.route.clone()));

        match hit {
            Some(Some(route)) => Ok(Some(route)),
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        route: &DirectionsRoute,
        ttl: Duration,
    ) -> Result<(), DispatchError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                route: route.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

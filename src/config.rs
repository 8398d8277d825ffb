use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::ROUTE_CACHE_TTL;
use crate::engine::lifecycle::SETTLE_DELAY;
use crate::engine::matching::{MatchingConfig, COURIER_SEARCH_RADIUS_METERS, MATCH_DEADLINE, MATCH_TICK};
use crate::engine::pricing::Pricer;
use crate::engine::routing::RouteConfig;
use crate::error::DispatchError;
use crate::providers::google::{DEFAULT_PLACES_URL, DEFAULT_ROUTES_URL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Staging,
    Production,
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(AppEnv::Development),
            "staging" => Ok(AppEnv::Staging),
            "production" | "prod" => Ok(AppEnv::Production),
            other => Err(format!("unknown environment {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub app_env: AppEnv,
    pub route_cache_enabled: bool,
    pub route_cache_ttl: Duration,
    pub google_maps_api_key: String,
    pub routes_api_url: String,
    pub places_api_url: String,
    pub hourly_wage: u64,
    pub base_product_name: String,
    pub match_tick: Duration,
    pub match_deadline: Duration,
    pub search_radius_meters: f64,
    pub settle_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            app_env: AppEnv::Development,
            route_cache_enabled: true,
            route_cache_ttl: ROUTE_CACHE_TTL,
            google_maps_api_key: String::new(),
            routes_api_url: DEFAULT_ROUTES_URL.to_string(),
            places_api_url: DEFAULT_PLACES_URL.to_string(),
            hourly_wage: 100,
            base_product_name: "economy".to_string(),
            match_tick: MATCH_TICK,
            match_deadline: MATCH_DEADLINE,
            search_radius_meters: COURIER_SEARCH_RADIUS_METERS,
            settle_delay: SETTLE_DELAY,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, DispatchError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let app_env: AppEnv = parse_or_default("APP_ENV", defaults.app_env)?;

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            app_env,
            route_cache_enabled: parse_or_default(
                "ROUTE_CACHE_ENABLED",
                app_env == AppEnv::Development,
            )?,
            route_cache_ttl: Duration::from_secs(parse_or_default(
                "ROUTE_CACHE_TTL_SECS",
                defaults.route_cache_ttl.as_secs(),
            )?),
            google_maps_api_key: env::var("GOOGLE_MAPS_API_KEY")
                .unwrap_or(defaults.google_maps_api_key),
            routes_api_url: env::var("ROUTES_API_URL").unwrap_or(defaults.routes_api_url),
            places_api_url: env::var("PLACES_API_URL").unwrap_or(defaults.places_api_url),
            hourly_wage: parse_or_default("HOURLY_WAGE", defaults.hourly_wage)?,
            base_product_name: env::var("BASE_PRODUCT_NAME")
                .unwrap_or(defaults.base_product_name),
            match_tick: Duration::from_millis(parse_or_default(
                "MATCH_TICK_MS",
                defaults.match_tick.as_millis() as u64,
            )?),
            match_deadline: Duration::from_secs(parse_or_default(
                "MATCH_DEADLINE_SECS",
                defaults.match_deadline.as_secs(),
            )?),
            search_radius_meters: parse_or_default(
                "SEARCH_RADIUS_METERS",
                defaults.search_radius_meters,
            )?,
            settle_delay: Duration::from_millis(parse_or_default(
                "SETTLE_DELAY_MS",
                defaults.settle_delay.as_millis() as u64,
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the runtime cannot start with: a zero tick interval or
    /// event buffer, and a negative or non-finite search radius.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.match_tick.is_zero() {
            return Err(DispatchError::Internal(
                "invalid MATCH_TICK_MS: must be greater than zero".to_string(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(DispatchError::Internal(
                "invalid EVENT_BUFFER_SIZE: must be greater than zero".to_string(),
            ));
        }
        if !self.search_radius_meters.is_finite() || self.search_radius_meters < 0.0 {
            return Err(DispatchError::Internal(format!(
                "invalid SEARCH_RADIUS_METERS: {}",
                self.search_radius_meters
            )));
        }
        Ok(())
    }

    pub fn pricer(&self) -> Pricer {
        Pricer::new(self.hourly_wage, self.base_product_name.clone())
    }

    pub fn routing(&self) -> RouteConfig {
        RouteConfig {
            cache_enabled: self.route_cache_enabled,
            cache_ttl: self.route_cache_ttl,
            product_radius_meters: self.search_radius_meters,
        }
    }

    pub fn matching(&self) -> MatchingConfig {
        MatchingConfig {
            tick: self.match_tick,
            deadline: self.match_deadline,
            search_radius_meters: self.search_radius_meters,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, DispatchError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| DispatchError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

// Availability resolver
// Turns raw per-country streaming responses into typed offers, with a
// per-(id, country) cache and a single retry after a rate-limit response.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::streaming::RawOffer;
use super::{AvailabilityResponse, AvailabilitySource};
use crate::models::{AvailabilityRecord, OfferType, StreamingOption};

const DEFAULT_OFFER_TYPE: &str = "subscription";
const DEFAULT_QUALITY: &str = "sd";

/// Pick the offers for `country` out of a raw response. Services keep the
/// order the response lists them in. Offers of unknown type are dropped.
pub fn parse_availability(
    response: &AvailabilityResponse,
    external_id: &str,
    country: &str,
) -> AvailabilityRecord {
    let mut options = Vec::new();

    let services = response
        .streaming_info
        .get(country)
        .or_else(|| response.streaming_info.get(&country.to_lowercase()));

    for (service, offers) in services.into_iter().flatten() {
        let Some(offers) = offers.as_array() else {
            tracing::debug!("Ignoring non-list offers for {} on {}", external_id, service);
            continue;
        };

        for raw in offers {
            let offer: RawOffer = match serde_json::from_value(raw.clone()) {
                Ok(offer) => offer,
                Err(e) => {
                    tracing::debug!("Skipping unreadable offer on {}: {}", service, e);
                    continue;
                }
            };

            let raw_type = offer.offer_type.as_deref().unwrap_or(DEFAULT_OFFER_TYPE);
            let Some(offer_type) = OfferType::from_raw(raw_type) else {
                tracing::debug!("Dropping {} offer of unknown type {:?}", service, raw_type);
                continue;
            };

            options.push(StreamingOption {
                service: service.clone(),
                offer_type,
                quality: offer.quality.unwrap_or_else(|| DEFAULT_QUALITY.to_string()),
                price: offer.price.map(|price| format_price(price.amount.as_ref())),
                link: offer.link.unwrap_or_default(),
            });
        }
    }

    AvailabilityRecord {
        external_id: external_id.to_string(),
        title: response.title.clone(),
        options,
    }
}

/// "$3.99"; a price object without an amount renders as "$N/A"
fn format_price(amount: Option<&Value>) -> String {
    match amount {
        Some(Value::String(s)) if !s.is_empty() => format!("${}", s),
        Some(Value::Number(n)) => format!("${}", n),
        _ => "$N/A".to_string(),
    }
}

/// Resolves metadata identifiers to viewing options through an `AvailabilitySource`
pub struct AvailabilityResolver<S> {
    source: S,
    rate_limit: Duration,
    rate_limit_retry: Duration,
    cache: HashMap<(String, String), Option<AvailabilityRecord>>,
    live_queries: usize,
}

impl<S: AvailabilitySource> AvailabilityResolver<S> {
    pub fn new(source: S, rate_limit: Duration, rate_limit_retry: Duration) -> Self {
        Self {
            source,
            rate_limit,
            rate_limit_retry,
            cache: HashMap::new(),
            live_queries: 0,
        }
    }

    pub fn live_queries(&self) -> usize {
        self.live_queries
    }

    /// `None` means the lookup failed; a record with no options means the
    /// movie is simply not offered in `country`.
    pub async fn resolve(&mut self, external_id: &str, country: &str) -> Option<AvailabilityRecord> {
        let key = (external_id.to_string(), country.to_string());
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Availability cache hit: {} ({})", external_id, country);
            return cached.clone();
        }

        self.live_queries += 1;
        let mut outcome = self.source.query(external_id, country).await;

        if matches!(&outcome, Err(e) if e.is_rate_limited()) {
            tracing::warn!(
                "Rate limited on {}, waiting {:?} before one retry",
                external_id,
                self.rate_limit_retry
            );
            tokio::time::sleep(self.rate_limit_retry).await;
            self.live_queries += 1;
            outcome = self.source.query(external_id, country).await;
        }

        tokio::time::sleep(self.rate_limit).await;

        let result = match outcome {
            Ok(response) => {
                let record = parse_availability(&response, external_id, country);
                tracing::debug!(
                    "{} streaming options for {}",
                    record.options.len(),
                    external_id
                );
                Some(record)
            }
            Err(e) => {
                tracing::warn!("Streaming lookup failed for {}: {}", external_id, e);
                None
            }
        };

        self.cache.insert(key, result.clone());
        result
    }

    /// Resolve a batch; output is aligned with `external_ids`
    pub async fn resolve_batch(
        &mut self,
        external_ids: &[String],
        country: &str,
    ) -> Vec<Option<AvailabilityRecord>> {
        let total = external_ids.len();
        let mut results = Vec::with_capacity(total);

        for (i, external_id) in external_ids.iter().enumerate() {
            tracing::info!("Streaming {}/{}: {}", i + 1, total, external_id);
            results.push(self.resolve(external_id, country).await);
        }

        let with_options = results
            .iter()
            .flatten()
            .filter(|record| !record.options.is_empty())
            .count();
        tracing::info!(
            "Found streaming options for {}/{} movies",
            with_options,
            total
        );

        results
    }
}

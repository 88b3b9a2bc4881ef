//! Turning place text into a coordinate by cascading through providers.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{AppConfig, SearchRadii};
use crate::errors::ProviderError;
use crate::model::{
    Coordinate, DebugTrail, GeocodeAttempt, GeocodeProvider, LocationBias, ResolutionStage,
};
use crate::normalize::{normalize_place_name, split_jammed_variant, Normalizer};
use crate::provider::{MapsProvider, ProviderResult};

/// A single provider lookup the cascade may try.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeStrategy {
    AddressValidation {
        line: String,
    },
    TextSearch {
        query: String,
        bias: Option<LocationBias>,
    },
    FindPlace {
        input: String,
        bias: Option<LocationBias>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Success(Coordinate),
    Failure(String),
}

impl GeocodeStrategy {
    pub fn provider(&self) -> GeocodeProvider {
        match self {
            GeocodeStrategy::AddressValidation { .. } => GeocodeProvider::AddressValidation,
            GeocodeStrategy::TextSearch { .. } => GeocodeProvider::TextSearch,
            GeocodeStrategy::FindPlace { .. } => GeocodeProvider::FindPlace,
        }
    }

    pub fn query(&self) -> &str {
        match self {
            GeocodeStrategy::AddressValidation { line } => line,
            GeocodeStrategy::TextSearch { query, .. } => query,
            GeocodeStrategy::FindPlace { input, .. } => input,
        }
    }

    /// Runs the lookup once. Transport and decoding failures become a
    /// `Failure` outcome; nothing is propagated.
    pub async fn run(
        &self,
        maps: &dyn MapsProvider,
        stage: ResolutionStage,
    ) -> (LookupOutcome, GeocodeAttempt) {
        let reply = match self {
            GeocodeStrategy::AddressValidation { line } => maps.validate_address(line).await,
            GeocodeStrategy::TextSearch { query, bias } => maps.text_search(query, *bias).await,
            GeocodeStrategy::FindPlace { input, bias } => maps.find_place(input, *bias).await,
        };
        record(self.provider(), stage, Some(self.query().to_string()), reply)
    }
}

/// Builds the debug-trail entry for one provider call and its tagged outcome.
pub fn record(
    provider: GeocodeProvider,
    stage: ResolutionStage,
    query: Option<String>,
    reply: ProviderResult<Option<Coordinate>>,
) -> (LookupOutcome, GeocodeAttempt) {
    match reply {
        Ok(reply) => {
            let outcome = match reply.value {
                Some(coordinate) => LookupOutcome::Success(coordinate),
                None => LookupOutcome::Failure(
                    reply
                        .provider_status
                        .clone()
                        .unwrap_or_else(|| "no coordinate in response".to_string()),
                ),
            };
            let attempt = GeocodeAttempt {
                provider,
                stage,
                query,
                succeeded: reply.value.is_some(),
                coordinate: reply.value,
                http_status: Some(reply.http_status),
                provider_status: reply.provider_status,
                error_message: reply.error_message,
            };
            (outcome, attempt)
        }
        Err(err) => {
            let attempt = failed_attempt(provider, stage, query, &err);
            (LookupOutcome::Failure(err.to_string()), attempt)
        }
    }
}

fn failed_attempt(
    provider: GeocodeProvider,
    stage: ResolutionStage,
    query: Option<String>,
    err: &ProviderError,
) -> GeocodeAttempt {
    GeocodeAttempt {
        provider,
        stage,
        query,
        succeeded: false,
        coordinate: None,
        http_status: err.http_status(),
        provider_status: None,
        error_message: Some(err.to_string()),
    }
}

/// Tries each strategy in order, appending one trail entry per call, and
/// stops at the first coordinate.
pub async fn cascade(
    maps: &dyn MapsProvider,
    stage: ResolutionStage,
    strategies: &[GeocodeStrategy],
    trail: &mut DebugTrail,
) -> Option<Coordinate> {
    for strategy in strategies {
        let (outcome, attempt) = strategy.run(maps, stage).await;
        trail.push(attempt);
        match outcome {
            LookupOutcome::Success(coordinate) => {
                debug!(
                    provider = strategy.provider().as_str(),
                    stage = ?stage,
                    lat = coordinate.lat,
                    lng = coordinate.lng,
                    "geocode strategy succeeded"
                );
                return Some(coordinate);
            }
            LookupOutcome::Failure(reason) => {
                warn!(
                    provider = strategy.provider().as_str(),
                    stage = ?stage,
                    %reason,
                    "geocode strategy failed; trying next provider"
                );
            }
        }
    }
    None
}

/// Result of a resolution: the coordinate if any strategy produced one, the
/// query text actually sent, and every attempt made.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub coordinate: Option<Coordinate>,
    pub normalized: Option<String>,
    pub trail: DebugTrail,
}

impl Resolution {
    fn unresolved(normalized: Option<String>, trail: DebugTrail) -> Self {
        Self {
            coordinate: None,
            normalized,
            trail,
        }
    }
}

/// Resolves one free-text address via address validation, then text search,
/// then find-place.
#[derive(Clone)]
pub struct GeocodeResolver {
    maps: Arc<dyn MapsProvider>,
    normalizer: Normalizer,
}

impl GeocodeResolver {
    pub fn new(maps: Arc<dyn MapsProvider>, normalizer: Normalizer) -> Self {
        Self { maps, normalizer }
    }

    pub fn strategies(normalized: &str) -> Vec<GeocodeStrategy> {
        vec![
            GeocodeStrategy::AddressValidation {
                line: normalized.to_string(),
            },
            GeocodeStrategy::TextSearch {
                query: normalized.to_string(),
                bias: None,
            },
            GeocodeStrategy::FindPlace {
                input: normalized.to_string(),
                bias: None,
            },
        ]
    }

    pub async fn resolve(&self, address: &str) -> Resolution {
        let query = self.normalizer.normalize(address);
        let mut trail = DebugTrail::new();
        if query.is_empty() {
            return Resolution::unresolved(None, trail);
        }

        let strategies = Self::strategies(&query.normalized);
        let coordinate = cascade(
            self.maps.as_ref(),
            ResolutionStage::Address,
            &strategies,
            &mut trail,
        )
        .await;
        Resolution {
            coordinate,
            normalized: Some(query.normalized),
            trail,
        }
    }
}

/// Two-stage resolution for separate city and area fields: find the city
/// centre, then refine with the area biased around it.
#[derive(Clone)]
pub struct CityAreaResolver {
    maps: Arc<dyn MapsProvider>,
    normalizer: Normalizer,
    radii: SearchRadii,
}

impl CityAreaResolver {
    pub fn new(maps: Arc<dyn MapsProvider>, normalizer: Normalizer, radii: SearchRadii) -> Self {
        Self {
            maps,
            normalizer,
            radii,
        }
    }

    pub fn from_config(maps: Arc<dyn MapsProvider>, config: &AppConfig) -> Self {
        Self::new(maps, Normalizer::new(&config.region), config.radii)
    }

    pub async fn resolve(&self, city: &str, area: &str) -> Resolution {
        let city = normalize_place_name(city);
        let area = normalize_place_name(area);
        let mut trail = DebugTrail::new();
        if city.is_empty() && area.is_empty() {
            return Resolution::unresolved(None, trail);
        }

        let base = if city.is_empty() { &area } else { &city };
        let city_query = self.normalizer.with_country(base);
        let city_strategies = [
            GeocodeStrategy::TextSearch {
                query: city_query.clone(),
                bias: None,
            },
            GeocodeStrategy::AddressValidation {
                line: city_query.clone(),
            },
        ];
        let Some(center) = cascade(
            self.maps.as_ref(),
            ResolutionStage::City,
            &city_strategies,
            &mut trail,
        )
        .await
        else {
            return Resolution::unresolved(Some(city_query), trail);
        };

        if area.is_empty() {
            return Resolution {
                coordinate: Some(center),
                normalized: Some(city_query),
                trail,
            };
        }

        let combined = if city.is_empty() {
            area.clone()
        } else {
            format!("{area}, {city}")
        };
        let strategies = self.area_strategies(&area, &combined, center);
        let refined = cascade(
            self.maps.as_ref(),
            ResolutionStage::Area,
            &strategies,
            &mut trail,
        )
        .await;

        let coordinate = refined.unwrap_or_else(|| {
            debug!(%area, %city, "area refinement failed; using city centre");
            center
        });
        Resolution {
            coordinate: Some(coordinate),
            normalized: Some(combined),
            trail,
        }
    }

    fn area_strategies(
        &self,
        area: &str,
        combined: &str,
        center: Coordinate,
    ) -> Vec<GeocodeStrategy> {
        let find_place_bias = LocationBias {
            center,
            radius_m: self.radii.area_find_place_m,
        };
        let mut strategies: Vec<GeocodeStrategy> = std::iter::once(area.to_string())
            .chain(split_jammed_variant(area))
            .map(|input| GeocodeStrategy::FindPlace {
                input,
                bias: Some(find_place_bias),
            })
            .collect();

        strategies.push(GeocodeStrategy::AddressValidation {
            line: combined.to_string(),
        });
        strategies.push(GeocodeStrategy::TextSearch {
            query: combined.to_string(),
            bias: Some(LocationBias {
                center,
                radius_m: self.radii.area_text_search_m,
            }),
        });
        strategies
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::errors::ProviderError;
    use crate::model::{Coordinate, FacilityCandidate, LocationBias};
    use crate::provider::{MapsProvider, MatrixElement, ProviderReply, ProviderResult};

    /// Records every call and replays scripted replies per provider.
    /// Unscripted geocoding calls answer with an empty result.
    #[derive(Default)]
    pub(crate) struct ScriptedMaps {
        geocode: Mutex<HashMap<&'static str, VecDeque<ProviderResult<Option<Coordinate>>>>>,
        nearby: Mutex<Option<ProviderResult<Vec<FacilityCandidate>>>>,
        matrix: Mutex<Option<ProviderResult<Vec<MatrixElement>>>>,
        pub(crate) calls: Mutex<Vec<(&'static str, String)>>,
    }

    impl ScriptedMaps {
        pub(crate) fn script(
            self,
            provider: &'static str,
            reply: ProviderResult<Option<Coordinate>>,
        ) -> Self {
            self.geocode
                .lock()
                .entry(provider)
                .or_default()
                .push_back(reply);
            self
        }

        pub(crate) fn with_nearby(self, reply: ProviderResult<Vec<FacilityCandidate>>) -> Self {
            *self.nearby.lock() = Some(reply);
            self
        }

        pub(crate) fn with_matrix(self, reply: ProviderResult<Vec<MatrixElement>>) -> Self {
            *self.matrix.lock() = Some(reply);
            self
        }

        pub(crate) fn calls(&self) -> Vec<(&'static str, String)> {
            self.calls.lock().clone()
        }

        fn next(&self, provider: &'static str, query: String) -> ProviderResult<Option<Coordinate>> {
            self.calls.lock().push((provider, query));
            self.geocode
                .lock()
                .get_mut(provider)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| {
                    Ok(ProviderReply {
                        http_status: 200,
                        provider_status: Some("ZERO_RESULTS".to_string()),
                        error_message: None,
                        value: None,
                    })
                })
        }
    }

    pub(crate) fn found(lat: f64, lng: f64) -> ProviderResult<Option<Coordinate>> {
        Ok(ProviderReply::ok(Some(Coordinate::new(lat, lng))))
    }

    pub(crate) fn unreachable() -> ProviderResult<Option<Coordinate>> {
        Err(ProviderError::Unreachable("operation timed out".to_string()))
    }

    #[async_trait]
    impl MapsProvider for ScriptedMaps {
        async fn validate_address(&self, line: &str) -> ProviderResult<Option<Coordinate>> {
            self.next("address_validation", line.to_string())
        }

        async fn text_search(
            &self,
            query: &str,
            _bias: Option<LocationBias>,
        ) -> ProviderResult<Option<Coordinate>> {
            self.next("text_search", query.to_string())
        }

        async fn find_place(
            &self,
            input: &str,
            _bias: Option<LocationBias>,
        ) -> ProviderResult<Option<Coordinate>> {
            self.next("find_place", input.to_string())
        }

        async fn geolocate(&self) -> ProviderResult<Option<Coordinate>> {
            self.next("geolocate", String::new())
        }

        async fn nearby_search(
            &self,
            origin: Coordinate,
            _radius_m: u32,
            _keyword: &str,
        ) -> ProviderResult<Vec<FacilityCandidate>> {
            self.calls.lock().push(("nearby_search", origin.to_string()));
            self.nearby
                .lock()
                .take()
                .unwrap_or_else(|| Ok(ProviderReply::ok(Vec::new())))
        }

        async fn distance_matrix(
            &self,
            origin: Coordinate,
            destinations: &[Coordinate],
        ) -> ProviderResult<Vec<MatrixElement>> {
            self.calls
                .lock()
                .push(("distance_matrix", format!("{origin}->{}", destinations.len())));
            self.matrix
                .lock()
                .take()
                .unwrap_or_else(|| Ok(ProviderReply::ok(Vec::new())))
        }
    }
}

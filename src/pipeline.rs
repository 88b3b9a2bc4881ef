//! Per-request orchestration: input → coordinate → candidates → ranking.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::errors::ResolveError;
use crate::facilities::{DistanceRanker, FacilityFinder};
use crate::geocode::{record, CityAreaResolver, GeocodeResolver, LookupOutcome, Resolution};
use crate::model::{Coordinate, DebugTrail, GeocodeProvider, ResolutionResult, ResolutionStage};
use crate::normalize::Normalizer;
use crate::provider::MapsProvider;

pub const FULLER_ADDRESS_HINT: &str =
    "Try a fuller address like 'LJ University, Ahmedabad', or share your location.";
pub const COORDINATE_HINT: &str = "lat and lng must both be decimal numbers.";

/// Raw request fields. Blank strings count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationQuery {
    pub address: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
}

impl LocationQuery {
    pub fn address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Self::default()
        }
    }

    pub fn city_area(city: impl Into<String>, area: impl Into<String>) -> Self {
        Self {
            city: Some(city.into()),
            area: Some(area.into()),
            ..Self::default()
        }
    }

    pub fn coordinates(lat: impl Into<String>, lng: impl Into<String>) -> Self {
        Self {
            lat: Some(lat.into()),
            lng: Some(lng.into()),
            ..Self::default()
        }
    }

    fn field(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Explicit coordinates win over an address, which wins over city/area.
    fn classify(&self) -> Result<LocationInput, ResolveError> {
        if let (Some(lat), Some(lng)) = (Self::field(&self.lat), Self::field(&self.lng)) {
            return parse_coordinate(lat, lng).map(LocationInput::Coordinates);
        }
        if let Some(address) = Self::field(&self.address) {
            return Ok(LocationInput::Address(address.to_string()));
        }
        let city = Self::field(&self.city).unwrap_or_default();
        let area = Self::field(&self.area).unwrap_or_default();
        if city.is_empty() && area.is_empty() {
            return Ok(LocationInput::Nothing);
        }
        Ok(LocationInput::CityArea {
            city: city.to_string(),
            area: area.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LocationInput {
    Coordinates(Coordinate),
    Address(String),
    CityArea { city: String, area: String },
    Nothing,
}

fn parse_coordinate(lat: &str, lng: &str) -> Result<Coordinate, ResolveError> {
    let lat = lat
        .parse::<f64>()
        .map_err(|_| ResolveError::InvalidCoordinateInput)?;
    let lng = lng
        .parse::<f64>()
        .map_err(|_| ResolveError::InvalidCoordinateInput)?;
    if !lat.is_finite() || !lng.is_finite() {
        return Err(ResolveError::InvalidCoordinateInput);
    }
    Ok(Coordinate::new(lat, lng))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PipelineState {
    ReceivedInput,
    Resolving,
    Searching,
    Ranking,
    Done,
    Errored,
}

pub struct Orchestrator {
    maps: Arc<dyn MapsProvider>,
    geocoder: GeocodeResolver,
    city_area: CityAreaResolver,
    finder: FacilityFinder,
    ranker: DistanceRanker,
}

impl Orchestrator {
    pub fn new(maps: Arc<dyn MapsProvider>, config: &AppConfig) -> Self {
        let normalizer = Normalizer::new(&config.region);
        Self {
            geocoder: GeocodeResolver::new(Arc::clone(&maps), normalizer),
            city_area: CityAreaResolver::from_config(Arc::clone(&maps), config),
            finder: FacilityFinder::new(Arc::clone(&maps), config.radii.facility_search_m),
            ranker: DistanceRanker::new(Arc::clone(&maps)),
            maps,
        }
    }

    pub async fn run(&self, query: &LocationQuery) -> Result<ResolutionResult, ResolveError> {
        self.run_with_state(query).await.0
    }

    /// Runs the pipeline and reports the state it finished in.
    pub(crate) async fn run_with_state(
        &self,
        query: &LocationQuery,
    ) -> (Result<ResolutionResult, ResolveError>, PipelineState) {
        let mut state = PipelineState::ReceivedInput;
        let outcome = self.drive(query, &mut state).await;
        if outcome.is_err() {
            transition(&mut state, PipelineState::Errored);
        }
        (outcome, state)
    }

    async fn drive(
        &self,
        query: &LocationQuery,
        state: &mut PipelineState,
    ) -> Result<ResolutionResult, ResolveError> {
        let input = query.classify()?;

        transition(state, PipelineState::Resolving);
        let Resolution {
            coordinate,
            normalized,
            mut trail,
        } = match input {
            LocationInput::Coordinates(origin) => Resolution {
                coordinate: Some(origin),
                normalized: None,
                trail: DebugTrail::new(),
            },
            LocationInput::Address(address) => self.geocoder.resolve(&address).await,
            LocationInput::CityArea { city, area } => self.city_area.resolve(&city, &area).await,
            LocationInput::Nothing => Resolution {
                coordinate: None,
                normalized: None,
                trail: DebugTrail::new(),
            },
        };

        let origin = match coordinate {
            Some(origin) => origin,
            None => match self.geolocate(&mut trail).await {
                Some(origin) => origin,
                None => {
                    info!(attempts = trail.len(), "every geocoding provider failed");
                    return Err(ResolveError::NoCoordinateFound {
                        hint: FULLER_ADDRESS_HINT.to_string(),
                        debug: trail.into_inner(),
                    });
                }
            },
        };

        transition(state, PipelineState::Searching);
        let candidates = self.finder.find_nearby(origin).await;

        transition(state, PipelineState::Ranking);
        let facilities = self.ranker.rank(origin, candidates).await;
        let nearest = facilities.first().cloned();

        transition(state, PipelineState::Done);
        Ok(ResolutionResult {
            origin: Some(origin),
            normalized,
            facilities,
            nearest,
            debug: trail.into_inner(),
        })
    }

    /// Last-resort device/IP geolocation, recorded on the same trail.
    async fn geolocate(&self, trail: &mut DebugTrail) -> Option<Coordinate> {
        let reply = self.maps.geolocate().await;
        let (outcome, attempt) = record(
            GeocodeProvider::Geolocate,
            ResolutionStage::Fallback,
            None,
            reply,
        );
        trail.push(attempt);
        match outcome {
            LookupOutcome::Success(origin) => Some(origin),
            LookupOutcome::Failure(_) => None,
        }
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!(from = ?*state, to = ?next, "pipeline transition");
    *state = next;
}

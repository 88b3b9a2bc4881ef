use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Renders as `lat,lng`, the form every provider expects in query strings.
impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Circle used to bias a text lookup towards an already known point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationBias {
    pub center: Coordinate,
    pub radius_m: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedQuery {
    pub raw: String,
    pub normalized: String,
}

impl NormalizedQuery {
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeProvider {
    AddressValidation,
    TextSearch,
    FindPlace,
    Geolocate,
}

impl GeocodeProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeProvider::AddressValidation => "address_validation",
            GeocodeProvider::TextSearch => "text_search",
            GeocodeProvider::FindPlace => "find_place",
            GeocodeProvider::Geolocate => "geolocate",
        }
    }
}

/// Which part of a resolution an attempt belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStage {
    Address,
    City,
    Area,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeAttempt {
    pub provider: GeocodeProvider,
    pub stage: ResolutionStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub succeeded: bool,
    pub coordinate: Option<Coordinate>,
    pub http_status: Option<u16>,
    pub provider_status: Option<String>,
    pub error_message: Option<String>,
}

/// Append-only record of every provider attempt made while resolving one
/// request. Entries can be added but never removed or rewritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DebugTrail(Vec<GeocodeAttempt>);

impl DebugTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attempt: GeocodeAttempt) {
        self.0.push(attempt);
    }

    pub fn extend(&mut self, other: DebugTrail) {
        self.0.extend(other.0);
    }

    pub fn attempts(&self) -> &[GeocodeAttempt] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<GeocodeAttempt> {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityCandidate {
    pub place_id: String,
    pub name: String,
    #[serde(rename = "address")]
    pub vicinity: String,
    pub location: Coordinate,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedFacility {
    #[serde(flatten)]
    pub candidate: FacilityCandidate,
    pub distance_text: String,
    pub distance_meters: u64,
    pub duration_text: String,
    pub duration_seconds: u64,
}

/// Successful outcome of one request. Built once, returned, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub origin: Option<Coordinate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    #[serde(rename = "places")]
    pub facilities: Vec<RankedFacility>,
    pub nearest: Option<RankedFacility>,
    pub debug: Vec<GeocodeAttempt>,
}

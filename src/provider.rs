//! Boundary to the external maps providers.
//!
//! [`MapsProvider`] is the seam the pipeline talks to; [`HttpMapsClient`] is
//! the production implementation that speaks the Google-compatible JSON APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::trace;

use crate::config::{AppConfig, ProviderEndpoints, ProviderTimeouts};
use crate::errors::{AppError, AppResult, ProviderError};
use crate::model::{Coordinate, FacilityCandidate, LocationBias};

/// Successful HTTP exchange with a provider, plus the provider's own status
/// fields when the response carried them.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply<T> {
    pub http_status: u16,
    pub provider_status: Option<String>,
    pub error_message: Option<String>,
    pub value: T,
}

impl<T> ProviderReply<T> {
    pub fn ok(value: T) -> Self {
        Self {
            http_status: 200,
            provider_status: Some("OK".to_string()),
            error_message: None,
            value,
        }
    }
}

pub type ProviderResult<T> = Result<ProviderReply<T>, ProviderError>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Measure {
    pub text: String,
    pub value: u64,
}

/// One origin/destination pair from a distance-matrix response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MatrixElement {
    #[serde(default)]
    pub status: String,
    pub distance: Option<Measure>,
    pub duration: Option<Measure>,
}

#[async_trait]
pub trait MapsProvider: Send + Sync {
    /// Structured address validation; yields the geocoded point if present.
    async fn validate_address(&self, address_line: &str) -> ProviderResult<Option<Coordinate>>;

    /// Free-text place search; yields the first result with a location.
    async fn text_search(
        &self,
        query: &str,
        bias: Option<LocationBias>,
    ) -> ProviderResult<Option<Coordinate>>;

    /// Find-place-from-text; yields the first candidate with geometry.
    async fn find_place(
        &self,
        input: &str,
        bias: Option<LocationBias>,
    ) -> ProviderResult<Option<Coordinate>>;

    /// Device/IP geolocation of the caller.
    async fn geolocate(&self) -> ProviderResult<Option<Coordinate>>;

    /// First page of places around `origin` matching `keyword`.
    async fn nearby_search(
        &self,
        origin: Coordinate,
        radius_m: u32,
        keyword: &str,
    ) -> ProviderResult<Vec<FacilityCandidate>>;

    /// Travel distance and duration from `origin` to every destination, in
    /// destination order.
    async fn distance_matrix(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
    ) -> ProviderResult<Vec<MatrixElement>>;
}

pub struct HttpMapsClient {
    http: Client,
    api_key: Option<SecretString>,
    endpoints: ProviderEndpoints,
    timeouts: ProviderTimeouts,
    region_code: String,
}

impl HttpMapsClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        validate_endpoints(&config.endpoints)?;
        let http = Client::builder()
            .user_agent(concat!("dumpyard-finder/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_key: config.maps_api_key.clone(),
            endpoints: config.endpoints.clone(),
            timeouts: config.timeouts,
            region_code: config.region.region_code.clone(),
        })
    }

    // A missing key is sent as empty; the provider reports it as a failure.
    fn key(&self) -> &str {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .unwrap_or_default()
    }

    fn region_param(&self) -> String {
        self.region_code.to_lowercase()
    }

    fn get(&self, url: &str, timeout: Duration) -> RequestBuilder {
        self.http
            .get(url)
            .timeout(timeout)
            .query(&[("key", self.key())])
    }

    fn post(&self, url: &str, timeout: Duration) -> RequestBuilder {
        self.http
            .post(url)
            .timeout(timeout)
            .query(&[("key", self.key())])
    }
}

#[async_trait]
impl MapsProvider for HttpMapsClient {
    async fn validate_address(&self, address_line: &str) -> ProviderResult<Option<Coordinate>> {
        #[derive(Deserialize)]
        struct Response {
            result: Option<ValidationResult>,
        }

        #[derive(Deserialize)]
        struct ValidationResult {
            geocode: Option<Geocode>,
            verdict: Option<Verdict>,
        }

        #[derive(Deserialize)]
        struct Geocode {
            location: Option<LatitudeLongitude>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Verdict {
            address_complete: Option<bool>,
        }

        #[derive(Deserialize)]
        struct LatitudeLongitude {
            latitude: Option<f64>,
            longitude: Option<f64>,
        }

        let body = json!({
            "address": {
                "regionCode": self.region_code,
                "addressLines": [address_line],
            }
        });
        let request = self
            .post(
                &self.endpoints.address_validation,
                self.timeouts.address_validation(),
            )
            .json(&body);
        let (http_status, parsed) = send_json::<Response>(request).await?;

        let result = parsed.result;
        let provider_status = result
            .as_ref()
            .and_then(|r| r.verdict.as_ref())
            .and_then(|v| v.address_complete)
            .map(|complete| {
                if complete {
                    "ADDRESS_COMPLETE".to_string()
                } else {
                    "ADDRESS_INCOMPLETE".to_string()
                }
            });
        let coordinate = result
            .and_then(|r| r.geocode)
            .and_then(|g| g.location)
            .and_then(|loc| Some(Coordinate::new(loc.latitude?, loc.longitude?)));

        Ok(ProviderReply {
            http_status,
            provider_status,
            error_message: None,
            value: coordinate,
        })
    }

    async fn text_search(
        &self,
        query: &str,
        bias: Option<LocationBias>,
    ) -> ProviderResult<Option<Coordinate>> {
        let mut request = self
            .get(&self.endpoints.text_search, self.timeouts.text_search())
            .query(&[("query", query), ("region", self.region_param().as_str())]);
        if let Some(bias) = bias {
            request = request.query(&[
                ("location", bias.center.to_string()),
                ("radius", bias.radius_m.to_string()),
            ]);
        }
        let (http_status, parsed) = send_json::<PlacesResponse>(request).await?;

        let value = parsed.results.iter().find_map(PlaceResult::coordinate);
        Ok(ProviderReply {
            http_status,
            provider_status: parsed.status,
            error_message: parsed.error_message,
            value,
        })
    }

    async fn find_place(
        &self,
        input: &str,
        bias: Option<LocationBias>,
    ) -> ProviderResult<Option<Coordinate>> {
        let mut request = self
            .get(&self.endpoints.find_place, self.timeouts.find_place())
            .query(&[
                ("input", input),
                ("inputtype", "textquery"),
                ("fields", "geometry"),
                ("region", self.region_param().as_str()),
            ]);
        if let Some(bias) = bias {
            request = request.query(&[(
                "locationbias",
                format!("circle:{}@{}", bias.radius_m, bias.center),
            )]);
        }
        let (http_status, parsed) = send_json::<FindPlaceResponse>(request).await?;

        let value = parsed.candidates.iter().find_map(PlaceResult::coordinate);
        Ok(ProviderReply {
            http_status,
            provider_status: parsed.status,
            error_message: parsed.error_message,
            value,
        })
    }

    async fn geolocate(&self) -> ProviderResult<Option<Coordinate>> {
        #[derive(Deserialize)]
        struct Response {
            location: Option<Location>,
        }

        // Either key spelling may appear, sometimes both at once.
        #[derive(Deserialize)]
        struct Location {
            lat: Option<f64>,
            lng: Option<f64>,
            latitude: Option<f64>,
            longitude: Option<f64>,
        }

        let request = self
            .post(&self.endpoints.geolocate, self.timeouts.geolocate())
            .json(&json!({}));
        let (http_status, parsed) = send_json::<Response>(request).await?;

        let value = parsed.location.and_then(|loc| {
            Some(Coordinate::new(
                loc.lat.or(loc.latitude)?,
                loc.lng.or(loc.longitude)?,
            ))
        });
        Ok(ProviderReply {
            http_status,
            provider_status: None,
            error_message: None,
            value,
        })
    }

    async fn nearby_search(
        &self,
        origin: Coordinate,
        radius_m: u32,
        keyword: &str,
    ) -> ProviderResult<Vec<FacilityCandidate>> {
        let request = self
            .get(&self.endpoints.nearby_search, self.timeouts.nearby_search())
            .query(&[
                ("location", origin.to_string()),
                ("radius", radius_m.to_string()),
                ("keyword", keyword.to_string()),
            ]);
        let (http_status, parsed) = send_json::<PlacesResponse>(request).await?;

        let value = parsed
            .results
            .into_iter()
            .filter_map(PlaceResult::into_candidate)
            .collect();
        Ok(ProviderReply {
            http_status,
            provider_status: parsed.status,
            error_message: parsed.error_message,
            value,
        })
    }

    async fn distance_matrix(
        &self,
        origin: Coordinate,
        destinations: &[Coordinate],
    ) -> ProviderResult<Vec<MatrixElement>> {
        #[derive(Deserialize)]
        struct Response {
            status: Option<String>,
            error_message: Option<String>,
            #[serde(default)]
            rows: Vec<Row>,
        }

        #[derive(Deserialize)]
        struct Row {
            #[serde(default)]
            elements: Vec<MatrixElement>,
        }

        let joined = destinations
            .iter()
            .map(Coordinate::to_string)
            .collect::<Vec<_>>()
            .join("|");
        let request = self
            .get(&self.endpoints.distance_matrix, self.timeouts.distance_matrix())
            .query(&[("origins", origin.to_string()), ("destinations", joined)]);
        let (http_status, parsed) = send_json::<Response>(request).await?;

        let value = parsed
            .rows
            .into_iter()
            .next()
            .map(|row| row.elements)
            .unwrap_or_default();
        Ok(ProviderReply {
            http_status,
            provider_status: parsed.status,
            error_message: parsed.error_message,
            value,
        })
    }
}

fn validate_endpoints(endpoints: &ProviderEndpoints) -> AppResult<()> {
    let named = [
        ("address validation", &endpoints.address_validation),
        ("text search", &endpoints.text_search),
        ("find place", &endpoints.find_place),
        ("geolocate", &endpoints.geolocate),
        ("nearby search", &endpoints.nearby_search),
        ("distance matrix", &endpoints.distance_matrix),
    ];
    for (name, url) in named {
        Url::parse(url)
            .map_err(|err| AppError::Config(format!("invalid {name} endpoint {url}: {err}")))?;
    }
    Ok(())
}

#[derive(Deserialize)]
struct PlacesResponse {
    status: Option<String>,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceResult>,
}

#[derive(Deserialize)]
struct FindPlaceResponse {
    status: Option<String>,
    error_message: Option<String>,
    #[serde(default)]
    candidates: Vec<PlaceResult>,
}

#[derive(Deserialize)]
struct PlaceResult {
    geometry: Option<Geometry>,
    place_id: Option<String>,
    name: Option<String>,
    vicinity: Option<String>,
    rating: Option<f64>,
}

#[derive(Deserialize)]
struct Geometry {
    location: Option<LatLng>,
}

#[derive(Deserialize)]
struct LatLng {
    lat: Option<f64>,
    lng: Option<f64>,
}

impl PlaceResult {
    fn coordinate(&self) -> Option<Coordinate> {
        let location = self.geometry.as_ref()?.location.as_ref()?;
        Some(Coordinate::new(location.lat?, location.lng?))
    }

    fn into_candidate(self) -> Option<FacilityCandidate> {
        let location = self.coordinate()?;
        Some(FacilityCandidate {
            place_id: self.place_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            vicinity: self.vicinity.unwrap_or_default(),
            location,
            rating: self.rating,
        })
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<(u16, T), ProviderError> {
    let response = request.send().await?;
    let status = response.status();
    trace!(url = %response.url().path(), status = status.as_u16(), "provider responded");
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ProviderError::Rejected {
            status: status.as_u16(),
            message: rejection_message(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "request rejected".to_string()),
        });
    }

    let parsed = serde_json::from_str(&body)
        .map_err(|err| ProviderError::Malformed(err.to_string()))?;
    Ok((status.as_u16(), parsed))
}

/// Pulls a human-readable message out of either error envelope the providers use.
fn rejection_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Envelope {
        error_message: Option<String>,
        error: Option<ErrorBody>,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    let envelope: Envelope = serde_json::from_str(body).ok()?;
    envelope
        .error_message
        .or_else(|| envelope.error.and_then(|e| e.message))
}

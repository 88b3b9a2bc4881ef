use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

const DEFAULT_ADDRESS_VALIDATION_URL: &str =
    "https://addressvalidation.gomaps.pro/v1:validateAddress";
const DEFAULT_TEXT_SEARCH_URL: &str = "https://maps.gomaps.pro/maps/api/place/textsearch/json";
const DEFAULT_FIND_PLACE_URL: &str =
    "https://maps.gomaps.pro/maps/api/place/findplacefromtext/json";
const DEFAULT_GEOLOCATE_URL: &str = "https://www.gomaps.pro/geolocation/v1/geolocate";
const DEFAULT_NEARBY_SEARCH_URL: &str =
    "https://places.gomaps.pro/maps/api/place/nearbysearch/json";
const DEFAULT_DISTANCE_MATRIX_URL: &str = "https://maps.gomaps.pro/maps/api/distancematrix/json";

pub const DEFAULT_FACILITY_RADIUS_M: u32 = 15_000;
const DEFAULT_AREA_FIND_PLACE_RADIUS_M: u32 = 30_000;
const DEFAULT_AREA_TEXT_SEARCH_RADIUS_M: u32 = 40_000;

#[derive(Clone, Debug, Serialize)]
pub struct ProviderEndpoints {
    pub address_validation: String,
    pub text_search: String,
    pub find_place: String,
    pub geolocate: String,
    pub nearby_search: String,
    pub distance_matrix: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            address_validation: DEFAULT_ADDRESS_VALIDATION_URL.to_string(),
            text_search: DEFAULT_TEXT_SEARCH_URL.to_string(),
            find_place: DEFAULT_FIND_PLACE_URL.to_string(),
            geolocate: DEFAULT_GEOLOCATE_URL.to_string(),
            nearby_search: DEFAULT_NEARBY_SEARCH_URL.to_string(),
            distance_matrix: DEFAULT_DISTANCE_MATRIX_URL.to_string(),
        }
    }
}

impl ProviderEndpoints {
    /// Points every provider at the same base URL, using fixed paths below it.
    /// Handy for mock servers.
    pub fn under(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            address_validation: format!("{base}/v1:validateAddress"),
            text_search: format!("{base}/place/textsearch/json"),
            find_place: format!("{base}/place/findplacefromtext/json"),
            geolocate: format!("{base}/geolocation/v1/geolocate"),
            nearby_search: format!("{base}/place/nearbysearch/json"),
            distance_matrix: format!("{base}/distancematrix/json"),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ProviderTimeouts {
    pub address_validation_secs: u64,
    pub text_search_secs: u64,
    pub find_place_secs: u64,
    pub geolocate_secs: u64,
    pub nearby_search_secs: u64,
    pub distance_matrix_secs: u64,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self {
            address_validation_secs: 20,
            text_search_secs: 20,
            find_place_secs: 20,
            geolocate_secs: 15,
            nearby_search_secs: 20,
            distance_matrix_secs: 20,
        }
    }
}

impl ProviderTimeouts {
    pub fn address_validation(&self) -> Duration {
        Duration::from_secs(self.address_validation_secs)
    }

    pub fn text_search(&self) -> Duration {
        Duration::from_secs(self.text_search_secs)
    }

    pub fn find_place(&self) -> Duration {
        Duration::from_secs(self.find_place_secs)
    }

    pub fn geolocate(&self) -> Duration {
        Duration::from_secs(self.geolocate_secs)
    }

    pub fn nearby_search(&self) -> Duration {
        Duration::from_secs(self.nearby_search_secs)
    }

    pub fn distance_matrix(&self) -> Duration {
        Duration::from_secs(self.distance_matrix_secs)
    }
}

/// Country bias applied to free-text queries and provider region params.
#[derive(Clone, Debug, Serialize)]
pub struct RegionBias {
    pub region_code: String,
    pub country_name: String,
}

impl Default for RegionBias {
    fn default() -> Self {
        Self {
            region_code: "IN".to_string(),
            country_name: "India".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct SearchRadii {
    pub facility_search_m: u32,
    pub area_find_place_m: u32,
    pub area_text_search_m: u32,
}

impl Default for SearchRadii {
    fn default() -> Self {
        Self {
            facility_search_m: DEFAULT_FACILITY_RADIUS_M,
            area_find_place_m: DEFAULT_AREA_FIND_PLACE_RADIUS_M,
            area_text_search_m: DEFAULT_AREA_TEXT_SEARCH_RADIUS_M,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub maps_api_key: Option<SecretString>,
    pub endpoints: ProviderEndpoints,
    pub timeouts: ProviderTimeouts,
    pub region: RegionBias,
    pub radii: SearchRadii,
    pub bind_addr: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub endpoints: ProviderEndpoints,
    pub timeouts: ProviderTimeouts,
    pub region: RegionBias,
    pub radii: SearchRadii,
    pub bind_addr: String,
    pub has_maps_api_key: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            maps_api_key: None,
            endpoints: ProviderEndpoints::default(),
            timeouts: ProviderTimeouts::default(),
            region: RegionBias::default(),
            radii: SearchRadii::default(),
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        let defaults = Self::default();
        let endpoints = ProviderEndpoints {
            address_validation: parse_string(
                "MAPS_ADDRESS_VALIDATION_URL",
                defaults.endpoints.address_validation,
            ),
            text_search: parse_string("MAPS_TEXT_SEARCH_URL", defaults.endpoints.text_search),
            find_place: parse_string("MAPS_FIND_PLACE_URL", defaults.endpoints.find_place),
            geolocate: parse_string("MAPS_GEOLOCATE_URL", defaults.endpoints.geolocate),
            nearby_search: parse_string(
                "MAPS_NEARBY_SEARCH_URL",
                defaults.endpoints.nearby_search,
            ),
            distance_matrix: parse_string(
                "MAPS_DISTANCE_MATRIX_URL",
                defaults.endpoints.distance_matrix,
            ),
        };
        let timeouts = ProviderTimeouts {
            address_validation_secs: parse_u64(
                "MAPS_ADDRESS_VALIDATION_TIMEOUT_SECS",
                defaults.timeouts.address_validation_secs,
            ),
            text_search_secs: parse_u64(
                "MAPS_TEXT_SEARCH_TIMEOUT_SECS",
                defaults.timeouts.text_search_secs,
            ),
            find_place_secs: parse_u64(
                "MAPS_FIND_PLACE_TIMEOUT_SECS",
                defaults.timeouts.find_place_secs,
            ),
            geolocate_secs: parse_u64(
                "MAPS_GEOLOCATE_TIMEOUT_SECS",
                defaults.timeouts.geolocate_secs,
            ),
            nearby_search_secs: parse_u64(
                "MAPS_NEARBY_SEARCH_TIMEOUT_SECS",
                defaults.timeouts.nearby_search_secs,
            ),
            distance_matrix_secs: parse_u64(
                "MAPS_DISTANCE_MATRIX_TIMEOUT_SECS",
                defaults.timeouts.distance_matrix_secs,
            ),
        };

        Self {
            maps_api_key: env::var("MAPS_API_KEY")
                .or_else(|_| env::var("GOMAPS_PRO_API_KEY"))
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            endpoints,
            timeouts,
            region: RegionBias {
                region_code: parse_string("MAPS_REGION_CODE", defaults.region.region_code),
                country_name: parse_string("MAPS_COUNTRY_NAME", defaults.region.country_name),
            },
            radii: SearchRadii {
                facility_search_m: parse_u32(
                    "FACILITY_SEARCH_RADIUS_M",
                    defaults.radii.facility_search_m,
                ),
                area_find_place_m: parse_u32(
                    "AREA_FIND_PLACE_RADIUS_M",
                    defaults.radii.area_find_place_m,
                ),
                area_text_search_m: parse_u32(
                    "AREA_TEXT_SEARCH_RADIUS_M",
                    defaults.radii.area_text_search_m,
                ),
            },
            bind_addr: parse_string("BIND_ADDR", defaults.bind_addr),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            endpoints: self.endpoints.clone(),
            timeouts: self.timeouts,
            region: self.region.clone(),
            radii: self.radii,
            bind_addr: self.bind_addr.clone(),
            has_maps_api_key: self.maps_api_key.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_string(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

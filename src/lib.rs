mod api;
mod config;
mod errors;
mod facilities;
mod geocode;
mod model;
mod normalize;
mod pipeline;
mod provider;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use api::{build_router, AppState, ErrorBody, HealthReport};
pub use config::{
    AppConfig, ProviderEndpoints, ProviderTimeouts, PublicAppConfig, RegionBias, SearchRadii,
};
pub use errors::{AppError, AppResult, ProviderError, ResolveError};
pub use facilities::{pair_and_sort, DistanceRanker, FacilityFinder, FACILITY_KEYWORDS};
pub use geocode::{
    cascade, CityAreaResolver, GeocodeResolver, GeocodeStrategy, LookupOutcome, Resolution,
};
pub use model::{
    Coordinate, DebugTrail, FacilityCandidate, GeocodeAttempt, GeocodeProvider, LocationBias,
    NormalizedQuery, RankedFacility, ResolutionResult, ResolutionStage,
};
pub use normalize::{collapse_whitespace, normalize_place_name, split_jammed_variant, Normalizer};
pub use pipeline::{LocationQuery, Orchestrator, FULLER_ADDRESS_HINT};
pub use provider::{
    HttpMapsClient, MapsProvider, MatrixElement, Measure, ProviderReply, ProviderResult,
};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,dumpyard_finder=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}

//! Candidate facility search and travel-time ranking.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::model::{Coordinate, FacilityCandidate, RankedFacility};
use crate::provider::{MapsProvider, MatrixElement};

/// Keyword filter sent to nearby search; `|` separates alternatives.
pub const FACILITY_KEYWORDS: &str = "waste management center|dump yard|dumping site|landfill|garbage depot|recycling center|recycle|municipal waste|solid waste";

const ELEMENT_OK: &str = "OK";

#[derive(Clone)]
pub struct FacilityFinder {
    maps: Arc<dyn MapsProvider>,
    radius_m: u32,
}

impl FacilityFinder {
    pub fn new(maps: Arc<dyn MapsProvider>, radius_m: u32) -> Self {
        Self { maps, radius_m }
    }

    pub async fn find_nearby(&self, origin: Coordinate) -> Vec<FacilityCandidate> {
        self.find_within(origin, self.radius_m).await
    }

    /// Only the first results page is used. Provider failure and an empty
    /// page both yield an empty list.
    pub async fn find_within(&self, origin: Coordinate, radius_m: u32) -> Vec<FacilityCandidate> {
        match self
            .maps
            .nearby_search(origin, radius_m, FACILITY_KEYWORDS)
            .await
        {
            Ok(reply) => {
                debug!(
                    count = reply.value.len(),
                    status = ?reply.provider_status,
                    "nearby search returned candidates"
                );
                reply.value
            }
            Err(err) => {
                warn!(?err, "nearby search failed; continuing without candidates");
                Vec::new()
            }
        }
    }
}

#[derive(Clone)]
pub struct DistanceRanker {
    maps: Arc<dyn MapsProvider>,
}

impl DistanceRanker {
    pub fn new(maps: Arc<dyn MapsProvider>) -> Self {
        Self { maps }
    }

    /// One batched distance lookup for all candidates, ordered by travel time
    /// then distance. Never calls the provider for an empty candidate list.
    pub async fn rank(
        &self,
        origin: Coordinate,
        candidates: Vec<FacilityCandidate>,
    ) -> Vec<RankedFacility> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let destinations: Vec<Coordinate> = candidates.iter().map(|c| c.location).collect();
        match self.maps.distance_matrix(origin, &destinations).await {
            Ok(reply) => pair_and_sort(candidates, reply.value),
            Err(err) => {
                warn!(?err, "distance matrix failed; no facilities can be ranked");
                Vec::new()
            }
        }
    }
}

/// Pairs matrix elements with candidates by position, drops every element
/// whose status is not `OK`, and sorts by `(duration, distance)`. The sort is
/// stable so equal keys keep provider order.
pub fn pair_and_sort(
    candidates: Vec<FacilityCandidate>,
    elements: Vec<MatrixElement>,
) -> Vec<RankedFacility> {
    let mut ranked: Vec<RankedFacility> = candidates
        .into_iter()
        .zip(elements)
        .filter_map(|(candidate, element)| {
            if element.status != ELEMENT_OK {
                trace!(place_id = %candidate.place_id, status = %element.status, "skipping unreachable facility");
                return None;
            }
            let (distance, duration) = (element.distance?, element.duration?);
            Some(RankedFacility {
                candidate,
                distance_text: distance.text,
                distance_meters: distance.value,
                duration_text: duration.text,
                duration_seconds: duration.value,
            })
        })
        .collect();

    ranked.sort_by_key(|facility| (facility.duration_seconds, facility.distance_meters));
    ranked
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::errors::ProviderError;
    use crate::geocode::testing::ScriptedMaps;
    use crate::provider::{Measure, ProviderReply};

    fn candidate(id: &str) -> FacilityCandidate {
        FacilityCandidate {
            place_id: id.to_string(),
            name: format!("Facility {id}"),
            vicinity: "Ahmedabad".to_string(),
            location: Coordinate::new(23.0, 72.5),
            rating: Some(4.1),
        }
    }

    fn element(status: &str, meters: u64, seconds: u64) -> MatrixElement {
        MatrixElement {
            status: status.to_string(),
            distance: Some(Measure {
                text: format!("{meters} m"),
                value: meters,
            }),
            duration: Some(Measure {
                text: format!("{seconds} s"),
                value: seconds,
            }),
        }
    }

    #[test]
    fn drops_non_ok_elements_and_orders_by_duration() {
        let ranked = pair_and_sort(
            vec![candidate("a"), candidate("b"), candidate("c")],
            vec![
                element("OK", 5_000, 600),
                element("OK", 7_000, 300),
                MatrixElement {
                    status: "ZERO_RESULTS".to_string(),
                    distance: None,
                    duration: None,
                },
            ],
        );

        let durations: Vec<_> = ranked.iter().map(|r| r.duration_seconds).collect();
        assert_eq!(durations, vec![300, 600]);
        assert_eq!(ranked[0].candidate.place_id, "b");
    }

    #[test]
    fn equal_durations_break_ties_on_distance() {
        let ranked = pair_and_sort(
            vec![candidate("far"), candidate("near")],
            vec![element("OK", 1_000, 400), element("OK", 900, 400)],
        );

        assert_eq!(ranked[0].candidate.place_id, "near");
        assert_eq!(ranked[0].distance_meters, 900);
        assert_eq!(ranked[1].candidate.place_id, "far");
    }

    #[test]
    fn fully_equal_keys_keep_provider_order() {
        let ranked = pair_and_sort(
            vec![candidate("first"), candidate("second")],
            vec![element("OK", 800, 200), element("OK", 800, 200)],
        );
        let ids: Vec<_> = ranked.iter().map(|r| r.candidate.place_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn empty_candidates_skip_the_provider() {
        let maps = Arc::new(ScriptedMaps::default());
        let ranked = DistanceRanker::new(maps.clone())
            .rank(Coordinate::new(23.0, 72.5), Vec::new())
            .await;
        assert!(ranked.is_empty());
        assert!(maps.calls().is_empty());
    }

    #[tokio::test]
    async fn nearby_failure_degrades_to_empty_list() {
        let maps = Arc::new(
            ScriptedMaps::default()
                .with_nearby(Err(ProviderError::Unreachable("connection reset".to_string()))),
        );
        let finder = FacilityFinder::new(maps, 15_000);
        assert!(finder.find_nearby(Coordinate::new(23.0, 72.5)).await.is_empty());
    }

    #[tokio::test]
    async fn zero_results_is_an_empty_list() {
        let maps = Arc::new(ScriptedMaps::default().with_nearby(Ok(ProviderReply {
            http_status: 200,
            provider_status: Some("ZERO_RESULTS".to_string()),
            error_message: None,
            value: Vec::new(),
        })));
        let finder = FacilityFinder::new(maps.clone(), 15_000);
        assert!(finder.find_nearby(Coordinate::new(23.0, 72.5)).await.is_empty());
        assert_eq!(maps.calls().len(), 1);
    }
}

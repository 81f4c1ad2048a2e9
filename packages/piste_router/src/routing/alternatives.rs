//! Approximate k-shortest-paths. Each substantial part of the primary route
//! is taken out of the graph in turn, and whatever the search comes up with
//! instead is kept if it is not too slow, and not too similar to the routes
//! already found.

use rayon::prelude::*;
use tracing::debug;

use crate::common::graph_data::{EdgeType, NavigationGraph};
use crate::routing::dijkstra::find_route;
use crate::routing::structs::{NavigationRoute, RouteSegment};

/// Alternatives may take at most this many times as long as the primary
/// route, unless the caller says otherwise
pub const DEFAULT_TOLERANCE: f64 = 1.5;

/// Segments shorter than this are not worth routing around
const MIN_SEGMENT_LENGTH: f64 = 200.0;

/// Routes sharing this proportion of their edges count as the same route
const MAX_OVERLAP: f64 = 0.8;

/// Determine the level of similarity between two routes based on the degree
/// of crossover between the edges in each
fn get_overlap(r1: &NavigationRoute, r2: &NavigationRoute) -> f64 {
    let (e1, e2) = (r1.edge_set(), r2.edge_set());
    let union = e1.union(&e2).count() as f64;
    if union == 0.0 {
        return 1.0;
    }
    let intersection = e1.intersection(&e2).count() as f64;
    intersection / union
}

/// Check whether the provided route is below the overlap threshold for
/// every route which has already been selected
fn is_dissimilar(
    route: &NavigationRoute,
    selected: &[NavigationRoute],
) -> bool {
    selected
        .iter()
        .all(|other| get_overlap(route, other) < MAX_OVERLAP)
}

/// A copy of the graph with one part of the primary route taken out. For
/// lifts and runs the whole feature goes, walks only lose their own edges.
fn without_segment(
    graph: &NavigationGraph,
    segment: &RouteSegment,
) -> NavigationGraph {
    match segment.segment_type {
        EdgeType::Walk => {
            graph.retain_edges(|edge| !segment.edge_ids.contains(&edge.id))
        }
        EdgeType::Lift | EdgeType::Run => {
            graph.retain_edges(|edge| edge.feature_id != segment.feature_id)
        }
    }
}

/// Find up to one alternative for every segment of the primary route longer
/// than 200m. Alternatives take no more than `tolerance` times as long as
/// the primary, share less than 80% of their edges with it or with each
/// other, and are returned quickest first.
pub fn find_alternative_routes(
    graph: &NavigationGraph,
    primary: &NavigationRoute,
    tolerance: f64,
) -> Vec<NavigationRoute> {
    if primary.is_empty() {
        return Vec::new();
    }

    let mut targets: Vec<&RouteSegment> = Vec::new();
    for segment in primary.segments.iter() {
        if segment.distance <= MIN_SEGMENT_LENGTH {
            continue;
        }
        // Removing a feature once is enough, however often it is used
        let seen = targets.iter().any(|target| {
            segment.segment_type != EdgeType::Walk
                && target.segment_type == segment.segment_type
                && target.feature_id == segment.feature_id
        });
        if !seen {
            targets.push(segment);
        }
    }

    let max_time = primary.metrics.total_time * tolerance;

    let mut candidates: Vec<NavigationRoute> = targets
        .into_par_iter()
        .filter_map(|segment| {
            let reduced = without_segment(graph, segment);
            find_route(&reduced, &primary.from, &primary.to)
        })
        .filter(|route| route.metrics.total_time <= max_time)
        .collect();

    candidates.sort_by(|a, b| {
        a.metrics.total_time.total_cmp(&b.metrics.total_time)
    });

    let mut selected = vec![primary.clone()];
    for candidate in candidates {
        if is_dissimilar(&candidate, &selected) {
            selected.push(candidate);
        }
    }

    // Take the primary route back out of the selection
    let alternatives: Vec<NavigationRoute> =
        selected.into_iter().skip(1).collect();
    debug!(count = alternatives.len(), "found alternative routes");
    alternatives
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::common::config::GraphConfig;
    use crate::common::fixtures::{get_lift_and_run_graph, get_test_resort};
    use crate::common::graph_data::NodeId;
    use crate::loading::builder::build_graph;

    fn node(raw: &str) -> NodeId {
        NodeId::parse(raw)
    }

    fn uses_feature(route: &NavigationRoute, feature_id: &str) -> bool {
        route
            .segments
            .iter()
            .any(|segment| segment.feature_id == feature_id)
    }

    /// Taking the black run out leaves the blue run as the way back down
    #[test]
    fn test_find_alternative_routes() {
        let area = get_test_resort();
        let graph = build_graph(&area, &GraphConfig::default());
        let primary =
            find_route(&graph, &node("lift-L1-end"), &node("lift-L1-start"))
                .unwrap();
        assert!(uses_feature(&primary, "R2"));

        let alternatives =
            find_alternative_routes(&graph, &primary, DEFAULT_TOLERANCE);

        assert_eq!(alternatives.len(), 1);
        let alternative = &alternatives[0];
        assert!(uses_feature(alternative, "R1"));
        assert!(!uses_feature(alternative, "R2"));
        assert!(alternative.metrics.total_time > primary.metrics.total_time);
        assert!(
            alternative.metrics.total_time
                <= primary.metrics.total_time * DEFAULT_TOLERANCE
        );
        assert!(get_overlap(alternative, &primary) < MAX_OVERLAP);
    }

    /// Nothing qualifies when no extra time is allowed
    #[test]
    fn test_tolerance() {
        let area = get_test_resort();
        let graph = build_graph(&area, &GraphConfig::default());
        let primary =
            find_route(&graph, &node("lift-L1-end"), &node("lift-L1-start"))
                .unwrap();

        let alternatives = find_alternative_routes(&graph, &primary, 1.0);

        assert!(alternatives.is_empty());
    }

    /// With only one way down, there is nothing else to offer
    #[test]
    fn test_no_alternative() {
        let graph = get_lift_and_run_graph();
        let primary =
            find_route(&graph, &node("lift-L1-start"), &node("run-R1-end"))
                .unwrap();

        let alternatives =
            find_alternative_routes(&graph, &primary, DEFAULT_TOLERANCE);

        assert!(alternatives.is_empty());
    }

    #[test]
    fn test_get_overlap() {
        let graph = get_lift_and_run_graph();
        let full =
            find_route(&graph, &node("lift-L1-start"), &node("run-R1-end"))
                .unwrap();
        let lift_only =
            find_route(&graph, &node("lift-L1-start"), &node("lift-L1-end"))
                .unwrap();

        assert_eq!(get_overlap(&full, &full), 1.0);
        // Only the lift edge is shared, the transfer at the top is too short
        // to count as part of the route
        let expected = 1.0 / full.edge_set().len() as f64;
        assert_eq!(get_overlap(&full, &lift_only), expected);
        assert!(is_dissimilar(&lift_only, &[full.clone()]));
        assert!(!is_dissimilar(&full, &[full.clone()]));
    }
}

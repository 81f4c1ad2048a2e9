//! Explains why a route could not be found. None of this changes the graph,
//! it only looks at what can be reached from the origin and how far that
//! falls short of the destination.

use petgraph::visit::Bfs;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::info;

use crate::common::geometry::haversine;
use crate::common::graph_data::{NavigationGraph, NavigationNode, NodeId};
use crate::common::resort::SkiArea;
use crate::routing::dijkstra::find_route;
use crate::routing::structs::NavigationRoute;

/// Gaps wider than this can't reasonably be covered on foot
pub const MAX_WALKABLE_GAP: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The origin or destination is not part of the graph
    NodeNotFound,
    /// The closest the skier can get is still too far from the destination
    TooFarToWalk,
    /// Origin and destination are in different sectors of the resort
    DifferentRegion,
    Unreachable,
}

/// Everything known about a failed search, for presenting to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteFailureDiagnostics {
    pub reason: FailureReason,
    pub start_node_exists: bool,
    pub end_node_exists: bool,
    /// Number of nodes which can be reached from the origin, including itself
    pub reachable_node_count: usize,
    /// The reachable node closest to the destination
    pub nearest_reachable_node: Option<NodeId>,
    /// Great-circle distance from the nearest reachable node to the
    /// destination
    pub nearest_reachable_distance: Option<f64>,
    /// Destination elevation minus that of the nearest reachable node
    pub elevation_gap: Option<f64>,
    pub origin_region: Option<String>,
    pub destination_region: Option<String>,
    pub suggestions: Vec<String>,
}

/// Result of a search which reports why it failed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOutcome {
    Found(NavigationRoute),
    Failed(RouteFailureDiagnostics),
}

/// Every node which can be reached from `start`, in breadth first order
fn get_reachable_nodes<'a>(
    graph: &'a NavigationGraph,
    start: &NodeId,
) -> Vec<&'a NavigationNode> {
    let Some(start_inx) = graph.node_index(start) else {
        return Vec::new();
    };

    let mut reachable = Vec::new();
    let mut bfs = Bfs::new(&graph.graph, start_inx);
    while let Some(inx) = bfs.next(&graph.graph) {
        if let Some(node) = graph.graph.node_weight(inx) {
            reachable.push(node);
        }
    }
    reachable
}

fn region_of(
    ski_area: &SkiArea,
    node: Option<&NavigationNode>,
) -> Option<String> {
    node.and_then(|node| ski_area.locality_of(&node.feature_id))
        .map(String::from)
}

fn get_suggestions(
    reason: FailureReason,
    diagnostics: &RouteFailureDiagnostics,
) -> Vec<String> {
    match reason {
        FailureReason::NodeNotFound => {
            let mut suggestions = Vec::new();
            if !diagnostics.start_node_exists {
                suggestions.push(
                    "The starting point is not on the resort map, try picking \
                     it again"
                        .to_string(),
                );
            }
            if !diagnostics.end_node_exists {
                suggestions.push(
                    "The destination is not on the resort map, try picking \
                     it again"
                        .to_string(),
                );
            }
            suggestions
        }
        FailureReason::TooFarToWalk => {
            let gap =
                diagnostics.nearest_reachable_distance.unwrap_or_default();
            vec![
                format!(
                    "The closest you can get is {gap:.0}m from your \
                     destination, which is too far to walk"
                ),
                "Check whether a lift or run in between is closed or \
                 excluded by your filters"
                    .to_string(),
                "Consider taking a shuttle bus or other transport".to_string(),
            ]
        }
        FailureReason::DifferentRegion => {
            let origin = diagnostics.origin_region.as_deref().unwrap_or("?");
            let destination =
                diagnostics.destination_region.as_deref().unwrap_or("?");
            vec![
                format!(
                    "{origin} and {destination} are not connected by any \
                     open lift or run"
                ),
                format!(
                    "Find a link between {origin} and {destination} on the \
                     piste map"
                ),
            ]
        }
        FailureReason::Unreachable => vec![
            "Try allowing more run difficulties or lift types".to_string(),
            "Try picking a different starting point".to_string(),
        ],
    }
}

/// Work out why there is no route from start to end
pub fn diagnose_failure(
    graph: &NavigationGraph,
    ski_area: &SkiArea,
    start: &NodeId,
    end: &NodeId,
) -> RouteFailureDiagnostics {
    let start_node = graph.node(start);
    let end_node = graph.node(end);
    let reachable = get_reachable_nodes(graph, start);

    let reachable_ids: FxHashSet<&NodeId> =
        reachable.iter().map(|node| &node.id).collect();
    let nearest = end_node.and_then(|target| {
        let target_pos = target.position();
        let node = graph.nearest_node_by(&target_pos, |node| {
            reachable_ids.contains(&node.id)
        })?;
        let dist = haversine(&node.position(), &target_pos);
        Some((node, dist, target.elevation - node.elevation))
    });

    let origin_region = region_of(ski_area, start_node);
    let destination_region = region_of(ski_area, end_node);

    let reason = if start_node.is_none() || end_node.is_none() {
        FailureReason::NodeNotFound
    } else if nearest.is_some_and(|(_, dist, _)| dist > MAX_WALKABLE_GAP) {
        FailureReason::TooFarToWalk
    } else if matches!(
        (&origin_region, &destination_region),
        (Some(origin), Some(destination)) if origin != destination
    ) {
        FailureReason::DifferentRegion
    } else {
        FailureReason::Unreachable
    };

    let mut diagnostics = RouteFailureDiagnostics {
        reason,
        start_node_exists: start_node.is_some(),
        end_node_exists: end_node.is_some(),
        reachable_node_count: reachable.len(),
        nearest_reachable_node: nearest.map(|(node, _, _)| node.id.clone()),
        nearest_reachable_distance: nearest.map(|(_, dist, _)| dist),
        elevation_gap: nearest.map(|(_, _, gap)| gap),
        origin_region,
        destination_region,
        suggestions: Vec::new(),
    };
    diagnostics.suggestions = get_suggestions(reason, &diagnostics);

    diagnostics
}

/// Find the quickest route between two nodes, explaining the failure if
/// there isn't one
pub fn find_route_with_diagnostics(
    graph: &NavigationGraph,
    ski_area: &SkiArea,
    start: &NodeId,
    end: &NodeId,
) -> RouteOutcome {
    match find_route(graph, start, end) {
        Some(route) => RouteOutcome::Found(route),
        None => {
            let diagnostics = diagnose_failure(graph, ski_area, start, end);
            info!(
                %start,
                %end,
                reason = ?diagnostics.reason,
                "no route found"
            );
            RouteOutcome::Failed(diagnostics)
        }
    }
}

#[cfg(test)]
mod tests {

    use approx::assert_relative_eq;

    use super::*;
    use crate::common::config::GraphConfig;
    use crate::common::fixtures::{
        get_lift_and_run_graph, get_test_resort, line_run, pos,
    };
    use crate::common::resort::{Difficulty, Run};
    use crate::loading::builder::build_graph;

    fn node(raw: &str) -> NodeId {
        NodeId::parse(raw)
    }

    /// Two parallel runs c. 450m apart, with no way across
    fn get_split_area(north: &str, south: &str) -> SkiArea {
        let with_locality = |run: Run, locality: &str| Run {
            locality: Some(locality.to_string()),
            ..run
        };
        SkiArea {
            id: "split".to_string(),
            name: "Split".to_string(),
            runs: vec![
                with_locality(
                    line_run(
                        "X",
                        Difficulty::Easy,
                        vec![pos(0.0, 0.01, 2000.0), pos(0.0, 0.0, 1000.0)],
                    ),
                    north,
                ),
                with_locality(
                    line_run(
                        "Y",
                        Difficulty::Easy,
                        vec![pos(0.004, 0.01, 2000.0), pos(0.004, 0.0, 1000.0)],
                    ),
                    south,
                ),
            ],
            lifts: Vec::new(),
        }
    }

    /// A successful search needs no explanation
    #[test]
    fn test_found() {
        let graph = get_lift_and_run_graph();
        let area = get_test_resort();

        let outcome = find_route_with_diagnostics(
            &graph,
            &area,
            &node("lift-L1-start"),
            &node("run-R1-end"),
        );

        assert!(matches!(outcome, RouteOutcome::Found(_)));
    }

    /// A destination which isn't in the graph is reported as such
    #[test]
    fn test_missing_destination() {
        let graph = get_lift_and_run_graph();
        let area = get_test_resort();

        let outcome = find_route_with_diagnostics(
            &graph,
            &area,
            &node("lift-L1-start"),
            &node("run-NOPE-end"),
        );

        let RouteOutcome::Failed(diagnostics) = outcome else {
            panic!("expected a failure");
        };
        assert_eq!(diagnostics.reason, FailureReason::NodeNotFound);
        assert!(diagnostics.start_node_exists);
        assert!(!diagnostics.end_node_exists);
        assert_eq!(diagnostics.nearest_reachable_node, None);
        assert_eq!(diagnostics.suggestions.len(), 1);
    }

    /// The glacier sector is kilometres from the village
    #[test]
    fn test_too_far_to_walk() {
        let area = get_test_resort();
        let graph = build_graph(&area, &GraphConfig::default());

        let diagnostics = diagnose_failure(
            &graph,
            &area,
            &node("lift-L1-start"),
            &node("run-R3-end"),
        );

        assert_eq!(diagnostics.reason, FailureReason::TooFarToWalk);
        assert!(diagnostics.nearest_reachable_distance.unwrap() > 7000.0);
        assert_eq!(diagnostics.origin_region.as_deref(), Some("Village"));
        assert_eq!(diagnostics.destination_region.as_deref(), Some("Glacier"));
        assert!(diagnostics.reachable_node_count > 1);

        // Nothing in the village gets closer than the bottom of the blue run
        assert_eq!(
            diagnostics.nearest_reachable_node,
            Some(node("run-R1-end"))
        );
        assert_relative_eq!(diagnostics.elevation_gap.unwrap(), 1000.0);
    }

    /// Close enough to walk, but the sectors aren't joined up
    #[test]
    fn test_different_region() {
        let area = get_split_area("North", "South");
        let graph = build_graph(&area, &GraphConfig::default());

        let diagnostics = diagnose_failure(
            &graph,
            &area,
            &node("run-X-start"),
            &node("run-Y-end"),
        );

        assert_eq!(diagnostics.reason, FailureReason::DifferentRegion);
        assert_eq!(diagnostics.nearest_reachable_node, Some(node("run-X-end")));
        assert!(diagnostics.nearest_reachable_distance.unwrap() < 500.0);
        assert_relative_eq!(diagnostics.elevation_gap.unwrap(), 0.0);
        assert!(diagnostics.suggestions[0].contains("North"));
    }

    #[test]
    fn test_unreachable() {
        let area = get_split_area("Centre", "Centre");
        let graph = build_graph(&area, &GraphConfig::default());

        let outcome = find_route_with_diagnostics(
            &graph,
            &area,
            &node("run-X-start"),
            &node("run-Y-end"),
        );

        let RouteOutcome::Failed(diagnostics) = outcome else {
            panic!("expected a failure");
        };
        assert_eq!(diagnostics.reason, FailureReason::Unreachable);
        assert!(!diagnostics.suggestions.is_empty());
    }

    /// Reachability follows edge direction, runs can't be skied uphill
    #[test]
    fn test_reachable_nodes() {
        let graph = get_lift_and_run_graph();

        let from_bottom = get_reachable_nodes(&graph, &node("lift-L1-start"));
        let from_end = get_reachable_nodes(&graph, &node("run-R1-end"));

        assert_eq!(from_bottom.len(), graph.node_count());
        assert_eq!(from_end.len(), 1);
        assert!(get_reachable_nodes(&graph, &node("nowhere")).is_empty());
    }
}

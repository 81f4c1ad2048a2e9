//! Ties the rest of the crate together to answer a single route request:
//! filter the shared graph, add the user's start and end points, search,
//! then tidy up the result or explain why there isn't one.

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{info, warn};

use crate::common::config::{
    GraphConfig, RouteEndpoint, RouteRequest, WalkConfig,
};
use crate::common::graph_data::{EdgeType, NavigationGraph, NodeId};
use crate::common::resort::{LiveStatus, SkiArea};
use crate::loading::filters::{apply_live_status, filter_graph};
use crate::loading::insertion::{add_arbitrary_point, add_poi_node, locate};
use crate::routing::alternatives::find_alternative_routes;
use crate::routing::diagnostics::{RouteFailureDiagnostics, diagnose_failure};
use crate::routing::dijkstra::{find_route, find_route_with_arrival_times};
use crate::routing::optimise::{cleanup_segments, optimize_route};
use crate::routing::structs::NavigationRoute;

/// Everything produced in response to a route request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    pub route: Option<NavigationRoute>,
    pub alternatives: Vec<NavigationRoute>,
    /// Closed or closing features used by a route which had to ignore the
    /// live status in order to get anywhere
    pub warnings: Vec<String>,
    /// Present only when no route could be found
    pub diagnostics: Option<RouteFailureDiagnostics>,
    /// Whether the route respects the live status of the resort
    pub live_status_applied: bool,
}

/// Get the node for one end of the route, adding it to the graph if it is
/// not already there
fn resolve_endpoint(
    graph: NavigationGraph,
    endpoint: &RouteEndpoint,
    walk: &WalkConfig,
) -> (NodeId, NavigationGraph) {
    match endpoint {
        RouteEndpoint::Node { node_id } => (node_id.clone(), graph),
        RouteEndpoint::MapPoint {
            id,
            lng,
            lat,
            elevation,
        } => {
            let pos = locate(&graph, *lng, *lat, *elevation);
            add_arbitrary_point(graph, id, &pos, walk)
        }
        RouteEndpoint::Poi {
            id,
            name,
            lng,
            lat,
            elevation,
        } => {
            let pos = locate(&graph, *lng, *lat, *elevation);
            add_poi_node(graph, id, name.as_deref(), &pos, walk)
        }
    }
}

/// Describe every closed or soon to close run and lift along a route. A
/// feature is closing soon if it stops running within `buffer_minutes` of
/// being reached.
fn get_status_warnings(
    route: &NavigationRoute,
    status: &LiveStatus,
    departure_offset: f64,
    buffer_minutes: f64,
) -> Vec<String> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut warnings = Vec::new();

    for segment in route.segments.iter() {
        if segment.segment_type == EdgeType::Walk
            || !seen.insert(segment.feature_id.as_str())
        {
            continue;
        }
        let name = segment.name.as_deref().unwrap_or(&segment.feature_id);

        if status.is_closed(&segment.feature_id) {
            warnings.push(format!("{name} is closed"));
            continue;
        }
        let closes_in = status.minutes_until_close.get(&segment.feature_id);
        if let Some(closes_in) = closes_in {
            let arrival = (departure_offset + segment.start_time) / 60.0;
            if arrival >= closes_in - buffer_minutes {
                warnings.push(format!(
                    "{name} closes in {closes_in:.0} minutes, and may not be \
                     running by the time you reach it"
                ));
            }
        }
    }

    warnings
}

/// Optimise and clean up a route for presentation
fn finalise(route: NavigationRoute, ski_area: &SkiArea) -> NavigationRoute {
    cleanup_segments(optimize_route(route, ski_area))
}

/// Plan a route across the resort. The base graph is never modified,
/// filtering and endpoint insertion work on a copy of it.
///
/// When live status is provided, only runs and lifts which will still be
/// open on arrival are used. If that rules out every route, the quickest
/// route ignoring the live status is returned along with warnings about the
/// features it relies on.
pub fn plan_route(
    base: &NavigationGraph,
    ski_area: &SkiArea,
    request: &RouteRequest,
    config: &GraphConfig,
) -> RoutePlan {
    let filtered = filter_graph(base, &request.filters);
    let (start, graph) =
        resolve_endpoint(filtered, &request.origin, &config.walk);
    let (end, graph) =
        resolve_endpoint(graph, &request.destination, &config.walk);

    let mut warnings = Vec::new();
    let mut live_status_applied = false;
    let mut search_graph = graph;

    let found = match &request.live_status {
        Some(status) => {
            let open = apply_live_status(&search_graph, status);
            let respecting = find_route_with_arrival_times(
                &open,
                &start,
                &end,
                status,
                request.departure_offset,
                request.closing_time_buffer,
            );
            match respecting {
                Some(route) => {
                    live_status_applied = true;
                    search_graph = open;
                    Some(route)
                }
                None => {
                    let fallback = find_route(&search_graph, &start, &end);
                    if let Some(route) = &fallback {
                        warn!(
                            %start,
                            %end,
                            "no route respects live status, ignoring it"
                        );
                        warnings.push(
                            "No route avoids closed or closing lifts and \
                             runs, this route ignores their status"
                                .to_string(),
                        );
                        warnings.extend(get_status_warnings(
                            route,
                            status,
                            request.departure_offset,
                            request.closing_time_buffer,
                        ));
                    }
                    fallback
                }
            }
        }
        None => find_route(&search_graph, &start, &end),
    };

    let Some(raw) = found else {
        let diagnostics =
            diagnose_failure(&search_graph, ski_area, &start, &end);
        info!(
            ski_area = %ski_area.id,
            %start,
            %end,
            reason = ?diagnostics.reason,
            "no route found"
        );
        return RoutePlan {
            route: None,
            alternatives: Vec::new(),
            warnings,
            diagnostics: Some(diagnostics),
            live_status_applied,
        };
    };

    let alternatives = match request.alternative_tolerance {
        Some(tolerance) => {
            find_alternative_routes(&search_graph, &raw, tolerance)
                .into_iter()
                .map(|route| finalise(route, ski_area))
                .collect()
        }
        None => Vec::new(),
    };

    let route = finalise(raw, ski_area);
    info!(
        ski_area = %ski_area.id,
        %start,
        %end,
        segments = route.segments.len(),
        total_time = route.metrics.total_time,
        "route found"
    );

    RoutePlan {
        route: Some(route),
        alternatives,
        warnings,
        diagnostics: None,
        live_status_applied,
    }
}

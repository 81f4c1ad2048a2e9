//! Restrict a navigation graph to what the user is willing or able to use.
//! Filtering never modifies the shared graph, a filtered copy is returned
//! instead so that the same cached graph can serve many requests.

use tracing::debug;

use crate::common::config::RouteFilters;
use crate::common::graph_data::{EdgeType, NavigationEdge, NavigationGraph};
use crate::common::resort::LiveStatus;

/// Whether an edge is permitted by the user's filters. Walking is always
/// allowed, runs and lifts must be one of the allowed kinds if a list has
/// been provided.
fn is_allowed(edge: &NavigationEdge, filters: &RouteFilters) -> bool {
    match edge.edge_type {
        EdgeType::Walk => true,
        EdgeType::Run => {
            match (&filters.allowed_difficulties, edge.difficulty) {
                (Some(allowed), Some(difficulty)) => {
                    allowed.contains(&difficulty)
                }
                (Some(_), None) => false,
                (None, _) => true,
            }
        }
        EdgeType::Lift => match (&filters.allowed_lift_types, edge.lift_type) {
            (Some(allowed), Some(lift_type)) => allowed.contains(&lift_type),
            (Some(_), None) => false,
            (None, _) => true,
        },
    }
}

/// Drop any run or lift edges which don't meet the user's preferences
pub fn filter_graph(
    graph: &NavigationGraph,
    filters: &RouteFilters,
) -> NavigationGraph {
    if filters.is_empty() {
        return graph.clone();
    }

    let filtered = graph.retain_edges(|edge| is_allowed(edge, filters));
    debug!(
        before = graph.edge_count(),
        after = filtered.edge_count(),
        "applied route filters"
    );
    filtered
}

/// Drop the edges of every run and lift which is currently closed. Walking
/// edges are unaffected.
pub fn apply_live_status(
    graph: &NavigationGraph,
    status: &LiveStatus,
) -> NavigationGraph {
    if status.closed_lifts.is_empty() && status.closed_runs.is_empty() {
        return graph.clone();
    }

    let filtered = graph.retain_edges(|edge| match edge.edge_type {
        EdgeType::Walk => true,
        EdgeType::Lift | EdgeType::Run => !status.is_closed(&edge.feature_id),
    });
    debug!(
        before = graph.edge_count(),
        after = filtered.edge_count(),
        "removed closed features"
    );
    filtered
}

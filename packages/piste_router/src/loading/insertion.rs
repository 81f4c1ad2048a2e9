//! Extend a navigation graph with the start and end points of a user's
//! route. Points of interest are connected to their surroundings on foot,
//! while points clicked on the map are snapped onto the nearest run where
//! possible so that the route can ski straight through them.
//!
//! Each function takes ownership of the graph and hands it back along with
//! the id of the inserted node. The caller is expected to pass in its own
//! copy of any shared graph.

use tracing::{debug, warn};

use crate::common::config::WalkConfig;
use crate::common::geometry::{
    Position, distance_3d, path_length, project_onto_segment,
    slice_by_distance,
};
use crate::common::graph_data::{
    EdgeType, NavigationEdge, NavigationGraph, NavigationNode, NodeId,
    NodeKind,
};
use crate::common::spatial::SegmentIndex;
use crate::loading::builder::connect_both_ways;

/// Snaps within this distance of either end of a run edge link to that end
/// instead of splitting the edge
const ENDPOINT_TOLERANCE: f64 = 1.0;

/// Fill in the elevation of a user supplied location. Where none is given,
/// the elevation of the closest node in the graph is used.
pub fn locate(
    graph: &NavigationGraph,
    lng: f64,
    lat: f64,
    elevation: Option<f64>,
) -> Position {
    let flat = Position::new(lng, lat, 0.0);
    let elevation = elevation.unwrap_or_else(|| {
        graph
            .nearest_node(&flat)
            .map(|node| node.elevation)
            .unwrap_or(0.0)
    });
    Position::new(lng, lat, elevation)
}

/// Connect a newly added node on foot to every other node within range,
/// returning the number of edges added
fn connect_nearby(
    graph: &mut NavigationGraph,
    id: &NodeId,
    radius: f64,
    max_elevation_diff: f64,
    walk: &WalkConfig,
) -> usize {
    let Some(pos) = graph.node(id).map(|node| node.position()) else {
        return 0;
    };

    let nearby: Vec<NodeId> = graph
        .nodes_within(&pos, radius)
        .into_iter()
        .filter(|node| &node.id != id)
        .filter(|node| {
            (pos.elevation - node.elevation).abs() <= max_elevation_diff
        })
        .map(|node| node.id.clone())
        .collect();

    nearby
        .iter()
        .map(|other| {
            connect_both_ways(graph, id, other, walk.poi_penalty, walk)
        })
        .sum()
}

/// Add a point of interest to the graph, linking it on foot to everything
/// within walking distance. Adding the same POI twice has no further effect.
pub fn add_poi_node(
    mut graph: NavigationGraph,
    poi_id: &str,
    name: Option<&str>,
    pos: &Position,
    walk: &WalkConfig,
) -> (NodeId, NavigationGraph) {
    let kind = NodeKind::Poi {
        poi_id: poi_id.to_string(),
    };
    let id = kind.id();
    if graph.contains(&id) {
        return (id, graph);
    }

    graph.add_node(NavigationNode::new(kind, pos, poi_id, name));
    let added = connect_nearby(
        &mut graph,
        &id,
        walk.poi_radius,
        walk.poi_max_elevation_diff,
        walk,
    );

    if added == 0 {
        warn!(node = %id, "point of interest has no walking connections");
    }

    (id, graph)
}

/// Closest point on any run edge to a location
struct Snap {
    edge_id: String,
    position: Position,
    /// 3d distance along the edge's geometry to the snapped point
    along: f64,
    /// Horizontal distance from the location to the snapped point
    distance: f64,
}

/// One straight piece of a run edge's geometry
struct RunSegment<'a> {
    /// Position among all run segments, in graph order
    order: usize,
    edge: &'a NavigationEdge,
    start: Position,
    end: Position,
    /// 3d distance along the edge to the start of the segment
    travelled: f64,
}

/// Closest point on any run edge within `max_distance` of a location. Ties
/// go to the edge added to the graph first.
fn find_snap(
    graph: &NavigationGraph,
    pos: &Position,
    max_distance: f64,
) -> Option<Snap> {
    let mut segments = Vec::new();
    for edge in graph.edges().filter(|e| e.edge_type == EdgeType::Run) {
        let mut travelled = 0.0;
        for w in edge.coordinates.windows(2) {
            let segment = RunSegment {
                order: segments.len(),
                edge,
                start: w[0],
                end: w[1],
                travelled,
            };
            segments.push((w[0], w[1], segment));
            travelled += distance_3d(&w[0], &w[1]);
        }
    }
    let index = SegmentIndex::bulk_load(segments);

    let mut candidates: Vec<&RunSegment> =
        index.candidates(pos, max_distance).collect();
    candidates.sort_by_key(|segment| segment.order);

    let mut best: Option<Snap> = None;
    for segment in candidates {
        let projection =
            project_onto_segment(pos, &segment.start, &segment.end);
        if projection.distance > max_distance {
            continue;
        }

        let closer = match &best {
            Some(snap) => projection.distance < snap.distance,
            None => true,
        };
        if closer {
            let step = distance_3d(&segment.start, &segment.end);
            best = Some(Snap {
                edge_id: segment.edge.id.clone(),
                position: projection.position,
                along: segment.travelled + projection.fraction * step,
                distance: projection.distance,
            });
        }
    }

    best
}

/// Build one half of a split run edge
fn split_part(
    edge: &NavigationEdge,
    suffix: &str,
    from: &NodeId,
    to: &NodeId,
    coordinates: Vec<Position>,
) -> NavigationEdge {
    let distance = path_length(&coordinates);
    let elevation_change = match (coordinates.first(), coordinates.last()) {
        (Some(first), Some(last)) => last.elevation - first.elevation,
        _ => 0.0,
    };

    NavigationEdge {
        id: format!("{}-{}", edge.id, suffix),
        from: from.clone(),
        to: to.clone(),
        distance,
        elevation_change,
        travel_time: distance / edge.speed,
        coordinates,
        ..edge.clone()
    }
}

/// Replace a run edge with two edges which meet at the provided node
fn split_edge(
    graph: &mut NavigationGraph,
    edge: NavigationEdge,
    id: &NodeId,
    at: &Snap,
) {
    let mut before = slice_by_distance(&edge.coordinates, 0.0, at.along);
    let mut after =
        slice_by_distance(&edge.coordinates, at.along, edge.distance);

    // Both halves must meet exactly at the new node
    if let Some(last) = before.last_mut() {
        *last = at.position;
    }
    if let Some(first) = after.first_mut() {
        *first = at.position;
    }

    let first_half = split_part(&edge, "a", &edge.from, id, before);
    let second_half = split_part(&edge, "b", id, &edge.to, after);

    debug!(edge = %edge.id, node = %id, "split run edge");
    graph.add_edge(first_half);
    graph.add_edge(second_half);
}

/// Add a point clicked on the map. Points close enough to a run are snapped
/// onto it, splitting the run edge so that the point lies on the run itself.
/// Anything else is connected on foot to the surrounding nodes. Adding the
/// same point twice has no further effect.
pub fn add_arbitrary_point(
    mut graph: NavigationGraph,
    point_id: &str,
    pos: &Position,
    walk: &WalkConfig,
) -> (NodeId, NavigationGraph) {
    let kind = NodeKind::MapPoint {
        point_id: point_id.to_string(),
    };
    let id = kind.id();
    if graph.contains(&id) {
        return (id, graph);
    }

    let Some(snap) = find_snap(&graph, pos, walk.snap_distance) else {
        graph.add_node(NavigationNode::new(kind, pos, point_id, None));
        let added = connect_nearby(
            &mut graph,
            &id,
            walk.map_point_radius,
            walk.map_point_max_elevation_diff,
            walk,
        );
        if added == 0 {
            warn!(node = %id, "map point has no walking connections");
        }
        return (id, graph);
    };

    let Some(edge) = graph.remove_edge_by_id(&snap.edge_id) else {
        return (id, graph);
    };

    graph.add_node(NavigationNode::new(
        kind,
        &snap.position,
        &edge.feature_id,
        edge.feature_name.as_deref(),
    ));

    let endpoint = if snap.along < ENDPOINT_TOLERANCE {
        Some(edge.from.clone())
    } else if edge.distance - snap.along < ENDPOINT_TOLERANCE {
        Some(edge.to.clone())
    } else {
        None
    };

    match endpoint {
        Some(endpoint) => {
            graph.add_edge(edge);
            connect_both_ways(
                &mut graph,
                &id,
                &endpoint,
                walk.poi_penalty,
                walk,
            );
        }
        None => split_edge(&mut graph, edge, &id, &snap),
    }

    (id, graph)
}

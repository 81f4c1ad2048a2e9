//! Based on the runs and lifts of a resort, generate the navigation graph
//! which is used for route plotting. Lifts become a single edge from their
//! base to their top station, runs become a downhill chain of short edges,
//! and nearby features are tied together with walking connections.

use petgraph::stable_graph::NodeIndex;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::common::config::{GraphConfig, WalkConfig};
use crate::common::geometry::{
    Position, distance_3d, haversine, path_length, split_evenly,
};
use crate::common::graph_data::{
    EdgeType, NavigationEdge, NavigationGraph, NavigationNode, NodeId,
    NodeKind, NodeType,
};
use crate::common::resort::{Geometry, Lift, Run, SkiArea};

/// Paths shorter than this are treated as degenerate
const MIN_PATH_LENGTH: f64 = 0.5;

/// Feature id carried by all walking edges
pub const WALK_FEATURE_ID: &str = "walk";

/// Build the full navigation graph for a resort. Features with unusable
/// geometry are skipped rather than failing the whole build.
pub fn build_graph(
    ski_area: &SkiArea,
    config: &GraphConfig,
) -> NavigationGraph {
    let mut graph = NavigationGraph::new();

    let lifts_added = ski_area
        .lifts
        .iter()
        .filter(|lift| add_lift(&mut graph, lift, config))
        .count();

    let runs_added = ski_area
        .runs
        .iter()
        .filter(|run| add_run(&mut graph, run, config))
        .count();

    let walks_added = connect_walkways(&mut graph, &config.walk);

    info!(
        ski_area = %ski_area.id,
        lifts = lifts_added,
        runs = runs_added,
        walks = walks_added,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built navigation graph"
    );

    graph
}

/// Drop consecutive duplicate points, returning None if what remains is too
/// short to travel along
fn clean_line(coords: &[Position]) -> Option<Vec<Position>> {
    let mut cleaned = coords.to_vec();
    cleaned.dedup();

    if cleaned.len() < 2 || path_length(&cleaned) < MIN_PATH_LENGTH {
        return None;
    }
    Some(cleaned)
}

/// Reduce a polygon footprint to a two-point centreline running from its
/// highest point to its lowest point
fn polygon_centreline(rings: &[Vec<Position>]) -> Option<Vec<Position>> {
    let exterior = rings.first()?;
    if exterior.len() < 3 {
        return None;
    }

    let highest = exterior
        .iter()
        .max_by(|a, b| a.elevation.total_cmp(&b.elevation))?;
    let lowest = exterior
        .iter()
        .min_by(|a, b| a.elevation.total_cmp(&b.elevation))?;

    clean_line(&[*highest, *lowest])
}

/// Geometry of a run in the direction it is skied, i.e. always starting at
/// its highest end. Returns None for geometry which can't be routed along.
pub fn downhill_coords(run: &Run) -> Option<Vec<Position>> {
    let mut coords = match &run.geometry {
        Geometry::LineString(coords) => clean_line(coords)?,
        Geometry::Polygon(rings) => polygon_centreline(rings)?,
        _ => return None,
    };

    let first = coords.first()?.elevation;
    let last = coords.last()?.elevation;
    if first < last {
        coords.reverse();
    }
    Some(coords)
}

/// Geometry of a lift from its base station to its top station
pub fn uphill_coords(lift: &Lift) -> Option<Vec<Position>> {
    let mut coords = match &lift.geometry {
        Geometry::LineString(coords) => clean_line(coords)?,
        _ => return None,
    };

    let first = coords.first()?.elevation;
    let last = coords.last()?.elevation;
    if first > last {
        coords.reverse();
    }
    Some(coords)
}

/// Add a single lift edge to the graph, returning whether it was added
pub fn add_lift(
    graph: &mut NavigationGraph,
    lift: &Lift,
    config: &GraphConfig,
) -> bool {
    if !lift.status.is_usable() {
        debug!(
            lift = %lift.id,
            status = ?lift.status,
            "skipping unusable lift"
        );
        return false;
    }

    let coords = match uphill_coords(lift) {
        Some(coords) => coords,
        None => {
            debug!(lift = %lift.id, "skipping lift with unusable geometry");
            return false;
        }
    };

    let (Some(bottom), Some(top)) = (coords.first(), coords.last()) else {
        return false;
    };

    let distance = path_length(&coords);
    let ride_time = match config.lift_ride_minutes.get(&lift.id) {
        Some(minutes) if *minutes > 0.0 => minutes * 60.0,
        _ => distance / lift.lift_type.speed(),
    };

    let name = lift.name.as_deref();
    let start = NavigationNode::new(
        NodeKind::LiftStart {
            lift_id: lift.id.clone(),
        },
        bottom,
        &lift.id,
        name,
    );
    let end = NavigationNode::new(
        NodeKind::LiftEnd {
            lift_id: lift.id.clone(),
        },
        top,
        &lift.id,
        name,
    );

    let edge = NavigationEdge {
        id: format!("lift-{}", lift.id),
        from: start.id.clone(),
        to: end.id.clone(),
        edge_type: EdgeType::Lift,
        feature_id: lift.id.clone(),
        feature_name: lift.name.clone(),
        distance,
        elevation_change: top.elevation - bottom.elevation,
        travel_time: ride_time + config.queue_time,
        speed: distance / ride_time,
        coordinates: coords.clone(),
        difficulty: None,
        lift_type: Some(lift.lift_type),
    };

    graph.add_node(start);
    graph.add_node(end);
    graph.add_edge(edge).is_some()
}

/// Determine how many pieces a run of the provided length should be split
/// into, so that each is roughly the target length without any falling
/// below the minimum
fn piece_count(length: f64, config: &GraphConfig) -> usize {
    if length <= config.run_segment_length {
        return 1;
    }
    let target = (length / config.run_segment_length).round().max(1.0);
    let limit = (length / config.min_run_segment_length).floor().max(1.0);
    target.min(limit) as usize
}

/// Kind of the node at position `inx` of a run subdivided into `pieces`
fn run_node_kind(run_id: &str, inx: usize, pieces: usize) -> NodeKind {
    let run_id = run_id.to_string();
    if inx == 0 {
        NodeKind::RunStart { run_id }
    } else if inx == pieces {
        NodeKind::RunEnd { run_id }
    } else {
        NodeKind::RunMid { run_id, index: inx }
    }
}

/// Add a run to the graph as a chain of edges, returning whether it was
/// added. The run as a whole points downhill, but it is split by length
/// alone, so a piece covering a rise in the terrain climbs.
pub fn add_run(
    graph: &mut NavigationGraph,
    run: &Run,
    config: &GraphConfig,
) -> bool {
    if !run.status.is_usable() {
        debug!(run = %run.id, status = ?run.status, "skipping unusable run");
        return false;
    }

    let coords = match downhill_coords(run) {
        Some(coords) => coords,
        None => {
            debug!(run = %run.id, "skipping run with unusable geometry");
            return false;
        }
    };

    let pieces = piece_count(path_length(&coords), config);
    let name = run.name.as_deref();
    let speed = run.difficulty.speed();

    // Pieces must meet exactly where they share a node
    let mut split = split_evenly(&coords, pieces);
    for inx in 1..split.len() {
        let boundary = split[inx - 1].last().copied();
        if let (Some(boundary), Some(first)) =
            (boundary, split[inx].first_mut())
        {
            *first = boundary;
        }
    }

    let mut added = 0;
    for (inx, piece) in split.into_iter().enumerate() {
        let (Some(first), Some(last)) = (piece.first(), piece.last()) else {
            continue;
        };

        let src = NavigationNode::new(
            run_node_kind(&run.id, inx, pieces),
            first,
            &run.id,
            name,
        );
        let dst = NavigationNode::new(
            run_node_kind(&run.id, inx + 1, pieces),
            last,
            &run.id,
            name,
        );

        let distance = path_length(&piece);
        let edge = NavigationEdge {
            id: format!("run-{}-{}", run.id, inx),
            from: src.id.clone(),
            to: dst.id.clone(),
            edge_type: EdgeType::Run,
            feature_id: run.id.clone(),
            feature_name: run.name.clone(),
            distance,
            elevation_change: last.elevation - first.elevation,
            travel_time: distance / speed,
            speed,
            coordinates: piece.clone(),
            difficulty: Some(run.difficulty),
            lift_type: None,
        };

        graph.add_node(src);
        graph.add_node(dst);
        if graph.add_edge(edge).is_some() {
            added += 1;
        }
    }

    added > 0
}

/// Create a walking edge between two nodes. Walking speed depends on whether
/// the walk is flat, uphill or downhill, and the penalty multiplier is
/// applied on top.
pub fn walk_edge(
    from: &NavigationNode,
    to: &NavigationNode,
    penalty: f64,
    walk: &WalkConfig,
) -> NavigationEdge {
    let (a, b) = (from.position(), to.position());
    let distance = distance_3d(&a, &b);
    let elevation_change = b.elevation - a.elevation;

    let speed = if elevation_change.abs() < walk.flat_threshold {
        walk.flat_speed
    } else if elevation_change > 0.0 {
        walk.climb_speed
    } else {
        walk.descent_speed
    };

    NavigationEdge {
        id: format!("walk-{}-{}", from.id, to.id),
        from: from.id.clone(),
        to: to.id.clone(),
        edge_type: EdgeType::Walk,
        feature_id: WALK_FEATURE_ID.to_string(),
        feature_name: None,
        distance,
        elevation_change,
        travel_time: (distance / speed * penalty).max(walk.min_time),
        speed,
        coordinates: vec![a, b],
        difficulty: None,
        lift_type: None,
    }
}

/// Add a walking edge in each direction between two existing nodes,
/// returning the number of edges added
pub fn connect_both_ways(
    graph: &mut NavigationGraph,
    a: &NodeId,
    b: &NodeId,
    penalty: f64,
    walk: &WalkConfig,
) -> usize {
    let (Some(node_a), Some(node_b)) = (graph.node(a), graph.node(b)) else {
        return 0;
    };
    let there = walk_edge(node_a, node_b, penalty, walk);
    let back = walk_edge(node_b, node_a, penalty, walk);

    [there, back]
        .into_iter()
        .filter_map(|edge| graph.add_edge(edge))
        .count()
}

/// Whether a pair of node types is worth a long walk: getting off a lift to
/// the top of a run or another lift, or from the bottom of a run to a lift
/// or another run
fn is_meaningful_pair(a: NodeType, b: NodeType) -> bool {
    let ordered = |x: NodeType, y: NodeType| {
        matches!(
            (x, y),
            (NodeType::LiftEnd, NodeType::RunStart)
                | (NodeType::RunEnd, NodeType::LiftStart)
                | (NodeType::LiftEnd, NodeType::LiftStart)
                | (NodeType::RunEnd, NodeType::RunStart)
        )
    };
    ordered(a, b) || ordered(b, a)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WalkKind {
    Normal,
    Extended,
}

/// Classify the walk between two nodes, if one should be added at all
fn classify_walk(
    a: &NavigationNode,
    b: &NavigationNode,
    walk: &WalkConfig,
) -> Option<WalkKind> {
    if a.feature_id == b.feature_id {
        return None;
    }

    let (pos_a, pos_b) = (a.position(), b.position());
    let horizontal = haversine(&pos_a, &pos_b);
    let vertical = (pos_a.elevation - pos_b.elevation).abs();

    if horizontal <= walk.radius && vertical <= walk.max_elevation_diff {
        Some(WalkKind::Normal)
    } else if horizontal <= walk.extended_radius
        && vertical <= walk.extended_max_elevation_diff
        && is_meaningful_pair(a.node_type(), b.node_type())
    {
        Some(WalkKind::Extended)
    } else {
        None
    }
}

/// Connect every pair of nodes on different features which are close enough
/// to walk between. A second, more generous pass links lift and run
/// endpoints with a heavier penalty, so that they are only used when no
/// normal path exists. Returns the number of edges added.
pub fn connect_walkways(
    graph: &mut NavigationGraph,
    walk: &WalkConfig,
) -> usize {
    let search_radius = walk.radius.max(walk.extended_radius);

    let pairs: Vec<(NodeId, NodeId, WalkKind)> = {
        let graph = &*graph;
        let indices: Vec<NodeIndex> = graph.graph.node_indices().collect();

        indices
            .into_par_iter()
            .flat_map_iter(|inx| {
                let Some(node) = graph.graph.node_weight(inx) else {
                    return Vec::new();
                };
                graph
                    .node_indices_within(&node.position(), search_radius)
                    .into_iter()
                    // Each pair is only looked at from its older node
                    .filter(|other| *other > inx)
                    .filter_map(|other| {
                        let other = graph.graph.node_weight(other)?;
                        let kind = classify_walk(node, other, walk)?;
                        Some((node.id.clone(), other.id.clone(), kind))
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    };

    let mut added = 0;
    for (a, b, kind) in pairs {
        let penalty = match kind {
            WalkKind::Normal => walk.penalty,
            WalkKind::Extended => walk.extended_penalty,
        };
        added += connect_both_ways(graph, &a, &b, penalty, walk);
    }

    added
}

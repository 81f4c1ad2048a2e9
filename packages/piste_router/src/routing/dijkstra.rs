//! Time-optimal search across the navigation graph. Both the static and the
//! closing time aware searches share a single Dijkstra implementation, which
//! differ only in which edges they are willing to travel along.
//!
//! Where two paths reach a node in exactly the same time, the one which was
//! discovered first is kept. Combined with the fixed edge order of the graph,
//! this makes every search deterministic for a given graph and query.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::common::graph_data::{
    EdgeType, NavigationEdge, NavigationGraph, NodeId,
};
use crate::common::resort::LiveStatus;
use crate::routing::structs::NavigationRoute;

#[derive(Copy, Clone, PartialEq)]
struct State {
    time: f64,
    /// Order in which this label was discovered, used to break ties
    seq: u64,
    node: NodeIndex,
}

impl Eq for State {}

// Min-heap by time, then by discovery order
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the quickest sequence of edges from start to goal, travelling only
/// along edges which `admit` accepts. `admit` is given each edge along with
/// the elapsed time at which it would be entered.
fn shortest_path<F>(
    graph: &NavigationGraph,
    start: NodeIndex,
    goal: NodeIndex,
    admit: F,
) -> Option<Vec<EdgeIndex>>
where
    F: Fn(&NavigationEdge, f64) -> bool,
{
    let mut best: FxHashMap<NodeIndex, f64> = FxHashMap::default();
    let mut predecessors: FxHashMap<NodeIndex, EdgeIndex> =
        FxHashMap::default();
    let mut settled: FxHashSet<NodeIndex> = FxHashSet::default();
    let mut heap = BinaryHeap::new();
    let mut seq = 0;

    best.insert(start, 0.0);
    heap.push(State {
        time: 0.0,
        seq,
        node: start,
    });

    let mut reached = false;
    while let Some(State { time, node, .. }) = heap.pop() {
        if node == goal {
            reached = true;
            break;
        }
        if !settled.insert(node) {
            continue;
        }

        for eref in graph.graph.edges(node) {
            let edge = eref.weight();
            if !admit(edge, time) {
                continue;
            }

            let next = eref.target();
            let next_time = time + edge.travel_time;
            let improved = match best.get(&next) {
                Some(known) => next_time < *known,
                None => true,
            };

            if improved {
                seq += 1;
                best.insert(next, next_time);
                predecessors.insert(next, eref.id());
                heap.push(State {
                    time: next_time,
                    seq,
                    node: next,
                });
            }
        }
    }

    if !reached {
        return None;
    }

    // Walk the predecessor map back from the goal
    let mut path = Vec::new();
    let mut cur = goal;
    while cur != start {
        let edge = *predecessors.get(&cur)?;
        path.push(edge);
        cur = graph.graph.edge_endpoints(edge)?.0;
    }
    path.reverse();

    Some(path)
}

/// Resolve both ends of a query, returning None if either is missing
fn resolve(
    graph: &NavigationGraph,
    start: &NodeId,
    end: &NodeId,
) -> Option<(NodeIndex, NodeIndex)> {
    Some((graph.node_index(start)?, graph.node_index(end)?))
}

fn to_route(
    graph: &NavigationGraph,
    start: &NodeId,
    end: &NodeId,
    path: &[EdgeIndex],
) -> NavigationRoute {
    let edges: Vec<&NavigationEdge> = path
        .iter()
        .filter_map(|inx| graph.graph.edge_weight(*inx))
        .collect();
    NavigationRoute::from_edges(start, end, &edges)
}

/// Find the quickest route between two nodes. Returns None if either node
/// is not in the graph, or if there is no way to get from one to the other.
pub fn find_route(
    graph: &NavigationGraph,
    start: &NodeId,
    end: &NodeId,
) -> Option<NavigationRoute> {
    let (start_inx, end_inx) = resolve(graph, start, end)?;
    if start_inx == end_inx {
        return Some(NavigationRoute::empty(start));
    }

    let path = shortest_path(graph, start_inx, end_inx, |_, _| true)?;
    Some(to_route(graph, start, end, &path))
}

/// Whether a run or lift can still be used when it is reached `elapsed`
/// seconds into a trip which sets off `departure_offset` seconds from now.
/// Features stop being usable `buffer_minutes` before they close.
fn is_open_on_arrival(
    edge: &NavigationEdge,
    elapsed: f64,
    status: &LiveStatus,
    departure_offset: f64,
    buffer_minutes: f64,
) -> bool {
    if edge.edge_type == EdgeType::Walk {
        return true;
    }
    if status.is_closed(&edge.feature_id) {
        return false;
    }
    match status.minutes_until_close.get(&edge.feature_id) {
        Some(closes_in) => {
            let arrival = (departure_offset + elapsed) / 60.0;
            arrival < closes_in - buffer_minutes
        }
        None => true,
    }
}

/// Find the quickest route between two nodes which only uses runs and lifts
/// that will still be running when they are reached. This is a greedy
/// search: the earliest arrival at each node is assumed to be the best, so
/// a route which waits for something to open is never considered.
pub fn find_route_with_arrival_times(
    graph: &NavigationGraph,
    start: &NodeId,
    end: &NodeId,
    status: &LiveStatus,
    departure_offset: f64,
    buffer_minutes: f64,
) -> Option<NavigationRoute> {
    let (start_inx, end_inx) = resolve(graph, start, end)?;
    if start_inx == end_inx {
        return Some(NavigationRoute::empty(start));
    }

    let path = shortest_path(graph, start_inx, end_inx, |edge, elapsed| {
        is_open_on_arrival(
            edge,
            elapsed,
            status,
            departure_offset,
            buffer_minutes,
        )
    })?;
    Some(to_route(graph, start, end, &path))
}

pub mod metrics;

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::common::bbox::BBox;
use crate::common::geometry::{Position, bearing, haversine};
use crate::common::graph_data::{EdgeType, NavigationEdge, NodeId};
use crate::common::resort::{Difficulty, LiftType};
use crate::routing::structs::metrics::RouteMetrics;

/// Walks shorter than this are transfers between coincident nodes, and are
/// not worth an instruction of their own. Their time still counts, and is
/// carried by a neighbouring segment.
const MIN_WALK_SEGMENT: f64 = 1.0;

fn is_step(edge: &NavigationEdge) -> bool {
    edge.edge_type == EdgeType::Walk && edge.distance < MIN_WALK_SEGMENT
}

/// A single instruction within a route, i.e. ski this run, ride this lift or
/// walk to the next feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSegment {
    #[serde(rename = "type")]
    pub segment_type: EdgeType,
    pub name: Option<String>,
    pub feature_id: String,
    pub difficulty: Option<Difficulty>,
    pub lift_type: Option<LiftType>,
    pub distance: f64,
    pub time: f64,
    pub elevation_change: f64,
    pub coordinates: Vec<Position>,
    pub from_node: NodeId,
    pub to_node: NodeId,
    /// Graph edges which this segment was built from
    pub edge_ids: Vec<String>,
    /// Seconds since departure at which this segment begins
    pub start_time: f64,
    /// Overall compass heading from the start to the end of the segment
    pub bearing: Option<f64>,
}

impl RouteSegment {
    pub fn from_edge(edge: &NavigationEdge) -> RouteSegment {
        let mut segment = RouteSegment {
            segment_type: edge.edge_type,
            name: edge.feature_name.clone(),
            feature_id: edge.feature_id.clone(),
            difficulty: edge.difficulty,
            lift_type: edge.lift_type,
            distance: edge.distance,
            time: edge.travel_time,
            elevation_change: edge.elevation_change,
            coordinates: edge.coordinates.clone(),
            from_node: edge.from.clone(),
            to_node: edge.to.clone(),
            edge_ids: vec![edge.id.clone()],
            start_time: 0.0,
            bearing: None,
        };
        segment.refresh_bearing();
        segment
    }

    /// Whether an edge continues this segment, rather than starting a new one
    fn continues_with(&self, edge: &NavigationEdge) -> bool {
        self.segment_type == edge.edge_type
            && self.feature_id == edge.feature_id
            && self.to_node == edge.from
    }

    /// Extend this segment to cover the provided edge
    fn absorb_edge(&mut self, edge: &NavigationEdge) {
        self.coordinates
            .extend(edge.coordinates.iter().skip(1).copied());
        self.distance += edge.distance;
        self.time += edge.travel_time;
        self.elevation_change += edge.elevation_change;
        self.to_node = edge.to.clone();
        self.edge_ids.push(edge.id.clone());
        self.refresh_bearing();
    }

    /// Fold a negligible walk onto the end of this segment
    fn absorb_step(&mut self, step: &NavigationEdge) {
        if let Some(end) = step.coordinates.last() {
            if self.end() != Some(end) {
                self.coordinates.push(*end);
            }
        }
        self.distance += step.distance;
        self.time += step.travel_time;
        self.elevation_change += step.elevation_change;
        self.to_node = step.to.clone();
        self.edge_ids.push(step.id.clone());
        self.refresh_bearing();
    }

    /// Fold negligible walks which lead up to this segment onto its start
    fn prepend_steps(&mut self, steps: &[&NavigationEdge]) {
        let Some(first) = steps.first() else {
            return;
        };

        let mut coordinates: Vec<Position> = steps
            .iter()
            .filter_map(|step| step.coordinates.first().copied())
            .collect();
        coordinates.append(&mut self.coordinates);
        coordinates.dedup();
        self.coordinates = coordinates;

        let mut edge_ids: Vec<String> =
            steps.iter().map(|step| step.id.clone()).collect();
        edge_ids.append(&mut self.edge_ids);
        self.edge_ids = edge_ids;

        for step in steps {
            self.distance += step.distance;
            self.time += step.travel_time;
            self.elevation_change += step.elevation_change;
        }
        self.from_node = first.from.clone();
        self.refresh_bearing();
    }

    /// Extend this segment to cover the one which follows it
    pub fn absorb(&mut self, next: RouteSegment) {
        self.coordinates
            .extend(next.coordinates.into_iter().skip(1));
        self.distance += next.distance;
        self.time += next.time;
        self.elevation_change += next.elevation_change;
        self.to_node = next.to_node;
        self.edge_ids.extend(next.edge_ids);
        self.refresh_bearing();
    }

    pub fn refresh_bearing(&mut self) {
        self.bearing = match (self.coordinates.first(), self.coordinates.last())
        {
            (Some(first), Some(last)) if haversine(first, last) > 0.0 => {
                Some(bearing(first, last))
            }
            _ => None,
        };
    }

    pub fn start(&self) -> Option<&Position> {
        self.coordinates.first()
    }

    pub fn end(&self) -> Option<&Position> {
        self.coordinates.last()
    }
}

/// A completed route between two nodes. Routes are snapshots, they hold no
/// references back into the graph which produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationRoute {
    pub from: NodeId,
    pub to: NodeId,
    pub segments: Vec<RouteSegment>,
    #[serde(flatten)]
    pub metrics: RouteMetrics,
    pub bbox: Option<BBox>,
}

impl NavigationRoute {
    /// A route which goes nowhere, used when the start and end coincide
    pub fn empty(node: &NodeId) -> NavigationRoute {
        NavigationRoute {
            from: node.clone(),
            to: node.clone(),
            segments: Vec::new(),
            metrics: RouteMetrics::new(),
            bbox: None,
        }
    }

    /// Assemble a route from the edges of a path through the graph.
    /// Consecutive edges belonging to the same feature are merged into a
    /// single segment. Negligible walks are folded into the segment before
    /// them, or the one after if they lead the route, so the totals match
    /// the cost of the path. A path made up of nothing else keeps them as
    /// a walk.
    pub fn from_edges(
        from: &NodeId,
        to: &NodeId,
        edges: &[&NavigationEdge],
    ) -> NavigationRoute {
        let mut segments: Vec<RouteSegment> = Vec::new();
        let mut leading: Vec<&NavigationEdge> = Vec::new();

        for &edge in edges {
            match segments.last_mut() {
                None if is_step(edge) => leading.push(edge),
                Some(last) if is_step(edge) => last.absorb_step(edge),
                Some(last) if last.continues_with(edge) => {
                    last.absorb_edge(edge)
                }
                _ => segments.push(RouteSegment::from_edge(edge)),
            }
        }

        match segments.first_mut() {
            Some(first) => first.prepend_steps(&leading),
            None => {
                let mut steps = leading.into_iter();
                if let Some(step) = steps.next() {
                    let mut walk = RouteSegment::from_edge(step);
                    steps.for_each(|step| walk.absorb_edge(step));
                    segments.push(walk);
                }
            }
        }

        NavigationRoute::from_segments(from, to, segments)
    }

    pub fn from_segments(
        from: &NodeId,
        to: &NodeId,
        segments: Vec<RouteSegment>,
    ) -> NavigationRoute {
        let mut route = NavigationRoute {
            from: from.clone(),
            to: to.clone(),
            segments,
            metrics: RouteMetrics::new(),
            bbox: None,
        };
        route.recompute_totals();
        route
    }

    /// Derive the route totals, segment start times and bounding box from
    /// the current list of segments
    pub fn recompute_totals(&mut self) {
        let mut metrics = RouteMetrics::new();
        for segment in self.segments.iter_mut() {
            segment.start_time = metrics.total_time;
            metrics.take_step(segment);
        }
        self.metrics = metrics;

        self.bbox = BBox::from_positions(
            self.segments.iter().flat_map(|seg| seg.coordinates.iter()),
        );
    }

    /// Every graph edge used by this route
    pub fn edge_set(&self) -> FxHashSet<&str> {
        self.segments
            .iter()
            .flat_map(|seg| seg.edge_ids.iter().map(String::as_str))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

//! Sets the data which will be stored as weights in the petgraph graph, along
//! with a thin wrapper around the graph itself which allows nodes to be
//! looked up by their stable string ids.

use petgraph::Directed;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::geometry::Position;
use crate::common::resort::{Difficulty, LiftType};
use crate::common::spatial::PointIndex;

/// What a node represents. Each kind has its own id constructor, so ids for
/// different kinds of node can never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    LiftStart { lift_id: String },
    LiftEnd { lift_id: String },
    RunStart { run_id: String },
    RunEnd { run_id: String },
    /// Intermediate point partway down a subdivided run
    RunMid { run_id: String, index: usize },
    /// A map click, possibly snapped onto a run
    MapPoint { point_id: String },
    Poi { poi_id: String },
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::LiftStart { .. } => NodeType::LiftStart,
            NodeKind::LiftEnd { .. } => NodeType::LiftEnd,
            NodeKind::RunStart { .. } => NodeType::RunStart,
            NodeKind::RunEnd { .. } => NodeType::RunEnd,
            NodeKind::RunMid { .. }
            | NodeKind::MapPoint { .. }
            | NodeKind::Poi { .. } => NodeType::Connection,
        }
    }

    /// The node's id, following the `lift-L7-start` style scheme
    pub fn id(&self) -> NodeId {
        let raw = match self {
            NodeKind::LiftStart { lift_id } => format!("lift-{lift_id}-start"),
            NodeKind::LiftEnd { lift_id } => format!("lift-{lift_id}-end"),
            NodeKind::RunStart { run_id } => format!("run-{run_id}-start"),
            NodeKind::RunEnd { run_id } => format!("run-{run_id}-end"),
            NodeKind::RunMid { run_id, index } => {
                format!("run-{run_id}-mid-{index}")
            }
            NodeKind::MapPoint { point_id } => format!("mappoint-{point_id}"),
            NodeKind::Poi { poi_id } => format!("poi-{poi_id}"),
        };
        NodeId(raw)
    }
}

/// Opaque, stable identifier for a node. Only ever constructed from a
/// [`NodeKind`], or parsed back from a value previously handed out.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an id received from outside the crate, e.g. in an API request
    pub fn parse(raw: impl Into<String>) -> Self {
        NodeId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public classification of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    LiftStart,
    LiftEnd,
    RunStart,
    RunEnd,
    Connection,
}

/// A point in the navigation graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub lng: f64,
    pub lat: f64,
    pub elevation: f64,
    pub feature_id: String,
    pub feature_name: Option<String>,
}

impl NavigationNode {
    pub fn new(
        kind: NodeKind,
        pos: &Position,
        feature_id: &str,
        feature_name: Option<&str>,
    ) -> Self {
        NavigationNode {
            id: kind.id(),
            kind,
            lng: pos.lng,
            lat: pos.lat,
            elevation: pos.elevation,
            feature_id: feature_id.to_string(),
            feature_name: feature_name.map(String::from),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn position(&self) -> Position {
        Position::new(self.lng, self.lat, self.elevation)
    }
}

/// How an edge is travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Lift,
    Run,
    Walk,
}

/// A directed, time-weighted traversal between two nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationEdge {
    pub id: String,
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: EdgeType,
    /// Owning run or lift, walk edges carry a synthetic id
    pub feature_id: String,
    pub feature_name: Option<String>,
    /// 3d distance in metres
    pub distance: f64,
    /// Signed change in elevation, positive for a climb
    pub elevation_change: f64,
    /// Seconds, always positive
    pub travel_time: f64,
    /// m/s
    pub speed: f64,
    pub coordinates: Vec<Position>,
    pub difficulty: Option<Difficulty>,
    pub lift_type: Option<LiftType>,
}

/// The navigation graph. Nodes and edges live in a petgraph arena whose
/// indices remain valid when edges are removed, while the id index allows
/// nodes to be found by their string id and the spatial index by their
/// location.
#[derive(Debug, Clone, Default)]
pub struct NavigationGraph {
    pub graph: StableGraph<NavigationNode, NavigationEdge, Directed, u32>,
    index: FxHashMap<NodeId, NodeIndex>,
    spatial: PointIndex<NodeIndex>,
}

impl NavigationGraph {
    pub fn new() -> Self {
        NavigationGraph::default()
    }

    /// Add a node to the graph. Node ids are unique, so adding a node with an
    /// id which already exists leaves the graph untouched and returns the
    /// index of the existing node.
    pub fn add_node(&mut self, node: NavigationNode) -> NodeIndex {
        if let Some(inx) = self.index.get(&node.id) {
            return *inx;
        }
        let id = node.id.clone();
        let pos = node.position();
        let inx = self.graph.add_node(node);
        self.index.insert(id, inx);
        self.spatial.insert(pos, inx);
        inx
    }

    /// Add an edge between two nodes which are already in the graph. Edges
    /// without a positive travel time, or which refer to unknown nodes, are
    /// rejected.
    pub fn add_edge(&mut self, edge: NavigationEdge) -> Option<EdgeIndex> {
        if !(edge.travel_time.is_finite() && edge.travel_time > 0.0) {
            return None;
        }
        let src = *self.index.get(&edge.from)?;
        let dst = *self.index.get(&edge.to)?;
        Some(self.graph.add_edge(src, dst, edge))
    }

    pub fn node_index(&self, id: &NodeId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&NavigationNode> {
        self.node_index(id)
            .and_then(|inx| self.graph.node_weight(inx))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NavigationNode> {
        self.graph.node_weights()
    }

    /// Indices of every node within `radius` metres horizontally of `pos`,
    /// in the order the nodes were added
    pub fn node_indices_within(
        &self,
        pos: &Position,
        radius: f64,
    ) -> Vec<NodeIndex> {
        let mut found: Vec<NodeIndex> =
            self.spatial.within(pos, radius).copied().collect();
        found.sort_unstable();
        found
    }

    pub fn nodes_within(
        &self,
        pos: &Position,
        radius: f64,
    ) -> Vec<&NavigationNode> {
        self.node_indices_within(pos, radius)
            .into_iter()
            .filter_map(|inx| self.graph.node_weight(inx))
            .collect()
    }

    /// The node horizontally closest to `pos`, out of those accepted
    pub fn nearest_node_by<F>(
        &self,
        pos: &Position,
        accept: F,
    ) -> Option<&NavigationNode>
    where
        F: Fn(&NavigationNode) -> bool,
    {
        let inx = self.spatial.nearest_by(pos, |inx| {
            self.graph.node_weight(*inx).is_some_and(&accept)
        })?;
        self.graph.node_weight(*inx)
    }

    pub fn nearest_node(&self, pos: &Position) -> Option<&NavigationNode> {
        self.nearest_node_by(pos, |_| true)
    }

    pub fn edges(&self) -> impl Iterator<Item = &NavigationEdge> {
        self.graph.edge_weights()
    }

    /// All edges leaving the provided node
    pub fn outgoing(&self, id: &NodeId) -> Vec<&NavigationEdge> {
        match self.node_index(id) {
            Some(inx) => self.graph.edges(inx).map(|e| e.weight()).collect(),
            None => Vec::new(),
        }
    }

    /// Outgoing edge ids for every node, the adjacency list view of the
    /// graph
    pub fn adjacency(&self) -> FxHashMap<NodeId, Vec<String>> {
        self.graph
            .node_indices()
            .filter_map(|inx| {
                let node = self.graph.node_weight(inx)?;
                let edge_ids = self
                    .graph
                    .edges(inx)
                    .map(|e| e.weight().id.clone())
                    .collect();
                Some((node.id.clone(), edge_ids))
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Return a copy of this graph which contains only the edges matching
    /// the provided predicate. Nodes are never removed.
    pub fn retain_edges<F>(&self, keep: F) -> NavigationGraph
    where
        F: Fn(&NavigationEdge) -> bool,
    {
        let mut copy = self.clone();
        copy.graph.retain_edges(|g, inx| match g.edge_weight(inx) {
            Some(edge) => keep(edge),
            None => false,
        });
        copy
    }

    /// Remove a single edge in place, returning its data. Used while a graph
    /// is being extended by its owner, never on a shared graph.
    pub(crate) fn remove_edge_by_id(
        &mut self,
        edge_id: &str,
    ) -> Option<NavigationEdge> {
        let inx = self
            .graph
            .edge_indices()
            .find(|inx| match self.graph.edge_weight(*inx) {
                Some(edge) => edge.id == edge_id,
                None => false,
            })?;
        self.graph.remove_edge(inx)
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn get_test_node(kind: NodeKind, elevation: f64) -> NavigationNode {
        NavigationNode::new(
            kind,
            &Position::new(0.0, 0.0, elevation),
            "feature",
            Some("Feature"),
        )
    }

    fn get_test_edge(from: &NodeId, to: &NodeId, time: f64) -> NavigationEdge {
        NavigationEdge {
            id: format!("{from}->{to}"),
            from: from.clone(),
            to: to.clone(),
            edge_type: EdgeType::Walk,
            feature_id: "walk".to_string(),
            feature_name: None,
            distance: 10.0,
            elevation_change: 0.0,
            travel_time: time,
            speed: 1.0,
            coordinates: vec![Position::default(), Position::default()],
            difficulty: None,
            lift_type: None,
        }
    }

    /// Ids follow the established scheme, and kinds map onto public types
    #[test]
    fn test_node_ids() {
        let cases = vec![
            (
                NodeKind::LiftStart {
                    lift_id: "L7".to_string(),
                },
                "lift-L7-start",
                NodeType::LiftStart,
            ),
            (
                NodeKind::RunEnd {
                    run_id: "R3".to_string(),
                },
                "run-R3-end",
                NodeType::RunEnd,
            ),
            (
                NodeKind::RunMid {
                    run_id: "R3".to_string(),
                    index: 4,
                },
                "run-R3-mid-4",
                NodeType::Connection,
            ),
            (
                NodeKind::MapPoint {
                    point_id: "X".to_string(),
                },
                "mappoint-X",
                NodeType::Connection,
            ),
            (
                NodeKind::Poi {
                    poi_id: "Y".to_string(),
                },
                "poi-Y",
                NodeType::Connection,
            ),
        ];

        for (kind, id, node_type) in cases {
            assert_eq!(kind.id().as_str(), id);
            assert_eq!(kind.node_type(), node_type);
        }
    }

    /// The same feature id used for a lift and a run yields distinct nodes
    #[test]
    fn test_ids_do_not_collide_across_kinds() {
        let lift = NodeKind::LiftStart {
            lift_id: "A".to_string(),
        };
        let run = NodeKind::RunStart {
            run_id: "A".to_string(),
        };
        assert_ne!(lift.id(), run.id());
    }

    /// Adding a node twice keeps a single copy
    #[test]
    fn test_add_node_idempotent() {
        let mut graph = NavigationGraph::new();
        let kind = NodeKind::Poi {
            poi_id: "hut".to_string(),
        };

        let first = graph.add_node(get_test_node(kind.clone(), 1000.0));
        let second = graph.add_node(get_test_node(kind.clone(), 2000.0));

        assert_eq!(first, second);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node(&kind.id()).unwrap().elevation, 1000.0);
    }

    mod test_add_edge {
        use super::*;

        fn get_test_graph() -> (NodeId, NodeId, NavigationGraph) {
            let mut graph = NavigationGraph::new();
            let a = NodeKind::Poi {
                poi_id: "a".to_string(),
            };
            let b = NodeKind::Poi {
                poi_id: "b".to_string(),
            };
            graph.add_node(get_test_node(a.clone(), 0.0));
            graph.add_node(get_test_node(b.clone(), 0.0));
            (a.id(), b.id(), graph)
        }

        #[test]
        fn test_valid() {
            let (a, b, mut graph) = get_test_graph();
            assert!(graph.add_edge(get_test_edge(&a, &b, 5.0)).is_some());
            assert_eq!(graph.outgoing(&a).len(), 1);
            assert!(graph.outgoing(&b).is_empty());
        }

        /// Zero, negative and NaN travel times are all rejected
        #[test]
        fn test_non_positive_time() {
            let (a, b, mut graph) = get_test_graph();
            for time in [0.0, -1.0, f64::NAN, f64::INFINITY] {
                assert!(graph.add_edge(get_test_edge(&a, &b, time)).is_none());
            }
            assert_eq!(graph.edge_count(), 0);
        }

        #[test]
        fn test_unknown_node() {
            let (a, _, mut graph) = get_test_graph();
            let ghost = NodeId::parse("poi-ghost");
            assert!(graph.add_edge(get_test_edge(&a, &ghost, 5.0)).is_none());
        }
    }

    /// Filtering produces a new graph and leaves the original untouched
    #[test]
    fn test_retain_edges_copy_on_write() {
        let mut graph = NavigationGraph::new();
        let a = NodeKind::Poi {
            poi_id: "a".to_string(),
        }
        .id();
        let b = NodeKind::Poi {
            poi_id: "b".to_string(),
        }
        .id();
        graph.add_node(get_test_node(
            NodeKind::Poi {
                poi_id: "a".to_string(),
            },
            0.0,
        ));
        graph.add_node(get_test_node(
            NodeKind::Poi {
                poi_id: "b".to_string(),
            },
            0.0,
        ));
        graph.add_edge(get_test_edge(&a, &b, 5.0));
        graph.add_edge(get_test_edge(&b, &a, 5.0));

        let filtered = graph.retain_edges(|edge| edge.from == a);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(filtered.edge_count(), 1);
        assert_eq!(filtered.node_count(), 2);
        assert_eq!(filtered.adjacency()[&a].len(), 1);
        assert!(filtered.adjacency()[&b].is_empty());
    }

    #[test]
    fn test_remove_edge_by_id() {
        let mut graph = NavigationGraph::new();
        for id in ["a", "b"] {
            graph.add_node(get_test_node(
                NodeKind::Poi {
                    poi_id: id.to_string(),
                },
                0.0,
            ));
        }
        let a = NodeId::parse("poi-a");
        let b = NodeId::parse("poi-b");
        graph.add_edge(get_test_edge(&a, &b, 5.0));

        let removed = graph.remove_edge_by_id("poi-a->poi-b").unwrap();

        assert_eq!(removed.from, a);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.remove_edge_by_id("poi-a->poi-b").is_none());
    }

    /// Nodes are found by location as soon as they are added
    #[test]
    fn test_spatial_lookup() {
        let mut graph = NavigationGraph::new();
        // Roughly 111m apart, running north
        for (id, lat) in [("c", 0.002), ("a", 0.0), ("b", 0.001)] {
            graph.add_node(NavigationNode::new(
                NodeKind::Poi {
                    poi_id: id.to_string(),
                },
                &Position::new(0.0, lat, 1000.0),
                id,
                None,
            ));
        }
        let origin = Position::new(0.0, 0.0, 0.0);

        let ids = |nodes: Vec<&NavigationNode>| -> Vec<String> {
            nodes.iter().map(|node| node.id.to_string()).collect()
        };

        // Listed in the order they were added, not by distance
        assert_eq!(
            ids(graph.nodes_within(&origin, 150.0)),
            vec!["poi-a", "poi-b"]
        );
        assert_eq!(ids(graph.nodes_within(&origin, 50.0)), vec!["poi-a"]);

        let nearest = graph.nearest_node(&origin).unwrap();
        assert_eq!(nearest.id.as_str(), "poi-a");
        let nearest_other = graph
            .nearest_node_by(&origin, |node| node.feature_id != "a")
            .unwrap();
        assert_eq!(nearest_other.id.as_str(), "poi-b");

        // Copies keep their own index
        let copy = graph.retain_edges(|_| true);
        assert_eq!(copy.nodes_within(&origin, 1000.0).len(), 3);
    }
}

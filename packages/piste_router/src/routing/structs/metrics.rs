//! Defines the struct which contains high level information about a route
//! (i.e. total distance, total time, total gain, etc)

use serde::Serialize;

use crate::common::graph_data::EdgeType;
use crate::routing::structs::RouteSegment;

/// Container for the overall metrics of a route
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RouteMetrics {
    pub total_distance: f64,
    pub total_time: f64,
    pub total_elevation_gain: f64,
    pub total_elevation_loss: f64,
    /// Time spent walking, useful for judging how awkward a route is
    pub walking_time: f64,
}

impl RouteMetrics {
    pub fn new() -> RouteMetrics {
        RouteMetrics::default()
    }

    /// Update the metrics to reflect their state after travelling the
    /// provided segment
    pub fn take_step(&mut self, segment: &RouteSegment) {
        self.total_distance += segment.distance;
        self.total_time += segment.time;

        if segment.elevation_change > 0.0 {
            self.total_elevation_gain += segment.elevation_change;
        } else {
            self.total_elevation_loss -= segment.elevation_change;
        }

        if segment.segment_type == EdgeType::Walk {
            self.walking_time += segment.time;
        }
    }
}

#[cfg(test)]
mod tests {

    use approx::assert_relative_eq;

    use super::*;
    use crate::common::graph_data::NodeId;

    fn get_test_segment(
        segment_type: EdgeType,
        elevation_change: f64,
    ) -> RouteSegment {
        RouteSegment {
            segment_type,
            name: None,
            feature_id: "feature".to_string(),
            difficulty: None,
            lift_type: None,
            distance: 100.0,
            time: 20.0,
            elevation_change,
            coordinates: Vec::new(),
            from_node: NodeId::parse("a"),
            to_node: NodeId::parse("b"),
            edge_ids: Vec::new(),
            start_time: 0.0,
            bearing: None,
        }
    }

    /// Climbs and descents are tallied separately, both as positive values
    #[test]
    fn test_take_step() {
        let mut metrics = RouteMetrics::new();

        metrics.take_step(&get_test_segment(EdgeType::Lift, 800.0));
        metrics.take_step(&get_test_segment(EdgeType::Walk, -5.0));
        metrics.take_step(&get_test_segment(EdgeType::Run, -795.0));

        assert_relative_eq!(metrics.total_distance, 300.0);
        assert_relative_eq!(metrics.total_time, 60.0);
        assert_relative_eq!(metrics.total_elevation_gain, 800.0);
        assert_relative_eq!(metrics.total_elevation_loss, 800.0);
        assert_relative_eq!(metrics.walking_time, 20.0);
    }
}

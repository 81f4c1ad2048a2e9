//! Shared test data. The test resort is a small village area with one lift
//! and two runs back down to the base, plus a glacier sector far enough away
//! that it can't be reached on foot.

use crate::common::config::GraphConfig;
use crate::common::geometry::Position;
use crate::common::graph_data::{NavigationGraph, NodeId};
use crate::common::resort::{
    Difficulty, FeatureStatus, Geometry, Lift, LiftType, Run, SkiArea,
};
use crate::loading::builder::{add_lift, add_run, connect_both_ways};

pub fn pos(lng: f64, lat: f64, elevation: f64) -> Position {
    Position::new(lng, lat, elevation)
}

pub fn line_run(
    id: &str,
    difficulty: Difficulty,
    coords: Vec<Position>,
) -> Run {
    Run {
        id: id.to_string(),
        name: None,
        difficulty,
        status: FeatureStatus::Operating,
        locality: None,
        geometry: Geometry::LineString(coords),
    }
}

pub fn line_lift(id: &str, lift_type: LiftType, coords: Vec<Position>) -> Lift {
    Lift {
        id: id.to_string(),
        name: None,
        lift_type,
        status: FeatureStatus::Operating,
        locality: None,
        geometry: Geometry::LineString(coords),
    }
}

fn named_run(
    id: &str,
    name: &str,
    locality: &str,
    difficulty: Difficulty,
    coords: Vec<Position>,
) -> Run {
    Run {
        name: Some(name.to_string()),
        locality: Some(locality.to_string()),
        ..line_run(id, difficulty, coords)
    }
}

fn named_lift(
    id: &str,
    name: &str,
    locality: &str,
    lift_type: LiftType,
    coords: Vec<Position>,
) -> Lift {
    Lift {
        name: Some(name.to_string()),
        locality: Some(locality.to_string()),
        ..line_lift(id, lift_type, coords)
    }
}

/// Small two sector resort.
///
/// * Village: lift L1 climbs from the base to 1800m, blue run R1 and black
///   run R2 lead back down either side of it. The runs start beside the top
///   station but fan out to finish c. 450m from the base, so getting back to
///   the lift means a long walk.
/// * Glacier: gondola L2 and run R3, c. 8km east of the village
/// * Lift L3 is disused and never makes it into the graph
pub fn get_test_resort() -> SkiArea {
    SkiArea {
        id: "test-resort".to_string(),
        name: "Test Resort".to_string(),
        runs: vec![
            named_run(
                "R1",
                "Blue Ribbon",
                "Village",
                Difficulty::Easy,
                vec![
                    pos(6.0015, 45.0100, 1796.0),
                    pos(6.0057, 45.0000, 1004.0),
                ],
            ),
            named_run(
                "R2",
                "Black Diamond",
                "Village",
                Difficulty::Expert,
                vec![
                    pos(5.9985, 45.0101, 1798.0),
                    pos(5.9964, 45.0050, 1400.0),
                    pos(5.9943, 45.0000, 1002.0),
                ],
            ),
            named_run(
                "R3",
                "Glacier Run",
                "Glacier",
                Difficulty::Intermediate,
                vec![
                    pos(6.1015, 45.0200, 2996.0),
                    pos(6.1015, 45.0000, 2004.0),
                ],
            ),
        ],
        lifts: vec![
            named_lift(
                "L1",
                "Village Express",
                "Village",
                LiftType::ChairLift,
                vec![
                    pos(6.0000, 45.0000, 1000.0),
                    pos(6.0000, 45.0100, 1800.0),
                ],
            ),
            named_lift(
                "L2",
                "Glacier Gondola",
                "Glacier",
                LiftType::Gondola,
                vec![
                    pos(6.1000, 45.0000, 2000.0),
                    pos(6.1000, 45.0200, 3000.0),
                ],
            ),
            Lift {
                status: FeatureStatus::Disused,
                ..named_lift(
                    "L3",
                    "Old Drag",
                    "Village",
                    LiftType::DragLift,
                    vec![
                        pos(6.0030, 45.0000, 1000.0),
                        pos(6.0030, 45.0030, 1200.0),
                    ],
                )
            },
        ],
    }
}

/// A chair lift with an easy run back down beside it, sharing both their top
/// and bottom positions. Only the top stations are connected, so the way
/// back to the bottom is to ride up and ski down.
pub fn get_lift_and_run_graph() -> NavigationGraph {
    let config = GraphConfig::default();
    let mut graph = NavigationGraph::new();

    add_lift(
        &mut graph,
        &line_lift(
            "L1",
            LiftType::ChairLift,
            vec![pos(0.0, 0.0, 1000.0), pos(0.0, 0.01, 1800.0)],
        ),
        &config,
    );
    add_run(
        &mut graph,
        &line_run(
            "R1",
            Difficulty::Easy,
            vec![pos(0.0, 0.01, 1800.0), pos(0.0, 0.0, 1000.0)],
        ),
        &config,
    );
    connect_both_ways(
        &mut graph,
        &NodeId::parse("lift-L1-end"),
        &NodeId::parse("run-R1-start"),
        config.walk.penalty,
        &config.walk,
    );

    graph
}

//! Lists the runs and lifts which can be picked as the start or end of a
//! route, along with the node at which each is joined.

use aho_corasick::AhoCorasick;
use serde::Serialize;

use crate::common::error::{Error, Result};
use crate::common::graph_data::{NavigationGraph, NodeId, NodeKind};
use crate::common::resort::{Difficulty, LiftType, SkiArea};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    Run,
    Lift,
}

/// A run or lift which can be routed to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationDestination {
    pub feature_id: String,
    /// Falls back to the feature id for features without a name
    pub name: String,
    pub kind: DestinationKind,
    pub difficulty: Option<Difficulty>,
    pub lift_type: Option<LiftType>,
    /// Where the feature is joined, the top of a run or the base of a lift
    pub node_id: NodeId,
}

/// Every run and lift in the graph, sorted by name. Features which didn't
/// make it into the graph are left out.
pub fn list_destinations(
    graph: &NavigationGraph,
    ski_area: &SkiArea,
) -> Vec<NavigationDestination> {
    let runs = ski_area.runs.iter().map(|run| NavigationDestination {
        feature_id: run.id.clone(),
        name: run.name.clone().unwrap_or_else(|| run.id.clone()),
        kind: DestinationKind::Run,
        difficulty: Some(run.difficulty),
        lift_type: None,
        node_id: NodeKind::RunStart {
            run_id: run.id.clone(),
        }
        .id(),
    });

    let lifts = ski_area.lifts.iter().map(|lift| NavigationDestination {
        feature_id: lift.id.clone(),
        name: lift.name.clone().unwrap_or_else(|| lift.id.clone()),
        kind: DestinationKind::Lift,
        difficulty: None,
        lift_type: Some(lift.lift_type),
        node_id: NodeKind::LiftStart {
            lift_id: lift.id.clone(),
        }
        .id(),
    });

    let mut destinations: Vec<NavigationDestination> = runs
        .chain(lifts)
        .filter(|dest| graph.contains(&dest.node_id))
        .collect();

    destinations.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.feature_id.cmp(&b.feature_id))
    });
    destinations
}

/// Narrow down a list of destinations to those whose name contains every
/// whitespace separated term in the query, ignoring case. An empty query
/// matches everything.
pub fn search_destinations(
    destinations: &[NavigationDestination],
    query: &str,
) -> Result<Vec<NavigationDestination>> {
    let mut terms: Vec<&str> = query.split_whitespace().collect();
    terms.sort_unstable();
    terms.dedup();
    if terms.is_empty() {
        return Ok(destinations.to_vec());
    }

    let ac = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&terms)
        .map_err(|_| Error::InvalidRequest {
            field: "q",
            value: query.to_string(),
        })?;

    let matches_all = |name: &str| {
        let mut found = vec![false; terms.len()];
        for mat in ac.find_overlapping_iter(name) {
            found[mat.pattern().as_usize()] = true;
        }
        found.iter().all(|hit| *hit)
    };

    Ok(destinations
        .iter()
        .filter(|dest| matches_all(&dest.name))
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::common::config::GraphConfig;
    use crate::common::fixtures::get_test_resort;
    use crate::loading::builder::build_graph;

    fn get_test_destinations() -> Vec<NavigationDestination> {
        let area = get_test_resort();
        let graph = build_graph(&area, &GraphConfig::default());
        list_destinations(&graph, &area)
    }

    fn names(destinations: &[NavigationDestination]) -> Vec<&str> {
        destinations.iter().map(|dest| dest.name.as_str()).collect()
    }

    /// Everything in the graph is listed alphabetically, the disused drag
    /// lift is not
    #[test]
    fn test_list_destinations() {
        let destinations = get_test_destinations();

        assert_eq!(
            names(&destinations),
            vec![
                "Black Diamond",
                "Blue Ribbon",
                "Glacier Gondola",
                "Glacier Run",
                "Village Express",
            ]
        );

        let express = &destinations[4];
        assert_eq!(express.kind, DestinationKind::Lift);
        assert_eq!(express.node_id.as_str(), "lift-L1-start");
        assert_eq!(express.lift_type, Some(LiftType::ChairLift));

        let blue = &destinations[1];
        assert_eq!(blue.node_id.as_str(), "run-R1-start");
        assert_eq!(blue.difficulty, Some(Difficulty::Easy));
    }

    mod test_search_destinations {
        use super::*;

        #[test]
        fn test_case_insensitive() {
            let destinations = get_test_destinations();

            let result = search_destinations(&destinations, "GLACIER").unwrap();

            assert_eq!(names(&result), vec!["Glacier Gondola", "Glacier Run"]);
        }

        /// Every term has to be present
        #[test]
        fn test_all_terms() {
            let destinations = get_test_destinations();

            let result =
                search_destinations(&destinations, "run glacier").unwrap();
            assert_eq!(names(&result), vec!["Glacier Run"]);

            let result =
                search_destinations(&destinations, "run blue").unwrap();
            assert!(result.is_empty());
        }

        /// Partial words match, so results can be shown while typing
        #[test]
        fn test_partial() {
            let destinations = get_test_destinations();

            let result = search_destinations(&destinations, "bl").unwrap();

            assert_eq!(names(&result), vec!["Black Diamond", "Blue Ribbon"]);
        }

        #[test]
        fn test_empty_query() {
            let destinations = get_test_destinations();

            let result = search_destinations(&destinations, "   ").unwrap();

            assert_eq!(result, destinations);
        }
    }
}

//! The functions defined here can be used to read in the runs and lifts of a
//! ski area from a postgres database. Geometry is unpacked into parallel
//! arrays of coordinates by the queries, and reassembled here.

use sqlx::PgPool;
use tracing::info;

use crate::common::error::{Error, Result};
use crate::common::geometry::Position;
use crate::common::resort::{
    Difficulty, FeatureStatus, Geometry, Lift, LiftType, Run, SkiArea,
};

/// Container for the raw output of the ski area SQL query
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct SkiAreaRow {
    pub id: String,
    name: String,
}

/// Container for the raw output of the runs SQL query
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RunRow {
    pub id: String,
    name: Option<String>,
    difficulty: Option<String>,
    status: Option<String>,
    locality: Option<String>,
    geometry_type: String,
    lons: Vec<f64>,
    lats: Vec<f64>,
    eles: Vec<f64>,
}

/// Container for the raw output of the lifts SQL query
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct LiftRow {
    pub id: String,
    name: Option<String>,
    lift_type: Option<String>,
    status: Option<String>,
    locality: Option<String>,
    geometry_type: String,
    lons: Vec<f64>,
    lats: Vec<f64>,
    eles: Vec<f64>,
}

/// Zip parallel coordinate arrays back into geometry. Polygons are returned
/// by the query as their exterior ring only. Multi-part geometry comes back
/// as one flat list of points, so the parts can't be told apart and it is
/// marked as unsupported along with any other type.
fn to_geometry(
    geometry_type: &str,
    lons: &[f64],
    lats: &[f64],
    eles: &[f64],
) -> Geometry {
    let coords: Vec<Position> = lons
        .iter()
        .zip(lats)
        .zip(eles)
        .map(|((lng, lat), elevation)| Position::new(*lng, *lat, *elevation))
        .collect();

    match (geometry_type, coords.first()) {
        ("ST_LineString", _) => Geometry::LineString(coords),
        ("ST_Polygon", _) => Geometry::Polygon(vec![coords]),
        ("ST_Point", Some(point)) => Geometry::Point(*point),
        _ => Geometry::Unsupported(geometry_type.to_string()),
    }
}

fn to_status(raw: Option<&str>) -> FeatureStatus {
    raw.map(FeatureStatus::from).unwrap_or_default()
}

impl From<RunRow> for Run {
    fn from(row: RunRow) -> Run {
        let geometry =
            to_geometry(&row.geometry_type, &row.lons, &row.lats, &row.eles);
        Run {
            difficulty: row
                .difficulty
                .as_deref()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(Difficulty::Unknown),
            status: to_status(row.status.as_deref()),
            id: row.id,
            name: row.name,
            locality: row.locality,
            geometry,
        }
    }
}

impl From<LiftRow> for Lift {
    fn from(row: LiftRow) -> Lift {
        let geometry =
            to_geometry(&row.geometry_type, &row.lons, &row.lats, &row.eles);
        Lift {
            lift_type: row
                .lift_type
                .as_deref()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(LiftType::Unknown),
            status: to_status(row.status.as_deref()),
            id: row.id,
            name: row.name,
            locality: row.locality,
            geometry,
        }
    }
}

/// Executes the ski area, runs and lifts SQL queries and assembles the
/// results into a single dataset
pub async fn load_ski_area(
    pool: &PgPool,
    ski_area_id: &str,
) -> Result<SkiArea> {
    let header: Option<SkiAreaRow> =
        sqlx::query_as(include_str!("sql/get_ski_area.sql"))
            .bind(ski_area_id)
            .fetch_optional(pool)
            .await?;

    let Some(header) = header else {
        return Err(Error::UnknownSkiArea {
            id: ski_area_id.to_string(),
        });
    };

    let runs: Vec<RunRow> = sqlx::query_as(include_str!("sql/get_runs.sql"))
        .bind(ski_area_id)
        .fetch_all(pool)
        .await?;

    let lifts: Vec<LiftRow> = sqlx::query_as(include_str!("sql/get_lifts.sql"))
        .bind(ski_area_id)
        .fetch_all(pool)
        .await?;

    info!(
        ski_area = %header.id,
        runs = runs.len(),
        lifts = lifts.len(),
        "loaded dataset from database"
    );

    Ok(SkiArea {
        id: header.id,
        name: header.name,
        runs: runs.into_iter().map(Run::from).collect(),
        lifts: lifts.into_iter().map(Lift::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::GraphConfig;
    use crate::common::graph_data::NavigationGraph;
    use crate::loading::builder::add_run;

    #[test]
    fn test_run_row_to_run() {
        let test_row = RunRow {
            id: "R1".to_string(),
            name: Some("Blue Ribbon".to_string()),
            difficulty: Some("easy".to_string()),
            status: Some("operating".to_string()),
            locality: None,
            geometry_type: "ST_LineString".to_string(),
            lons: vec![6.0, 6.1],
            lats: vec![45.0, 45.1],
            eles: vec![2000.0, 1500.0],
        };

        let target = Run {
            id: "R1".to_string(),
            name: Some("Blue Ribbon".to_string()),
            difficulty: Difficulty::Easy,
            status: FeatureStatus::Operating,
            locality: None,
            geometry: Geometry::LineString(vec![
                Position::new(6.0, 45.0, 2000.0),
                Position::new(6.1, 45.1, 1500.0),
            ]),
        };

        let result: Run = test_row.into();

        assert_eq!(result, target);
    }

    /// Unrecognised values fall back to unknown rather than failing the
    /// whole load
    #[test]
    fn test_lift_row_to_lift() {
        let test_row = LiftRow {
            id: "L1".to_string(),
            name: None,
            lift_type: Some("hovercraft".to_string()),
            status: Some("construction".to_string()),
            locality: Some("Village".to_string()),
            geometry_type: "ST_LineString".to_string(),
            lons: vec![6.0, 6.1],
            lats: vec![45.0, 45.1],
            eles: vec![1500.0, 2000.0],
        };

        let result: Lift = test_row.into();

        assert_eq!(result.lift_type, LiftType::Unknown);
        assert_eq!(result.status, FeatureStatus::Construction);
        assert_eq!(result.locality.as_deref(), Some("Village"));
    }

    #[test]
    fn test_to_geometry_polygon() {
        let result = to_geometry(
            "ST_Polygon",
            &[0.0, 1.0, 1.0, 0.0],
            &[0.0, 0.0, 1.0, 0.0],
            &[3.0, 2.0, 1.0, 3.0],
        );

        match result {
            Geometry::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].len(), 4);
                assert_eq!(rings[0][2], Position::new(1.0, 1.0, 1.0));
            }
            other => panic!("expected a polygon, got {other:?}"),
        }
    }

    /// Anything which isn't a plain line or polygon is kept out of the
    /// graph
    #[test]
    fn test_unsupported_geometry() {
        let (lons, lats, eles) = (
            [0.0, 0.001, 0.001, 0.0],
            [0.01, 0.01, 0.0, 0.0],
            [2000.0, 1990.0, 1000.0, 1010.0],
        );

        for geometry_type in
            ["ST_MultiPolygon", "ST_MultiLineString", "ST_GeometryCollection"]
        {
            let geometry = to_geometry(geometry_type, &lons, &lats, &eles);
            assert_eq!(
                geometry,
                Geometry::Unsupported(geometry_type.to_string())
            );

            let run = Run {
                id: "R1".to_string(),
                name: None,
                difficulty: Difficulty::Easy,
                status: FeatureStatus::Operating,
                locality: None,
                geometry,
            };
            let mut graph = NavigationGraph::new();
            assert!(!add_run(&mut graph, &run, &GraphConfig::default()));
            assert_eq!(graph.edge_count(), 0);
        }

        assert_eq!(
            to_geometry("ST_Point", &[], &[], &[]),
            Geometry::Unsupported("ST_Point".to_string())
        );
    }
}

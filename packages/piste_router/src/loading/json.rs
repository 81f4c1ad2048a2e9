//! Read resort datasets which have been exported to disk as JSON. Each ski
//! area lives in its own file, named after its id.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::common::error::{Error, Result};
use crate::common::resort::SkiArea;

/// Parse a single ski area from a JSON document
pub fn parse_ski_area(raw: &str, path: &Path) -> Result<SkiArea> {
    serde_json::from_str(raw).map_err(|source| Error::DatasetParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a ski area from the JSON file at the provided path
pub fn load_ski_area_from_path(path: &Path) -> Result<SkiArea> {
    let raw = fs::read_to_string(path).map_err(|source| Error::DatasetRead {
        path: path.to_path_buf(),
        source,
    })?;
    let ski_area = parse_ski_area(&raw, path)?;

    info!(
        ski_area = %ski_area.id,
        runs = ski_area.runs.len(),
        lifts = ski_area.lifts.len(),
        "loaded dataset from {}",
        path.display()
    );

    Ok(ski_area)
}

/// Location of the dataset for a ski area within a dataset directory. Ids
/// containing anything other than alphanumerics, dashes and underscores
/// can't name a dataset.
fn dataset_path(dir: &Path, ski_area_id: &str) -> Option<PathBuf> {
    let valid = !ski_area_id.is_empty()
        && ski_area_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    valid.then(|| dir.join(format!("{ski_area_id}.json")))
}

/// Load a ski area by id from a directory of `<id>.json` files
pub fn load_ski_area(dir: &Path, ski_area_id: &str) -> Result<SkiArea> {
    let unknown = || Error::UnknownSkiArea {
        id: ski_area_id.to_string(),
    };

    let path = dataset_path(dir, ski_area_id).ok_or_else(unknown)?;
    if !path.is_file() {
        return Err(unknown());
    }
    load_ski_area_from_path(&path)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::common::geometry::Position;
    use crate::common::resort::{
        Difficulty, FeatureStatus, Geometry, LiftType,
    };

    const TEST_DATASET: &str = r#"{
        "id": "les-arcs",
        "name": "Les Arcs",
        "runs": [
            {
                "id": "R1",
                "name": "Aiguille Rouge",
                "difficulty": "expert",
                "locality": "Arc 2000",
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[6.86, 45.58, 3200.0], [6.84, 45.60, 1200.0]]
                }
            },
            {
                "id": "R2",
                "name": null,
                "status": "abandoned",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[6.8, 45.5, 2000.0], [6.81, 45.5, 1990.0], [6.81, 45.51, 1900.0], [6.8, 45.5, 2000.0]]]
                }
            }
        ],
        "lifts": [
            {
                "id": "L1",
                "name": "Transarc",
                "lift_type": "gondola",
                "status": "operating",
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[6.80, 45.57, 1600.0], [6.82, 45.58, 2600.0]]
                }
            },
            {
                "id": "L2",
                "name": "Drag",
                "lift_type": "t-bar",
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[6.80, 45.57, 1600.0], [6.80, 45.571, 1700.0]]
                }
            }
        ]
    }"#;

    /// Check that a complete dataset is read in, with defaults applied to
    /// missing fields
    #[test]
    fn test_parse_ski_area() {
        let result =
            parse_ski_area(TEST_DATASET, Path::new("test.json")).unwrap();

        assert_eq!(result.id, "les-arcs");
        assert_eq!(result.runs.len(), 2);
        assert_eq!(result.lifts.len(), 2);

        let r1 = result.run("R1").unwrap();
        assert_eq!(r1.difficulty, Difficulty::Expert);
        assert_eq!(r1.status, FeatureStatus::Unknown);
        assert_eq!(r1.locality.as_deref(), Some("Arc 2000"));
        assert_eq!(
            r1.geometry,
            Geometry::LineString(vec![
                Position::new(6.86, 45.58, 3200.0),
                Position::new(6.84, 45.60, 1200.0)
            ])
        );

        let r2 = result.run("R2").unwrap();
        assert_eq!(r2.difficulty, Difficulty::Unknown);
        assert_eq!(r2.status, FeatureStatus::Abandoned);
        assert!(matches!(r2.geometry, Geometry::Polygon(_)));

        assert_eq!(result.lift("L2").unwrap().lift_type, LiftType::TBar);
        assert_eq!(result.locality_of("R1"), Some("Arc 2000"));
    }

    #[test]
    fn test_parse_invalid() {
        let result = parse_ski_area("{\"id\": 5}", Path::new("bad.json"));

        assert!(matches!(result, Err(Error::DatasetParse { .. })));
    }

    #[test]
    fn test_dataset_path() {
        let dir = Path::new("/data");

        assert_eq!(
            dataset_path(dir, "les-arcs_2"),
            Some(PathBuf::from("/data/les-arcs_2.json"))
        );
        assert_eq!(dataset_path(dir, "../secrets"), None);
        assert_eq!(dataset_path(dir, ""), None);
    }

    /// Round trip through the filesystem, and a missing dataset is reported
    /// as an unknown ski area rather than an IO failure
    #[test]
    fn test_load_ski_area() {
        let dir = std::env::temp_dir()
            .join(format!("piste-router-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("les-arcs.json"), TEST_DATASET).unwrap();

        let result = load_ski_area(&dir, "les-arcs").unwrap();
        assert_eq!(result.name, "Les Arcs");

        let missing = load_ski_area(&dir, "val-thorens");
        assert!(matches!(missing, Err(Error::UnknownSkiArea { .. })));

        fs::remove_dir_all(&dir).unwrap();
    }
}

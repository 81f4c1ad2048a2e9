//! Structs which describe a resort as it is received from the outside world:
//! its runs and lifts, their geometry, and the live operational status which
//! is refreshed independently of the routing engine.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::error::Error;
use crate::common::geometry::Position;

/// Difficulty rating of a run, each rating has its own typical skiing speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Novice,
    Easy,
    Intermediate,
    Advanced,
    Expert,
    #[serde(other)]
    Unknown,
}

impl Difficulty {
    /// Typical speed of a skier on a run of this difficulty, in m/s
    pub fn speed(&self) -> f64 {
        match self {
            Difficulty::Novice => 4.0,
            Difficulty::Easy => 6.0,
            Difficulty::Intermediate => 8.0,
            Difficulty::Advanced => 10.0,
            Difficulty::Expert => 12.0,
            Difficulty::Unknown => 6.0,
        }
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(input: &str) -> Result<Difficulty, Self::Err> {
        match input.trim() {
            "novice" => Ok(Difficulty::Novice),
            "easy" => Ok(Difficulty::Easy),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            "expert" => Ok(Difficulty::Expert),
            "unknown" => Ok(Difficulty::Unknown),
            other => Err(Error::InvalidRequest {
                field: "difficulty",
                value: other.to_string(),
            }),
        }
    }
}

/// Type of uphill conveyance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiftType {
    Gondola,
    CableCar,
    ChairLift,
    DragLift,
    #[serde(rename = "t-bar")]
    TBar,
    #[serde(rename = "j-bar")]
    JBar,
    Platter,
    MagicCarpet,
    RopeTow,
    Funicular,
    #[serde(other)]
    Unknown,
}

impl LiftType {
    /// Typical line speed of this type of lift, in m/s
    pub fn speed(&self) -> f64 {
        match self {
            LiftType::Gondola => 6.0,
            LiftType::CableCar => 10.0,
            LiftType::ChairLift => 3.0,
            LiftType::DragLift => 2.5,
            LiftType::TBar => 3.0,
            LiftType::JBar => 3.0,
            LiftType::Platter => 2.5,
            LiftType::MagicCarpet => 0.8,
            LiftType::RopeTow => 2.0,
            LiftType::Funicular => 5.0,
            LiftType::Unknown => 3.0,
        }
    }
}

impl FromStr for LiftType {
    type Err = Error;

    fn from_str(input: &str) -> Result<LiftType, Self::Err> {
        match input.trim() {
            "gondola" => Ok(LiftType::Gondola),
            "cable_car" => Ok(LiftType::CableCar),
            "chair_lift" => Ok(LiftType::ChairLift),
            "drag_lift" => Ok(LiftType::DragLift),
            "t-bar" => Ok(LiftType::TBar),
            "j-bar" => Ok(LiftType::JBar),
            "platter" => Ok(LiftType::Platter),
            "magic_carpet" => Ok(LiftType::MagicCarpet),
            "rope_tow" => Ok(LiftType::RopeTow),
            "funicular" => Ok(LiftType::Funicular),
            "unknown" => Ok(LiftType::Unknown),
            other => Err(Error::InvalidRequest {
                field: "lift_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle status of a run or lift as recorded in the dataset. This is not
/// the same as whether it is open today, see [`LiveStatus`] for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Operating,
    Disused,
    Abandoned,
    Proposed,
    Planned,
    Construction,
    #[default]
    #[serde(other)]
    Unknown,
}

impl FeatureStatus {
    /// Whether a feature with this status can be used at all
    pub fn is_usable(&self) -> bool {
        matches!(self, FeatureStatus::Operating | FeatureStatus::Unknown)
    }
}

impl From<&str> for FeatureStatus {
    fn from(raw: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(raw.to_string()))
            .unwrap_or_default()
    }
}

/// Feature geometry, following the shape of GeoJSON geometry objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    LineString(Vec<Position>),
    Polygon(Vec<Vec<Position>>),
    Point(Position),
    MultiLineString(Vec<Vec<Position>>),
    /// Any other geometry, named by its original type. Never routable.
    #[serde(skip_deserializing)]
    Unsupported(String),
}

/// A downhill ski trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub name: Option<String>,
    #[serde(default = "unknown_difficulty")]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub status: FeatureStatus,
    /// Named region of the resort this run belongs to
    #[serde(default)]
    pub locality: Option<String>,
    pub geometry: Geometry,
}

fn unknown_difficulty() -> Difficulty {
    Difficulty::Unknown
}

/// An uphill conveyance, drawn from its base station to its top station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lift {
    pub id: String,
    pub name: Option<String>,
    #[serde(default = "unknown_lift_type")]
    pub lift_type: LiftType,
    #[serde(default)]
    pub status: FeatureStatus,
    #[serde(default)]
    pub locality: Option<String>,
    pub geometry: Geometry,
}

fn unknown_lift_type() -> LiftType {
    LiftType::Unknown
}

/// A complete resort dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkiArea {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default)]
    pub lifts: Vec<Lift>,
}

impl SkiArea {
    pub fn run(&self, id: &str) -> Option<&Run> {
        self.runs.iter().find(|run| run.id == id)
    }

    pub fn lift(&self, id: &str) -> Option<&Lift> {
        self.lifts.iter().find(|lift| lift.id == id)
    }

    /// Named region of whichever run or lift has the provided id
    pub fn locality_of(&self, feature_id: &str) -> Option<&str> {
        self.run(feature_id)
            .and_then(|run| run.locality.as_deref())
            .or_else(|| {
                self.lift(feature_id)
                    .and_then(|lift| lift.locality.as_deref())
            })
    }
}

/// Live operational state of the resort, keyed by run/lift id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveStatus {
    #[serde(default)]
    pub closed_lifts: FxHashSet<String>,
    #[serde(default)]
    pub closed_runs: FxHashSet<String>,
    /// Minutes from now until each feature stops running
    #[serde(default)]
    pub minutes_until_close: FxHashMap<String, f64>,
}

impl LiveStatus {
    pub fn is_closed(&self, feature_id: &str) -> bool {
        self.closed_lifts.contains(feature_id)
            || self.closed_runs.contains(feature_id)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Difficulty::Novice => "novice",
            Difficulty::Easy => "easy",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
            Difficulty::Unknown => "unknown",
        };
        f.write_str(value)
    }
}

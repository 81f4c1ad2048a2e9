//! Geometric helpers for working with trail and lift coordinates. Distances
//! over the surface of the planet are calculated with the haversine formula,
//! elevation is then folded in to give the length actually travelled.
//! Projections onto short line segments use a local equirectangular
//! approximation, which is accurate to well under a metre at resort scale.

use geo::{Bearing, Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

/// Mean radius of the earth in metres, matching the value used by geo
pub const EARTH_RADIUS: f64 = 6_371_008.8;

/// Tolerance below which two lengths are treated as equal
const EPSILON: f64 = 1e-9;

/// A single point of trail or lift geometry. Serialized as a
/// `[lng, lat, elevation]` triple, as is the convention for GeoJSON
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Position {
    pub lng: f64,
    pub lat: f64,
    pub elevation: f64,
}

impl Position {
    pub fn new(lng: f64, lat: f64, elevation: f64) -> Self {
        Position {
            lng,
            lat,
            elevation,
        }
    }

    /// Drop the elevation, giving a 2d point for use with geo
    pub fn point(&self) -> Point {
        Point::new(self.lng, self.lat)
    }
}

impl From<[f64; 3]> for Position {
    fn from(raw: [f64; 3]) -> Self {
        Position::new(raw[0], raw[1], raw[2])
    }
}

impl From<Position> for [f64; 3] {
    fn from(pos: Position) -> Self {
        [pos.lng, pos.lat, pos.elevation]
    }
}

/// Great-circle distance between two positions, ignoring elevation
pub fn haversine(a: &Position, b: &Position) -> f64 {
    Haversine::distance(a.point(), b.point())
}

/// Distance between two positions once the change in elevation is taken
/// into account
pub fn distance_3d(a: &Position, b: &Position) -> f64 {
    let horizontal = haversine(a, b);
    let vertical = b.elevation - a.elevation;
    (horizontal.powi(2) + vertical.powi(2)).sqrt()
}

/// Total 3d length of a path
pub fn path_length(coords: &[Position]) -> f64 {
    coords.windows(2).map(|w| distance_3d(&w[0], &w[1])).sum()
}

/// Compass bearing in degrees (0 = north, clockwise) from a to b
pub fn bearing(a: &Position, b: &Position) -> f64 {
    Haversine::bearing(a.point(), b.point()).rem_euclid(360.0)
}

/// The direction a slope faces, i.e. the bearing from its highest point to
/// its lowest point. Returns None for flat or degenerate geometry.
pub fn aspect(coords: &[Position]) -> Option<f64> {
    let highest = coords
        .iter()
        .max_by(|a, b| a.elevation.total_cmp(&b.elevation))?;
    let lowest = coords
        .iter()
        .min_by(|a, b| a.elevation.total_cmp(&b.elevation))?;

    if (highest.elevation - lowest.elevation).abs() < EPSILON
        || haversine(highest, lowest) < EPSILON
    {
        return None;
    }

    Some(bearing(highest, lowest))
}

/// Linear interpolation between two positions, elevation included
pub fn interpolate(a: &Position, b: &Position, fraction: f64) -> Position {
    Position {
        lng: a.lng + (b.lng - a.lng) * fraction,
        lat: a.lat + (b.lat - a.lat) * fraction,
        elevation: a.elevation + (b.elevation - a.elevation) * fraction,
    }
}

/// Offset of `pos` from `origin` in metres (east, north), using an
/// equirectangular projection centred on the origin
fn to_local(origin: &Position, pos: &Position) -> (f64, f64) {
    let cos_lat = origin.lat.to_radians().cos();
    let x = (pos.lng - origin.lng).to_radians() * EARTH_RADIUS * cos_lat;
    let y = (pos.lat - origin.lat).to_radians() * EARTH_RADIUS;
    (x, y)
}

/// The result of projecting a point onto a line segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// The closest point on the segment, with interpolated elevation
    pub position: Position,
    /// How far along the segment the closest point lies, in [0, 1]
    pub fraction: f64,
    /// Horizontal distance from the projected point to the segment
    pub distance: f64,
}

/// Find the closest point on the segment a-b to p, using the scalar
/// projection of a->p onto a->b clamped to the extent of the segment
pub fn project_onto_segment(
    p: &Position,
    a: &Position,
    b: &Position,
) -> Projection {
    let (bx, by) = to_local(a, b);
    let (px, py) = to_local(a, p);

    let seg_len_sq = bx * bx + by * by;
    let fraction = if seg_len_sq < EPSILON {
        0.0
    } else {
        ((px * bx + py * by) / seg_len_sq).clamp(0.0, 1.0)
    };

    let position = interpolate(a, b, fraction);

    Projection {
        position,
        fraction,
        distance: haversine(p, &position),
    }
}

/// Closest approach between two line segments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Approach {
    pub distance: f64,
    /// Fraction along the first segment at which the approach occurs
    pub fraction_a: f64,
    /// Fraction along the second segment at which the approach occurs
    pub fraction_b: f64,
}

/// Determine the closest pair of points between segments a0-a1 and b0-b1.
/// Crossing segments have an approach distance of zero at the crossing.
pub fn closest_approach(
    a0: &Position,
    a1: &Position,
    b0: &Position,
    b1: &Position,
) -> Approach {
    let origin = a0;
    let (ux, uy) = to_local(origin, a1);
    let (b0x, b0y) = to_local(origin, b0);
    let (b1x, b1y) = to_local(origin, b1);
    let (vx, vy) = (b1x - b0x, b1y - b0y);
    let (rx, ry) = (-b0x, -b0y);

    let a = ux * ux + uy * uy;
    let e = vx * vx + vy * vy;
    let f = vx * rx + vy * ry;

    let (s, t) = if a < EPSILON && e < EPSILON {
        (0.0, 0.0)
    } else if a < EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = ux * rx + uy * ry;
        if e < EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = ux * vx + uy * vy;
            let denom = a * e - b * b;
            let mut s = if denom.abs() > EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    let (dx, dy) = (
        ux * s - (b0x + vx * t),
        uy * s - (b0y + vy * t),
    );

    Approach {
        distance: (dx * dx + dy * dy).sqrt(),
        fraction_a: s,
        fraction_b: t,
    }
}

/// Where a position lies in relation to a path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathLocation {
    /// 3d distance along the path from its first point to the closest point
    pub along: f64,
    pub projection: Projection,
}

/// Find the point on a path closest to `p`. Where several points are
/// equally close, the one furthest up the path is used.
pub fn locate_along(coords: &[Position], p: &Position) -> Option<PathLocation> {
    let mut best: Option<PathLocation> = None;
    let mut travelled = 0.0;

    for w in coords.windows(2) {
        let step = distance_3d(&w[0], &w[1]);
        let projection = project_onto_segment(p, &w[0], &w[1]);

        let closer = match &best {
            Some(loc) => projection.distance < loc.projection.distance,
            None => true,
        };
        if closer {
            best = Some(PathLocation {
                along: travelled + projection.fraction * step,
                projection,
            });
        }
        travelled += step;
    }

    best
}

/// Closest approach between two whole paths
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathApproach {
    pub distance: f64,
    /// Distance along the first path at which the approach occurs
    pub along_a: f64,
    /// Distance along the second path at which the approach occurs
    pub along_b: f64,
    /// Point on the first path at the approach
    pub point_a: Position,
    /// Point on the second path at the approach
    pub point_b: Position,
}

/// Determine where two paths come closest to each other, checking every
/// pair of line segments
pub fn closest_approach_between(
    a: &[Position],
    b: &[Position],
) -> Option<PathApproach> {
    let mut best: Option<PathApproach> = None;

    let mut travelled_a = 0.0;
    for wa in a.windows(2) {
        let step_a = distance_3d(&wa[0], &wa[1]);

        let mut travelled_b = 0.0;
        for wb in b.windows(2) {
            let step_b = distance_3d(&wb[0], &wb[1]);
            let approach = closest_approach(&wa[0], &wa[1], &wb[0], &wb[1]);

            let closer = match &best {
                Some(found) => approach.distance < found.distance,
                None => true,
            };
            if closer {
                best = Some(PathApproach {
                    distance: approach.distance,
                    along_a: travelled_a + approach.fraction_a * step_a,
                    along_b: travelled_b + approach.fraction_b * step_b,
                    point_a: interpolate(&wa[0], &wa[1], approach.fraction_a),
                    point_b: interpolate(&wb[0], &wb[1], approach.fraction_b),
                });
            }
            travelled_b += step_b;
        }
        travelled_a += step_a;
    }

    best
}

/// Cut the portion of a path lying between two distances (measured in 3d
/// along the path from its first point). Points at the cut locations are
/// interpolated, so the result starts and ends exactly at `from` and `to`.
pub fn slice_by_distance(
    coords: &[Position],
    from: f64,
    to: f64,
) -> Vec<Position> {
    let mut sliced = Vec::new();
    let mut travelled = 0.0;

    for w in coords.windows(2) {
        let step = distance_3d(&w[0], &w[1]);
        let (seg_start, seg_end) = (travelled, travelled + step);

        if seg_end >= from && seg_start <= to && step > EPSILON {
            if sliced.is_empty() {
                let fraction = ((from - seg_start) / step).clamp(0.0, 1.0);
                sliced.push(interpolate(&w[0], &w[1], fraction));
            }
            if seg_end <= to {
                sliced.push(w[1]);
            } else {
                let fraction = ((to - seg_start) / step).clamp(0.0, 1.0);
                sliced.push(interpolate(&w[0], &w[1], fraction));
            }
        }

        travelled = seg_end;
        if travelled >= to {
            break;
        }
    }

    sliced.dedup();
    sliced
}

/// Split a path into `pieces` parts of equal 3d length. Consecutive parts
/// share their boundary point.
pub fn split_evenly(coords: &[Position], pieces: usize) -> Vec<Vec<Position>> {
    let total = path_length(coords);
    if pieces <= 1 || total < EPSILON {
        return vec![coords.to_vec()];
    }

    let step = total / pieces as f64;
    (0..pieces)
        .map(|inx| {
            let from = step * inx as f64;
            // Guard against floating point drift cutting off the last point
            let to = if inx + 1 == pieces {
                total
            } else {
                step * (inx + 1) as f64
            };
            slice_by_distance(coords, from, to)
        })
        .collect()
}

//! R-tree indexes for finding graph nodes and run geometry near a location.
//! Positions are stored projected onto a flat plane in metres around a
//! reference latitude. That is only used to shortlist candidates, every
//! candidate is then checked against its great-circle distance.

use rstar::RTree;
use rstar::primitives::{GeomWithData, Line};

use crate::common::geometry::{EARTH_RADIUS, Position, haversine};

/// Leeway given to shortlists over the requested radius, covering the
/// distortion of the flat projection away from its reference latitude
const PROJECTION_SLACK: f64 = 1.05;
const PROJECTION_MARGIN: f64 = 10.0;

fn with_slack(radius: f64) -> f64 {
    radius * PROJECTION_SLACK + PROJECTION_MARGIN
}

/// Equirectangular projection onto metres, scaled for one latitude
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlanarFrame {
    cos_lat: f64,
}

impl PlanarFrame {
    fn new(reference_lat: f64) -> Self {
        PlanarFrame {
            cos_lat: reference_lat.to_radians().cos(),
        }
    }

    fn project(&self, pos: &Position) -> [f64; 2] {
        [
            pos.lng.to_radians() * EARTH_RADIUS * self.cos_lat,
            pos.lat.to_radians() * EARTH_RADIUS,
        ]
    }
}

fn planar_distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let (dx, dy) = (a[0] - b[0], a[1] - b[1]);
    (dx * dx + dy * dy).sqrt()
}

type IndexedPoint<T> = GeomWithData<[f64; 2], (Position, T)>;

/// Points on the map, each tagged with a value
#[derive(Debug, Clone)]
pub struct PointIndex<T> {
    frame: Option<PlanarFrame>,
    tree: RTree<IndexedPoint<T>>,
}

impl<T> Default for PointIndex<T> {
    fn default() -> Self {
        PointIndex {
            frame: None,
            tree: RTree::new(),
        }
    }
}

impl<T> PointIndex<T> {
    /// Build an index in one go, projected around the first point
    pub fn bulk_load(points: Vec<(Position, T)>) -> Self {
        let Some((first, _)) = points.first() else {
            return PointIndex::default();
        };
        let frame = PlanarFrame::new(first.lat);

        let entries = points
            .into_iter()
            .map(|(pos, value)| {
                GeomWithData::new(frame.project(&pos), (pos, value))
            })
            .collect();

        PointIndex {
            frame: Some(frame),
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn insert(&mut self, pos: Position, value: T) {
        let frame = *self.frame.get_or_insert(PlanarFrame::new(pos.lat));
        self.tree
            .insert(GeomWithData::new(frame.project(&pos), (pos, value)));
    }

    fn frame_for(&self, pos: &Position) -> PlanarFrame {
        self.frame.unwrap_or(PlanarFrame::new(pos.lat))
    }

    /// Values of every point within `radius` metres of `pos`, in no
    /// particular order
    pub fn within<'a>(
        &'a self,
        pos: &'a Position,
        radius: f64,
    ) -> impl Iterator<Item = &'a T> + 'a {
        let query = self.frame_for(pos).project(pos);
        let reach = with_slack(radius);

        self.tree
            .locate_within_distance(query, reach * reach)
            .filter(move |entry| haversine(pos, &entry.data.0) <= radius)
            .map(|entry| &entry.data.1)
    }

    /// Value of the point closest to `pos`, out of those accepted. Ties go
    /// to whichever the tree yields first.
    pub fn nearest_by<F>(&self, pos: &Position, accept: F) -> Option<&T>
    where
        F: Fn(&T) -> bool,
    {
        let query = self.frame_for(pos).project(pos);

        let mut best: Option<(f64, &T)> = None;
        for entry in self.tree.nearest_neighbor_iter(&query) {
            let planar = planar_distance(entry.geom(), &query);
            if let Some((dist, _)) = best {
                // Nothing further out can beat the current best
                if planar > with_slack(dist) {
                    break;
                }
            }

            let (point, value) = &entry.data;
            if !accept(value) {
                continue;
            }
            let dist = haversine(pos, point);
            if best.is_none_or(|(best_dist, _)| dist < best_dist) {
                best = Some((dist, value));
            }
        }

        best.map(|(_, value)| value)
    }

    pub fn nearest(&self, pos: &Position) -> Option<&T> {
        self.nearest_by(pos, |_| true)
    }
}

/// Straight line segments on the map, each tagged with a value
#[derive(Debug, Clone)]
pub struct SegmentIndex<T> {
    frame: PlanarFrame,
    tree: RTree<GeomWithData<Line<[f64; 2]>, T>>,
}

impl<T> SegmentIndex<T> {
    /// Build an index of segments, projected around the start of the first
    pub fn bulk_load(segments: Vec<(Position, Position, T)>) -> Self {
        let frame = PlanarFrame::new(
            segments.first().map(|(start, _, _)| start.lat).unwrap_or(0.0),
        );

        let entries = segments
            .into_iter()
            .map(|(start, end, value)| {
                let line =
                    Line::new(frame.project(&start), frame.project(&end));
                GeomWithData::new(line, value)
            })
            .collect();

        SegmentIndex {
            frame,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Values of every segment which might pass within `radius` metres of
    /// `pos`. This is a shortlist, exact distances are left to the caller.
    pub fn candidates<'a>(
        &'a self,
        pos: &Position,
        radius: f64,
    ) -> impl Iterator<Item = &'a T> + 'a {
        let reach = with_slack(radius);
        self.tree
            .locate_within_distance(self.frame.project(pos), reach * reach)
            .map(|entry| &entry.data)
    }
}

//! Refine a route once it has been found. The graph only knows about the
//! ends of each run and a handful of points in between, so the raw route
//! can take detours which the real pistes make unnecessary. The rewrites
//! here use the full run geometry to straighten those out, and a final
//! cleanup tidies the list of instructions presented to the user.
//!
//! Optimisation is capped at a fixed number of passes. The rewrites can
//! interact, and a cap guarantees termination at the cost of occasionally
//! stopping short of the best possible result.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::common::geometry::{
    Position, closest_approach_between, haversine, locate_along, path_length,
    slice_by_distance,
};
use crate::common::graph_data::EdgeType;
use crate::common::resort::{Run, SkiArea};
use crate::loading::builder::downhill_coords;
use crate::routing::structs::{NavigationRoute, RouteSegment};

/// Upper bound on the number of optimisation passes
pub const MAX_PASSES: usize = 5;

/// How close a walk's endpoints must be to a run for the run to replace it
const WALK_COVER_TOLERANCE: f64 = 30.0;

/// How close a later point of a segment must be to the end of the previous
/// segment for the segment to be cut short
const SHORTCUT_TOLERANCE: f64 = 30.0;

/// How close two runs must pass for them to be spliced together
const FUSION_TOLERANCE: f64 = 20.0;

/// Walks shorter than this are removed during cleanup
const MIN_WALK_LENGTH: f64 = 100.0;

/// A run along with its geometry in the direction it is skied
struct RunGeometry<'a> {
    run: &'a Run,
    coords: Vec<Position>,
}

fn get_run_geometries(ski_area: &SkiArea) -> Vec<RunGeometry<'_>> {
    ski_area
        .runs
        .iter()
        .filter(|run| run.status.is_usable())
        .filter_map(|run| {
            downhill_coords(run).map(|coords| RunGeometry { run, coords })
        })
        .collect()
}

/// Give a segment new geometry, keeping its speed but updating its
/// distance, time and elevation change to match
fn reshape(
    segment: &RouteSegment,
    coordinates: Vec<Position>,
) -> Option<RouteSegment> {
    if coordinates.len() < 2 || segment.distance <= 0.0 || segment.time <= 0.0
    {
        return None;
    }
    let speed = segment.distance / segment.time;
    let distance = path_length(&coordinates);
    let elevation_change =
        coordinates.last()?.elevation - coordinates.first()?.elevation;

    let mut reshaped = RouteSegment {
        distance,
        time: distance / speed,
        elevation_change,
        coordinates,
        ..segment.clone()
    };
    reshaped.refresh_bearing();
    Some(reshaped)
}

/// Check whether a run covers the same ground as a walk, returning the
/// quickest skiable replacement if one exists. The replacement keeps the
/// walk's exact endpoints so that the route stays connected.
fn cover_walk(
    walk: &RouteSegment,
    runs: &[RunGeometry],
) -> Option<RouteSegment> {
    let (start, end) = (walk.start()?, walk.end()?);
    let mut best: Option<RouteSegment> = None;

    for RunGeometry { run, coords } in runs {
        let (Some(from), Some(to)) =
            (locate_along(coords, start), locate_along(coords, end))
        else {
            continue;
        };
        if from.projection.distance > WALK_COVER_TOLERANCE
            || to.projection.distance > WALK_COVER_TOLERANCE
            || from.along >= to.along
        {
            continue;
        }

        let mut path = vec![*start];
        path.extend(slice_by_distance(coords, from.along, to.along));
        path.push(*end);
        path.dedup();

        let distance = path_length(&path);
        let time = distance / run.difficulty.speed();
        let quickest = match &best {
            Some(found) => time < found.time,
            None => time < walk.time,
        };
        if !quickest {
            continue;
        }

        let mut replacement = RouteSegment {
            segment_type: EdgeType::Run,
            name: run.name.clone(),
            feature_id: run.id.clone(),
            difficulty: Some(run.difficulty),
            lift_type: None,
            distance,
            time,
            elevation_change: end.elevation - start.elevation,
            coordinates: path,
            ..walk.clone()
        };
        replacement.refresh_bearing();
        best = Some(replacement);
    }

    best
}

/// Replace walks with skiing wherever a run covers the same ground
fn substitute_walks(
    segments: &mut [RouteSegment],
    runs: &[RunGeometry],
) -> bool {
    let mut changed = false;
    for segment in segments.iter_mut() {
        if segment.segment_type != EdgeType::Walk {
            continue;
        }
        if let Some(replacement) = cover_walk(segment, runs) {
            debug!(run = %replacement.feature_id, "replaced walk with run");
            *segment = replacement;
            changed = true;
        }
    }
    changed
}

/// Cut the start off a segment if a later point along it is closer to
/// `target` than the segment's own start. At least one point after the
/// cut is always kept.
fn truncate_towards(
    segment: &RouteSegment,
    target: &Position,
) -> Option<RouteSegment> {
    let first = segment.start()?;
    let base = haversine(target, first);
    let last_inx = segment.coordinates.len().checked_sub(1)?;

    let (cut, distance) = segment.coordinates[..last_inx]
        .iter()
        .enumerate()
        .skip(1)
        .map(|(inx, pos)| (inx, haversine(target, pos)))
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    if distance > SHORTCUT_TOLERANCE || distance >= base {
        return None;
    }

    let mut coordinates = vec![*target];
    coordinates.extend_from_slice(&segment.coordinates[cut..]);
    reshape(segment, coordinates)
}

/// Remove backtracking where the next segment passes closer to the end of
/// the current one than its own start does. Lifts can only be boarded at
/// their base, so they are never cut short.
fn truncate_shortcuts(segments: &mut [RouteSegment]) -> bool {
    let mut changed = false;
    for inx in 1..segments.len() {
        let (head, tail) = segments.split_at_mut(inx);
        let next = &mut tail[0];
        if next.segment_type == EdgeType::Lift {
            continue;
        }
        let Some(target) = head[inx - 1].end().copied() else {
            continue;
        };
        if let Some(truncated) = truncate_towards(next, &target) {
            debug!(segment = %next.feature_id, "truncated backtracking");
            *next = truncated;
            changed = true;
        }
    }
    changed
}

/// Splice two runs together where their geometries meet, removing the
/// walk between them. Only applied when it makes the route quicker.
fn fuse(
    first: &RouteSegment,
    walk: &RouteSegment,
    second: &RouteSegment,
    runs: &FxHashMap<&str, &[Position]>,
) -> Option<(RouteSegment, RouteSegment)> {
    if first.segment_type != EdgeType::Run
        || walk.segment_type != EdgeType::Walk
        || second.segment_type != EdgeType::Run
        || first.feature_id == second.feature_id
    {
        return None;
    }

    let geom_a = *runs.get(first.feature_id.as_str())?;
    let geom_b = *runs.get(second.feature_id.as_str())?;

    let meeting = closest_approach_between(geom_a, geom_b)?;
    if meeting.distance > FUSION_TOLERANCE {
        return None;
    }

    let (start, end) = (*first.start()?, *second.end()?);
    let from = locate_along(geom_a, &start)?.along;
    let to = locate_along(geom_b, &end)?.along;
    if meeting.along_a <= from || meeting.along_b >= to {
        return None;
    }

    // Both halves meet exactly at the splice point on the first run
    let splice = meeting.point_a;
    let mut coords_a = slice_by_distance(geom_a, from, meeting.along_a);
    let mut coords_b = slice_by_distance(geom_b, meeting.along_b, to);
    if coords_a.len() < 2 || coords_b.len() < 2 {
        return None;
    }
    coords_a[0] = start;
    let last = coords_a.len() - 1;
    coords_a[last] = splice;
    coords_b[0] = splice;
    let last = coords_b.len() - 1;
    coords_b[last] = end;

    let fused_a = reshape(first, coords_a)?;
    let fused_b = reshape(second, coords_b)?;

    let before = first.time + walk.time + second.time;
    if fused_a.time + fused_b.time >= before {
        return None;
    }
    Some((fused_a, fused_b))
}

/// Find run, walk, run sequences where the two runs pass close to each
/// other, and splice the runs together
fn fuse_runs(segments: &mut Vec<RouteSegment>, runs: &[RunGeometry]) -> bool {
    let lookup: FxHashMap<&str, &[Position]> = runs
        .iter()
        .map(|geom| (geom.run.id.as_str(), geom.coords.as_slice()))
        .collect();

    let mut changed = false;
    let mut inx = 0;
    while inx + 2 < segments.len() {
        let fused = fuse(
            &segments[inx],
            &segments[inx + 1],
            &segments[inx + 2],
            &lookup,
        );
        if let Some((first, second)) = fused {
            debug!(
                first = %first.feature_id,
                second = %second.feature_id,
                "spliced runs together"
            );
            segments[inx] = first;
            segments[inx + 1] = second;
            segments.remove(inx + 2);
            changed = true;
        }
        inx += 1;
    }
    changed
}

/// Apply the walk substitution, shortcut truncation and run fusion rewrites
/// until the route stops changing, or the pass limit is reached
pub fn optimize_route(
    route: NavigationRoute,
    ski_area: &SkiArea,
) -> NavigationRoute {
    let NavigationRoute {
        from,
        to,
        mut segments,
        ..
    } = route;
    let runs = get_run_geometries(ski_area);

    for pass in 0..MAX_PASSES {
        let mut changed = substitute_walks(&mut segments, &runs);
        changed |= truncate_shortcuts(&mut segments);
        changed |= fuse_runs(&mut segments, &runs);

        if !changed {
            break;
        }
        debug!(pass, "optimisation pass changed the route");
    }

    NavigationRoute::from_segments(&from, &to, segments)
}

/// Whether two neighbouring segments read as a single instruction
fn is_continuation(prev: &RouteSegment, next: &RouteSegment) -> bool {
    if prev.segment_type != next.segment_type {
        return false;
    }
    match prev.segment_type {
        EdgeType::Walk => true,
        EdgeType::Lift => prev.feature_id == next.feature_id,
        EdgeType::Run => {
            prev.feature_id == next.feature_id
                || (prev.name.is_none()
                    && next.name.is_none()
                    && prev.difficulty == next.difficulty)
        }
    }
}

/// Join consecutive segments which continue one another
fn merge_continuations(segments: Vec<RouteSegment>) -> Vec<RouteSegment> {
    let mut merged: Vec<RouteSegment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match merged.last_mut() {
            Some(prev) if is_continuation(prev, &segment) => {
                prev.absorb(segment)
            }
            _ => merged.push(segment),
        }
    }
    merged
}

/// Fold walks which are too short to be worth an instruction into the
/// segment which follows them, or the one before if they come last
fn drop_short_walks(segments: Vec<RouteSegment>) -> Vec<RouteSegment> {
    let mut kept: Vec<RouteSegment> = Vec::with_capacity(segments.len());
    let mut pending: Option<RouteSegment> = None;

    for segment in segments {
        let is_short_walk = segment.segment_type == EdgeType::Walk
            && segment.distance < MIN_WALK_LENGTH;

        if is_short_walk {
            pending = Some(match pending.take() {
                Some(mut walk) => {
                    walk.absorb(segment);
                    walk
                }
                None => segment,
            });
            continue;
        }

        match pending.take() {
            Some(mut walk) => {
                // Take on the identity of the segment the walk leads into
                let mut host = segment.clone();
                walk.absorb(segment);
                host.coordinates = walk.coordinates;
                host.distance = walk.distance;
                host.time = walk.time;
                host.elevation_change = walk.elevation_change;
                host.from_node = walk.from_node;
                host.edge_ids = walk.edge_ids;
                host.refresh_bearing();
                kept.push(host);
            }
            None => kept.push(segment),
        }
    }

    // A route which is nothing but a short walk keeps it
    if let Some(walk) = pending {
        match kept.last_mut() {
            Some(last) => last.absorb(walk),
            None => kept.push(walk),
        }
    }

    kept
}

/// Tidy up the instructions of a route: consecutive walks are merged, walks
/// under 100m are folded away, and consecutive pieces of the same run (or of
/// unnamed runs of the same difficulty) are merged. Totals are recomputed
/// from the resulting segments.
pub fn cleanup_segments(route: NavigationRoute) -> NavigationRoute {
    let NavigationRoute {
        from, to, segments, ..
    } = route;

    let walks_merged = merge_continuations(segments);
    let walks_dropped = drop_short_walks(walks_merged);
    let segments = merge_continuations(walks_dropped);

    NavigationRoute::from_segments(&from, &to, segments)
}

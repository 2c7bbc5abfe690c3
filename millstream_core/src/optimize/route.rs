//! Route grouping: reorder independent drill sets nearest-first.
//!
//! The trace must decompose into "drill sets" framed by a descent through
//! Z0 and a lift back above it, with Z never moving together with X or Y.
//! When the structure does not hold the pass reports an error without
//! touching the trace.

use glam::DVec3;
use thiserror::Error;

use crate::vm::{Machine, MoveMode, Position};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OptimizeError {
    #[error("complex z-motion detected")]
    ComplexZMotion,
    #[error("rapid move in stock detected")]
    RapidBelowZero,
    #[error("move above stock detected")]
    MoveAboveStock,
    #[error("multiple drill feedrates detected")]
    MultipleDrillFeedrates,
    #[error("unable to detect safety height")]
    NoSafetyHeight,
    #[error("unable to detect drill feedrate")]
    NoDrillFeedrate,
    #[error("incomplete final drill set")]
    IncompleteFinalSet,
}

fn planar_distance(from: DVec3, to: &Position) -> f64 {
    (from.x - to.x).hypot(from.y - to.y)
}

impl Machine {
    pub fn opt_route_grouping(&mut self) -> Result<(), OptimizeError> {
        let mut sets: Vec<Vec<Position>> = Vec::new();
        let mut cur_set: Vec<Position> = Vec::new();
        let (mut last_x, mut last_y, mut last_z) = (0.0, 0.0, 0.0);
        let mut safety_height = 0.0_f64;
        let mut drill_feed = 0.0_f64;
        let mut started = false;

        for pos in &self.positions {
            if pos.z != last_z && (pos.x != last_x || pos.y != last_y) {
                return Err(OptimizeError::ComplexZMotion);
            }

            let mut in_set = started;
            if pos.x == last_x && pos.y == last_y {
                if last_z >= 0.0 && pos.z < 0.0 {
                    // Descent: a new set begins.
                    started = true;
                    in_set = true;
                    if pos.state.move_mode == MoveMode::Linear && pos.state.feedrate > drill_feed {
                        if drill_feed != 0.0 {
                            return Err(OptimizeError::MultipleDrillFeedrates);
                        }
                        drill_feed = pos.state.feedrate;
                    }
                } else if last_z < 0.0 && pos.z >= 0.0 {
                    // Lift: the set is closed, the lift itself excluded.
                    if started {
                        sets.push(std::mem::take(&mut cur_set));
                    }
                    started = false;
                    in_set = false;
                }
            } else if pos.z < 0.0 && pos.state.move_mode == MoveMode::Rapid {
                return Err(OptimizeError::RapidBelowZero);
            }

            if in_set {
                // Unreachable under the complex-z and lift checks above;
                // kept as a hard stop should the set framing ever regress.
                if pos.z > 0.0 {
                    return Err(OptimizeError::MoveAboveStock);
                }
                cur_set.push(*pos);
            }

            safety_height = safety_height.max(pos.z);
            last_x = pos.x;
            last_y = pos.y;
            last_z = pos.z;
        }

        if safety_height == 0.0 {
            return Err(OptimizeError::NoSafetyHeight);
        }
        if drill_feed == 0.0 {
            return Err(OptimizeError::NoDrillFeedrate);
        }

        // A residual set means the input ended without lifting clear.
        if cur_set.len() == 1 {
            let p = cur_set[0];
            if p.z != safety_height || last_z != safety_height || p.x != 0.0 || p.y != 0.0 {
                return Err(OptimizeError::IncompleteFinalSet);
            }
        } else if !cur_set.is_empty() {
            return Err(OptimizeError::IncompleteFinalSet);
        }

        // Greedy nearest-neighbour ordering from the origin, ties to the
        // higher entry point.
        let mut remaining = sets;
        let mut sorted: Vec<Vec<Position>> = Vec::with_capacity(remaining.len());
        let mut cursor = DVec3::ZERO;
        while !remaining.is_empty() {
            let mut best = 0;
            for idx in 1..remaining.len() {
                let da = planar_distance(cursor, &remaining[idx][0]);
                let db = planar_distance(cursor, &remaining[best][0]);
                if da < db || (da == db && remaining[idx][0].z > remaining[best][0].z) {
                    best = idx;
                }
            }
            cursor = remaining[best][0].vector();
            sorted.push(remaining.remove(best));
        }

        let mut out: Vec<Position> = vec![self.positions[0]];
        for set in &sorted {
            for (idx, pos) in set.iter().enumerate() {
                if idx == 0 {
                    bridge_to(&mut out, pos, safety_height, drill_feed, self.tolerance);
                } else {
                    out.push(*pos);
                }
            }
        }
        self.positions = out;
        Ok(())
    }
}

/// Emits the connective moves from the tail of `out` to `target`:
/// lift-traverse-descend for real travel, a direct move when the planar
/// distance is inside the tolerance.
fn bridge_to(
    out: &mut Vec<Position>,
    target: &Position,
    safety_height: f64,
    drill_feed: f64,
    tolerance: f64,
) {
    let cur = *out.last().expect("route head is always present");
    if planar_distance(cur.vector(), target) < tolerance {
        if cur.x != target.x || cur.y != target.y {
            // Close, but not exact: align without lifting.
            let mut align = cur;
            align.state.move_mode = MoveMode::Linear;
            align.x = target.x;
            align.y = target.y;
            out.push(align);
        }
        out.push(*target);
    } else {
        let mut lift = cur;
        lift.z = safety_height;
        lift.state.move_mode = MoveMode::Rapid;
        let mut traverse = lift;
        traverse.x = target.x;
        traverse.y = target.y;
        let mut descend = traverse;
        descend.z = target.z;
        descend.state.move_mode = MoveMode::Linear;
        descend.state.feedrate = drill_feed;
        out.push(lift);
        out.push(traverse);
        out.push(descend);
    }
}

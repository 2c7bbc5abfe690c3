//! Whole-trace rewrites applied between interpretation and emission.

use std::time::Duration;

use glam::DVec3;
use thiserror::Error;

use super::{Machine, MoveMode};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("safety height {height} collides with the feed height {next}")]
    SafetyHeightCollision { height: f64, next: f64 },
}

/// Bounding box, feedrate inventory and a runtime estimate for a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineInfo {
    pub min: DVec3,
    pub max: DVec3,
    pub feedrates: Vec<f64>,
    pub eta: Duration,
}

// Rapids run at whatever the controller allows; this is only for the
// estimate.
const NOMINAL_RAPID_FEED: f64 = 2500.0;

impl Machine {
    /// Clamps every feedrate above `feed` down to it.
    pub fn limit_feedrate(&mut self, feed: f64) {
        for pos in &mut self.positions {
            if pos.state.feedrate > feed {
                pos.state.feedrate = feed;
            }
        }
    }

    pub fn multiply_feedrate(&mut self, multiplier: f64) {
        for pos in &mut self.positions {
            pos.state.feedrate *= multiplier;
        }
    }

    /// Forces one spindle configuration across the whole trace.
    pub fn enforce_spindle(&mut self, enabled: bool, clockwise: bool, speed: f64) {
        for pos in &mut self.positions {
            pos.state.spindle_enabled = enabled;
            pos.state.spindle_clockwise = clockwise;
            pos.state.spindle_speed = speed;
        }
    }

    /// Raises every clearance move at the trace's maximum Z to `height`.
    ///
    /// Fails if `height` does not clear the next-highest Z in the trace.
    pub fn set_safety_height(&mut self, height: f64) -> Result<(), TransformError> {
        let mut max_z = f64::NEG_INFINITY;
        let mut next_z = f64::NEG_INFINITY;
        for pos in &self.positions {
            if pos.z > max_z {
                next_z = max_z;
                max_z = pos.z;
            } else if pos.z > next_z && pos.z < max_z {
                next_z = pos.z;
            }
        }

        if height <= next_z {
            return Err(TransformError::SafetyHeightCollision {
                height,
                next: next_z,
            });
        }

        let (mut last_x, mut last_y) = (0.0, 0.0);
        for pos in &mut self.positions {
            if last_x == pos.x && last_y == pos.y && pos.z == max_z {
                pos.z = height;
            }
            last_x = pos.x;
            last_y = pos.y;
        }
        Ok(())
    }

    /// Appends the rapid moves that park the machine back at the origin.
    pub fn return_home(&mut self) {
        let max_z = self
            .positions
            .iter()
            .fold(0.0_f64, |acc, p| acc.max(p.z));

        let mut last = self.current_position();
        last.state.move_mode = MoveMode::Rapid;

        if last.x == 0.0 && last.y == 0.0 && last.z == 0.0 {
            return;
        }
        if last.x == 0.0 && last.y == 0.0 {
            last.z = 0.0;
            self.positions.push(last);
            return;
        }
        if last.z != max_z {
            let mut lift = last;
            lift.z = max_z;
            self.positions.push(lift);
            last = lift;
        }
        let mut traverse = last;
        traverse.x = 0.0;
        traverse.y = 0.0;
        self.positions.push(traverse);
        let mut descend = traverse;
        descend.z = 0.0;
        self.positions.push(descend);
    }

    /// Mirrors the trace across the X=Y diagonal.
    pub fn flip_xy(&mut self) {
        for pos in &mut self.positions {
            std::mem::swap(&mut pos.x, &mut pos.y);
        }
    }

    pub fn info(&self) -> MachineInfo {
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        let mut feedrates: Vec<f64> = Vec::new();
        let mut seconds = 0.0;

        let mut prev: Option<DVec3> = None;
        for pos in &self.positions {
            let v = pos.vector();
            min = min.min(v);
            max = max.max(v);
            if !feedrates.contains(&pos.state.feedrate) {
                feedrates.push(pos.state.feedrate);
            }

            if let Some(p) = prev {
                let length = p.distance(v);
                match pos.state.move_mode {
                    MoveMode::Linear => {
                        if pos.state.feedrate > 0.0 {
                            seconds += length / pos.state.feedrate * 60.0;
                        }
                    }
                    MoveMode::Rapid => seconds += length / NOMINAL_RAPID_FEED * 60.0,
                    MoveMode::Dwell => seconds += pos.state.dwell_time,
                    _ => {}
                }
            }
            prev = Some(v);
        }

        MachineInfo {
            min,
            max,
            feedrates,
            eta: Duration::from_secs_f64(seconds),
        }
    }
}

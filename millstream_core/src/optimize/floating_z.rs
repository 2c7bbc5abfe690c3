//! Collapse chains of positioning moves above Z0 into a single move at
//! the highest clearance point.

use crate::vm::{Machine, Position};

impl Machine {
    pub fn opt_floating_z(&mut self) {
        let mut out: Vec<Position> = Vec::with_capacity(self.positions.len());
        let mut last: Option<Position> = None;

        for pos in &self.positions {
            match last {
                Some(prev) if prev.z > 0.0 && pos.z > 0.0 && !out.is_empty() => {
                    let top = out.last_mut().expect("checked non-empty");
                    if pos.z > top.z {
                        top.z = pos.z;
                    }
                }
                Some(prev) if prev.z > 0.0 && pos.z < 0.0 => {
                    // Restore the point above the plunge before descending.
                    if out.last() != Some(&prev) {
                        out.push(prev);
                    }
                    out.push(*pos);
                }
                _ => out.push(*pos),
            }
            last = Some(*pos);
        }
        self.positions = out;
    }
}

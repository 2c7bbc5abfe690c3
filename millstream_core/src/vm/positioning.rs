//! Coordinate resolution and arc tessellation.

use glam::DVec3;

use super::{Machine, MoveMode, Plane, Position, Statement, VmErrorKind};

impl Machine {
    pub(crate) fn push_move(&mut self, target: DVec3) {
        self.positions.push(Position {
            state: self.state,
            x: target.x,
            y: target.y,
            z: target.z,
        });
    }

    /// Resolves the block's X/Y/Z words into absolute machine coordinates,
    /// consuming them. Missing axes keep their previous value.
    pub(crate) fn resolve_target(&mut self, stmt: &mut Statement) -> Result<DVec3, VmErrorKind> {
        let prev = self.current_position().vector();
        let scale = self.unit_scale();
        let x = stmt.take_word('X')?;
        let y = stmt.take_word('Y')?;
        let z = stmt.take_word('Z')?;

        let mut out = prev;
        if self.absolute_move {
            let offset = self.coordinates.total_offset();
            if let Some(x) = x {
                out.x = x * scale + offset.x;
            }
            if let Some(y) = y {
                out.y = y * scale + offset.y;
            }
            if let Some(z) = z {
                out.z = z * scale + offset.z;
            }
        } else {
            out.x += x.unwrap_or(0.0) * scale;
            out.y += y.unwrap_or(0.0) * scale;
            out.z += z.unwrap_or(0.0) * scale;
        }
        Ok(out)
    }

    /// Resolves I/J/K/P into an absolute arc centre and a turn count.
    pub(crate) fn resolve_arc_center(
        &mut self,
        stmt: &mut Statement,
    ) -> Result<(DVec3, u32), VmErrorKind> {
        let prev = self.current_position().vector();
        let scale = self.unit_scale();
        let i = stmt.take_word_default('I', 0.0)? * scale;
        let j = stmt.take_word_default('J', 0.0)? * scale;
        let k = stmt.take_word_default('K', 0.0)? * scale;
        let p = stmt.take_word_default('P', 1.0)?;
        let turns = if p < 1.0 { 1 } else { p as u32 };

        let center = if self.absolute_arc {
            DVec3::new(i, j, k) + self.coordinates.total_offset()
        } else {
            prev + DVec3::new(i, j, k)
        };
        Ok((center, turns))
    }

    /// Tessellates an arc from the current position to `end` around
    /// `center` into linear segments bounded by `max_arc_deviation` and
    /// `min_arc_line_length`.
    pub(crate) fn arc(
        &mut self,
        end: DVec3,
        center: DVec3,
        turns: u32,
        clockwise: bool,
    ) -> Result<(), VmErrorKind> {
        let start = self.current_position().vector();

        // Rename axes so the arc runs in the (1,2) plane with 3 helical.
        let (s1, s2, s3, e1, e2, e3, c1, c2) = match self.move_plane {
            Plane::Xy => (
                start.x, start.y, start.z, end.x, end.y, end.z, center.x, center.y,
            ),
            Plane::Xz => (
                start.z, start.x, start.y, end.z, end.x, end.y, center.z, center.x,
            ),
            Plane::Yz => (
                start.y, start.z, start.x, end.y, end.z, end.x, center.y, center.z,
            ),
        };

        let radius_start = (c1 - s1).hypot(c2 - s2);
        let radius_end = (c1 - e1).hypot(c2 - e2);
        if radius_start == 0.0 || radius_end == 0.0 {
            return Err(VmErrorKind::ZeroRadiusArc);
        }

        let deviation = ((radius_end - radius_start) / radius_start).abs() * 100.0;
        if deviation > 0.6 {
            let gap = (radius_end - radius_start).abs();
            if gap > 0.1 {
                return Err(VmErrorKind::ArcRadiusMismatch {
                    percent: deviation,
                    millimetres: gap,
                });
            }
        }
        let radius = radius_start;

        let theta1 = (s2 - c2).atan2(s1 - c1);
        let theta2 = (e2 - c2).atan2(e1 - c1);
        let mut angle_diff = theta2 - theta1;
        if angle_diff < 0.0 && !clockwise {
            angle_diff += 2.0 * std::f64::consts::PI;
        } else if angle_diff > 0.0 && clockwise {
            angle_diff -= 2.0 * std::f64::consts::PI;
        }

        // Coincident endpoints describe a full circle.
        if angle_diff == 0.0 {
            angle_diff = if clockwise {
                -2.0 * std::f64::consts::PI
            } else {
                2.0 * std::f64::consts::PI
            };
        }

        // Extra full turns beyond the first.
        let extra = (turns - 1) as f64 * 2.0 * std::f64::consts::PI;
        if clockwise {
            angle_diff -= extra;
        } else {
            angle_diff += extra;
        }

        let mut steps: usize = 1;
        if self.max_arc_deviation < radius {
            let per_step = 2.0 * (1.0 - self.max_arc_deviation / radius).acos();
            steps = (angle_diff.abs() / per_step).ceil() as usize;
        }
        let arc_len = angle_diff.abs() * (radius * radius + ((e3 - s3) / angle_diff).powi(2)).sqrt();
        let length_cap = (arc_len / self.min_arc_line_length) as usize;
        steps = steps.min(length_cap).max(1);

        let saved_mode = self.state.move_mode;
        self.state.move_mode = MoveMode::Linear;
        for i in 0..steps {
            let angle = theta1 + angle_diff * i as f64 / steps as f64;
            let a1 = c1 + radius * angle.cos();
            let a2 = c2 + radius * angle.sin();
            let a3 = s3 + (e3 - s3) * i as f64 / steps as f64;
            let target = unmap_plane(self.move_plane, a1, a2, a3);
            self.push_move(target);
        }
        // Land exactly on the stated endpoint.
        self.push_move(end);
        self.state.move_mode = saved_mode;
        Ok(())
    }
}

fn unmap_plane(plane: Plane, a1: f64, a2: f64, a3: f64) -> DVec3 {
    match plane {
        Plane::Xy => DVec3::new(a1, a2, a3),
        Plane::Xz => DVec3::new(a2, a3, a1),
        Plane::Yz => DVec3::new(a3, a1, a2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcode::parser::parse;
    use crate::vm::Machine;

    fn run(src: &str) -> Machine {
        let doc = parse(src).unwrap();
        let mut machine = Machine::new();
        machine.process(&doc).unwrap();
        machine
    }

    #[test]
    fn clockwise_semicircle_tessellates_to_linear() {
        let machine = run("G17 G2 X10 Y0 I5 J0 F100");
        let moves = &machine.positions[1..];
        assert!(moves.len() > 4);
        for p in moves {
            assert_eq!(p.state.move_mode, MoveMode::Linear);
            // On the radius-5 circle centred at (5, 0).
            let r = (p.x - 5.0).hypot(p.y);
            assert!((r - 5.0).abs() < 1e-9, "r = {r}");
            // Clockwise from the 9 o'clock point sweeps over the top.
            assert!(p.y >= -1e-9);
        }
        // First tessellated point sits at the start angle.
        assert!((moves[0].x).abs() < 1e-9);
        let last = machine.current_position();
        assert!((last.x - 10.0).abs() < 1e-9);
        assert!(last.y.abs() < 1e-9);
    }

    #[test]
    fn helical_full_turn_descends_monotonically() {
        let machine = run("G17 G2 X0 Y0 Z-2 I5 J0 P1 F100");
        let last = machine.current_position();
        assert!((last.x).abs() < 1e-9);
        assert!((last.y).abs() < 1e-9);
        assert!((last.z + 2.0).abs() < 1e-9);
        let mut prev_z = f64::INFINITY;
        for p in &machine.positions[1..] {
            assert!(p.z <= prev_z + 1e-12);
            prev_z = p.z;
        }
        // A full turn sweeps well past a semicircle of steps.
        assert!(machine.positions.len() > 8);
    }

    #[test]
    fn extra_turns_multiply_path_length(){
        let one = run("G2 X0 Y0 Z-2 I5 J0 P1 F100").positions.len();
        let two = run("G2 X0 Y0 Z-2 I5 J0 P2 F100").positions.len();
        assert!(two > one + (one / 2));
    }

    #[test]
    fn zero_radius_arc_is_rejected() {
        let doc = parse("G2 X10 Y0 F100").unwrap();
        let mut machine = Machine::new();
        let err = machine.process(&doc).unwrap_err();
        assert_eq!(err.kind, VmErrorKind::ZeroRadiusArc);
    }

    #[test]
    fn inconsistent_radius_is_rejected() {
        let doc = parse("G2 X40 Y0 I5 J0 F100").unwrap();
        let mut machine = Machine::new();
        let err = machine.process(&doc).unwrap_err();
        assert!(matches!(err.kind, VmErrorKind::ArcRadiusMismatch { .. }));
    }

    #[test]
    fn arc_in_xz_plane() {
        let machine = run("G18 G2 X10 Z0 I5 F100");
        for p in &machine.positions[1..] {
            assert!(p.y.abs() < 1e-12);
            let r = (p.x - 5.0).hypot(p.z);
            assert!((r - 5.0).abs() < 1e-9);
        }
        let last = machine.current_position();
        assert!((last.x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn tiny_arc_degenerates_to_single_segment() {
        let machine = run("G2 X0.002 Y0 I0.001 J0 F100");
        // Shorter than the minimum line length: one step plus the exact
        // endpoint.
        assert_eq!(machine.positions.len(), 3);
        let last = machine.current_position();
        assert!((last.x - 0.002).abs() < 1e-12);
    }

    #[test]
    fn ccw_arc_turns_the_other_way() {
        let machine = run("G3 X10 Y0 I5 J0 F100");
        for p in &machine.positions[1..] {
            assert!(p.y <= 1e-9);
        }
    }

    #[test]
    fn no_arcs_survive_in_any_trace() {
        let machine = run("G2 X10 Y0 I5 J0 F100\nG3 X0 Y0 J5 F100");
        for p in &machine.positions {
            assert!(!matches!(
                p.state.move_mode,
                MoveMode::CwArc | MoveMode::CcwArc
            ));
        }
    }
}

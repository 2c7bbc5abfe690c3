//! Collinear-move collapse.
//!
//! A sliding three-point window over each run of same-mode rapid or
//! linear moves: when the detour through the middle point adds less than
//! the tolerance to the straight-line distance, the middle point is
//! dropped. Zero-length repeats collapse the same way.

use crate::vm::{Machine, MoveMode, Position};

fn collapsible(mode: MoveMode) -> bool {
    matches!(mode, MoveMode::Rapid | MoveMode::Linear)
}

impl Machine {
    pub fn opt_bogus_moves(&mut self) {
        let tolerance = self.tolerance;
        let mut out: Vec<Position> = Vec::with_capacity(self.positions.len());

        for pos in &self.positions {
            let n = out.len();
            if n >= 2 {
                let a = out[n - 2];
                let b = out[n - 1];
                let same_run = collapsible(pos.state.move_mode)
                    && a.state.move_mode == pos.state.move_mode
                    && b.state.move_mode == pos.state.move_mode;
                if same_run {
                    let detour = a.vector().distance(b.vector())
                        + b.vector().distance(pos.vector())
                        - a.vector().distance(pos.vector());
                    if detour < tolerance {
                        out[n - 1] = *pos;
                        continue;
                    }
                }
            }
            out.push(*pos);
        }
        self.positions = out;
    }
}

#[cfg(test)]
mod tests {
    use crate::gcode::parser::parse;
    use crate::vm::{Machine, MoveMode};

    fn run(src: &str) -> Machine {
        let doc = parse(src).unwrap();
        let mut machine = Machine::new();
        machine.process(&doc).unwrap();
        machine
    }

    #[test]
    fn collinear_midpoints_are_dropped() {
        let mut machine = run("G1 X1 F60\nG1 X2\nG1 X3\nG1 X4\nG1 Y5");
        machine.opt_bogus_moves();
        let coords: Vec<(f64, f64)> = machine.positions.iter().map(|p| (p.x, p.y)).collect();
        // The window opens after two linear moves, so the first segment
        // stays; everything collinear after it collapses.
        assert_eq!(coords, vec![(0.0, 0.0), (1.0, 0.0), (4.0, 0.0), (4.0, 5.0)]);
    }

    #[test]
    fn genuine_corners_survive() {
        let mut machine = run("G1 X5 F60\nG1 Y5\nG1 X0");
        let before = machine.positions.len();
        machine.opt_bogus_moves();
        assert_eq!(machine.positions.len(), before);
    }

    #[test]
    fn mode_change_resets_the_window() {
        let mut machine = run("G1 X1 F60\nG0 X2\nG1 X3");
        let before = machine.positions.len();
        machine.opt_bogus_moves();
        assert_eq!(machine.positions.len(), before);
    }

    #[test]
    fn no_collinear_triples_remain() {
        let mut machine = run(
            "G1 X1 F60\nG1 X2\nG1 X2 Y1\nG1 X2 Y3\nG1 X5 Y3\nG0 Z2\nG0 X0 Y0",
        );
        machine.opt_bogus_moves();
        let tol = machine.tolerance;
        for w in machine.positions.windows(3) {
            let same = w
                .iter()
                .all(|p| p.state.move_mode == w[0].state.move_mode)
                && matches!(w[0].state.move_mode, MoveMode::Rapid | MoveMode::Linear);
            if same {
                let detour = w[0].vector().distance(w[1].vector())
                    + w[1].vector().distance(w[2].vector())
                    - w[0].vector().distance(w[2].vector());
                assert!(detour >= tol);
            }
        }
    }

    #[test]
    fn duplicate_positions_collapse() {
        let mut machine = run("G1 X5 F60\nG1 X5\nG1 X5 Y1");
        machine.opt_bogus_moves();
        let coords: Vec<(f64, f64)> = machine.positions.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(coords, vec![(0.0, 0.0), (5.0, 0.0), (5.0, 1.0)]);
    }
}

//! Rapid traversal of already-drilled material.

use crate::vm::{Machine, MoveMode, Position};

impl Machine {
    /// Splits repeated drills at one XY: rapid down to the depth already
    /// reached, then feed the rest. A drill no deeper than a previous one
    /// at the same spot becomes a plain rapid.
    pub fn opt_drill_speed(&mut self) {
        let mut drill_stack: Vec<Position> = Vec::new();
        let mut out: Vec<Position> = Vec::with_capacity(self.positions.len());
        let (mut last_x, mut last_y, mut last_z) = (0.0, 0.0, 0.0);

        for pos in &self.positions {
            let descending = pos.x == last_x
                && pos.y == last_y
                && pos.z < last_z
                && pos.state.move_mode == MoveMode::Linear;
            if descending {
                let mut known_depth: Option<f64> = None;
                for m in &drill_stack {
                    if m.x == pos.x && m.y == pos.y && m.z < known_depth.unwrap_or(0.0) {
                        known_depth = Some(m.z);
                    }
                }
                drill_stack.push(*pos);

                match known_depth {
                    Some(depth) if pos.z >= depth => {
                        // Already drilled through: rapid all the way.
                        let mut rapid = *pos;
                        rapid.state.move_mode = MoveMode::Rapid;
                        out.push(rapid);
                    }
                    Some(depth) => {
                        let mut rapid = *pos;
                        rapid.z = depth;
                        rapid.state.move_mode = MoveMode::Rapid;
                        out.push(rapid);
                        out.push(*pos);
                    }
                    None => out.push(*pos),
                }
            } else {
                out.push(*pos);
            }
            last_x = pos.x;
            last_y = pos.y;
            last_z = pos.z;
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
    fn second_pass_rapids_to_known_depth() {
        let mut machine = run(
            "G0 Z5\nG1 Z-5 F60\nG0 Z5\nG1 Z-8\nG0 Z5",
        );
        machine.opt_drill_speed();
        let kinds: Vec<(MoveMode, f64)> = machine
            .positions
            .iter()
            .map(|p| (p.state.move_mode, p.z))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (MoveMode::None, 0.0),
                (MoveMode::Rapid, 5.0),
                (MoveMode::Linear, -5.0),
                (MoveMode::Rapid, 5.0),
                (MoveMode::Rapid, -5.0),
                (MoveMode::Linear, -8.0),
                (MoveMode::Rapid, 5.0),
            ]
        );
    }

    #[test]
    fn shallower_redrill_becomes_rapid() {
        let mut machine = run("G0 Z5\nG1 Z-8 F60\nG0 Z5\nG1 Z-5\nG0 Z5");
        machine.opt_drill_speed();
        let redrill = machine.positions[4];
        assert_eq!(redrill.state.move_mode, MoveMode::Rapid);
        assert_eq!(redrill.z, -5.0);
    }

    #[test]
    fn distinct_locations_untouched() {
        let mut machine = run("G0 Z5\nG1 Z-5 F60\nG0 Z5\nG0 X10\nG1 Z-5\nG0 Z5");
        let before = machine.positions.clone();
        machine.opt_drill_speed();
        assert_eq!(machine.positions, before);
    }
}

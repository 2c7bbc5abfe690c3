//! Z-only lifts never cut anything, so they can always run at rapid.

use crate::vm::{Machine, MoveMode};

impl Machine {
    pub fn opt_lift_speed(&mut self) {
        let (mut last_x, mut last_y, mut last_z) = (0.0, 0.0, 0.0);
        for pos in &mut self.positions {
            if pos.x == last_x && pos.y == last_y && pos.z > last_z {
                pos.state.move_mode = MoveMode::Rapid;
            }
            last_x = pos.x;
            last_y = pos.y;
            last_z = pos.z;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::gcode::parser::parse;
    use crate::vm::{Machine, MoveMode};

    #[test]
    fn ascending_z_moves_become_rapid() {
        let doc = parse("G1 Z-2 F60\nG1 Z5\nG1 X10\nG1 Z6").unwrap();
        let mut machine = Machine::new();
        machine.process(&doc).unwrap();
        machine.opt_lift_speed();
        let modes: Vec<MoveMode> = machine
            .positions
            .iter()
            .map(|p| p.state.move_mode)
            .collect();
        assert_eq!(
            modes,
            vec![
                MoveMode::None,
                MoveMode::Linear, // plunge
                MoveMode::Rapid,  // lift
                MoveMode::Linear, // lateral cut
                MoveMode::Rapid,  // lift
            ]
        );
    }
}

//! Work-offset bookkeeping: nine selectable work coordinate systems, the
//! G92 extra offset, and the per-block machine-coordinate override.

use glam::DVec3;

#[derive(Debug, Clone)]
pub struct CoordinateSystem {
    systems: Vec<DVec3>,
    offset: DVec3,
    offset_enabled: bool,
    current: usize,
    override_enabled: bool,
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self {
            systems: Vec::new(),
            offset: DVec3::ZERO,
            offset_enabled: false,
            current: 1,
            override_enabled: false,
        }
    }
}

impl CoordinateSystem {
    fn expand_if_necessary(&mut self, slot: usize) {
        while self.systems.len() <= slot {
            self.systems.push(DVec3::ZERO);
        }
    }

    /// Selects work coordinate system `slot` (1 through 9).
    pub fn select(&mut self, slot: usize) {
        self.expand_if_necessary(slot);
        self.current = slot;
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn set(&mut self, slot: usize, offset: DVec3) {
        self.expand_if_necessary(slot);
        self.systems[slot] = offset;
    }

    pub fn get(&mut self, slot: usize) -> DVec3 {
        self.expand_if_necessary(slot);
        self.systems[slot]
    }

    pub fn set_offset(&mut self, offset: DVec3) {
        self.offset = offset;
    }

    pub fn offset(&self) -> DVec3 {
        self.offset
    }

    pub fn enable_offset(&mut self) {
        self.offset_enabled = true;
    }

    pub fn disable_offset(&mut self) {
        self.offset_enabled = false;
    }

    pub fn erase_offset(&mut self) {
        self.offset = DVec3::ZERO;
        self.offset_enabled = false;
    }

    pub fn offset_active(&self) -> bool {
        self.offset_enabled
    }

    /// The work offset of the active system, without the G92 component.
    pub fn work_offset(&mut self) -> DVec3 {
        self.expand_if_necessary(self.current);
        self.systems[self.current]
    }

    /// The combined offset applied to program coordinates, honouring the
    /// override.
    pub fn total_offset(&mut self) -> DVec3 {
        if self.override_enabled {
            return DVec3::ZERO;
        }
        let mut v = self.work_offset();
        if self.offset_enabled {
            v += self.offset;
        }
        v
    }

    /// Maps program coordinates to machine coordinates.
    pub fn apply(&mut self, point: DVec3) -> DVec3 {
        point + self.total_offset()
    }

    pub fn set_override(&mut self) {
        self.override_enabled = true;
    }

    pub fn cancel_override(&mut self) {
        self.override_enabled = false;
    }

    pub fn override_active(&self) -> bool {
        self.override_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_compose() {
        let mut cs = CoordinateSystem::default();
        cs.set(2, DVec3::new(10.0, 0.0, 0.0));
        cs.select(2);
        cs.set_offset(DVec3::new(0.0, 5.0, 0.0));
        cs.enable_offset();
        assert_eq!(cs.apply(DVec3::new(1.0, 1.0, 1.0)), DVec3::new(11.0, 6.0, 1.0));
    }

    #[test]
    fn override_bypasses_everything() {
        let mut cs = CoordinateSystem::default();
        cs.set(1, DVec3::new(10.0, 10.0, 10.0));
        cs.set_offset(DVec3::new(1.0, 1.0, 1.0));
        cs.enable_offset();
        cs.set_override();
        assert_eq!(cs.apply(DVec3::ZERO), DVec3::ZERO);
        cs.cancel_override();
        assert_eq!(cs.apply(DVec3::ZERO), DVec3::new(11.0, 11.0, 11.0));
    }

    #[test]
    fn erase_clears_and_disables() {
        let mut cs = CoordinateSystem::default();
        cs.set_offset(DVec3::ONE);
        cs.enable_offset();
        cs.erase_offset();
        assert!(!cs.offset_active());
        assert_eq!(cs.offset(), DVec3::ZERO);
    }
}

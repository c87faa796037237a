//! Save-level accounting.
//!
//! `save` opens a new level; local dictionaries remember the level they were
//! allocated at, and `restore` reclaims everything allocated at or above the
//! restored level. Allocations made while in global mode are never
//! reclaimed.

use rip_value::ErrorCode;

#[derive(Debug)]
pub struct SaveLevels {
    current: u32,
    max: u32,
    global: bool,
}

impl SaveLevels {
    pub fn new(max: u32) -> Self {
        SaveLevels {
            current: 0,
            max,
            global: false,
        }
    }

    /// Level new allocations are tagged with.
    #[inline]
    pub fn current(&self) -> u32 {
        self.current
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn set_global(&mut self, global: bool) {
        self.global = global;
    }

    /// Open a level and return its number.
    pub fn save(&mut self) -> Result<u32, ErrorCode> {
        if self.current >= self.max {
            return Err(ErrorCode::LimitCheck);
        }
        self.current += 1;
        Ok(self.current)
    }

    /// Check `level` names an open save.
    pub fn check_restore(&self, level: u32) -> Result<(), ErrorCode> {
        if level == 0 || level > self.current {
            return Err(ErrorCode::InvalidRestore);
        }
        Ok(())
    }

    /// Close `level` and every level above it.
    pub(crate) fn unwind_to(&mut self, level: u32) {
        self.current = level.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.global = false;
    }
}

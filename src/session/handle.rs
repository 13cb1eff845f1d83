use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a session slot.
///
/// A handle stays valid only while its generation equals the slot's current
/// generation; every release bumps the slot generation so stale copies are
/// rejected after reuse. Generations start at 1, so the all-zero handle is
/// never live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle {
    index: u32,
    generation: u32,
}

impl SessionHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack into a non-negative `i64` for callers that can only carry integers
    pub fn to_raw(&self) -> i64 {
        ((self.generation as i64) << 32) | self.index as i64
    }

    /// Inverse of [`to_raw`](Self::to_raw); `None` for negative values
    pub fn from_raw(raw: i64) -> Option<Self> {
        if raw < 0 {
            return None;
        }
        Some(Self {
            index: (raw & 0xFFFF_FFFF) as u32,
            generation: (raw >> 32) as u32,
        })
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}@{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip() {
        let handle = SessionHandle::new(17, 3);
        let raw = handle.to_raw();
        assert!(raw > 0);
        assert_eq!(SessionHandle::from_raw(raw), Some(handle));
    }

    #[test]
    fn test_negative_raw_rejected() {
        assert_eq!(SessionHandle::from_raw(-1), None);
        assert_eq!(SessionHandle::from_raw(i64::MIN), None);
    }

    #[test]
    fn test_zero_raw_has_generation_zero() {
        let handle = SessionHandle::from_raw(0).unwrap();
        assert_eq!(handle.generation(), 0);
        assert_eq!(handle.index(), 0);
    }
}

//! Translation of a caller read timeout into the native comm-timeout model.
//!
//! The OS expresses read timeouts as an `(interval, multiplier, constant)`
//! triple. Setting interval and multiplier to `MAXDWORD` while keeping the
//! constant below `MAXDWORD` selects a specific documented behavior:
//!
//! - bytes already buffered: the read returns immediately with them;
//! - buffer empty: the read waits for the first byte and then returns
//!   immediately;
//! - no byte within `constant` milliseconds: the read completes with zero
//!   bytes.
//!
//! A whole-call deadline would not be equivalent — this model never delays a
//! read that already has data.

use std::time::Duration;

pub(crate) const MAXDWORD: u32 = u32::MAX;

/// Native read/write timeout record, recomputed on every open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommTimeouts {
    pub read_interval: u32,
    pub read_total_multiplier: u32,
    pub read_total_constant: u32,
    pub write_total_multiplier: u32,
    pub write_total_constant: u32,
}

impl CommTimeouts {
    /// Derive the native triple from the requested read timeout.
    ///
    /// `Duration::ZERO` maps to a practically unbounded first-byte wait
    /// (`MAXDWORD - 1` ms); positive values are clamped to
    /// `[1, MAXDWORD - 1]` ms. Write timeouts are left at zero: writes block
    /// until the OS accepts the buffer or fails.
    pub fn for_read_timeout(timeout: Duration) -> Self {
        let constant = if timeout.is_zero() {
            MAXDWORD - 1
        } else {
            timeout.as_millis().clamp(1, u128::from(MAXDWORD - 1)) as u32
        };

        Self {
            read_interval: MAXDWORD,
            read_total_multiplier: MAXDWORD,
            read_total_constant: constant,
            write_total_multiplier: 0,
            write_total_constant: 0,
        }
    }

    /// How long a read with an empty buffer waits for the first byte, or
    /// `None` for the practically unbounded wait.
    pub fn first_byte_wait(&self) -> Option<Duration> {
        if self.read_total_constant == MAXDWORD - 1 {
            None
        } else {
            Some(Duration::from_millis(u64::from(self.read_total_constant)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_duration_blocks_until_first_byte() {
        let t = CommTimeouts::for_read_timeout(Duration::ZERO);
        assert_eq!(t.read_interval, MAXDWORD);
        assert_eq!(t.read_total_multiplier, MAXDWORD);
        assert_eq!(t.read_total_constant, MAXDWORD - 1);
        assert_eq!(t.first_byte_wait(), None);
    }

    #[test]
    fn positive_duration_maps_to_milliseconds() {
        let t = CommTimeouts::for_read_timeout(Duration::from_millis(100));
        assert_eq!(t.read_total_constant, 100);
        assert_eq!(t.first_byte_wait(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn sub_millisecond_durations_round_up_to_one() {
        let t = CommTimeouts::for_read_timeout(Duration::from_micros(50));
        assert_eq!(t.read_total_constant, 1);
    }

    #[test]
    fn huge_durations_clamp_below_maxdword() {
        let t = CommTimeouts::for_read_timeout(Duration::from_secs(u64::MAX / 1000));
        assert_eq!(t.read_total_constant, MAXDWORD - 1);
    }

    #[test]
    fn writes_are_unbounded() {
        let t = CommTimeouts::for_read_timeout(Duration::from_secs(1));
        assert_eq!(t.write_total_multiplier, 0);
        assert_eq!(t.write_total_constant, 0);
    }

    proptest! {
        #[test]
        fn constant_always_in_valid_range(millis in 0u64..=u64::MAX / 1000) {
            let t = CommTimeouts::for_read_timeout(Duration::from_millis(millis));
            prop_assert!(t.read_total_constant >= 1);
            prop_assert!(t.read_total_constant <= MAXDWORD - 1);
            prop_assert_eq!(t.read_interval, MAXDWORD);
            prop_assert_eq!(t.read_total_multiplier, MAXDWORD);
        }
    }
}

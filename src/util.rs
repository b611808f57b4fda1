//! Demand accounting helpers shared by the publishers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// Demand value meaning "no limit".
pub const UNBOUNDED: u64 = u64::MAX;

/// Reject non-positive requests.
pub fn validate_demand(n: u64) -> Result<u64> {
    if n == 0 {
        return Err(Error::InvalidDemand { requested: n });
    }
    Ok(n)
}

/// Add `n` to `requested`, capping at [`UNBOUNDED`]. Returns the previous value.
pub fn add_demand(requested: &AtomicU64, n: u64) -> u64 {
    match requested.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        if current == UNBOUNDED {
            None
        } else {
            Some(current.saturating_add(n))
        }
    }) {
        Ok(previous) | Err(previous) => previous,
    }
}

/// Subtract `emitted` from `requested` unless it is unbounded. Returns the new value.
pub fn produced(requested: &AtomicU64, emitted: u64) -> u64 {
    match requested.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        if current == UNBOUNDED {
            None
        } else {
            Some(current.saturating_sub(emitted))
        }
    }) {
        Ok(previous) => previous.saturating_sub(emitted),
        Err(unbounded) => unbounded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_demand() {
        assert!(matches!(
            validate_demand(0),
            Err(Error::InvalidDemand { requested: 0 })
        ));
        assert_eq!(validate_demand(3).unwrap(), 3);
    }

    #[test]
    fn test_add_demand_caps() {
        let requested = AtomicU64::new(0);
        assert_eq!(add_demand(&requested, 5), 0);
        assert_eq!(add_demand(&requested, UNBOUNDED - 1), 5);
        assert_eq!(requested.load(Ordering::SeqCst), UNBOUNDED);
        add_demand(&requested, 1);
        assert_eq!(requested.load(Ordering::SeqCst), UNBOUNDED);
    }

    #[test]
    fn test_produced_leaves_unbounded_alone() {
        let requested = AtomicU64::new(10);
        assert_eq!(produced(&requested, 4), 6);
        assert_eq!(requested.load(Ordering::SeqCst), 6);

        let unbounded = AtomicU64::new(UNBOUNDED);
        assert_eq!(produced(&unbounded, 4), UNBOUNDED);
    }
}

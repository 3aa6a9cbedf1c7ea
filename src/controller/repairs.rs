//! Repair schedule planning

use std::collections::BTreeSet;

use crate::clients::RepairScheduleInfo;
use crate::crd::Repair;

/// Declared repairs that Reaper does not have yet
///
/// Declarations sharing a key collapse to the first one. Existing schedules
/// are never modified or removed.
pub fn missing_schedules<'a>(
    declared: &'a [Repair],
    existing: &[RepairScheduleInfo],
) -> Vec<&'a Repair> {
    let mut seen: BTreeSet<_> = existing.iter().map(|s| s.key()).collect();
    declared
        .iter()
        .filter(|repair| seen.insert(repair.key()))
        .collect()
}

//! Which batches may share one fermenter.

use crate::id::ProcessId;
use crate::process::GroupingMode;

/// Whether a new batch of `process` (running in `mode`) may start next to the
/// `existing` batches.
///
/// - Nothing starts next to a `Single` batch. A second `Single` batch of the
///   same process is merged by the caller instead.
/// - Batches of different processes may coexist only when both are
///   `MultipleMixed`.
/// - `Multiple` and `MultipleMixed` batches of the same process always stack.
pub fn can_start_batch<I>(existing: I, process: ProcessId, mode: GroupingMode) -> bool
where
    I: IntoIterator<Item = (ProcessId, GroupingMode)>,
{
    existing.into_iter().all(|(other, other_mode)| {
        if other_mode == GroupingMode::Single || mode == GroupingMode::Single {
            return false;
        }
        other == process
            || (mode == GroupingMode::MultipleMixed && other_mode == GroupingMode::MultipleMixed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use GroupingMode::*;

    const A: ProcessId = ProcessId(0);
    const B: ProcessId = ProcessId(1);

    #[test]
    fn anything_starts_in_an_empty_fermenter() {
        for mode in [Single, Multiple, MultipleMixed] {
            assert!(can_start_batch(Vec::new(), A, mode));
        }
    }

    #[test]
    fn single_batch_monopolizes() {
        for mode in [Single, Multiple, MultipleMixed] {
            assert!(!can_start_batch([(A, Single)], B, mode));
            assert!(!can_start_batch([(A, Single)], A, mode));
        }
    }

    #[test]
    fn single_needs_an_empty_fermenter() {
        assert!(!can_start_batch([(A, Multiple)], B, Single));
        assert!(!can_start_batch([(A, MultipleMixed)], B, Single));
    }

    #[test]
    fn multiple_stacks_with_itself_only() {
        assert!(can_start_batch([(A, Multiple), (A, Multiple)], A, Multiple));
        assert!(!can_start_batch([(A, Multiple)], B, Multiple));
        assert!(!can_start_batch([(A, MultipleMixed)], B, Multiple));
        assert!(!can_start_batch([(A, Multiple)], B, MultipleMixed));
    }

    #[test]
    fn mixed_processes_share() {
        assert!(can_start_batch([(A, MultipleMixed)], B, MultipleMixed));
        assert!(can_start_batch(
            [(A, MultipleMixed), (B, MultipleMixed)],
            A,
            MultipleMixed
        ));
    }
}

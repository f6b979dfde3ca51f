//! Sparse-binding coverage analysis.

use std::collections::BTreeMap;

use prism_capture::SparseMemoryBind;

/// True if `[offset, offset + size)` of a resource is contiguously covered
/// by `bindings` (keyed by resource offset).
///
/// The walk runs backward from the first binding starting beyond the queried
/// end (one past the last binding when none does); any gap fails. The
/// boundary handling is asymmetric between the loop-exit path and the
/// explicit first-element check when the earliest binding does not start at
/// the queried offset; that asymmetry is load-bearing for existing captures
/// and must not be "tidied up".
pub fn is_fully_bound(offset: u64, size: u64, bindings: &BTreeMap<u64, SparseMemoryBind>) -> bool {
    let resource_offsets: Vec<u64> = bindings.keys().copied().collect();

    let queried_end = offset + size;
    let one_after_req_range = resource_offsets
        .iter()
        .position(|&o| o > queried_end)
        .unwrap_or(resource_offsets.len());
    if one_after_req_range == 0 {
        return false;
    }
    let mut i = one_after_req_range - 1;

    let mut end = queried_end;
    while i > 0 && end > offset {
        let res_offset = resource_offsets[i];
        if res_offset + bindings[&res_offset].size >= end {
            end = res_offset;
            i -= 1;
            continue;
        }
        return false;
    }

    if end <= offset {
        return true;
    }

    if i == 0 {
        let res_offset = resource_offsets[0];
        if res_offset <= offset && res_offset + bindings[&res_offset].size >= end {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_capture::{DeviceMemoryHandle, SparseMemoryBindFlags};

    fn bindings(spans: &[(u64, u64)]) -> BTreeMap<u64, SparseMemoryBind> {
        spans
            .iter()
            .map(|&(offset, size)| {
                (
                    offset,
                    SparseMemoryBind {
                        resource_offset: offset,
                        size,
                        memory: DeviceMemoryHandle(1),
                        memory_offset: offset,
                        flags: SparseMemoryBindFlags::empty(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn contiguous_bindings_cover() {
        let b = bindings(&[(0, 10), (10, 10)]);
        assert!(is_fully_bound(0, 20, &b));
    }

    #[test]
    fn gap_fails() {
        let b = bindings(&[(0, 5), (10, 10)]);
        assert!(!is_fully_bound(0, 20, &b));
    }

    #[test]
    fn empty_set_fails() {
        let b = bindings(&[]);
        assert!(!is_fully_bound(0, 20, &b));
    }

    #[test]
    fn single_exact_binding_covers() {
        let b = bindings(&[(0, 64)]);
        assert!(is_fully_bound(0, 64, &b));
        assert!(!is_fully_bound(0, 65, &b));
    }

    #[test]
    fn first_binding_must_reach_back_to_offset() {
        // The first-element check requires the earliest binding to start at
        // or before the queried offset.
        let b = bindings(&[(5, 15)]);
        assert!(!is_fully_bound(0, 20, &b));
        assert!(is_fully_bound(5, 15, &b));
    }

    #[test]
    fn coverage_with_sentinel_binding_past_end() {
        // A later binding past the queried end lets the walk start.
        let b = bindings(&[(0, 32), (32, 32), (128, 16)]);
        assert!(is_fully_bound(0, 48, &b));
        assert!(!is_fully_bound(0, 80, &b));
    }

    #[test]
    fn queried_subrange_inside_one_binding() {
        let b = bindings(&[(0, 0x100), (0x1000, 0x10)]);
        assert!(is_fully_bound(0x20, 0x40, &b));
    }
}

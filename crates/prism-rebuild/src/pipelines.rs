//! Pipeline creation ordering: a base pipeline must exist before its
//! derivatives can be created against it.

use std::collections::{BTreeMap, BTreeSet};

use prism_capture::PipelineHandle;

/// Emission order for `pipelines` (handle → base handle, null for none).
///
/// Pipelines whose base is null or already resolved move to the output,
/// repeatedly, until the set drains. A pass that resolves nothing means a
/// base-handle cycle or a base outside the known set; the remainder is
/// appended in table order with no base honored and also returned so the
/// caller can report the broken dependency. Never an error.
pub fn pipelines_in_order(
    pipelines: &BTreeMap<PipelineHandle, PipelineHandle>,
) -> (Vec<PipelineHandle>, Vec<PipelineHandle>) {
    let mut order = Vec::with_capacity(pipelines.len());
    let mut unhandled: BTreeMap<PipelineHandle, PipelineHandle> = pipelines.clone();
    let mut handled: BTreeSet<PipelineHandle> = BTreeSet::new();

    while !unhandled.is_empty() {
        let mut resolved_this_pass = Vec::new();
        for (&pipeline, &base) in &unhandled {
            if base.is_null() || handled.contains(&base) {
                resolved_this_pass.push(pipeline);
            }
        }
        if resolved_this_pass.is_empty() {
            let remainder: Vec<PipelineHandle> = unhandled.keys().copied().collect();
            order.extend_from_slice(&remainder);
            return (order, remainder);
        }
        for pipeline in resolved_this_pass {
            unhandled.remove(&pipeline);
            handled.insert(pipeline);
            order.push(pipeline);
        }
    }
    (order, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(v: u64) -> PipelineHandle {
        PipelineHandle(v)
    }

    #[test]
    fn chain_emits_base_first() {
        let pipelines = BTreeMap::from([
            (handle(3), handle(2)),
            (handle(2), handle(1)),
            (handle(1), PipelineHandle::NULL),
        ]);
        let (order, cycle) = pipelines_in_order(&pipelines);
        assert_eq!(order, vec![handle(1), handle(2), handle(3)]);
        assert!(cycle.is_empty());
    }

    #[test]
    fn cycle_terminates_and_emits_each_once() {
        let pipelines = BTreeMap::from([(handle(1), handle(2)), (handle(2), handle(1))]);
        let (order, cycle) = pipelines_in_order(&pipelines);
        assert_eq!(order.len(), 2);
        assert_eq!(cycle.len(), 2);
        let mut sorted = order.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 2);
    }

    #[test]
    fn base_outside_known_set_is_treated_like_a_cycle() {
        let pipelines = BTreeMap::from([(handle(1), handle(99))]);
        let (order, cycle) = pipelines_in_order(&pipelines);
        assert_eq!(order, vec![handle(1)]);
        assert_eq!(cycle, vec![handle(1)]);
    }

    #[test]
    fn mixed_chain_and_cycle() {
        let pipelines = BTreeMap::from([
            (handle(1), PipelineHandle::NULL),
            (handle(2), handle(1)),
            (handle(10), handle(11)),
            (handle(11), handle(10)),
        ]);
        let (order, cycle) = pipelines_in_order(&pipelines);
        assert_eq!(order.len(), 4);
        assert_eq!(&order[..2], &[handle(1), handle(2)]);
        assert_eq!(cycle, vec![handle(10), handle(11)]);
    }
}

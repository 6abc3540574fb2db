use indexmap::IndexMap;

use super::{IpIndex, MergedAllocation, TraceData};

/// Groups the call paths of `data` by the frame they allocated in.
///
/// Groups are ordered by the first call path that allocated in them, and each group keeps its
/// call paths in the order they were first seen.
pub(super) fn merge_allocations(data: &TraceData) -> Vec<MergedAllocation> {
    let mut merged: IndexMap<IpIndex, MergedAllocation> = IndexMap::new();
    for allocation in &data.allocations {
        let ip_index = data.find_trace(allocation.trace_index).ip_index;
        let group = merged
            .entry(ip_index)
            .or_insert_with(|| MergedAllocation {
                ip_index,
                ..Default::default()
            });
        group.data += allocation.data;
        group.traces.push(*allocation);
    }
    merged.into_values().collect()
}

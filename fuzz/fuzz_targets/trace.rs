#![no_main]

use heapscope::model::{AllocationModel, ModelIndex, Role, TreeModel};
use heapscope::trace::TraceData;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let model = match TraceData::read(data) {
        Ok(data) => AllocationModel::from(data),
        Err(_) => return,
    };
    let root = ModelIndex::invalid();
    for row in 0..model.row_count(root) {
        let top = model.index(row, 0, root);
        for child in 0..model.row_count(top) {
            for column in 0..model.column_count() {
                let index = model.index(child, column, top);
                model.data(index, Role::Display);
                model.data(index, Role::ToolTip);
            }
        }
    }
});

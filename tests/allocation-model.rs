mod common;

use std::collections::HashSet;
use std::fmt::Write;
use std::fs;
use std::io;

use heapscope::model::{ModelIndex, Role, TreeModel, Value};
use heapscope::trace::TraceData;
use log::Level;
use pretty_assertions::assert_eq;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const ALLOCATIONS: usize = 3;
const PEAK: usize = 4;
const LEAKED: usize = 5;
const ALLOCATED: usize = 6;

// Random but well-formed traces: every parent precedes its child and every reference resolves.
fn random_trace(rng: &mut SmallRng) -> String {
    let mut out = String::new();
    let nstrings = rng.gen_range(0..8u32);
    for i in 0..nstrings {
        writeln!(out, "s sym{}", i).unwrap();
    }
    let nips = rng.gen_range(1..12u32);
    for i in 0..nips {
        let module = rng.gen_range(0..=nstrings);
        let function = rng.gen_range(0..=nstrings);
        writeln!(out, "i {:x} {:x} {:x}", 0x1000 + i, module, function).unwrap();
    }
    let ntraces = rng.gen_range(1..20u32);
    for i in 0..ntraces {
        let ip = rng.gen_range(1..=nips);
        let parent = rng.gen_range(0..=i);
        writeln!(out, "t {:x} {:x}", ip, parent).unwrap();
    }
    let mut live = Vec::new();
    for ptr in 1..rng.gen_range(1..60u64) {
        if !live.is_empty() && rng.gen_bool(0.3) {
            let freed: u64 = live.swap_remove(rng.gen_range(0..live.len()));
            writeln!(out, "- {:x}", freed).unwrap();
        }
        let size = rng.gen_range(0..0x1000u64);
        let trace = rng.gen_range(1..=ntraces);
        writeln!(out, "+ {:x} {:x} {:x}", size, trace, ptr).unwrap();
        live.push(ptr);
    }
    out
}

#[test]
fn allocation_model_random_navigation() {
    let mut rng = SmallRng::seed_from_u64(0x6865_6170);
    for _ in 0..200 {
        let input = random_trace(&mut rng);
        let data = TraceData::read(input.as_bytes()).unwrap();
        let (total_allocations, total_allocated, leaked) =
            (data.total_allocations, data.total_allocated, data.leaked);
        let model = heapscope::model::AllocationModel::from(data);
        let data = model.trace_data();
        let root = ModelIndex::invalid();

        let mut sums = [0u64; 3];
        let leaves: HashSet<_> = data
            .merged_allocations()
            .iter()
            .map(|allocation| allocation.ip_index.0)
            .collect();
        assert_eq!(leaves.len(), data.merged_allocations().len());
        for row in 0..model.row_count(root) {
            let top = model.index(row, 0, root);
            assert!(top.is_valid());
            assert_eq!(model.parent(top), root);
            sums[0] += common::count(&model, row, ALLOCATIONS, root);
            sums[1] += common::count(&model, row, ALLOCATED, root);
            sums[2] += common::count(&model, row, LEAKED, root);

            let nchildren = model.row_count(top);
            assert!(nchildren > 0, "{}", input);
            let mut child_sums = [0u64; 4];
            for child in 0..nchildren {
                for column in 0..model.column_count() {
                    let index = model.index(child, column, top);
                    assert_eq!(model.parent(index), top);
                    assert_eq!(model.row_count(index), 0);
                }
                child_sums[0] += common::count(&model, child, ALLOCATIONS, top);
                child_sums[1] += common::count(&model, child, PEAK, top);
                child_sums[2] += common::count(&model, child, LEAKED, top);
                child_sums[3] += common::count(&model, child, ALLOCATED, top);

                // the backtrace starts at the frame of the top-level row
                let tooltip = model.data(model.index(child, 0, top), Role::ToolTip);
                let function = common::row_text(&model, row, root).remove(1);
                assert!(
                    tooltip.as_text().unwrap().starts_with(&function),
                    "{:?} does not start with {}",
                    tooltip,
                    function
                );
            }
            assert_eq!(
                child_sums,
                [
                    common::count(&model, row, ALLOCATIONS, root),
                    common::count(&model, row, PEAK, root),
                    common::count(&model, row, LEAKED, root),
                    common::count(&model, row, ALLOCATED, root),
                ]
            );
            assert_eq!(model.index(nchildren, 0, top), ModelIndex::invalid());
        }
        assert_eq!(sums, [total_allocations, total_allocated, leaked]);
    }
}

#[test]
fn allocation_model_from_gzip() {
    let input = fs::read(common::data_file("two-callers.txt")).unwrap();
    let path = common::write_gzip("two-callers", &input).unwrap();
    let data = TraceData::read_file(&path);
    fs::remove_file(&path).unwrap();

    let data = data.unwrap();
    assert_eq!(data.debuggee, "./demo --frames 5");
    assert_eq!(data.total_time, 2000);
    assert_eq!(data.merged_allocations().len(), 1);
    assert_eq!(data.allocations().len(), 2);

    let model = heapscope::model::AllocationModel::from(data);
    let top = model.index(0, 0, ModelIndex::invalid());
    assert_eq!(
        common::row_text(&model, 1, top),
        ["demo.c:32", "render_frame", "demo", "4", "1024", "1024", "4096"]
    );
}

#[test]
fn allocation_model_invalid_input() {
    let cases = [
        "t 1 0\n",
        "i 1 2\n",
        "s a\ni 1 1\nt 1 1\n",
        "s a\ni 1 1\nt 1 0\n+ 8 2 a\n",
        "i 1 0\nt zz 0\n",
    ];
    for input in cases {
        let err = TraceData::read(input.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData, "{:?}", input);
    }
}

#[test]
fn allocation_model_logs_skipped_lines() {
    common::test_trace_logs(
        "i 1 0\nt 1 0\n+ 8 1 a\n+ 8\n- b\nq something\nc\n",
        |captured_logs| {
            let warnings: Vec<_> = captured_logs
                .iter()
                .filter(|log| log.level == Level::Warn)
                .map(|log| log.body.as_str())
                .collect();
            assert_eq!(
                warnings,
                [
                    "Unable to parse allocation on line 4: + 8",
                    "Ignoring deallocation of unknown pointer 0xb on line 5",
                    "Unknown line on line 6: q something",
                    "Unable to parse timestamp on line 7: c",
                ]
            );
        },
    );
}

#[test]
fn allocation_model_stale_indices() {
    let mut model = common::model("i 1 0\ni 2 0\nt 1 0\nt 2 1\n+ 8 2 a\n");
    let root = ModelIndex::invalid();
    let top = model.index(0, 0, root);
    let child = model.index(0, 3, top);
    assert_eq!(model.data(child, Role::Display), Value::Count(1));

    model.begin_reset();
    assert!(!model.has_children(root));
    model.end_reset(Default::default());
    assert_eq!(model.data(child, Role::Display), Value::Empty);
    assert_eq!(model.row_count(top), 0);
}

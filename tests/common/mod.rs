#![allow(dead_code)]

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use heapscope::model::{AllocationModel, ModelIndex, Role, TreeModel, Value};
use heapscope::trace::TraceData;
use testing_logger::CapturedLog;

pub const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/browse");

pub fn data_file(name: &str) -> PathBuf {
    Path::new(DATA_DIR).join(name)
}

pub fn model(input: &str) -> AllocationModel {
    TraceData::read(input.as_bytes()).unwrap().into()
}

/// The display text of every cell of `row` below `parent`.
pub fn row_text<M: TreeModel>(model: &M, row: usize, parent: ModelIndex) -> Vec<String> {
    (0..model.column_count())
        .map(|column| {
            model
                .data(model.index(row, column, parent), Role::Display)
                .to_string()
        })
        .collect()
}

pub fn count<M: TreeModel>(model: &M, row: usize, column: usize, parent: ModelIndex) -> u64 {
    match model.data(model.index(row, column, parent), Role::Display) {
        Value::Count(count) => count,
        other => panic!("expected a count at {}:{}, got {:?}", row, column, other),
    }
}

/// Reads `input` and hands the captured log lines to `asserter`.
pub fn test_trace_logs<F>(input: &str, asserter: F)
where
    F: Fn(&Vec<CapturedLog>),
{
    testing_logger::setup();
    TraceData::read(input.as_bytes()).unwrap();
    testing_logger::validate(asserter);
}

/// Compresses `input` into a fresh `.gz` file in the temp directory.
pub fn write_gzip(name: &str, input: &[u8]) -> io::Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("heapscope-{}-{}.gz", name, std::process::id()));
    let mut encoder = libflate::gzip::Encoder::new(File::create(&path)?)?;
    encoder.write_all(input)?;
    encoder.finish().into_result()?;
    Ok(path)
}

//! heapscope lets you browse the allocations recorded by a heap profiler like [heaptrack]. It
//! reads a trace of every allocation and deallocation the profiled program made, works out which
//! call stacks were responsible for how much memory, and presents the result as a two-level tree:
//! one row per place in the code that allocated memory, and below it one row per call path that
//! led there.
//!
//! # Command-line use
//!
//! ```console
//! $ heapscope-browse --expand heaptrack.myapp.1234.gz
//! ```
//!
//! prints a summary of the profile followed by the allocation tree as tab-separated columns:
//! file, function, module, number of allocations, peak, leaked and allocated bytes.
//! `--backtraces` also prints the full call stack of every call path.
//!
//! # Programmatic access
//!
//! The tree is exposed through the [`model::TreeModel`] trait, which is shaped after what
//! virtualized tree views need: rows are addressed by small [`model::ModelIndex`] values, and
//! nothing is computed for rows that are never looked at.
//!
//! ```
//! use heapscope::model::{AllocationModel, ModelIndex, Role, TreeModel};
//! use heapscope::trace::TraceData;
//!
//! let trace = "\
//! s libfoo.so
//! s allocate
//! i 1000 1 2
//! i 2000 1
//! t 2 0
//! t 1 1
//! + 400 2 7f00
//! ";
//! let data = TraceData::read(trace.as_bytes())?;
//! let model = AllocationModel::from(data);
//!
//! let root = ModelIndex::invalid();
//! assert_eq!(model.row_count(root), 1);
//! let function = model.index(0, 1, root);
//! assert_eq!(model.data(function, Role::Display).to_string(), "allocate");
//!
//! // the call path below it shows the calling frame
//! let call_path = model.index(0, 1, model.index(0, 0, root));
//! assert_eq!(model.data(call_path, Role::Display).to_string(), "0x2000");
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! Loading a file can take a while, so [`load::Loader`] does it on a background thread and
//! reports back over a channel, bracketing the swap of the data with reset events.
//!
//!   [heaptrack]: https://github.com/KDE/heaptrack

#![deny(missing_docs)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

#[macro_use]
extern crate log;

macro_rules! invalid_data_error {
    ($($arg:tt)*) => {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!($($arg)*),
        ))
    };
}

/// Loading traces in the background.
///
/// See the [crate-level documentation] for details.
///
///   [crate-level documentation]: ../index.html
pub mod load;

/// The allocation tree and the tree model contract it implements.
///
/// See the [crate-level documentation] for details.
///
///   [crate-level documentation]: ../index.html
pub mod model;

/// Human-readable summary of a heap profile.
pub mod summary;

/// Reading heap profiler traces into flat allocation tables.
///
/// See [`TraceData::read`](trace::TraceData::read) for the input format.
pub mod trace;

/// Plain-text rendering of tree models.
pub mod view;

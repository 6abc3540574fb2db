mod demangle;
mod merge;
mod parse;

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io;
use std::ops::AddAssign;
use std::path::Path;

use str_stack::StrStack;

const READER_CAPACITY: usize = 128 * 1024;

macro_rules! index_type {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        ///
        /// Indices are 1-based into their table. The zero index is the null reference.
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Returns `true` if this is the null reference.
            pub fn is_null(self) -> bool {
                self.0 == 0
            }

            // Position in the backing table, if this is not the null reference.
            fn slot(self) -> Option<usize> {
                (self.0 as usize).checked_sub(1)
            }
        }
    };
}

index_type!(
    /// Reference to a [`TraceNode`].
    TraceIndex
);
index_type!(
    /// Reference to an [`InstructionPointer`].
    IpIndex
);
index_type!(
    /// Reference to an interned string.
    StringIndex
);

/// Allocation counters of a call path, or of a group of call paths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocationData {
    /// Number of calls to allocation functions.
    pub allocations: u64,
    /// Peak number of bytes that were live at the same time.
    pub peak: u64,
    /// Bytes that were never freed.
    pub leaked: u64,
    /// Bytes allocated in total, ignoring deallocations.
    pub allocated: u64,
}

impl AddAssign for AllocationData {
    fn add_assign(&mut self, rhs: Self) {
        self.allocations = self.allocations.saturating_add(rhs.allocations);
        self.peak = self.peak.saturating_add(rhs.peak);
        self.leaked = self.leaked.saturating_add(rhs.leaked);
        self.allocated = self.allocated.saturating_add(rhs.allocated);
    }
}

/// The counters of a single call path that allocated memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Allocation {
    /// Counters for this call path.
    pub data: AllocationData,
    /// The leaf node of the call path.
    pub trace_index: TraceIndex,
}

/// All call paths that share the same leaf frame, with their counters summed up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedAllocation {
    /// Sum of the counters of all `traces`.
    pub data: AllocationData,
    /// The leaf frame shared by all `traces`.
    pub ip_index: IpIndex,
    /// The contributing call paths, in the order they were first seen.
    pub traces: Vec<Allocation>,
}

/// One frame of a call stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceNode {
    /// The frame of this node.
    pub ip_index: IpIndex,
    /// The calling node, or the null reference at the outermost frame.
    pub parent_index: TraceIndex,
}

/// A resolved code location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InstructionPointer {
    /// The raw address.
    pub instruction_pointer: u64,
    /// The module (executable or shared library) containing the address.
    pub module_index: StringIndex,
    /// The (mangled) function symbol, if known.
    pub function_index: StringIndex,
    /// The source file, if known.
    pub file_index: StringIndex,
    /// The source line, only meaningful if `file_index` is set.
    pub line: u32,
}

struct StringTable {
    strings: StrStack,
    len: usize,
}

impl Default for StringTable {
    fn default() -> Self {
        Self {
            strings: StrStack::new(),
            len: 0,
        }
    }
}

impl StringTable {
    fn push(&mut self, s: &str) {
        self.strings.push(s);
        self.len += 1;
    }

    fn get(&self, index: StringIndex) -> &str {
        match index.slot() {
            Some(slot) if slot < self.len => &self.strings[slot],
            _ => "",
        }
    }
}

impl fmt::Debug for StringTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringTable").field("len", &self.len).finish()
    }
}

/// The flat aggregate of one heap profile.
///
/// A `TraceData` is built in one go by [`TraceData::read`] and never changes afterwards. Call
/// stacks are stored as a table of [`TraceNode`]s that point towards their callers, so there is
/// no tree of owned nodes anywhere: every cross reference is an index into one of the tables.
///
/// Looking up a null or out-of-range index yields an empty default record rather than an error.
#[derive(Debug, Default)]
pub struct TraceData {
    strings: StringTable,
    traces: Vec<TraceNode>,
    instruction_pointers: Vec<InstructionPointer>,
    allocations: Vec<Allocation>,
    merged_allocations: Vec<MergedAllocation>,

    /// Bytes allocated in total, ignoring deallocations.
    pub total_allocated: u64,
    /// Number of calls to allocation functions.
    pub total_allocations: u64,
    /// Peak heap memory consumption in bytes.
    pub peak: u64,
    /// Bytes that were never freed.
    pub leaked: u64,
    /// Runtime of the profiled program in milliseconds.
    pub total_time: u64,
    /// Command line of the profiled program, if recorded.
    pub debuggee: String,
}

impl TraceData {
    /// Reads a trace file.
    ///
    /// Files with a `.gz` extension are decompressed on the fly.
    pub fn read_file<P>(path: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path)?;
        if path.extension().map_or(false, |ext| ext == "gz") {
            let decoder = libflate::gzip::Decoder::new(file)?;
            Self::read(io::BufReader::with_capacity(READER_CAPACITY, decoder))
        } else {
            Self::read(io::BufReader::with_capacity(READER_CAPACITY, file))
        }
    }

    /// Reads a trace from `reader`.
    ///
    /// Each line holds one record, introduced by a single-character tag and followed by
    /// whitespace-separated fields. Numbers are lowercase hex without a prefix.
    ///
    ///  - `s <text>`: the next interned string.
    ///  - `t <ip> <parent>`: the next trace node.
    ///  - `i <address> <module> [<function> [<file> <line>]]`: the next instruction pointer.
    ///  - `+ <size> <trace> <pointer>`: an allocation.
    ///  - `- <pointer>`: a deallocation.
    ///  - `c <milliseconds>`: a timestamp.
    ///  - `X <command line>`: the profiled program.
    ///  - `# ...`: a comment.
    ///
    /// Unknown or malformed allocation records are skipped with a warning. Malformed table
    /// records, or references that do not resolve, make the whole trace invalid.
    pub fn read<R>(reader: R) -> io::Result<Self>
    where
        R: io::BufRead,
    {
        parse::Parser::default().parse(reader)
    }

    /// All allocations grouped by their leaf frame.
    pub fn merged_allocations(&self) -> &[MergedAllocation] {
        &self.merged_allocations
    }

    /// All call paths that allocated memory, in the order they were first seen.
    pub fn allocations(&self) -> &[Allocation] {
        &self.allocations
    }

    /// Number of trace nodes.
    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }

    /// Looks up a trace node.
    pub fn find_trace(&self, index: TraceIndex) -> TraceNode {
        index
            .slot()
            .and_then(|slot| self.traces.get(slot))
            .copied()
            .unwrap_or_default()
    }

    /// Looks up an instruction pointer.
    pub fn find_ip(&self, index: IpIndex) -> InstructionPointer {
        index
            .slot()
            .and_then(|slot| self.instruction_pointers.get(slot))
            .copied()
            .unwrap_or_default()
    }

    /// Resolves an interned string. Unknown strings are empty.
    pub fn stringify(&self, index: StringIndex) -> &str {
        self.strings.get(index)
    }

    /// Turns a raw function symbol into something fit for display.
    pub fn pretty_function<'a>(&self, function: &'a str) -> Cow<'a, str> {
        demangle::prettify(function)
    }

    /// Renders the call stack ending in `index`, one frame per line, innermost frame first.
    pub fn render_backtrace(&self, index: TraceIndex) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_backtrace(index, &mut out);
        out
    }

    /// Writes the call stack ending in `index` to `writer`, see [`TraceData::render_backtrace`].
    pub fn write_backtrace<W>(&self, mut index: TraceIndex, writer: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        // parents always precede their children, but a stale index must not hang us
        let mut remaining = self.traces.len();
        while !index.is_null() && remaining > 0 {
            let node = self.find_trace(index);
            self.write_frame(&self.find_ip(node.ip_index), writer)?;
            writer.write_char('\n')?;
            index = node.parent_index;
            remaining -= 1;
        }
        Ok(())
    }

    fn write_frame<W>(&self, ip: &InstructionPointer, writer: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        if ip.function_index.is_null() {
            write!(writer, "0x{:x}", ip.instruction_pointer)?;
        } else {
            writer.write_str(&self.pretty_function(self.stringify(ip.function_index)))?;
        }
        if !ip.file_index.is_null() {
            write!(writer, " at {}:{}", self.stringify(ip.file_index), ip.line)?;
        }
        let module = self.stringify(ip.module_index);
        if !module.is_empty() {
            write!(writer, " in {}", module)?;
        }
        Ok(())
    }
}

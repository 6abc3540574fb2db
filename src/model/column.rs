use crate::trace::{AllocationData, InstructionPointer, IpIndex, TraceData};

use super::Value;

/// Number of columns of the allocation tree.
pub const NUM_COLUMNS: usize = 7;

/// The columns of the allocation tree, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    /// Source location as `file:line`.
    File,
    /// Function name, or the raw address if unknown.
    Function,
    /// Executable or shared library.
    Module,
    /// Number of calls to allocation functions.
    Allocations,
    /// Peak number of live bytes.
    Peak,
    /// Bytes never freed.
    Leaked,
    /// Bytes allocated in total.
    Allocated,
}

impl Column {
    /// All columns, in display order.
    pub const ALL: [Column; NUM_COLUMNS] = [
        Column::File,
        Column::Function,
        Column::Module,
        Column::Allocations,
        Column::Peak,
        Column::Leaked,
        Column::Allocated,
    ];

    /// The column at position `index`, if any.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The header title of this column.
    pub fn label(self) -> &'static str {
        match self {
            Column::File => "File",
            Column::Function => "Function",
            Column::Module => "Module",
            Column::Allocations => "Allocations",
            Column::Peak => "Peak",
            Column::Leaked => "Leaked",
            Column::Allocated => "Allocated",
        }
    }
}

/// The display value of `column` for a row with the given counters and frame.
pub(super) fn allocation_data(
    data: &TraceData,
    counters: &AllocationData,
    ip_index: IpIndex,
    column: Column,
) -> Value {
    match column {
        Column::Allocations => Value::Count(counters.allocations),
        Column::Peak => Value::Count(counters.peak),
        Column::Leaked => Value::Count(counters.leaked),
        Column::Allocated => Value::Count(counters.allocated),
        Column::File => file_text(data, &data.find_ip(ip_index)),
        Column::Function => function_text(data, &data.find_ip(ip_index)),
        Column::Module => {
            let ip = data.find_ip(ip_index);
            Value::Text(data.stringify(ip.module_index).to_string())
        }
    }
}

fn function_text(data: &TraceData, ip: &InstructionPointer) -> Value {
    if ip.function_index.is_null() {
        Value::Text(format!("0x{:x}", ip.instruction_pointer))
    } else {
        let function = data.stringify(ip.function_index);
        Value::Text(data.pretty_function(function).into_owned())
    }
}

fn file_text(data: &TraceData, ip: &InstructionPointer) -> Value {
    if ip.file_index.is_null() {
        Value::Text(String::new())
    } else {
        Value::Text(format!("{}:{}", data.stringify(ip.file_index), ip.line))
    }
}

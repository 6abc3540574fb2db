mod column;
mod index;

pub use column::{Column, NUM_COLUMNS};
pub use index::ModelIndex;

use std::fmt;
use std::sync::Arc;

use crate::trace::{Allocation, MergedAllocation, TraceData};

/// What a view asks a model for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The text or number shown in a cell.
    Display,
    /// Secondary text, typically shown when hovering a cell.
    ToolTip,
    /// Any other view-specific role. Models answer these with [`Value::Empty`] unless they know
    /// better.
    Other(u32),
}

/// Header orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Column headers.
    Horizontal,
    /// Row headers.
    Vertical,
}

/// A cell value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Value {
    /// Nothing to show.
    #[default]
    Empty,
    /// Text.
    Text(String),
    /// An exact count, in whatever unit the column uses.
    Count(u64),
}

impl Value {
    /// Returns `true` for [`Value::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// The text of a [`Value::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The number of a [`Value::Count`].
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Value::Count(count) => Some(*count),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(text) => f.write_str(text),
            Value::Count(count) => write!(f, "{}", count),
        }
    }
}

/// The contract between a hierarchical data source and a virtualized tree view.
///
/// The view never sees the model's data structures. It walks the tree through [`ModelIndex`]
/// values it gets from [`TreeModel::index`], and only asks for the rows it is about to show.
/// Implementations must treat every index they are handed as untrusted: a view may hold on to
/// indices across a reset of the model, and asking about a stale index must yield an invalid
/// index, zero rows or [`Value::Empty`], never a panic.
pub trait TreeModel {
    /// Number of rows below `parent`. The invalid index stands for the root.
    fn row_count(&self, parent: ModelIndex) -> usize;

    /// Number of columns. The same for every row.
    fn column_count(&self) -> usize;

    /// The index of the cell at `row` and `column` below `parent`, or the invalid index if there
    /// is no such cell.
    fn index(&self, row: usize, column: usize, parent: ModelIndex) -> ModelIndex;

    /// The parent of `child`, or the invalid index for top-level and invalid indices.
    fn parent(&self, child: ModelIndex) -> ModelIndex;

    /// The value of the cell at `index` for `role`.
    fn data(&self, index: ModelIndex, role: Role) -> Value;

    /// The header title of `section`.
    fn header_data(&self, section: usize, orientation: Orientation, role: Role) -> Value;

    /// Returns `true` if `parent` has any rows below it.
    fn has_children(&self, parent: ModelIndex) -> bool {
        self.row_count(parent) > 0
    }
}

/// Presents the merged allocations of a [`TraceData`] as a two-level tree.
///
/// Every top-level row is one [`MergedAllocation`], that is, one frame in which memory was
/// allocated. Below it are the call paths that led there, one row each. No tree is ever built:
/// rows are looked up by position in the flat tables of the current snapshot.
#[derive(Debug, Default)]
pub struct AllocationModel {
    data: Arc<TraceData>,
    resetting: bool,
}

impl From<Arc<TraceData>> for AllocationModel {
    fn from(data: Arc<TraceData>) -> Self {
        Self {
            data,
            resetting: false,
        }
    }
}

impl From<TraceData> for AllocationModel {
    fn from(data: TraceData) -> Self {
        Arc::new(data).into()
    }
}

impl AllocationModel {
    /// Creates a model without any allocations.
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot currently shown.
    pub fn trace_data(&self) -> &Arc<TraceData> {
        &self.data
    }

    /// Announces that the data is about to be replaced.
    ///
    /// Until the matching [`AllocationModel::end_reset`], the model has no rows and hands out no
    /// indices. Indices obtained before this call must be considered stale by the view.
    pub fn begin_reset(&mut self) {
        debug!("Begin model reset");
        self.resetting = true;
    }

    /// Replaces the data and ends a reset.
    pub fn end_reset(&mut self, data: Arc<TraceData>) {
        debug!(
            "End model reset with {} allocation rows",
            data.merged_allocations().len()
        );
        self.data = data;
        self.resetting = false;
    }

    /// Returns `true` between [`AllocationModel::begin_reset`] and
    /// [`AllocationModel::end_reset`].
    pub fn is_resetting(&self) -> bool {
        self.resetting
    }

    fn top_level(&self, row: usize) -> Option<&MergedAllocation> {
        self.data.merged_allocations().get(row)
    }

    fn child(&self, parent_row: usize, row: usize) -> Option<&Allocation> {
        self.top_level(parent_row)?.traces.get(row)
    }

    fn data_(&self, index: ModelIndex, role: Role) -> Option<Value> {
        let column = Column::from_index(index.column()?)?;
        let row = index.row()?;
        let data = &*self.data;
        match index.parent_row() {
            None => {
                let allocation = self.top_level(row)?;
                match role {
                    Role::Display => Some(column::allocation_data(
                        data,
                        &allocation.data,
                        allocation.ip_index,
                        column,
                    )),
                    _ => None,
                }
            }
            Some(parent_row) => {
                let trace = self.child(parent_row, row)?;
                match role {
                    Role::Display => {
                        // The leaf frame of the call path is the one shown by the top-level row,
                        // so show where it was called from instead.
                        let node = data.find_trace(trace.trace_index);
                        let caller = data.find_trace(node.parent_index);
                        Some(column::allocation_data(
                            data,
                            &trace.data,
                            caller.ip_index,
                            column,
                        ))
                    }
                    Role::ToolTip => Some(Value::Text(data.render_backtrace(trace.trace_index))),
                    Role::Other(_) => None,
                }
            }
        }
    }
}

impl TreeModel for AllocationModel {
    fn row_count(&self, parent: ModelIndex) -> usize {
        if self.resetting {
            return 0;
        }
        if !parent.is_valid() {
            return self.data.merged_allocations().len();
        }
        // only top-level rows have children, and only through their first column
        if parent.column() != Some(0) || !parent.is_top_level() {
            return 0;
        }
        parent
            .row()
            .and_then(|row| self.top_level(row))
            .map_or(0, |allocation| allocation.traces.len())
    }

    fn column_count(&self) -> usize {
        NUM_COLUMNS
    }

    fn index(&self, row: usize, column: usize, parent: ModelIndex) -> ModelIndex {
        if column >= self.column_count() || row >= self.row_count(parent) {
            return ModelIndex::invalid();
        }
        ModelIndex::encode(row, column, parent)
    }

    fn parent(&self, child: ModelIndex) -> ModelIndex {
        match child.parent_row() {
            Some(row) => ModelIndex::encode(row, 0, ModelIndex::invalid()),
            None => ModelIndex::invalid(),
        }
    }

    fn data(&self, index: ModelIndex, role: Role) -> Value {
        self.data_(index, role).unwrap_or_default()
    }

    fn header_data(&self, section: usize, orientation: Orientation, role: Role) -> Value {
        if orientation != Orientation::Horizontal || role != Role::Display {
            return Value::Empty;
        }
        Column::from_index(section).map_or(Value::Empty, |column| {
            Value::Text(column.label().to_string())
        })
    }
}

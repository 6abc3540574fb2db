use std::io::{self, Write};

use crate::model::{ModelIndex, Orientation, Role, TreeModel, Value};

/// Configure the text rendering of a tree.
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Also print the rows below each top-level row.
    pub expand: bool,

    /// Print the tool tip of every child row below it. Implies `expand`.
    pub backtraces: bool,

    /// Print at most this many top-level rows.
    pub max_rows: Option<usize>,
}

/// Writes the rows of `model` as tab-separated lines, starting with a header line.
///
/// Child rows are indented by two spaces, and tool tip lines by four.
pub fn write_tree<M, W>(model: &M, opt: &Options, mut writer: W) -> io::Result<()>
where
    M: TreeModel,
    W: Write,
{
    let columns = model.column_count();
    for section in 0..columns {
        if section > 0 {
            writer.write_all(b"\t")?;
        }
        let label = model.header_data(section, Orientation::Horizontal, Role::Display);
        write!(writer, "{}", label)?;
    }
    writer.write_all(b"\n")?;

    let root = ModelIndex::invalid();
    let nrows = model.row_count(root);
    let shown = opt.max_rows.map_or(nrows, |max| max.min(nrows));
    for row in 0..shown {
        write_row(model, row, root, "", &mut writer)?;
        if !(opt.expand || opt.backtraces) {
            continue;
        }

        let parent = model.index(row, 0, root);
        for child in 0..model.row_count(parent) {
            write_row(model, child, parent, "  ", &mut writer)?;
            if opt.backtraces {
                let tooltip = model.data(model.index(child, 0, parent), Role::ToolTip);
                for line in tooltip.to_string().lines() {
                    writeln!(writer, "    {}", line)?;
                }
            }
        }
    }

    if shown < nrows {
        info!("{} of {} allocation rows not shown", nrows - shown, nrows);
    }
    Ok(())
}

fn write_row<M, W>(
    model: &M,
    row: usize,
    parent: ModelIndex,
    indent: &str,
    writer: &mut W,
) -> io::Result<()>
where
    M: TreeModel,
    W: Write,
{
    let mut buf = itoa::Buffer::new();
    writer.write_all(indent.as_bytes())?;
    for column in 0..model.column_count() {
        if column > 0 {
            writer.write_all(b"\t")?;
        }
        match model.data(model.index(row, column, parent), Role::Display) {
            Value::Empty => {}
            Value::Text(text) => writer.write_all(text.as_bytes())?,
            Value::Count(count) => writer.write_all(buf.format(count).as_bytes())?,
        }
    }
    writer.write_all(b"\n")
}

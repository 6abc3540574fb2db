use std::fmt;

use num_format::{Buffer, Locale};

use crate::trace::TraceData;

const BYTE_UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// The headline numbers of a heap profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Runtime of the profiled program in milliseconds.
    pub total_time: u64,
    /// Bytes allocated in total, ignoring deallocations.
    pub total_allocated: u64,
    /// Number of calls to allocation functions.
    pub total_allocations: u64,
    /// Peak heap memory consumption in bytes.
    pub peak: u64,
    /// Bytes that were never freed.
    pub leaked: u64,
}

impl From<&TraceData> for Summary {
    fn from(data: &TraceData) -> Self {
        Self {
            total_time: data.total_time,
            total_allocated: data.total_allocated,
            total_allocations: data.total_allocations,
            peak: data.peak,
            leaked: data.leaked,
        }
    }
}

impl Summary {
    /// Writes the summary, using `locale` for thousands separators.
    ///
    /// Rates are left out if the runtime is unknown.
    pub fn write_with_locale<W>(&self, writer: &mut W, locale: &Locale) -> fmt::Result
    where
        W: fmt::Write,
    {
        let seconds = self.total_time as f64 / 1000.0;
        writeln!(writer, "total runtime: {}s.", seconds)?;

        write!(
            writer,
            "bytes allocated in total (ignoring deallocations): {}",
            format_byte_size(self.total_allocated as f64, 2)
        )?;
        if self.total_time > 0 {
            write!(
                writer,
                " ({}/s)",
                format_byte_size(self.total_allocated as f64 / seconds, 1)
            )?;
        }
        writeln!(writer)?;

        let mut buf = Buffer::default();
        buf.write_formatted(&self.total_allocations, locale);
        write!(writer, "calls to allocation functions: {}", buf.as_str())?;
        if self.total_time > 0 {
            let rate = (self.total_allocations as f64 / seconds) as u64;
            buf.write_formatted(&rate, locale);
            write!(writer, " ({}/s)", buf.as_str())?;
        }
        writeln!(writer)?;

        writeln!(
            writer,
            "peak heap memory consumption: {}",
            format_byte_size(self.peak as f64, 1)
        )?;
        writeln!(
            writer,
            "total memory leaked: {}",
            format_byte_size(self.leaked as f64, 1)
        )
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_with_locale(f, &Locale::en)
    }
}

/// Formats a byte count with binary (IEC) units, e.g. `1.50 KiB` for 1536 bytes at precision 2.
///
/// Counts below one KiB are shown as whole bytes.
pub fn format_byte_size(bytes: f64, precision: usize) -> String {
    let mut size = bytes;
    let mut unit = 0;
    while size >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", size as u64)
    } else {
        format!("{:.*} {}", precision, size, BYTE_UNITS[unit])
    }
}

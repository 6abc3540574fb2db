use std::io;

use ahash::AHashMap;
use indexmap::IndexMap;

use super::{
    merge, Allocation, AllocationData, InstructionPointer, IpIndex, StringIndex, TraceData,
    TraceIndex, TraceNode,
};

/// Builds a [`TraceData`] from the lines of a trace.
#[derive(Default)]
pub(super) struct Parser {
    data: TraceData,

    /// Counters per call path, in the order the call paths were first seen.
    allocations: IndexMap<TraceIndex, AllocationData>,

    /// Live pointers, with the call path that allocated them and their size.
    active: AHashMap<u64, (TraceIndex, u64)>,

    line_number: usize,
}

impl Parser {
    pub(super) fn parse<R>(mut self, mut reader: R) -> io::Result<TraceData>
    where
        R: io::BufRead,
    {
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            self.line_number += 1;

            let l = String::from_utf8_lossy(&line);
            let l = l.trim_end_matches(|c| c == '\n' || c == '\r');
            if l.is_empty() {
                continue;
            }
            self.on_line(l)?;
        }

        debug!(
            "Read {} lines: {} strings, {} traces, {} instruction pointers",
            self.line_number,
            self.data.strings.len,
            self.data.traces.len(),
            self.data.instruction_pointers.len()
        );
        self.finish()
    }

    fn on_line(&mut self, line: &str) -> io::Result<()> {
        let (tag, rest) = line.split_once(' ').unwrap_or((line, ""));
        match tag {
            "s" => self.data.strings.push(rest),
            "t" => {
                let mut fields = rest.split_whitespace();
                match (parse_index(fields.next()), parse_index(fields.next())) {
                    (Some(ip_index), Some(parent_index)) => self.data.traces.push(TraceNode {
                        ip_index: IpIndex(ip_index),
                        parent_index: TraceIndex(parent_index),
                    }),
                    _ => {
                        return invalid_data_error!(
                            "Invalid trace on line {}: {}",
                            self.line_number,
                            line
                        )
                    }
                }
            }
            "i" => match parse_instruction_pointer(rest) {
                Some(ip) => self.data.instruction_pointers.push(ip),
                None => {
                    return invalid_data_error!(
                        "Invalid instruction pointer on line {}: {}",
                        self.line_number,
                        line
                    )
                }
            },
            "+" => {
                let mut fields = rest.split_whitespace();
                let size = parse_hex(fields.next());
                let trace_index = parse_index(fields.next());
                let ptr = parse_hex(fields.next());
                match (size, trace_index, ptr) {
                    (Some(size), Some(trace_index), Some(ptr)) if trace_index != 0 => {
                        self.on_allocation(size, TraceIndex(trace_index), ptr)
                    }
                    _ => warn!(
                        "Unable to parse allocation on line {}: {}",
                        self.line_number, line
                    ),
                }
            }
            "-" => match parse_hex(rest.split_whitespace().next()) {
                Some(ptr) => self.on_deallocation(ptr),
                None => warn!(
                    "Unable to parse deallocation on line {}: {}",
                    self.line_number, line
                ),
            },
            "c" => match parse_hex(rest.split_whitespace().next()) {
                Some(timestamp) => self.data.total_time = timestamp,
                None => warn!(
                    "Unable to parse timestamp on line {}: {}",
                    self.line_number, line
                ),
            },
            "X" => self.data.debuggee = rest.to_string(),
            "#" => {}
            _ => warn!("Unknown line on line {}: {}", self.line_number, line),
        }
        Ok(())
    }

    fn on_allocation(&mut self, size: u64, trace_index: TraceIndex, ptr: u64) {
        let info = self.allocations.entry(trace_index).or_default();
        info.allocations += 1;
        info.allocated = info.allocated.saturating_add(size);
        info.leaked = info.leaked.saturating_add(size);
        info.peak = info.peak.max(info.leaked);

        let data = &mut self.data;
        data.total_allocations += 1;
        data.total_allocated = data.total_allocated.saturating_add(size);
        data.leaked = data.leaked.saturating_add(size);
        data.peak = data.peak.max(data.leaked);

        if let Some((previous, _)) = self.active.insert(ptr, (trace_index, size)) {
            // the earlier allocation stays accounted as leaked
            debug!(
                "Pointer 0x{:x} allocated again on line {}, first by trace {}",
                ptr, self.line_number, previous.0
            );
        }
    }

    fn on_deallocation(&mut self, ptr: u64) {
        let (trace_index, size) = match self.active.remove(&ptr) {
            Some(active) => active,
            None => {
                warn!(
                    "Ignoring deallocation of unknown pointer 0x{:x} on line {}",
                    ptr, self.line_number
                );
                return;
            }
        };
        if let Some(info) = self.allocations.get_mut(&trace_index) {
            info.leaked = info.leaked.saturating_sub(size);
        }
        self.data.leaked = self.data.leaked.saturating_sub(size);
    }

    fn finish(mut self) -> io::Result<TraceData> {
        self.validate()?;

        self.data.allocations = self
            .allocations
            .into_iter()
            .map(|(trace_index, data)| Allocation { data, trace_index })
            .collect();
        self.data.merged_allocations = merge::merge_allocations(&self.data);
        info!(
            "Merged {} call paths into {} allocation sites",
            self.data.allocations.len(),
            self.data.merged_allocations.len()
        );
        Ok(self.data)
    }

    // Every reference must resolve and every call stack must end at the root.
    fn validate(&self) -> io::Result<()> {
        let data = &self.data;
        let nstrings = data.strings.len;
        let resolves = |index: StringIndex| (index.0 as usize) <= nstrings;
        for (slot, ip) in data.instruction_pointers.iter().enumerate() {
            if !(resolves(ip.module_index) && resolves(ip.function_index) && resolves(ip.file_index))
            {
                return invalid_data_error!(
                    "Instruction pointer {} references an unknown string",
                    slot + 1
                );
            }
        }

        let nips = data.instruction_pointers.len();
        for (slot, node) in data.traces.iter().enumerate() {
            if node.ip_index.0 as usize > nips {
                return invalid_data_error!(
                    "Trace {} references unknown instruction pointer {}",
                    slot + 1,
                    node.ip_index.0
                );
            }
            // parents are written before their children
            if node.parent_index.0 as usize > slot {
                return invalid_data_error!(
                    "Trace {} has parent {} which does not precede it",
                    slot + 1,
                    node.parent_index.0
                );
            }
        }

        let ntraces = data.traces.len();
        for trace_index in self.allocations.keys() {
            if trace_index.0 as usize > ntraces {
                return invalid_data_error!(
                    "Allocation references unknown trace {}",
                    trace_index.0
                );
            }
        }
        Ok(())
    }
}

fn parse_hex(field: Option<&str>) -> Option<u64> {
    u64::from_str_radix(field?, 16).ok()
}

fn parse_index(field: Option<&str>) -> Option<u32> {
    u32::try_from(parse_hex(field)?).ok()
}

// Parse the fields of lines like:
// i 7f2bd2d3b4c2 3 4 5 1a
fn parse_instruction_pointer(fields: &str) -> Option<InstructionPointer> {
    let mut fields = fields.split_whitespace();
    let mut ip = InstructionPointer {
        instruction_pointer: parse_hex(fields.next())?,
        module_index: StringIndex(parse_index(fields.next())?),
        ..Default::default()
    };
    if let Some(function) = fields.next() {
        ip.function_index = StringIndex(parse_index(Some(function))?);
        if let Some(file) = fields.next() {
            ip.file_index = StringIndex(parse_index(Some(file))?);
            ip.line = parse_index(fields.next())?;
        }
    }
    if fields.next().is_some() {
        return None;
    }
    Some(ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_pointer_fields() {
        assert_eq!(
            parse_instruction_pointer("7f2b 3"),
            Some(InstructionPointer {
                instruction_pointer: 0x7f2b,
                module_index: StringIndex(3),
                ..Default::default()
            })
        );
        assert_eq!(
            parse_instruction_pointer("7f2b 3 4"),
            Some(InstructionPointer {
                instruction_pointer: 0x7f2b,
                module_index: StringIndex(3),
                function_index: StringIndex(4),
                ..Default::default()
            })
        );
        assert_eq!(
            parse_instruction_pointer("7f2b 3 4 5 1a"),
            Some(InstructionPointer {
                instruction_pointer: 0x7f2b,
                module_index: StringIndex(3),
                function_index: StringIndex(4),
                file_index: StringIndex(5),
                line: 26,
            })
        );
    }

    #[test]
    fn instruction_pointer_garbage() {
        assert_eq!(parse_instruction_pointer(""), None);
        assert_eq!(parse_instruction_pointer("7f2b"), None);
        assert_eq!(parse_instruction_pointer("7f2b 3 4 5"), None);
        assert_eq!(parse_instruction_pointer("7f2b 3 4 5 1a 9"), None);
        assert_eq!(parse_instruction_pointer("7f2b 100000000"), None);
        assert_eq!(parse_instruction_pointer("0x7f2b 3"), None);
    }

    #[test]
    fn reallocated_pointer_stays_leaked() {
        let data = TraceData::read("i 1 0\nt 1 0\n+ 10 1 a\n+ 4 1 a\n- a\n".as_bytes()).unwrap();
        assert_eq!(data.total_allocated, 0x14);
        assert_eq!(data.leaked, 0x10);
    }

    #[test]
    fn crlf_line_endings() {
        let data = TraceData::read("s libc.so\r\ni 1 1\r\nt 1 0\r\n+ 8 1 a\r\n".as_bytes()).unwrap();
        assert_eq!(data.stringify(StringIndex(1)), "libc.so");
        assert_eq!(data.total_allocated, 8);
    }
}

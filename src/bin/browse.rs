use std::io::{self, Write};
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use env_logger::Env;
use heapscope::load::Loader;
use heapscope::model::AllocationModel;
use heapscope::view::{self, Options};

#[derive(Debug, Parser)]
#[command(
    name = "heapscope-browse",
    about,
    after_help = "\
[1] The input is a heaptrack-style trace, optionally gzip-compressed (.gz).
    Rows are printed as tab-separated columns:
        file, function, module, allocations, peak, leaked, allocated"
)]
struct Opt {
    // Flags...
    /// Also print the call paths below each allocation site
    #[arg(short = 'e', long = "expand")]
    expand: bool,

    /// Print the full backtrace of every call path (implies --expand)
    #[arg(short = 'b', long = "backtraces")]
    backtraces: bool,

    /// Don't print the summary before the allocation rows
    #[arg(long = "no-summary")]
    no_summary: bool,

    /// Silence all log output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Verbose logging mode (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    // Options...
    /// Print at most this many allocation sites
    #[arg(short = 'n', long = "rows", value_name = "UINT")]
    rows: Option<usize>,

    // Args...
    /// Trace file [1]
    #[arg(value_name = "INFILE")]
    infile: PathBuf,
}

impl Opt {
    fn into_parts(self) -> (PathBuf, bool, Options) {
        (
            self.infile,
            !self.no_summary,
            Options {
                expand: self.expand,
                backtraces: self.backtraces,
                max_rows: self.rows,
            },
        )
    }
}

fn main() -> io::Result<()> {
    let opt = Opt::parse();

    // Initialize logger
    if !opt.quiet {
        env_logger::Builder::from_env(Env::default().default_filter_or(match opt.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }))
        .format_timestamp(None)
        .init();
    }

    let (infile, print_summary, options) = opt.into_parts();

    let mut loader = Loader::new();
    let mut model = AllocationModel::new();
    let handle = loader.load_file(infile)?;
    let summary = loader.wait(&mut model)?;
    if handle.join().is_err() {
        return Err(io::Error::new(io::ErrorKind::Other, "loader thread panicked"));
    }

    let stdout = io::stdout();
    let mut writer = io::BufWriter::new(stdout.lock());
    if print_summary {
        write!(writer, "{}", summary)?;
        writeln!(writer)?;
    }
    view::write_tree(&model, &options, &mut writer)?;
    writer.flush()
}

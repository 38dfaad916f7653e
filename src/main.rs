//! Command-line interface: print selected fields of a Bro log.
//!
//! Reads the log named by `-f` (or standard input) and writes the requested
//! columns of every row to standard output. When `-f` names a directory, every
//! log below it is printed, grouped by `#path`.

use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use brolog::{
    Cut, CutWriter, Error, FieldStats, FormatOptions, JsonLinesWriter, LogManager, LogReader, LogSpec, Row,
    RowWriter,
};
use clap::Parser;
use log::{debug, info, warn, LevelFilter};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Print selected fields of a Bro/Zeek ASCII log",
    long_about = "Reads a Bro/Zeek ASCII log (plain, .log.gz or .log.bz2) and prints the requested \
                  fields of every row.\n\n\
                  With no FIELDS every column is printed. A directory is searched recursively \
                  for logs, which are printed one #path at a time."
)]
struct Args {
    /// Explain what the tool is doing
    #[arg(short, long)]
    verbose: bool,

    /// Log file or directory to process; standard input when omitted or '-'
    #[arg(short = 'f', long = "file", value_name = "LOG")]
    file: Option<PathBuf>,

    /// Display readable timestamps in local time
    #[arg(short = 'd')]
    readable: bool,

    /// Display readable timestamps in UTC
    #[arg(short = 'u')]
    utc: bool,

    /// Readable timestamps in local time, using a strftime format
    #[arg(short = 'D', value_name = "FMT", conflicts_with = "utc_format")]
    local_format: Option<String>,

    /// Readable timestamps in UTC, using a strftime format
    #[arg(short = 'U', value_name = "FMT")]
    utc_format: Option<String>,

    /// Output field separator
    #[arg(short = 'F', value_name = "SEP", default_value = "\t")]
    separator: String,

    /// Print every field except the ones listed
    #[arg(short = 'n')]
    negate: bool,

    /// Print a line naming the selected fields first
    #[arg(short = 'c')]
    header: bool,

    /// Print each row as a JSON object
    #[arg(
        long,
        conflicts_with_all = ["stats", "readable", "utc", "local_format", "utc_format", "separator", "header"]
    )]
    json: bool,

    /// Print per-field statistics instead of rows
    #[arg(long)]
    stats: bool,

    /// Fields to display
    #[arg(value_name = "FIELDS")]
    fields: Vec<String>,
}

impl Args {
    fn format_options(&self) -> FormatOptions {
        let mut options = FormatOptions::new()
            .readable_time(self.readable || self.utc || self.local_format.is_some() || self.utc_format.is_some())
            .utc(self.utc || self.utc_format.is_some());
        if let Some(format) = self.local_format.as_ref().or(self.utc_format.as_ref()) {
            options = options.time_format(format.as_str());
        }
        options
    }

    /// A writer for `cut`, with the column line first when `header` is set.
    fn row_writer<'w>(&self, out: &'w mut dyn Write, cut: Cut, header: bool) -> Result<Box<dyn RowWriter + 'w>> {
        if self.json {
            return Ok(Box::new(JsonLinesWriter::new(out, cut)));
        }
        let mut writer = CutWriter::new(out, cut, self.format_options()).separator(self.separator.as_str());
        if header {
            writer.write_header()?;
        }
        Ok(Box::new(writer))
    }
}

fn open(file: Option<&Path>) -> Result<LogReader> {
    match file {
        Some(path) if path.as_os_str() != "-" => {
            LogReader::open(path).with_context(|| format!("cannot load {}", path.display()))
        }
        _ => LogReader::stdin().context("cannot load log from standard input"),
    }
}

/// Write every decodable row, returning how many were skipped.
fn write_rows<I>(spec: &LogSpec, rows: I, writer: &mut dyn RowWriter) -> Result<usize>
where
    I: Iterator<Item = brolog::Result<Row>>,
{
    let mut skipped = 0usize;
    for row in rows {
        match row {
            Ok(row) => writer.write_row(spec, &row)?,
            Err(err) if err.is_row_error() => {
                warn!("skipping row: {}", err);
                skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(skipped)
}

fn accumulate<I>(spec: &LogSpec, rows: I) -> Result<FieldStats>
where
    I: Iterator<Item = brolog::Result<Row>>,
{
    let mut stats = spec.accumulators();
    for row in rows {
        match row {
            Ok(row) => stats.accumulate_row(&row),
            Err(err) if err.is_row_error() => warn!("skipping row: {}", err),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(stats)
}

fn print_stats(out: &mut dyn Write, path: &str, stats: &FieldStats, cut: &Cut) -> Result<()> {
    writeln!(out, "#path {} ({} rows)", path, stats.rows())?;
    for name in cut.names() {
        if let Some(accumulator) = stats.get(name) {
            writeln!(out, "{}\t{}", name, accumulator.summary())?;
        }
    }
    Ok(())
}

fn run_log(args: &Args, reader: LogReader) -> Result<()> {
    let spec = reader.spec();
    info!(
        "{}: #path {} opened {}, {} fields (id {})",
        spec.origin(),
        spec.path(),
        spec.open_timestamp(),
        spec.fields().len(),
        spec.id()
    );

    let cut = Cut::new(spec.fields(), &args.fields, args.negate)?;
    debug!("selected columns: {}", cut.names().join(", "));

    let (spec, lines) = reader.into_parts();
    let mut out = BufWriter::new(io::stdout().lock());

    if args.stats {
        let stats = accumulate(&spec, spec.rows(lines))?;
        print_stats(&mut out, spec.path(), &stats, &cut)?;
    } else {
        let mut writer = args.row_writer(&mut out, cut, args.header)?;
        let skipped = write_rows(&spec, spec.rows(lines), writer.as_mut())?;
        let stats = writer.finish()?;
        debug!("wrote {}, skipped {} rows", stats.summary(), skipped);
    }
    out.flush()?;
    Ok(())
}

/// Print every log below `dir`, one `#path` group after another.
///
/// Groups lacking a requested field are skipped with a warning. The column
/// line is printed once per group.
fn run_tree(args: &Args, dir: &Path) -> Result<()> {
    let mut manager = LogManager::new();
    manager
        .load(dir)
        .with_context(|| format!("cannot scan {}", dir.display()))?;
    info!("{}: {}", dir.display(), manager.summary());
    if manager.is_empty() {
        bail!("no Bro logs found under {}", dir.display());
    }

    let mut out = BufWriter::new(io::stdout().lock());
    for group in manager.groups() {
        if !group.is_consistent() {
            info!("#path {}: files differ in layout, selecting per file", group.path());
        }

        if args.stats {
            let spec = group.files()[0].spec();
            let cut = match Cut::new(spec.fields(), &args.fields, args.negate) {
                Ok(cut) => cut,
                Err(err) => {
                    warn!("#path {}: {}", group.path(), err);
                    continue;
                }
            };
            let stats = group.accumulate()?;
            print_stats(&mut out, group.path(), &stats, &cut)?;
            continue;
        }

        let mut header = args.header;
        for file in group.files() {
            let cut = match Cut::new(file.spec().fields(), &args.fields, args.negate) {
                Ok(cut) => cut,
                Err(err) => {
                    warn!("{}: {}", file.path().display(), err);
                    continue;
                }
            };
            let mut writer = args.row_writer(&mut out, cut, header)?;
            header = false;

            let skipped = write_rows(file.spec(), file.rows()?, writer.as_mut())?;
            let stats = writer.finish()?;
            debug!("{}: wrote {}, skipped {} rows", file.path().display(), stats.summary(), skipped);
        }
    }
    out.flush()?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let start = Instant::now();

    match args.file.as_deref() {
        Some(dir) if dir.is_dir() => run_tree(&args, dir)?,
        file => run_log(&args, open(file)?)?,
    }

    info!("done in {:.2?}", start.elapsed());
    Ok(())
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| match cause.downcast_ref::<Error>() {
        Some(Error::Io { source, .. }) => source.kind() == ErrorKind::BrokenPipe,
        _ => cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == ErrorKind::BrokenPipe),
    })
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Warn })
        .format_timestamp(None)
        .init();

    match run(args) {
        Err(err) if is_broken_pipe(&err) => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rejects_text_formatting_flags() {
        let flags: [&[&str]; 7] = [&["-d"], &["-u"], &["-D", "%H"], &["-U", "%H"], &["-F", ","], &["-c"], &["--stats"]];
        for flag in flags {
            let argv = [&["bro-cut", "--json"][..], flag, &["uid"]].concat();
            let err = Args::try_parse_from(argv).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict, "{:?}", flag);
        }
    }

    #[test]
    fn test_json_with_selection() {
        let args = Args::try_parse_from(["bro-cut", "--json", "-n", "-f", "conn.log", "ts"]).unwrap();
        assert!(args.json && args.negate);
        assert_eq!(args.fields, vec!["ts"]);
    }

    #[test]
    fn test_format_options_from_flags() {
        let args = Args::try_parse_from(["bro-cut", "-U", "%H:%M", "ts"]).unwrap();
        let options = args.format_options();
        assert!(options.is_readable_time());
        assert!(options.is_utc());
        assert_eq!(options.get_time_format(), "%H:%M");
    }
}

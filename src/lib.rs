//! # brolog
//!
//! A reader for the self-describing ASCII log format written by Bro/Zeek.
//!
//! Every log starts with an eight-line header that declares the field
//! separator, the set separator, the sentinels for empty and unset values, the
//! logical log path, the time the log was opened, and the names and types of
//! its columns. This crate parses that header, binds a typed decode pipeline to
//! every column, and streams the remaining lines as typed rows.
//!
//! ## Features
//!
//! - **Strict header parsing**: a header is accepted whole or rejected with the
//!   marker that failed
//! - **Typed values**: `time`, `interval`, `double`, `count`, `int`, `bool`,
//!   `port`, `addr`, `subnet`, `string`, `enum`, and `set[T]` / `vector[T]`
//! - **Streaming**: rows are decoded lazily, one line at a time
//! - **Compression**: `.log.gz` and `.log.bz2` files are decompressed on the fly,
//!   including files made of several concatenated streams
//! - **Directories**: [`LogManager`] loads a tree of logs grouped by `#path`
//! - **Per-row errors**: a malformed row is reported and iteration continues
//!
//! ## Quick Start
//!
//! ```no_run
//! use brolog::LogReader;
//!
//! let mut reader = LogReader::open("conn.log")?;
//! println!("#path {} opened {}", reader.spec().path(), reader.spec().open_timestamp());
//!
//! for row in reader.rows() {
//!     let row = row?;
//!     println!("{:?} {:?}", row.get("ts"), row.get("id.orig_h"));
//! }
//! # Ok::<(), brolog::Error>(())
//! ```
//!
//! ## Load, then Open
//!
//! [`LogSpec::load`] reads only the header and closes the file. Rows are then
//! streamed with [`LogSpec::open`], which may be called again to start over:
//!
//! ```no_run
//! use brolog::LogSpec;
//!
//! let spec = LogSpec::load("dns.log.gz")?;
//! let names: Vec<&str> = spec.names().iter().map(String::as_str).collect();
//! println!("{}", names.join(" "));
//!
//! let rows = spec.open("dns.log.gz")?.filter_map(Result::ok).count();
//! println!("{} rows", rows);
//! # Ok::<(), brolog::Error>(())
//! ```
//!
//! ## Many Files
//!
//! ```no_run
//! use brolog::LogManager;
//!
//! let mut manager = LogManager::new();
//! manager.load("/var/log/bro/2020-01-01")?;
//! for group in manager.groups() {
//!     println!("{}: {} files", group.path(), group.files().len());
//! }
//! # Ok::<(), brolog::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Header and type errors stop loading; decode and shape errors are yielded
//! per row:
//!
//! ```no_run
//! use brolog::{Error, LogReader};
//!
//! let mut reader = LogReader::open("conn.log")?;
//! for row in reader.rows() {
//!     match row {
//!         Ok(row) => println!("{:?}", row.get("uid")),
//!         Err(err) if err.is_row_error() => eprintln!("skipping: {}", err),
//!         Err(err) => return Err(err),
//!     }
//! }
//! # Ok::<(), brolog::Error>(())
//! ```

// Public API modules
pub mod error;
pub mod manager;
pub mod reader;
pub mod spec;
pub mod writer;

// Building blocks
pub mod bz2;
pub mod cut;
pub mod header;
pub mod options;
pub mod row;
pub mod source;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use cut::Cut;
pub use error::{DecodeError, Error, Result};
pub use header::{FieldSpec, Header, HeaderMetadata, Marker};
pub use manager::{LogFile, LogGroup, LogManager};
pub use options::FormatOptions;
pub use reader::{LogReader, LogReaderBuilder};
pub use row::{Row, Rows};
pub use source::{Compression, LineSource};
pub use spec::LogSpec;
pub use stats::{Accumulator, FieldStats};
pub use types::{TypeRegistry, Value};
pub use writer::{CutWriter, JsonLinesWriter, RowWriter, WriteStats};

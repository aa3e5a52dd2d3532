//! Process-wide logging, reconfigurable at runtime.
//!
//! [`init`] installs a `tracing` subscriber made of a global `EnvFilter` and a
//! single fmt layer, each behind its own reload handle. [`configure`] swaps
//! both for ones built from a textual specification, which is how the builtin
//! `LOGGER` loader function applies its configuration string.
//!
//! # Specification
//!
//! Whitespace or `;` separated `key=value` tokens:
//!
//! | Key | Values | Default |
//! |-----|--------|---------|
//! | `filter` | `EnvFilter` directives | `$RUST_LOG` or `info` |
//! | `sink` | `stdout`, `stderr`, `file:<path>` | `stderr` |
//! | `format` | `full`, `compact`, `json` | `full` |
//! | `ansi` | `true`, `false` | `true` when the sink is a terminal |

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

use crate::error::{Error, Result};

type FilteredRegistry = Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type OutputLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

struct Handles {
	filter: reload::Handle<EnvFilter, Registry>,
	output: reload::Handle<OutputLayer, FilteredRegistry>,
}

static HANDLES: OnceLock<Handles> = OnceLock::new();
static INSTALL: Mutex<()> = parking_lot::const_mutex(());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
	Stdout,
	Stderr,
	File(PathBuf),
}

impl Sink {
	fn is_terminal(&self) -> bool {
		match self {
			Self::Stdout => std::io::stdout().is_terminal(),
			Self::Stderr => std::io::stderr().is_terminal(),
			Self::File(_) => false,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
	Full,
	Compact,
	Json,
}

/// Parsed logger specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerSpec {
	pub filter: String,
	pub sink: Sink,
	pub format: Format,
	pub ansi: bool,
}

impl Default for LoggerSpec {
	fn default() -> Self {
		Self {
			filter: std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "info".to_owned()),
			sink: Sink::Stderr,
			format: Format::Full,
			ansi: Sink::Stderr.is_terminal(),
		}
	}
}

impl FromStr for LoggerSpec {
	type Err = Error;

	fn from_str(text: &str) -> Result<Self> {
		let mut spec = Self::default();
		let mut ansi = None;
		for token in text.split(|c: char| c == ';' || c.is_whitespace()).filter(|t| !t.is_empty()) {
			let Some((key, value)) = token.split_once('=') else {
				return Err(Error::Logger(format!("expected `key=value`, found `{token}`")));
			};
			match key {
				"filter" => spec.filter = value.to_owned(),
				"sink" => {
					spec.sink = match value {
						"stdout" => Sink::Stdout,
						"stderr" => Sink::Stderr,
						_ => match value.strip_prefix("file:") {
							Some(path) if !path.is_empty() => Sink::File(PathBuf::from(path)),
							_ => return Err(Error::Logger(format!("unknown sink `{value}`"))),
						},
					}
				}
				"format" => {
					spec.format = match value {
						"full" => Format::Full,
						"compact" => Format::Compact,
						"json" => Format::Json,
						_ => return Err(Error::Logger(format!("unknown format `{value}`"))),
					}
				}
				"ansi" => {
					ansi = Some(
						value
							.parse()
							.map_err(|_| Error::Logger(format!("`ansi` expects true or false, found `{value}`")))?,
					)
				}
				_ => return Err(Error::Logger(format!("unknown key `{key}`"))),
			}
		}
		spec.ansi = ansi.unwrap_or_else(|| spec.sink.is_terminal());
		Ok(spec)
	}
}

/// Installs the subscriber with the default specification.
pub fn init() -> Result<()> {
	install(&LoggerSpec::default())
}

/// Applies a textual specification, installing the subscriber if needed.
pub fn configure(spec: &str) -> Result<()> {
	install(&spec.parse()?)
}

/// Applies a parsed specification, installing the subscriber if needed.
pub fn install(spec: &LoggerSpec) -> Result<()> {
	let filter = build_filter(spec)?;
	let output: OutputLayer = build_output(spec)?;
	let _guard = INSTALL.lock();

	if let Some(handles) = HANDLES.get() {
		handles.output.reload(output).map_err(|err| Error::Logger(err.to_string()))?;
		return handles.filter.reload(filter).map_err(|err| Error::Logger(err.to_string()));
	}

	let (filter, filter_handle) = reload::Layer::new(filter);
	let (output, output_handle) = reload::Layer::new(output);
	tracing_subscriber::registry()
		.with(filter)
		.with(output)
		.try_init()
		.map_err(|err| Error::Logger(format!("cannot install subscriber: {err}")))?;
	let _ = HANDLES.set(Handles {
		filter: filter_handle,
		output: output_handle,
	});
	Ok(())
}

fn build_filter(spec: &LoggerSpec) -> Result<EnvFilter> {
	EnvFilter::try_new(&spec.filter).map_err(|err| Error::Logger(format!("invalid filter `{}`: {err}", spec.filter)))
}

fn build_output<S>(spec: &LoggerSpec) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
	S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
	let (writer, ansi) = match &spec.sink {
		Sink::Stdout => (BoxMakeWriter::new(std::io::stdout), spec.ansi),
		Sink::Stderr => (BoxMakeWriter::new(std::io::stderr), spec.ansi),
		Sink::File(path) => {
			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(path)
				.map_err(|err| Error::Logger(format!("cannot open log file {}: {err}", path.display())))?;
			(BoxMakeWriter::new(Arc::new(file)), false)
		}
	};

	let base = fmt::layer().with_writer(writer).with_ansi(ansi).with_target(true);
	Ok(match spec.format {
		Format::Full => base.boxed(),
		Format::Compact => base.compact().boxed(),
		Format::Json => base.json().boxed(),
	})
}

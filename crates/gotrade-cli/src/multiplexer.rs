//! Line tagging for service output.
//!
//! Every forwarded line is prefixed with a wall-clock timestamp and a coloured
//! service label, for example `14:03:07 [FASTAPI] Application startup complete`.
//! Lines from one stream keep their order; lines from different streams
//! interleave in arrival order.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::thread::{self, JoinHandle};

use clap::ValueEnum;
use colored::{Color, Colorize};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::debug;

const MULTIPLEXER_TARGET: &str = "gotrade::multiplexer";

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second]");

/// Labels attached to forwarded service output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub(crate) enum StreamLabel {
    /// Engine standard output.
    #[value(name = "ENGINE1")]
    Engine1,
    /// Engine standard error.
    #[value(name = "ENGINE2")]
    Engine2,
    /// API standard output and standard error.
    #[value(name = "FASTAPI")]
    Fastapi,
    /// Frontend standard output and standard error.
    #[value(name = "FRONTEND")]
    Frontend,
}

impl StreamLabel {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Engine1 => "ENGINE1",
            Self::Engine2 => "ENGINE2",
            Self::Fastapi => "FASTAPI",
            Self::Frontend => "FRONTEND",
        }
    }

    pub(crate) const fn color(self) -> Color {
        match self {
            Self::Engine1 => Color::Cyan,
            Self::Engine2 => Color::Blue,
            Self::Fastapi => Color::Green,
            Self::Frontend => Color::Magenta,
        }
    }
}

impl fmt::Display for StreamLabel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Formats lines for a single labelled stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LineTagger {
    label: StreamLabel,
    use_color: bool,
}

impl LineTagger {
    pub(crate) const fn new(label: StreamLabel, use_color: bool) -> Self {
        Self { label, use_color }
    }

    /// Renders one tagged line, including the trailing newline.
    pub(crate) fn tag(&self, timestamp: &str, line: &str) -> String {
        if self.use_color {
            let label = self.label.as_str().color(self.label.color()).bold();
            format!("{timestamp} [{label}] {line}\n")
        } else {
            format!("{timestamp} [{}] {line}\n", self.label)
        }
    }
}

/// Current UTC wall-clock time as `HH:MM:SS`.
pub(crate) fn current_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| String::from("--:--:--"))
}

/// Copies `reader` to `writer` line by line, tagging each line.
///
/// Invalid UTF-8 is replaced rather than rejected. Each tagged line is written
/// and flushed in one call so concurrent forwarders never split a line. A
/// closed writer ends forwarding quietly. Returns the number of lines written.
pub(crate) fn forward<R, W>(mut reader: R, writer: &mut W, tagger: &LineTagger) -> io::Result<u64>
where
    R: BufRead,
    W: Write,
{
    let mut buffer = Vec::new();
    let mut forwarded = 0u64;
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(forwarded);
        }
        let line = String::from_utf8_lossy(&buffer);
        let line = line.trim_end_matches(['\n', '\r']);
        let tagged = tagger.tag(&current_timestamp(), line);
        let written = writer
            .write_all(tagged.as_bytes())
            .and_then(|()| writer.flush());
        match written {
            Ok(()) => forwarded += 1,
            Err(error) if error.kind() == io::ErrorKind::BrokenPipe => return Ok(forwarded),
            Err(error) => return Err(error),
        }
    }
}

/// Forwards `source` to this process's stdout on a dedicated thread.
pub(crate) fn spawn_forwarder<R>(
    source: R,
    tagger: LineTagger,
) -> io::Result<JoinHandle<io::Result<u64>>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("forward-{}", tagger.label))
        .spawn(move || {
            let mut stdout = io::stdout();
            let result = forward(BufReader::new(source), &mut stdout, &tagger);
            debug!(
                target: MULTIPLEXER_TARGET,
                label = %tagger.label,
                ?result,
                "output stream closed"
            );
            result
        })
}

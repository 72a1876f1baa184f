use crate::config::Cli;
use indicatif::MultiProgress;
use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Log to stderr; RUST_LOG overrides the level picked from the flags.
///
/// Spinners on `progress` are hidden while a line is written.
pub fn init_logging(cli: &Cli, progress: &MultiProgress) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(SuspendingWriter::new(progress.clone(), io::stderr))
        .init();
}

/// Writes log lines through `inner` with the progress bars suspended
pub struct SuspendingWriter<M> {
    progress: MultiProgress,
    inner: M,
}

impl<M> SuspendingWriter<M> {
    pub fn new(progress: MultiProgress, inner: M) -> Self {
        Self { progress, inner }
    }
}

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for SuspendingWriter<M> {
    type Writer = Suspended<'a, M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        Suspended {
            progress: &self.progress,
            inner: self.inner.make_writer(),
        }
    }
}

pub struct Suspended<'a, W> {
    progress: &'a MultiProgress,
    inner: W,
}

impl<W: Write> Write for Suspended<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Self { progress, inner } = self;
        progress.suspend(|| inner.write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let Self { progress, inner } = self;
        progress.suspend(|| inner.write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        let Self { progress, inner } = self;
        progress.suspend(|| inner.flush())
    }
}

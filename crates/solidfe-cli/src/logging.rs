use crate::error::{CliError, Result};
use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::Subscriber;
use tracing_subscriber::{
    Layer,
    filter::LevelFilter,
    fmt::{self, MakeWriter},
    prelude::*,
    registry::LookupSpan,
};

/// Log written into every kernel's scratch folder.
pub const KERNEL_LOG: &str = "solidfe.log";

thread_local! {
    static KERNEL_FILE: RefCell<Option<Arc<File>>> = const { RefCell::new(None) };
}

fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Kernel logs record stage transitions even when the console is quiet.
fn kernel_level(verbosity: u8) -> LevelFilter {
    level_filter(verbosity, false).max(LevelFilter::INFO)
}

/// Routes events emitted on the current thread into a kernel's
/// [`KERNEL_LOG`] until dropped. Guards nest; dropping one restores the
/// file that was active before it.
pub struct KernelLogGuard {
    previous: Option<Arc<File>>,
}

impl Drop for KernelLogGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        KERNEL_FILE.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Opens `<scratch>/solidfe.log` for appending and makes it the current
/// thread's kernel log. A kernel runs start to finish on one worker thread,
/// so everything it logs lands in its own folder.
pub fn kernel_log(scratch: &Path) -> Result<KernelLogGuard> {
    std::fs::create_dir_all(scratch).map_err(CliError::Io)?;
    let path = scratch.join(KERNEL_LOG);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| CliError::KernelLog { path, source })?;
    let previous = KERNEL_FILE.with(|slot| slot.replace(Some(Arc::new(file))));
    Ok(KernelLogGuard { previous })
}

/// Hands the fmt layer the current thread's kernel log, or a sink outside
/// any kernel.
#[derive(Debug, Clone, Copy, Default)]
struct KernelWriter;

enum KernelSink {
    File(Arc<File>),
    Discard,
}

impl Write for KernelSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            KernelSink::File(file) => (&**file).write(buf),
            KernelSink::Discard => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            KernelSink::File(file) => (&**file).flush(),
            KernelSink::Discard => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for KernelWriter {
    type Writer = KernelSink;

    fn make_writer(&'a self) -> Self::Writer {
        KERNEL_FILE
            .with(|slot| slot.borrow().clone())
            .map_or(KernelSink::Discard, KernelSink::File)
    }
}

/// Plain-text layer writing into the active kernel log. Span context names
/// the kernel and the task on every line.
pub(crate) fn kernel_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(KernelWriter)
        .with_ansi(false)
        .with_target(true)
}

/// Installs the global subscriber: a compact stderr layer, the per-kernel
/// log layer, and a plain-text file layer when `log_file` is given. The
/// shared file interleaves kernels running on worker threads; their thread
/// ids and `kernel` spans tell them apart.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let console_level = level_filter(verbosity, quiet);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(console_level);

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(CliError::Io)?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_target(true)
                    .with_filter(kernel_level(verbosity)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(kernel_layer().with_filter(kernel_level(verbosity)))
        .with(file_layer)
        .init();

    Ok(())
}

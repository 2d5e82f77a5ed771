//! Progress bars and a log writer that keeps them pinned.

use crate::scheduler::SchedulerSnapshot;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

pub fn add_progress_bar(len: u64) -> ProgressBar {
    let bar = multi_progress().add(ProgressBar::new(len));
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
    {
        bar.set_style(style);
    }
    bar
}

/// Render scheduler snapshots on a bar until the scheduler goes idle.
///
/// The bar counts finished documents (done or error) out of all tracked ones.
pub fn follow_scheduler(
    mut snapshots: watch::Receiver<SchedulerSnapshot>,
    bar: ProgressBar,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            render(&bar, &snapshot);
            if snapshot.is_idle() || snapshots.changed().await.is_err() {
                break;
            }
        }
        bar.finish_and_clear();
    })
}

fn render(bar: &ProgressBar, snapshot: &SchedulerSnapshot) {
    bar.set_length(snapshot.total() as u64);
    bar.set_position((snapshot.done + snapshot.error) as u64);
    bar.set_message(format!(
        "{} active | {} pending | {} failed | {}",
        snapshot.active_workers, snapshot.pending, snapshot.error, snapshot.sync_status
    ));
}

fn print_line(line: &str) {
    let _ = multi_progress().println(line.trim_end_matches('\r'));
}

#[derive(Default, Clone)]
pub struct LogWriterFactory;

/// Buffers log output and prints whole lines above the progress bars
pub struct LogWriter {
    buffer: String,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.push_str(&String::from_utf8_lossy(buf));

        while let Some(idx) = self.buffer.find('\n') {
            print_line(&self.buffer[..idx]);
            self.buffer.drain(..idx + 1);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            print_line(self.buffer.trim_end_matches('\n'));
            self.buffer.clear();
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            buffer: String::new(),
        }
    }
}

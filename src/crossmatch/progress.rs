//! Progress reporting for a cross-match run.
//!
//! The orchestrator publishes one [`ProgressEvent`] after each job
//! finishes; the stream is append-only and the completed count only grows.
//! Consumers implement [`ProgressSink`]: headless runs use
//! [`NullProgress`], interactive callers usually drain a channel fed by
//! [`ChannelProgress`] from another thread, and the `progress` feature adds
//! a console bar.

use std::sync::mpsc::{self, Receiver, Sender};

use serde::Serialize;

use crate::crossmatch::JobResult;

/// Snapshot emitted after one job completes.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Jobs finished so far, this one included.
    pub completed: usize,
    /// Jobs planned for the run.
    pub total: usize,
    /// The job that just finished.
    pub last: JobResult,
}

/// Receives the orchestrator's progress stream.
pub trait ProgressSink: Send + Sync {
    fn job_finished(&self, event: &ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn job_finished(&self, _event: &ProgressEvent) {}
}

/// Forwards events into an unbounded channel for another thread to drain.
/// Events sent after the receiver is gone are silently dropped.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (ChannelProgress, Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel();
        (ChannelProgress { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn job_finished(&self, event: &ProgressEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Console progress bar, one tick per finished job.
#[cfg(feature = "progress")]
pub struct ConsoleProgress {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "progress")]
impl ConsoleProgress {
    pub fn new(total: usize) -> ConsoleProgress {
        let style = indicatif::ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar());
        let bar = indicatif::ProgressBar::new(total as u64);
        bar.set_style(style);
        ConsoleProgress { bar }
    }
}

#[cfg(feature = "progress")]
impl ProgressSink for ConsoleProgress {
    fn job_finished(&self, event: &ProgressEvent) {
        self.bar.set_position(event.completed as u64);
        self.bar.set_message(format!(
            "{} x {} ({})",
            event.last.survey.file_tag(),
            event.last.catalog.as_str().to_uppercase(),
            event.last.status,
        ));
        if event.completed == event.total {
            self.bar.finish();
        }
    }
}

#[cfg(test)]
mod progress_test {
    use super::*;

    use crate::catalogs::CatalogKey;
    use crate::crossmatch::JobDescriptor;
    use crate::footprints::SurveyKey;

    fn sample_result() -> JobResult {
        JobResult::completed(
            JobDescriptor {
                survey: SurveyKey::Hlwas,
                catalog: CatalogKey::Abell,
            },
            10,
            4,
            0,
            None,
        )
    }

    #[test]
    fn test_channel_progress_delivers_in_order() {
        let (sink, rx) = ChannelProgress::new();
        for completed in 1..=3 {
            sink.job_finished(&ProgressEvent {
                completed,
                total: 3,
                last: sample_result(),
            });
        }
        drop(sink);

        let received: Vec<usize> = rx.iter().map(|e| e.completed).collect();
        assert_eq!(received, vec![1, 2, 3]);
    }

    #[test]
    fn test_channel_progress_survives_dropped_receiver() {
        let (sink, rx) = ChannelProgress::new();
        drop(rx);
        sink.job_finished(&ProgressEvent {
            completed: 1,
            total: 1,
            last: sample_result(),
        });
    }
}

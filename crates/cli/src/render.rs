//! Terminal rendering of pipeline events.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;

use extractor_core::{PipelineEvent, ProgressOperation, StepStatus};

const BAR_TEMPLATE: &str = "{spinner:.green} {msg:<20} [{bar:30.cyan/blue}] {pos:>3}%";

/// Draws loading steps and transcode progress until finished.
pub struct Renderer {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Renderer {
    pub fn spawn(events: broadcast::Receiver<PipelineEvent>) -> Self {
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(render(events, stop_rx));
        Self { stop, task }
    }

    /// Renders whatever is still queued, then clears the bar.
    pub async fn finish(self) {
        let _ = self.stop.send(());
        let _ = self.task.await;
    }
}

async fn render(mut events: broadcast::Receiver<PipelineEvent>, mut stop: oneshot::Receiver<()>) {
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
        bar.set_style(style.progress_chars("##-"));
    }

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => apply(&bar, event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = &mut stop => {
                while let Ok(event) = events.try_recv() {
                    apply(&bar, event);
                }
                break;
            }
        }
    }

    bar.finish_and_clear();
}

fn apply(bar: &ProgressBar, event: PipelineEvent) {
    match event {
        PipelineEvent::StepsChanged(steps) => {
            if let Some(step) = steps.iter().find(|s| s.status == StepStatus::Active) {
                bar.set_message(step.label.clone());
                bar.set_position(step.progress.unwrap_or(0) as u64);
            }
        }
        PipelineEvent::Progress(progress) if progress.operation == ProgressOperation::Transcode => {
            bar.set_message("Converting");
            bar.set_position(progress.percent as u64);
        }
        _ => {}
    }
}

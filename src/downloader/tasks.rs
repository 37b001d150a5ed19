// Background tasks: one slot per TaskKind, results delivered as DownloadEvents

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::metadata::MetadataResolver;
use super::models::{DownloadEvent, StreamDescriptor, TaskKind};
use super::orchestrator::{DownloadOrchestrator, OutputTarget};
use super::tools::Toolchain;
use super::traits::ProgressEmitter;

struct Slot {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Keeps at most one live task per kind.
///
/// Starting a task cancels the previous one of the same kind and waits for it
/// to finish first, so its child process is gone before the new one starts.
#[derive(Default)]
pub struct TaskController {
    slots: HashMap<TaskKind, Slot>,
}

impl TaskController {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn spawn<F, Fut>(&mut self, kind: TaskKind, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.cancel(kind).await {
            log::debug!("[tasks] replaced running {:?} task", kind);
        }
        let token = CancellationToken::new();
        let handle = tokio::spawn(task(token.clone()));
        self.slots.insert(kind, Slot { token, handle });
    }

    /// Cancel and reap the task of `kind`. Returns whether one was live.
    pub async fn cancel(&mut self, kind: TaskKind) -> bool {
        let Some(slot) = self.slots.remove(&kind) else {
            return false;
        };
        let was_running = !slot.handle.is_finished();
        slot.token.cancel();
        if let Err(e) = slot.handle.await {
            log::warn!("[tasks] {:?} task ended abnormally: {}", kind, e);
        }
        was_running
    }

    pub async fn cancel_all(&mut self) {
        let kinds: Vec<TaskKind> = self.slots.keys().copied().collect();
        for kind in kinds {
            self.cancel(kind).await;
        }
    }

    pub fn is_running(&self, kind: TaskKind) -> bool {
        self.slots
            .get(&kind)
            .map(|slot| !slot.handle.is_finished())
            .unwrap_or(false)
    }
}

/// Entry point for a presentation layer: each request runs in the background
/// and reports back through the event channel.
///
/// A task that was cancelled sends nothing.
pub struct DownloadSession {
    resolver: MetadataResolver,
    orchestrator: DownloadOrchestrator,
    events: UnboundedSender<DownloadEvent>,
    tasks: TaskController,
}

impl DownloadSession {
    pub fn new(toolchain: &Toolchain, events: UnboundedSender<DownloadEvent>) -> Self {
        Self {
            resolver: MetadataResolver::new(toolchain.ytdlp.clone()),
            orchestrator: DownloadOrchestrator::new(
                toolchain,
                ProgressEmitter::new(events.clone()),
            ),
            events,
            tasks: TaskController::new(),
        }
    }

    pub async fn request_metadata(&mut self, url: &str) {
        let resolver = self.resolver.clone();
        let events = self.events.clone();
        let url = url.to_string();
        self.tasks
            .spawn(TaskKind::Metadata, move |token| async move {
                let event = match resolver.fetch_metadata(&url, &token).await {
                    Ok(metadata) => DownloadEvent::MetadataReady(metadata),
                    Err(e) => failed(TaskKind::Metadata, e),
                };
                send_unless_cancelled(&events, &token, event);
            })
            .await;
    }

    pub async fn request_catalog(&mut self, url: &str) {
        let resolver = self.resolver.clone();
        let events = self.events.clone();
        let url = url.to_string();
        self.tasks
            .spawn(TaskKind::Catalog, move |token| async move {
                let event = match resolver.fetch_catalog(&url, &token).await {
                    Ok(catalog) => DownloadEvent::CatalogReady(catalog),
                    Err(e) => failed(TaskKind::Catalog, e),
                };
                send_unless_cancelled(&events, &token, event);
            })
            .await;
    }

    pub async fn request_size(&mut self, url: &str, format_id: &str) {
        let resolver = self.resolver.clone();
        let events = self.events.clone();
        let url = url.to_string();
        let format_id = format_id.to_string();
        self.tasks
            .spawn(TaskKind::Size, move |token| async move {
                let label = resolver.fetch_format_size(&url, &format_id, &token).await;
                let event = DownloadEvent::SizeReady { format_id, label };
                send_unless_cancelled(&events, &token, event);
            })
            .await;
    }

    /// `catalog` is a snapshot taken by the caller
    pub async fn request_download(
        &mut self,
        url: &str,
        catalog: Vec<StreamDescriptor>,
        chosen_id: &str,
        target: OutputTarget,
    ) {
        let orchestrator = self.orchestrator.clone();
        let events = self.events.clone();
        let url = url.to_string();
        let chosen_id = chosen_id.to_string();
        self.tasks
            .spawn(TaskKind::Download, move |token| async move {
                let result = orchestrator
                    .download(&url, &catalog, &chosen_id, &target, &token)
                    .await;
                send_unless_cancelled(&events, &token, DownloadEvent::Finished(result));
            })
            .await;
    }

    pub async fn cancel(&mut self, kind: TaskKind) -> bool {
        self.tasks.cancel(kind).await
    }

    pub async fn cancel_all(&mut self) {
        self.tasks.cancel_all().await;
    }

    pub fn is_running(&self, kind: TaskKind) -> bool {
        self.tasks.is_running(kind)
    }

    pub fn can_merge(&self) -> bool {
        self.orchestrator.can_merge()
    }
}

fn failed(kind: TaskKind, error: super::errors::DownloadError) -> DownloadEvent {
    DownloadEvent::Failed {
        kind,
        message: error.to_string(),
    }
}

fn send_unless_cancelled(
    events: &UnboundedSender<DownloadEvent>,
    token: &CancellationToken,
    event: DownloadEvent,
) {
    if token.is_cancelled() {
        return;
    }
    // receiver gone means nobody is listening anymore
    let _ = events.send(event);
}

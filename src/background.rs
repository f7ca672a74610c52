//! Privileged context: the process-resident translation service, the note
//! collaborator, the durable store, and every connected tab.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{
    AckReply, AppendPayload, BackgroundMessage, ChipKind, DetailReply, PageRequest, Port, PortPeer, Reply, Runtime,
    SelectionReply, TabEnvelope, TranslateReply,
};
use crate::config::{self, NoteSettings, Settings, ENABLE_KEY};
use crate::error::{AppendError, ChannelError, InitError, StorageError};
use crate::metrics::MetricsRegistry;
use crate::notes::{NoteAppender, NoteEntry};
use crate::storage::{KvStore, SqliteStore};
use crate::translate::service::TranslationService;
use crate::translate::ProviderChain;

pub type TabId = Uuid;

const NO_DETAIL: &str = "No detailed information available";

struct HostInner {
    service: TranslationService,
    notes: NoteAppender,
    store: Arc<dyn KvStore>,
    metrics: Arc<MetricsRegistry>,
    tabs: Mutex<HashMap<TabId, mpsc::UnboundedSender<TabEnvelope>>>,
}

#[derive(Clone)]
pub struct BackgroundHost {
    inner: Arc<HostInner>,
}

impl BackgroundHost {
    pub fn new(
        service: TranslationService,
        notes: NoteAppender,
        store: Arc<dyn KvStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(HostInner {
                service,
                notes,
                store,
                metrics,
                tabs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// SQLite store at `settings.db_path`, provider chain from the
    /// configured endpoints, persisted cache restored.
    pub fn from_settings(settings: &Settings) -> Result<Self, InitError> {
        let store: Arc<dyn KvStore> = Arc::new(SqliteStore::open(&settings.db_path)?);
        let metrics = Arc::new(MetricsRegistry::new());
        let chain = ProviderChain::from_settings(settings)?;
        let http = reqwest::Client::builder().timeout(settings.http_timeout).build()?;
        let service = TranslationService::restore(chain, Arc::clone(&store), Arc::clone(&metrics));
        info!(cached = service.cached_entries(), "privileged context ready");
        Ok(Self::new(service, NoteAppender::new(http), store, metrics))
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.inner.metrics
    }

    pub fn service(&self) -> &TranslationService {
        &self.inner.service
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.inner.store
    }

    /// Answer one page request. Never fails: errors travel inside the reply.
    pub async fn handle(&self, request: PageRequest) -> Reply {
        debug!(kind = request.kind(), "page request");
        match request {
            PageRequest::Translate { word } => {
                let reply = match self.inner.service.translate(&word).await {
                    Ok(result) => TranslateReply {
                        translation: result.translated_text,
                        error: None,
                    },
                    Err(e) => {
                        warn!(word, error = %e, "translate request failed");
                        TranslateReply {
                            translation: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
                Reply::Translation(reply)
            }
            PageRequest::FetchVocabDetail { word } => {
                let detail = self.inner.service.translate_detailed(&word).await;
                let error = detail.is_none().then(|| NO_DETAIL.to_string());
                Reply::Detail(DetailReply { detail, error })
            }
            PageRequest::ObsidianAppend { payload } => Reply::Ack(self.append_payload(payload).await),
        }
    }

    async fn append_payload(&self, payload: AppendPayload) -> AckReply {
        let entry = NoteEntry {
            text: payload.selected_text,
            title: payload.page_title,
            url: payload.url,
        };
        match self.append(&entry).await {
            Ok(()) => AckReply::ok(),
            Err(e) => {
                warn!(error = %e, "append request failed");
                AckReply::failed(e.to_string())
            }
        }
    }

    async fn append(&self, entry: &NoteEntry) -> Result<(), AppendError> {
        if entry.text.trim().is_empty() {
            return Err(AppendError::NoSelection);
        }
        let settings = self.note_settings()?;
        self.inner.notes.append(&settings, entry).await
    }

    /// Options-form save: validated, then persisted.
    pub fn update_note_settings(&self, settings: &NoteSettings) -> Result<(), AppendError> {
        settings.save(self.inner.store.as_ref())?;
        info!(note_path = %settings.note_path, "note settings saved");
        Ok(())
    }

    pub fn note_settings(&self) -> Result<NoteSettings, AppendError> {
        NoteSettings::load(self.inner.store.as_ref())
            .map_err(|e| AppendError::ConfigurationMissing(format!("could not read settings: {e}")))
    }

    async fn serve_port(self, mut peer: PortPeer) {
        debug!(port = peer.name(), "port connected");
        while let Some(request) = peer.recv().await {
            let reply = self.handle(request).await;
            // the page may have timed out and disconnected meanwhile
            if !peer.reply(reply) {
                break;
            }
        }
    }

    // ---- tabs ----

    /// Register a page; it receives privileged messages on the returned
    /// receiver.
    pub fn register_tab(&self) -> (TabId, mpsc::UnboundedReceiver<TabEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.inner.tabs.lock().insert(id, tx);
        debug!(tab = %id, "tab registered");
        (id, rx)
    }

    pub fn unregister_tab(&self, tab: TabId) {
        self.inner.tabs.lock().remove(&tab);
    }

    /// Best effort. A closed tab is dropped from the registry.
    pub fn notify_tab(&self, tab: TabId, message: BackgroundMessage) -> bool {
        let mut tabs = self.inner.tabs.lock();
        let Some(tx) = tabs.get(&tab) else {
            debug!(tab = %tab, "notify for unknown tab");
            return false;
        };
        if tx.send(TabEnvelope::notify(message)).is_err() {
            debug!(tab = %tab, "tab gone, unregistering");
            tabs.remove(&tab);
            return false;
        }
        true
    }

    fn chip(&self, tab: TabId, kind: ChipKind, message: &str) {
        self.notify_tab(
            tab,
            BackgroundMessage::ShowChip {
                message: Some(message.to_string()),
                chip_type: kind,
            },
        );
    }

    pub fn is_enabled(&self) -> bool {
        config::load_enabled(self.inner.store.as_ref())
    }

    /// Persist the flag and broadcast it to every tab.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), StorageError> {
        self.inner.store.set(ENABLE_KEY, json!(enabled))?;
        let delivered = self.broadcast(BackgroundMessage::ExtensionToggle { enabled });
        info!(enabled, delivered, "extension toggled");
        Ok(())
    }

    /// Toolbar action: flip the persisted flag. Returns the new value.
    pub fn toggle_enabled(&self) -> Result<bool, StorageError> {
        let enabled = !self.is_enabled();
        self.set_enabled(enabled)?;
        Ok(enabled)
    }

    fn broadcast(&self, message: BackgroundMessage) -> usize {
        let mut tabs = self.inner.tabs.lock();
        tabs.retain(|id, tx| {
            let alive = tx.send(TabEnvelope::notify(message.clone())).is_ok();
            if !alive {
                debug!(tab = %id, "dropping closed tab");
            }
            alive
        });
        tabs.len()
    }

    /// Context-menu save: progress and outcome are shown as chips in `tab`.
    pub async fn save_selection(&self, tab: TabId, text: &str, title: &str, url: &str) -> Result<(), AppendError> {
        if text.trim().is_empty() {
            return Err(AppendError::NoSelection);
        }
        self.chip(tab, ChipKind::Info, "Saving...");

        let settings = match self.note_settings() {
            Ok(s) if s.api_key.is_some() => s,
            Ok(_) => {
                self.chip(tab, ChipKind::Error, "API key not set");
                return Err(AppendError::ConfigurationMissing("API key not set".into()));
            }
            Err(e) => {
                self.chip(tab, ChipKind::Error, "Save failed");
                return Err(e);
            }
        };

        let entry = NoteEntry {
            text: text.to_string(),
            title: title.to_string(),
            url: url.to_string(),
        };
        match self.inner.notes.append(&settings, &entry).await {
            Ok(()) => {
                self.chip(tab, ChipKind::Success, "Saved to Obsidian!");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "context-menu save failed");
                self.chip(tab, ChipKind::Error, "Save failed");
                Err(e)
            }
        }
    }

    /// Context-menu translate: ask the page to translate and show its tooltip.
    pub async fn translate_selection_in_tab(
        &self,
        tab: TabId,
        selected_text: Option<String>,
    ) -> Result<SelectionReply, ChannelError> {
        let (tx, rx) = oneshot::channel();
        let envelope = TabEnvelope {
            message: BackgroundMessage::TranslateSelection { selected_text },
            reply: Some(tx),
        };
        {
            let tabs = self.inner.tabs.lock();
            let sender = tabs
                .get(&tab)
                .ok_or_else(|| ChannelError::Unavailable(format!("no tab {tab}")))?;
            sender.send(envelope).map_err(|_| ChannelError::Closed)?;
        }
        rx.await.map_err(|_| ChannelError::Closed)
    }
}

#[async_trait]
impl Runtime for BackgroundHost {
    fn connect(&self, name: &str) -> Result<Port, ChannelError> {
        let (port, peer) = Port::pair(name);
        tokio::spawn(self.clone().serve_port(peer));
        Ok(port)
    }

    async fn send_message(&self, request: PageRequest) -> Result<Reply, ChannelError> {
        Ok(self.handle(request).await)
    }
}

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use wiremock::MockServer;

use vocab_lens::background::BackgroundHost;
use vocab_lens::channel::{DispatchClient, DispatchPolicy, PageRequest, Port, Reply, Runtime};
use vocab_lens::config::Settings;
use vocab_lens::error::ChannelError;
use vocab_lens::metrics::MetricsRegistry;
use vocab_lens::notes::NoteAppender;
use vocab_lens::page::{MemorySurface, PageSession, PageTranslator};
use vocab_lens::state_machine::UiSnapshot;
use vocab_lens::storage::MemoryStore;
use vocab_lens::translate::service::TranslationService;
use vocab_lens::translate::ProviderChain;

/// A privileged context that never answers.
pub struct OfflineRuntime;

#[async_trait]
impl Runtime for OfflineRuntime {
    fn connect(&self, _name: &str) -> Result<Port, ChannelError> {
        Err(ChannelError::Unavailable("extension context invalidated".into()))
    }

    async fn send_message(&self, _request: PageRequest) -> Result<Reply, ChannelError> {
        Err(ChannelError::Unavailable("extension context invalidated".into()))
    }
}

pub fn settings_for(server: &MockServer) -> Settings {
    Settings {
        google_base: server.uri(),
        // nothing listens here; provider B always fails
        libre_base: "http://127.0.0.1:9".into(),
        http_timeout: Duration::from_secs(2),
        db_path: Settings::default().db_path,
    }
}

pub fn fast_policy() -> DispatchPolicy {
    DispatchPolicy {
        translate_timeout: Duration::from_millis(2000),
        detail_timeout: Duration::from_millis(2000),
        max_attempts: 2,
        backoff_step: Duration::from_millis(10),
    }
}

pub struct World {
    pub host: BackgroundHost,
    pub store: Arc<MemoryStore>,
    pub surface: Arc<MemorySurface>,
    pub page: PageSession,
}

/// Privileged context over an in-memory store, one page wired to it.
pub fn world(server: &MockServer) -> World {
    let settings = settings_for(server);
    let store = Arc::new(MemoryStore::new());
    let metrics = Arc::new(MetricsRegistry::new());
    let chain = ProviderChain::from_settings(&settings).unwrap();
    let service = TranslationService::restore(chain.clone(), store.clone(), Arc::clone(&metrics));
    let host = BackgroundHost::new(
        service,
        NoteAppender::new(reqwest::Client::new()),
        store.clone(),
        Arc::clone(&metrics),
    );

    let dispatch = DispatchClient::new(Arc::new(host.clone()), fast_policy(), Arc::clone(&metrics));
    let surface = Arc::new(MemorySurface::default());
    surface.set_page("Words", "https://example.com/words");
    let page = PageSession::new(surface.clone(), PageTranslator::new(dispatch, chain, metrics));
    page.initialize(true);
    World {
        host,
        store,
        surface,
        page,
    }
}

/// Page with no reachable privileged context, only direct fetches.
pub fn offline_page(server: &MockServer) -> (Arc<MemorySurface>, PageSession) {
    let settings = settings_for(server);
    let metrics = Arc::new(MetricsRegistry::new());
    let dispatch = DispatchClient::new(Arc::new(OfflineRuntime), fast_policy(), Arc::clone(&metrics));
    let chain = ProviderChain::from_settings(&settings).unwrap();
    let surface = Arc::new(MemorySurface::default());
    let page = PageSession::new(surface.clone(), PageTranslator::new(dispatch, chain, metrics));
    page.initialize(true);
    (surface, page)
}

/// Block until a snapshot satisfies `pred`, or panic after five seconds.
pub async fn wait_for(rx: &mut watch::Receiver<UiSnapshot>, pred: impl Fn(&UiSnapshot) -> bool) -> UiSnapshot {
    let wait = async {
        loop {
            {
                let snap = rx.borrow_and_update();
                if pred(&snap) {
                    return snap.clone();
                }
            }
            rx.changed().await.expect("state machine dropped");
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("state never reached")
}

//! vocab-lens: selection translation engine.
//! Inline tooltip for the selected word, a tabbed vocabulary popup, and
//! one-click capture of selections into a markdown note.

pub mod background;
pub mod cancellation;
pub mod channel;
pub mod config;
pub mod error;
pub mod geometry;
pub mod metrics;
pub mod notes;
pub mod page;
pub mod state_machine;
pub mod storage;
pub mod translate;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use background::BackgroundHost;
use channel::{DispatchClient, DispatchPolicy};
use config::Settings;
use error::InitError;
use geometry::Rect;
use page::{MemorySurface, PageSession, PageTranslator};
use state_machine::TooltipState;
use translate::ProviderChain;

/// Install the global subscriber. `VOCAB_LENS_LOG_JSON=1` switches to JSON
/// lines. Safe to call more than once.
pub fn init_tracing() {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vocab_lens=debug"));
    let json = std::env::var("VOCAB_LENS_LOG_JSON").is_ok_and(|v| v == "1");
    let result = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(true)
            .with_thread_ids(true)
            .try_init()
    };
    if result.is_err() {
        warn!("tracing subscriber already installed");
    }
}

/// Wait for the tooltip to resolve after a selection.
async fn resolve_selection(page: &PageSession, surface: &MemorySurface, text: &str) -> Option<String> {
    let mut rx = page.subscribe();
    // Escape clears the de-duplication memory so a repeated line is looked up again
    page.key_down("Escape");
    surface.select(text, Rect::new(600.0, 380.0, 80.0, 18.0));
    page.pointer_up();

    let wait = async {
        loop {
            rx.changed().await.ok()?;
            if let TooltipState::Resolved { meaning, .. } = &rx.borrow_and_update().tooltip {
                return Some(meaning.clone());
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(15), wait).await.ok().flatten()
}

/// Headless driver: one privileged context, one in-memory page.
///
/// stdin commands: a plain line is selected and translated through the page,
/// `?word` prints the detailed record as JSON, `+text` appends to the note,
/// `!key <api key>` stores the note-service key, `!toggle` flips the enable flag.
pub async fn run() -> Result<(), InitError> {
    init_tracing();
    info!("vocab-lens starting");

    let settings = Settings::from_env();
    let host = BackgroundHost::from_settings(&settings)?;
    let metrics = Arc::clone(host.metrics());

    let surface = Arc::new(MemorySurface::default());
    surface.set_page("vocab-lens", "about:blank");
    let dispatch = DispatchClient::new(Arc::new(host.clone()), DispatchPolicy::default(), Arc::clone(&metrics));
    let translator = PageTranslator::new(dispatch, ProviderChain::from_settings(&settings)?, Arc::clone(&metrics));
    let page = PageSession::new(surface.clone(), translator);

    let (tab, rx) = host.register_tab();
    let listener = page.listen(rx);
    page.initialize(host.is_enabled());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(word) = line.strip_prefix('?') {
            match page.translator().lookup_detail(word).await {
                Some(detail) => match serde_json::to_string_pretty(&detail) {
                    Ok(text) => println!("{text}"),
                    Err(e) => warn!(error = %e, "could not render detail"),
                },
                None => println!("no detail for {word}"),
            }
        } else if let Some(text) = line.strip_prefix('+') {
            let ack = page.save_to_notes(Some(text)).await;
            println!("{}", serde_json::json!(ack));
        } else if let Some(key) = line.strip_prefix("!key ") {
            let saved = host.note_settings().and_then(|mut settings| {
                settings.api_key = Some(key.trim().to_string());
                host.update_note_settings(&settings)
            });
            match saved {
                Ok(()) => println!("note settings saved"),
                Err(e) => println!("note settings rejected: {e}"),
            }
        } else if line == "!toggle" {
            match host.toggle_enabled() {
                Ok(enabled) => println!("enabled: {enabled}"),
                Err(e) => warn!(error = %e, "toggle failed"),
            }
        } else {
            match resolve_selection(&page, &surface, line).await {
                Some(meaning) => println!("{line} → {meaning}"),
                None => println!("{line} → (no tooltip)"),
            }
        }
    }

    host.unregister_tab(tab);
    listener.abort();
    for (name, m) in metrics.summary() {
        info!(metric = %name, p50_us = m.p50_us, p95_us = m.p95_us, count = m.count, "latency");
    }
    info!("vocab-lens stopped");
    Ok(())
}

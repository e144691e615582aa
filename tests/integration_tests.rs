//! Integration tests for the translation cache
//!
//! These drive the HTTP router end to end with the in-memory cache and a
//! scripted engine backend, so no Redis or translate-shell is needed.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

use translate_cache::{
    cache::{CacheStore, MemoryStore},
    engines::EngineRegistry,
    invoker::{EngineInvoker, InvokeError},
    janitor::CacheJanitor,
    notifier::{NotificationSink, Notifier, NotifierHandle},
    resolver::Resolver,
    server::{router, AppState},
};

// ==================== Test Helpers ====================

/// Engine backend that answers from a fixed dictionary for the listed engines
struct DictionaryInvoker {
    working: Vec<&'static str>,
    calls: Mutex<Vec<(String, String, String)>>,
}

impl DictionaryInvoker {
    fn new(working: Vec<&'static str>) -> Self {
        Self {
            working,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl EngineInvoker for DictionaryInvoker {
    async fn invoke(
        &self,
        word: &str,
        language: &str,
        engine: &str,
    ) -> Result<String, InvokeError> {
        self.calls
            .lock()
            .unwrap()
            .push((word.to_string(), language.to_string(), engine.to_string()));

        if !self.working.contains(&engine) {
            return Err(InvokeError::EmptyReply);
        }
        match (word, language) {
            ("hello", "es") => Ok("hola".to_string()),
            ("cat", "de") => Ok("katze".to_string()),
            _ => Err(InvokeError::EmptyReply),
        }
    }
}

/// Sink collecting delivered batches
#[derive(Default)]
struct CollectingSink {
    batches: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationSink for CollectingSink {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        self.batches.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct TestApp {
    store: Arc<MemoryStore>,
    invoker: Arc<DictionaryInvoker>,
    engines: Arc<EngineRegistry>,
    notify: NotifierHandle,
    events: mpsc::UnboundedReceiver<String>,
}

impl TestApp {
    fn new(working: Vec<&'static str>) -> Self {
        // Batches reach the test through a channel once the notifier flushes
        let (notifier, notify) = Notifier::new(Duration::from_secs(3600));
        let (tx, events) = mpsc::unbounded_channel();
        let sink = Arc::new(ForwardingSink { tx });
        tokio::spawn(notifier.with_sink(Some(sink)).run());

        Self {
            store: Arc::new(MemoryStore::new()),
            invoker: Arc::new(DictionaryInvoker::new(working)),
            engines: Arc::new(EngineRegistry::new("google")),
            notify,
            events,
        }
    }

    fn router(&self) -> axum::Router {
        let resolver = Resolver::new(
            self.store.clone(),
            self.invoker.clone(),
            self.engines.clone(),
            self.notify.clone(),
        );
        router(AppState {
            resolver: Arc::new(resolver),
        })
    }

    /// Drop the last notifier handle and wait for the final flush
    async fn delivered_batch(self) -> String {
        let TestApp {
            notify, mut events, ..
        } = self;
        drop(notify);
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("notification batch delivered")
            .expect("sink channel open")
    }
}

/// Sink that hands each batch to a channel so tests can await delivery
struct ForwardingSink {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl NotificationSink for ForwardingSink {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        let _ = self.tx.send(text.to_string());
        Ok(())
    }
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

// ==================== HTTP Endpoint Tests ====================

#[tokio::test]
async fn test_translate_miss_then_hit() {
    let app = TestApp::new(vec!["google"]);

    let (status, body) = get(app.router(), "/translate/hello/to/es").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hola");
    assert_eq!(app.invoker.call_count(), 1);
    assert_eq!(app.store.get("es", "hello").await.unwrap().as_deref(), Some("hola"));

    let (status, body) = get(app.router(), "/translate/hello/to/es").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hola");
    assert_eq!(app.invoker.call_count(), 1, "second lookup comes from the cache");
}

#[tokio::test]
async fn test_translate_normalizes_path_segments() {
    let app = TestApp::new(vec!["google"]);

    let (_, body) = get(app.router(), "/translate/%20HeLLo%20/to/ES").await;

    assert_eq!(body, "hola");
    let calls = app.invoker.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![("hello".to_string(), "es".to_string(), "google".to_string())]
    );
}

#[tokio::test]
async fn test_blank_word_returns_empty_body_without_lookups() {
    let app = TestApp::new(vec!["google"]);
    app.store.set("es", "", "never").await.unwrap();

    let (status, body) = get(app.router(), "/translate/%20%20/to/es").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "");

    let (status, body) = get(app.router(), "/translate/hello/to/%20").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "");

    assert_eq!(app.invoker.call_count(), 0);
}

#[tokio::test]
async fn test_untranslatable_word_is_echoed_with_200() {
    let app = TestApp::new(vec!["google"]);
    app.engines
        .replace(vec!["google".to_string(), "bing".to_string()]);

    let (status, body) = get(app.router(), "/translate/Zyzzyva/to/es").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "zyzzyva");
    assert_eq!(app.invoker.call_count(), 2);
    assert_eq!(app.store.get("es", "zyzzyva").await.unwrap(), None);

    let batch = app.delivered_batch().await;
    assert_eq!(batch, "[error] zyzzyva (to es) failed to translate in all engines");
}

#[tokio::test]
async fn test_fallback_uses_discovered_engine_order() {
    let app = TestApp::new(vec!["yandex"]);
    app.engines.replace(vec![
        "google".to_string(),
        "bing".to_string(),
        "yandex".to_string(),
    ]);

    let (_, body) = get(app.router(), "/translate/cat/to/de").await;

    assert_eq!(body, "katze");
    let engines: Vec<String> = app
        .invoker
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|(_, _, engine)| engine.clone())
        .collect();
    assert_eq!(engines, vec!["google", "bing", "yandex"]);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new(vec!["google"]);
    let (status, _) = get(app.router(), "/translate/hello").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(vec!["google"]);
    let (status, body) = get(app.router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

// ==================== Janitor Tests ====================

#[tokio::test]
async fn test_swept_entries_are_translated_again() {
    let app = TestApp::new(vec!["google"]);
    app.store.set("es", "hello", "\u{7}hola").await.unwrap();

    let (_, body) = get(app.router(), "/translate/hello/to/es").await;
    assert_eq!(body, "\u{7}hola", "bad values are served until a sweep runs");

    let janitor = CacheJanitor::new(app.store.clone(), app.notify.clone());
    let report = janitor.sweep().await;
    assert_eq!(report.non_printable.removed, 1);

    let (_, body) = get(app.router(), "/translate/hello/to/es").await;
    assert_eq!(body, "hola");
    assert_eq!(app.invoker.call_count(), 1);
}

#[tokio::test]
async fn test_sweep_summary_is_delivered_on_shutdown() {
    let store = Arc::new(MemoryStore::new());
    store.set("en", "a", "").await.unwrap();
    store.set("en", "b", "ok").await.unwrap();
    store.set("en", "c", "\x01bad").await.unwrap();

    let sink = Arc::new(CollectingSink::default());
    let (notifier, notify) = Notifier::new(Duration::from_secs(3600));
    let delivery = notifier.with_sink(Some(sink.clone())).spawn();

    CacheJanitor::new(store.clone(), notify).sweep().await;
    delivery.await.unwrap();

    assert_eq!(
        sink.batches.lock().unwrap().clone(),
        vec![
            "[info] removed 1 trashed (empty) translations\nen: 1 removes\n\
             [info] removed 1 non-printable translations\nen: 1 removes"
                .to_string()
        ]
    );
    assert_eq!(store.entries("en").await.unwrap().len(), 1);
}

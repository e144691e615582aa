//! Cache hygiene: removes cached translations that should never have been
//! stored (empty strings, or text with non-printable characters).
//!
//! Each pass rescans the whole store and reports its removals through the
//! notifier. Sweeps are not atomic with concurrent writes, so an entry
//! written between scan and delete may be lost.

use crate::cache::CacheStore;
use crate::notifier::NotifierHandle;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Empty,
    NonPrintable,
}

impl Pass {
    fn rejects(self, value: &str) -> bool {
        match self {
            Pass::Empty => value.is_empty(),
            Pass::NonPrintable => !is_printable(value),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Pass::Empty => "trashed (empty)",
            Pass::NonPrintable => "non-printable",
        }
    }
}

/// Removals made by one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub removed: usize,
    pub per_language: BTreeMap<String, usize>,
}

impl PassReport {
    fn record(&mut self, language: &str) {
        self.removed += 1;
        *self.per_language.entry(language.to_string()).or_insert(0) += 1;
    }

    /// Notification text for this pass, `None` when nothing was removed
    fn summary(&self, label: &str) -> Option<String> {
        if self.removed == 0 {
            return None;
        }
        let mut lines = vec![format!("removed {} {} translations", self.removed, label)];
        lines.extend(
            self.per_language
                .iter()
                .map(|(language, count)| format!("{}: {} removes", language, count)),
        );
        Some(lines.join("\n"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub empty: PassReport,
    pub non_printable: PassReport,
}

impl SweepReport {
    pub fn total_removed(&self) -> usize {
        self.empty.removed + self.non_printable.removed
    }
}

pub struct CacheJanitor {
    store: Arc<dyn CacheStore>,
    notifier: NotifierHandle,
}

impl CacheJanitor {
    pub fn new(store: Arc<dyn CacheStore>, notifier: NotifierHandle) -> Self {
        Self { store, notifier }
    }

    /// Run both passes, empty values first
    pub async fn sweep(&self) -> SweepReport {
        info!("Starting cache sweep");
        let report = SweepReport {
            empty: self.run_pass(Pass::Empty).await,
            non_printable: self.run_pass(Pass::NonPrintable).await,
        };
        info!("Cache sweep finished, {} entries removed", report.total_removed());
        report
    }

    async fn run_pass(&self, pass: Pass) -> PassReport {
        let mut report = PassReport::default();

        let languages = match self.store.languages().await {
            Ok(languages) => languages,
            Err(e) => {
                warn!("Cache sweep could not list languages: {}", e);
                return report;
            }
        };

        for language in languages {
            debug!("Cleaning {} translations for {}", pass.label(), language);
            let entries = match self.store.entries(&language).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cache sweep skipped {}: {}", language, e);
                    continue;
                }
            };

            for (word, value) in entries {
                if !pass.rejects(&value) {
                    continue;
                }
                match self.store.delete(&language, &word).await {
                    Ok(()) => report.record(&language),
                    Err(e) => warn!("Failed to remove '{}' ({}): {}", word, language, e),
                }
            }
        }

        if let Some(summary) = report.summary(pass.label()) {
            self.notifier.info(summary);
        }
        report
    }
}

fn non_graphic() -> &'static Regex {
    static NON_GRAPHIC: OnceLock<Regex> = OnceLock::new();
    // Graphic = letters, marks, numbers, punctuation, symbols and plain spaces.
    // Everything else: control, format, surrogate, private use, unassigned,
    // and line/paragraph separators.
    NON_GRAPHIC.get_or_init(|| Regex::new(r"[\p{C}\p{Zl}\p{Zp}]").expect("static regex is valid"))
}

/// True when every character is graphic
pub fn is_printable(value: &str) -> bool {
    !non_graphic().is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::notifier::tests::{capture, drain};

    // ==================== Printability ====================

    #[test]
    fn test_is_printable_accepts_text() {
        assert!(is_printable("hola"));
        assert!(is_printable("два слова"));
        assert!(is_printable("¿qué tal? 100%"));
        assert!(is_printable("日本語"));
        assert!(is_printable("café ☕"));
        assert!(is_printable(""));
    }

    #[test]
    fn test_is_printable_rejects_control_and_format() {
        assert!(!is_printable("\x01bad"));
        assert!(!is_printable("line\nbreak"));
        assert!(!is_printable("tab\there"));
        assert!(!is_printable("zero\u{200b}width"));
        assert!(!is_printable("private\u{e000}use"));
        assert!(!is_printable("para\u{2029}sep"));
    }

    // ==================== Sweeping ====================

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.set("en", "a", "").await.unwrap();
        store.set("en", "b", "ok").await.unwrap();
        store.set("en", "c", "\x01bad").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_sweep_removes_empty_and_non_printable() {
        let store = seeded_store().await;
        let (notifier, mut rx) = capture();
        let janitor = CacheJanitor::new(store.clone(), notifier);

        let report = janitor.sweep().await;

        assert_eq!(report.empty.removed, 1);
        assert_eq!(report.non_printable.removed, 1);
        assert_eq!(report.empty.per_language["en"], 1);
        assert_eq!(report.non_printable.per_language["en"], 1);

        let remaining = store.entries("en").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining["b"], "ok");

        assert_eq!(
            drain(&mut rx),
            vec![
                "[info] removed 1 trashed (empty) translations\nen: 1 removes",
                "[info] removed 1 non-printable translations\nen: 1 removes",
            ]
        );
    }

    #[tokio::test]
    async fn test_second_sweep_is_a_noop() {
        let store = seeded_store().await;
        let (notifier, mut rx) = capture();
        let janitor = CacheJanitor::new(store.clone(), notifier);

        janitor.sweep().await;
        drain(&mut rx);

        let report = janitor.sweep().await;

        assert_eq!(report.total_removed(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_sweep_breaks_down_by_language() {
        let store = Arc::new(MemoryStore::new());
        store.set("es", "x", "").await.unwrap();
        store.set("es", "y", "").await.unwrap();
        store.set("de", "x", "").await.unwrap();
        store.set("de", "ok", "gut").await.unwrap();
        let (notifier, mut rx) = capture();
        let janitor = CacheJanitor::new(store, notifier);

        let report = janitor.sweep().await;

        assert_eq!(report.empty.removed, 3);
        assert_eq!(report.non_printable.removed, 0);
        assert_eq!(
            drain(&mut rx),
            vec!["[info] removed 3 trashed (empty) translations\nde: 1 removes\nes: 2 removes"]
        );
    }

    #[tokio::test]
    async fn test_sweep_of_clean_cache_is_silent() {
        let store = Arc::new(MemoryStore::new());
        store.set("es", "hello", "hola").await.unwrap();
        let (notifier, mut rx) = capture();
        let janitor = CacheJanitor::new(store, notifier);

        assert_eq!(janitor.sweep().await, SweepReport::default());
        assert!(drain(&mut rx).is_empty());
    }
}

//! Cache invalidation bus.
//!
//! A small pub/sub channel decoupling document-mutating operations from the
//! caches they invalidate: ingestion emits `documents:changed` after
//! persisting, and every long-lived query-cache owner subscribes and clears
//! its cache in response. The bus is an explicitly constructed service
//! passed by reference (`Arc`), not a process-global singleton, so tests
//! can run isolated instances.

use std::sync::{Arc, Mutex};

/// The bus vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A corpus mutation occurred (documents added or cleared).
    DocumentsChanged,
    /// Blunt reset: every cache should drop everything.
    ClearAll,
    /// Advisory selective invalidation; consumers may treat the pattern as
    /// a hint or fall back to a full clear.
    Invalidate { pattern: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    DocumentsChanged,
    ClearAll,
    Invalidate,
}

impl CacheEvent {
    fn kind(&self) -> EventKind {
        match self {
            CacheEvent::DocumentsChanged => EventKind::DocumentsChanged,
            CacheEvent::ClearAll => EventKind::ClearAll,
            CacheEvent::Invalidate { .. } => EventKind::Invalidate,
        }
    }
}

type Handler = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

struct Subscription {
    kind: EventKind,
    subscriber: String,
    handler: Handler,
}

#[derive(Default)]
pub struct CacheEventBus {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl CacheEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_documents_changed(&self, emitter: &str) {
        tracing::info!("{} emitted documents:changed", emitter);
        self.emit(&CacheEvent::DocumentsChanged);
    }

    pub fn emit_clear_all(&self, emitter: &str) {
        tracing::info!("{} emitted cache:clear-all", emitter);
        self.emit(&CacheEvent::ClearAll);
    }

    pub fn emit_invalidate(&self, emitter: &str, pattern: Option<&str>) {
        tracing::info!(
            "{} emitted cache:invalidate (pattern: {})",
            emitter,
            pattern.unwrap_or("*")
        );
        self.emit(&CacheEvent::Invalidate {
            pattern: pattern.map(str::to_string),
        });
    }

    pub fn on_documents_changed<F>(&self, subscriber: &str, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(EventKind::DocumentsChanged, subscriber, move |_| handler());
    }

    pub fn on_clear_all<F>(&self, subscriber: &str, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(EventKind::ClearAll, subscriber, move |_| handler());
    }

    pub fn on_invalidate<F>(&self, subscriber: &str, handler: F)
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Invalidate, subscriber, move |event| {
            if let CacheEvent::Invalidate { pattern } = event {
                handler(pattern.as_deref());
            }
        });
    }

    /// Number of registered subscriptions, for diagnostics.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn subscribe<F>(&self, kind: EventKind, subscriber: &str, handler: F)
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        tracing::info!("{} subscribed to {:?}", subscriber, kind);
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.push(Subscription {
                kind,
                subscriber: subscriber.to_string(),
                handler: Arc::new(handler),
            });
        }
    }

    fn emit(&self, event: &CacheEvent) {
        // Clone handlers out so callbacks run without the registry lock,
        // letting a handler subscribe or emit without deadlocking.
        let matching: Vec<(String, Handler)> = match self.subscriptions.lock() {
            Ok(subscriptions) => subscriptions
                .iter()
                .filter(|s| s.kind == event.kind())
                .map(|s| (s.subscriber.clone(), Arc::clone(&s.handler)))
                .collect(),
            Err(_) => return,
        };

        for (subscriber, handler) in matching {
            tracing::debug!("Delivering {:?} to {}", event.kind(), subscriber);
            handler(event);
        }
    }
}

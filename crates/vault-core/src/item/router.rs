//! Process-wide handler registry and open/list/stream dispatch.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Attributes, Item};
use crate::error::CoreResult;
use crate::reader::Reader;
use crate::streamer::{Streamer, StreamOutput};

pub type OpenFn = Arc<dyn Fn(&Item, &Attributes) -> CoreResult<Box<dyn Reader>> + Send + Sync>;
pub type ListFn = Arc<dyn Fn(Item, &Attributes) -> CoreResult<Item> + Send + Sync>;
pub type StreamFn = Arc<dyn Fn(&Item, &Attributes) -> CoreResult<Box<dyn Streamer>> + Send + Sync>;
pub type ListDecorator = Arc<dyn Fn(&ListFn, Item, &Attributes) -> CoreResult<Item> + Send + Sync>;

/// A registered handler: its factory closures for each operation it
/// supports, and the capability bits a `Route` must carry to reach it.
#[derive(Clone)]
pub struct HandlerEntry {
    pub open_fn: Option<OpenFn>,
    pub list_fn: Option<ListFn>,
    pub stream_fn: Option<StreamFn>,
    pub can_open: bool,
    pub can_list: bool,
    pub can_stream: bool,
}

impl HandlerEntry {
    pub fn openable(open_fn: OpenFn) -> Self {
        Self {
            open_fn: Some(open_fn),
            list_fn: None,
            stream_fn: None,
            can_open: true,
            can_list: false,
            can_stream: false,
        }
    }

    pub fn listable(list_fn: ListFn) -> Self {
        Self {
            open_fn: None,
            list_fn: Some(list_fn),
            stream_fn: None,
            can_open: false,
            can_list: true,
            can_stream: false,
        }
    }

    pub fn streamable(stream_fn: StreamFn) -> Self {
        Self {
            open_fn: None,
            list_fn: None,
            stream_fn: Some(stream_fn),
            can_open: false,
            can_list: false,
            can_stream: true,
        }
    }
}

/// Process-wide registry of `handler_id -> HandlerEntry`, plus dispatch for
/// `Item::open`/`list`/`stream`. Registration is idempotent on `handler_id`
/// (last registration wins).
#[derive(Default)]
pub struct Router {
    registry: RwLock<HashMap<String, HandlerEntry>>,
    list_decorator: RwLock<Option<ListDecorator>>,
}

fn merge_kwargs(base: &Attributes, extra: &Attributes) -> Attributes {
    let mut merged = base.clone();
    for (k, v) in extra {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

fn routes_by_priority_desc(item: &Item) -> Vec<super::Route> {
    let mut routes = item.routes.clone();
    routes.sort_by(|a, b| b.priority.cmp(&a.priority));
    routes
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&self, handler_id: impl Into<String>, entry: HandlerEntry) {
        self.registry.write().unwrap().insert(handler_id.into(), entry);
    }

    pub fn unregister_handler(&self, handler_id: &str) {
        self.registry.write().unwrap().remove(handler_id);
    }

    pub fn set_list_decorator(&self, decorator: ListDecorator) {
        *self.list_decorator.write().unwrap() = Some(decorator);
    }

    /// Picks the highest-priority `can_open` route whose handler is
    /// registered and instantiates it. Returns `None` if no route matches
    /// rather than an error — a missing route is a recoverable outcome.
    pub fn open(&self, item: &Item, kwargs: &Attributes) -> CoreResult<Option<Box<dyn Reader>>> {
        if item.routes.is_empty() {
            return Ok(None);
        }
        let registry = self.registry.read().unwrap();
        for route in routes_by_priority_desc(item) {
            let Some(entry) = registry.get(&route.handler_id) else {
                continue;
            };
            if !entry.can_open {
                continue;
            }
            let Some(open_fn) = &entry.open_fn else {
                continue;
            };
            let merged = merge_kwargs(kwargs, &route.kwargs);
            return Ok(Some(open_fn(item, &merged)?));
        }
        Ok(None)
    }

    /// Spawns one thread per `can_list` route, each operating on a private
    /// clone of a vanilla (childless, routeless) copy of `item`, then merges
    /// every result serially on the caller's thread.
    pub fn list(&self, item: &Item, kwargs: &Attributes) -> CoreResult<Item> {
        if item.routes.is_empty() {
            return Ok(item.clone());
        }

        let mut accumulator = item.clone();
        accumulator.children = None;
        accumulator.routes.clear();

        let registry = self.registry.read().unwrap();
        let decorator = self.list_decorator.read().unwrap().clone();

        let (tx, rx) = std::sync::mpsc::channel();
        let mut handles = Vec::new();
        for route in &item.routes {
            let Some(entry) = registry.get(&route.handler_id) else {
                continue;
            };
            if !entry.can_list {
                continue;
            }
            let Some(list_fn) = entry.list_fn.clone() else {
                continue;
            };
            let item_copy = accumulator.clone();
            let kwargs_copy = merge_kwargs(kwargs, &route.kwargs);
            let decorator = decorator.clone();
            let tx = tx.clone();
            let handle = std::thread::spawn(move || {
                let result = match &decorator {
                    Some(dec) => dec(&list_fn, item_copy, &kwargs_copy),
                    None => list_fn(item_copy, &kwargs_copy),
                };
                let _ = tx.send(result);
            });
            handles.push(handle);
        }
        drop(tx);
        drop(registry);

        for handle in handles {
            let _ = handle.join();
        }

        while let Ok(result) = rx.recv() {
            match result {
                Ok(listed) => accumulator.merge(&listed),
                Err(e) => tracing::warn!(error = %e, "list route failed"),
            }
        }

        Ok(accumulator)
    }

    /// Evaluates every `can_stream` route (highest priority first) and
    /// streams the one with the highest non-null score; ties keep the
    /// first one seen.
    pub fn stream(&self, item: &Item, kwargs: &Attributes) -> CoreResult<Option<StreamOutput>> {
        if item.routes.is_empty() {
            return Ok(None);
        }
        let registry = self.registry.read().unwrap();
        let mut best_evaluation: Option<i64> = None;
        let mut best_streamer: Option<Box<dyn Streamer>> = None;

        for route in routes_by_priority_desc(item) {
            let Some(entry) = registry.get(&route.handler_id) else {
                continue;
            };
            if !entry.can_stream {
                continue;
            }
            let Some(stream_fn) = &entry.stream_fn else {
                continue;
            };
            let merged = merge_kwargs(kwargs, &route.kwargs);
            let streamer = stream_fn(item, &merged)?;
            let Some(evaluation) = streamer.evaluate() else {
                continue;
            };
            if best_evaluation.map_or(true, |best| evaluation > best) {
                best_evaluation = Some(evaluation);
                best_streamer = Some(streamer);
            }
        }

        match best_streamer {
            Some(s) => Ok(Some(s.stream()?)),
            None => Ok(None),
        }
    }
}

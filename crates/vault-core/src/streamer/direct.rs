//! Plain-file streamer: picks the largest readable descendant, optionally
//! restricted to a filename-extension allow-list.

use std::sync::Arc;

use super::{StreamOutput, Streamer};
use crate::error::CoreResult;
use crate::item::{Attributes, Item, Router};

fn extension_of(id: &str) -> Option<&str> {
    id.rsplit_once('.').map(|(_, ext)| ext)
}

fn extension_allowed(id: &str, allow_list: &Option<Vec<String>>) -> bool {
    let Some(allow_list) = allow_list else {
        return true;
    };
    let Some(ext) = extension_of(id) else {
        return false;
    };
    allow_list.iter().any(|a| a.eq_ignore_ascii_case(ext))
}

fn item_size(item: &Item) -> Option<u64> {
    item.attributes.get("size").and_then(|v| v.as_u64())
}

/// Recursively finds the largest `is_readable` descendant of `item` (or
/// `item` itself) whose extension passes `allow_list`, listing any
/// unexpanded `is_listable` children along the way.
fn largest_candidate(
    router: &Router,
    item: &Item,
    kwargs: &Attributes,
    allow_list: &Option<Vec<String>>,
) -> CoreResult<Option<(Item, u64)>> {
    let mut best: Option<(Item, u64)> = None;

    if item.is_readable() && extension_allowed(&item.id, allow_list) {
        if let Some(size) = item_size(item) {
            best = Some((item.clone(), size));
        }
    }

    if item.is_listable() {
        let listed = router.list(item, kwargs)?;
        if let Some(children) = &listed.children {
            for child in children {
                if let Some((candidate, size)) = largest_candidate(router, child, kwargs, allow_list)? {
                    if best.as_ref().map_or(true, |(_, best_size)| size > *best_size) {
                        best = Some((candidate, size));
                    }
                }
            }
        }
    }

    Ok(best)
}

/// Evaluates and streams the single largest allowed file under an item's
/// listing, without regard for multi-volume archives.
pub struct DirectStreamer {
    router: Arc<Router>,
    item: Item,
    kwargs: Attributes,
    allow_extensions: Option<Vec<String>>,
}

impl DirectStreamer {
    pub fn new(router: Arc<Router>, item: Item, kwargs: Attributes, allow_extensions: Option<Vec<String>>) -> Self {
        Self {
            router,
            item,
            kwargs,
            allow_extensions,
        }
    }
}

impl Streamer for DirectStreamer {
    fn evaluate(&self) -> Option<i64> {
        largest_candidate(&self.router, &self.item, &self.kwargs, &self.allow_extensions)
            .ok()
            .flatten()
            .map(|(_, size)| size as i64)
    }

    fn stream(&self) -> CoreResult<StreamOutput> {
        let found = largest_candidate(&self.router, &self.item, &self.kwargs, &self.allow_extensions)?;
        let item = found
            .map(|(item, _)| item)
            .unwrap_or_else(|| self.item.clone());
        Ok(StreamOutput::Item(item))
    }
}

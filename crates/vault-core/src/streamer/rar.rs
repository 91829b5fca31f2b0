//! Multi-volume RAR streamer: finds every candidate first volume in a
//! listing, assembles each into a fileset by walking the volume-naming
//! rule, and streams the largest one.

use std::sync::Arc;

use super::{StreamOutput, Streamer};
use crate::error::CoreResult;
use crate::item::{Attributes, Item, Router};
use crate::rar::{self, NamingScheme};

fn item_size(item: &Item) -> Option<u64> {
    item.attributes.get("size").and_then(|v| v.as_u64())
}

/// Walks `naming_scheme`'s successor rule across `siblings`, starting from
/// `first`, collecting every volume until a successor id is missing from
/// the listing. Returns `None` (no fileset) only if `first` itself can't
/// be found among `siblings`, which shouldn't happen since `first` came
/// from the same listing.
fn assemble_fileset(siblings: &[Item], first: &Item, naming_scheme: NamingScheme) -> Vec<Item> {
    let mut fileset = vec![first.clone()];
    let mut current_id = first.id.clone();
    loop {
        let Some(next_name) = naming_scheme.next_name(&current_id) else {
            break;
        };
        let Some(next) = siblings.iter().find(|s| s.id.eq_ignore_ascii_case(&next_name)) else {
            break;
        };
        current_id = next.id.clone();
        fileset.push(next.clone());
    }
    fileset
}

fn fileset_size(fileset: &[Item]) -> u64 {
    fileset.iter().filter_map(item_size).sum()
}

/// Evaluates and streams the largest assembled RAR fileset among an item's
/// children.
pub struct RarStreamer {
    router: Arc<Router>,
    directory: Item,
    kwargs: Attributes,
}

impl RarStreamer {
    pub fn new(router: Arc<Router>, directory: Item, kwargs: Attributes) -> Self {
        Self { router, directory, kwargs }
    }

    /// Lists `directory` once and returns the largest fileset found, if
    /// any. Shared between `evaluate` and `stream` so both see the same
    /// listing within one call.
    fn best_fileset(&self) -> CoreResult<Option<Vec<Item>>> {
        let listed = self.router.list(&self.directory, &self.kwargs)?;
        let siblings = listed.children.unwrap_or_default();

        let naming_scheme = |child: &Item| -> Option<NamingScheme> {
            if rar::volume::is_old_style_first_volume(&child.id) {
                Some(NamingScheme::Old)
            } else if rar::volume::is_new_style_first_volume(&child.id) {
                Some(NamingScheme::New)
            } else {
                None
            }
        };

        let mut best: Option<Vec<Item>> = None;
        for child in &siblings {
            let Some(scheme) = naming_scheme(child) else {
                continue;
            };
            let fileset = assemble_fileset(&siblings, child, scheme);
            let size = fileset_size(&fileset);
            let best_size = best.as_ref().map(|f| fileset_size(f)).unwrap_or(0);
            if best.is_none() || size > best_size {
                best = Some(fileset);
            }
        }

        Ok(best)
    }
}

impl Streamer for RarStreamer {
    fn evaluate(&self) -> Option<i64> {
        let fileset = self.best_fileset().ok().flatten()?;
        let size = fileset_size(&fileset);
        Some(((size as f64) * 0.99) as i64)
    }

    fn stream(&self) -> CoreResult<StreamOutput> {
        let fileset = self
            .best_fileset()?
            .ok_or_else(|| crate::error::CoreError::InvalidInput("no RAR fileset found to stream".into()))?;
        let first_volume = fileset[0].clone();
        let reader = rar::DirectRarReader::open(Arc::clone(&self.router), self.directory.clone(), first_volume)?;
        Ok(StreamOutput::Reader(Box::new(reader)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::router::HandlerEntry;
    use crate::item::Route;

    fn volume(id: &str, size: u64) -> Item {
        let mut item = Item::new(id);
        item.readable = true;
        item.attributes.insert("size".into(), serde_json::Value::from(size));
        item
    }

    fn router_with_two_filesets() -> (Arc<Router>, Item) {
        let router = Arc::new(Router::new());
        router.register_handler(
            "dir",
            HandlerEntry::listable(Arc::new(|mut item, _kwargs| {
                // Small old-style set: movie.rar + movie.r00.
                item.add_item(volume("movie.rar", 1_000));
                item.add_item(volume("movie.r00", 1_000));
                // Bigger new-style set: big.part01.rar..big.part03.rar.
                item.add_item(volume("big.part01.rar", 5_000));
                item.add_item(volume("big.part02.rar", 5_000));
                item.add_item(volume("big.part03.rar", 5_000));
                Ok(item)
            })),
        );
        let mut root = Item::new("dir");
        root.expandable = true;
        root.add_route(Route::new("dir", false, true, false));
        (router, root)
    }

    #[test]
    fn picks_the_larger_fileset_across_naming_schemes() {
        let (router, root) = router_with_two_filesets();
        let streamer = RarStreamer::new(router, root, Attributes::new());
        let fileset = streamer.best_fileset().unwrap().unwrap();
        assert_eq!(fileset.len(), 3);
        assert_eq!(fileset[0].id, "big.part01.rar");
        assert_eq!(fileset[2].id, "big.part03.rar");
    }

    #[test]
    fn evaluate_applies_tiebreak_factor() {
        let (router, root) = router_with_two_filesets();
        let streamer = RarStreamer::new(router, root, Attributes::new());
        assert_eq!(streamer.evaluate(), Some((15_000.0 * 0.99) as i64));
    }

    #[test]
    fn evaluate_is_none_without_any_first_volume() {
        let router = Arc::new(Router::new());
        router.register_handler(
            "dir",
            HandlerEntry::listable(Arc::new(|item, _kwargs| Ok(item))),
        );
        let mut root = Item::new("dir");
        root.expandable = true;
        root.add_route(Route::new("dir", false, true, false));
        let streamer = RarStreamer::new(router, root, Attributes::new());
        assert_eq!(streamer.evaluate(), None);
    }
}

//! Builds the process-wide `Router` and resolves a CLI target string (a
//! local path or an `http(s)://` URL) into a root `Item`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use vault_core::config::VaultConfig;
use vault_core::error::CoreResult;
use vault_core::item::router::HandlerEntry;
use vault_core::item::{Item, Route, Router};
use vault_core::reader::{FileReader, Reader, SegmentedHttpReader};
use vault_core::streamer::{DirectStreamer, RarStreamer};
use vault_core::CoreError;

/// Registers the handlers this binary knows about: `local_fs` (files and
/// directories on disk), `http` (a remote range-readable object), and the
/// two streamers from C8. The streamers need `Arc<Router>` to recurse back
/// into listing, so they're registered after the router exists rather than
/// at construction time.
pub fn build_router(cfg: VaultConfig) -> Arc<Router> {
    let router = Arc::new(Router::new());

    router.register_handler(
        "local_fs",
        HandlerEntry {
            open_fn: Some(Arc::new(|item, _kwargs| {
                let path = path_attribute(item)?;
                Ok(Box::new(FileReader::new(path)) as Box<dyn Reader>)
            })),
            list_fn: Some(Arc::new(|mut item, _kwargs| {
                let path = path_attribute(&item)?;
                for entry in fs::read_dir(&path)? {
                    let entry = entry?;
                    item.add_item(local_item(&entry.path())?);
                }
                Ok(item)
            })),
            stream_fn: None,
            can_open: true,
            can_list: true,
            can_stream: false,
        },
    );

    router.register_handler(
        "http",
        HandlerEntry::openable(Arc::new(move |item, _kwargs| {
            let url = item
                .attributes
                .get("url")
                .and_then(|v| v.as_str())
                .ok_or_else(|| CoreError::InvalidInput("http item missing url attribute".into()))?;
            let reader = SegmentedHttpReader::with_config(url, &cfg)?;
            Ok(Box::new(reader) as Box<dyn Reader>)
        })),
    );

    {
        let router_for_direct = Arc::clone(&router);
        router.register_handler(
            "direct_stream",
            HandlerEntry::streamable(Arc::new(move |item, kwargs| {
                Ok(Box::new(DirectStreamer::new(
                    Arc::clone(&router_for_direct),
                    item.clone(),
                    kwargs.clone(),
                    None,
                )) as Box<dyn vault_core::streamer::Streamer>)
            })),
        );
    }

    {
        let router_for_rar = Arc::clone(&router);
        router.register_handler(
            "rar_stream",
            HandlerEntry::streamable(Arc::new(move |item, kwargs| {
                Ok(Box::new(RarStreamer::new(
                    Arc::clone(&router_for_rar),
                    item.clone(),
                    kwargs.clone(),
                )) as Box<dyn vault_core::streamer::Streamer>)
            })),
        );
    }

    router
}

fn path_attribute(item: &Item) -> CoreResult<PathBuf> {
    item.attributes
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .ok_or_else(|| CoreError::InvalidInput(format!("item {} missing path attribute", item.id)))
}

/// Builds an `Item` for one filesystem entry. Directories get `local_fs`
/// listing plus both streamers (a directory might be a plain folder of
/// media or a set of RAR volumes; `Router::stream` picks whichever scores
/// higher); files just get `local_fs` open.
fn local_item(path: &Path) -> CoreResult<Item> {
    let metadata = fs::metadata(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut item = Item::new(name);
    item.attributes
        .insert("path".into(), serde_json::Value::from(path.to_string_lossy().into_owned()));

    if metadata.is_dir() {
        item.expandable = true;
        item.streamable = true;
        item.add_route(Route::new("local_fs", false, true, false));
        item.add_route(Route::new("direct_stream", false, false, true));
        item.add_route(Route::new("rar_stream", false, false, true));
    } else {
        item.readable = true;
        item.attributes
            .insert("size".into(), serde_json::Value::from(metadata.len()));
        item.add_route(Route::new("local_fs", true, false, false));
    }

    Ok(item)
}

/// Builds the root `Item` for a remote object, probing its `Content-Length`
/// via `HEAD` up front so the item is readable (and thus routable) as soon
/// as it's constructed.
fn http_item(url: &str) -> CoreResult<Item> {
    let probe = vault_core::reader::http::probe(url)?;
    let id = probe.filename.clone().unwrap_or_else(|| url.to_string());

    let mut item = Item::new(id);
    item.attributes.insert("url".into(), serde_json::Value::from(url));
    item.attributes
        .insert("size".into(), serde_json::Value::from(probe.content_length));
    if let Some(filename) = &probe.filename {
        item.attributes.insert("filename".into(), serde_json::Value::from(filename.as_str()));
    }
    if let Some(content_type) = &probe.content_type {
        item.attributes
            .insert("content_type".into(), serde_json::Value::from(content_type.as_str()));
    }
    item.readable = true;
    item.add_route(Route::new("http", true, false, false));

    Ok(item)
}

/// Resolves a CLI target string into its root `Item`: an `http(s)://` URL
/// probes the remote object, anything else is treated as a local path.
pub fn resolve_item(target: &str) -> Result<Item> {
    if target.starts_with("http://") || target.starts_with("https://") {
        return Ok(http_item(target)?);
    }
    let path = Path::new(target);
    if !path.exists() {
        return Err(anyhow!("no such file or directory: {target}"));
    }
    Ok(local_item(path)?)
}

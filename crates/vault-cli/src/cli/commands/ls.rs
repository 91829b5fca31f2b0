//! `vault ls` -- list an item's children.

use anyhow::Result;
use vault_core::item::{Attributes, Item, Router};

fn size_of(item: &Item) -> Option<u64> {
    item.attributes.get("size").and_then(|v| v.as_u64())
}

fn kind_of(item: &Item) -> &'static str {
    if item.is_listable() {
        "dir"
    } else if item.is_readable() {
        "file"
    } else {
        "?"
    }
}

pub fn run_ls(router: &Router, item: &Item) -> Result<()> {
    let listed = router.list(item, &Attributes::new())?;
    let children = listed.children.unwrap_or_default();

    if children.is_empty() {
        println!("{} (no children)", item.id);
        return Ok(());
    }

    println!("{:<5} {:>12}  {}", "KIND", "SIZE", "NAME");
    for child in &children {
        let size_str = size_of(child).map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
        println!("{:<5} {:>12}  {}", kind_of(child), size_str, child.id);
    }

    Ok(())
}

//! `vault cat` -- open an item and stream its bytes to stdout.

use std::io::Write;

use anyhow::{anyhow, Result};
use vault_core::item::{Attributes, Item, Router};
use vault_core::reader::Reader;

const CHUNK_SIZE: usize = 1 << 20;

pub fn run_cat(router: &Router, item: &Item) -> Result<()> {
    let mut reader = router
        .open(item, &Attributes::new())?
        .ok_or_else(|| anyhow!("item {} has no route that can open it", item.id))?;

    reader.seek(0)?;
    let mut stdout = std::io::stdout().lock();
    loop {
        let chunk = reader.read(CHUNK_SIZE)?;
        if chunk.is_empty() {
            break;
        }
        stdout.write_all(&chunk)?;
    }
    reader.close();
    Ok(())
}

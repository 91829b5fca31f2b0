//! `vault stream` -- resolve the best streamer for an item and cat it.

use std::io::Write;

use anyhow::{anyhow, Result};
use vault_core::item::{Attributes, Item, Router};
use vault_core::reader::Reader;
use vault_core::streamer::StreamOutput;

use super::run_cat;

const CHUNK_SIZE: usize = 1 << 20;

pub fn run_stream(router: &Router, item: &Item) -> Result<()> {
    let output = router
        .stream(item, &Attributes::new())?
        .ok_or_else(|| anyhow!("item {} has no streamer that scored a candidate", item.id))?;

    match output {
        StreamOutput::Item(winner) => run_cat(router, &winner),
        StreamOutput::Reader(mut reader) => {
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
    }
}

//! `vault inspect` -- print what the RAR header parser sees in a volume's
//! first file entry, without assembling or reading its body.

use std::path::Path;

use anyhow::{Context, Result};
use vault_core::rar::header;
use vault_core::reader::{FileReader, Reader};

pub fn run_inspect(path: &Path) -> Result<()> {
    let mut reader = FileReader::new(path);
    reader.seek(0)?;
    let scan = header::scan_volume(&mut reader).with_context(|| format!("scanning {}", path.display()))?;
    reader.close();

    println!("volume: {}", path.display());
    println!(
        "naming scheme: {}",
        match scan.naming_scheme {
            Some(vault_core::rar::NamingScheme::Old) => "old (.rNN)",
            Some(vault_core::rar::NamingScheme::New) => "new (.partNN.rar)",
            None => "(not declared)",
        }
    );
    println!("recovery record present: {}", scan.recovery_record);
    println!("first file: {}", scan.first_file.name);
    println!("  method: {}", scan.first_file.method);
    println!("  pack size (this volume): {}", scan.first_file.pack_size);
    println!("  unpack size (whole member): {}", scan.first_file.unpack_size);
    println!("  data offset: {}", scan.first_file.data_offset);
    println!("  split before: {}", scan.first_file.split_before);
    println!("  split after: {}", scan.first_file.split_after);

    Ok(())
}

use std::fs;

use anyhow::Result;

use pressmark::import::{preview_batch, UploadedFile};
use pressmark::store::memory::MemoryStore;

use crate::CheckArgs;

/// Runs the import preview against an empty store, which reports validation
/// problems and conflicts between the files themselves.
pub fn check_cmd(args: CheckArgs) -> Result<()> {
    let mut paths: Vec<_> = fs::read_dir(&args.dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.to_lowercase().ends_with(".md"))
                    .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        files.push(UploadedFile {
            name,
            data: fs::read(path)?,
        });
    }

    if files.is_empty() {
        println!("No markdown files found in {}", args.dir.display());
        return Ok(());
    }

    let store = MemoryStore::new();
    let report = preview_batch(&store, &files)?;

    for preview in &report.previews {
        if preview.errors.is_empty() && !preview.conflict {
            println!("ok       {} -> {}", preview.filename, preview.slug);
            continue;
        }

        if preview.conflict {
            println!("conflict {} -> {} (duplicate slug in this set)", preview.filename, preview.slug);
        }
        for error in &preview.errors {
            println!("error    {}: {}", preview.filename, error);
        }
    }

    println!();
    println!(
        "{} files checked: {} valid, {} conflicting",
        report.total, report.valid, report.conflicting
    );

    Ok(())
}

//! Dump-tree command implementation.

use super::{open_store, open_tree};
use objdb_core::Direction;
use std::path::Path;

/// Runs the dump-tree command.
pub fn run(
    path: &Path,
    header: u64,
    descending: bool,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let mut tree = open_tree(&store, header)?;
    let direction = if descending {
        Direction::Descending
    } else {
        Direction::Ascending
    };

    println!(
        "Tree {} (degree {}, {}, {} values)",
        tree.name(),
        tree.degree(),
        if tree.is_unique() { "unique" } else { "multi-value" },
        tree.size()
    );

    let entries = tree.entries(direction)?;
    let shown = limit.unwrap_or(entries.len());
    for slot in entries.iter().take(shown) {
        let oids: Vec<String> = slot.value.oids().iter().map(ToString::to_string).collect();
        println!("{} => [{}]", slot.key, oids.join(", "));
    }
    if shown < entries.len() {
        println!("... {} more keys", entries.len() - shown);
    }

    Ok(())
}

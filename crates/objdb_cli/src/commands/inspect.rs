//! Inspect command implementation.

use super::{open_store, open_tree};
use objdb_storage::RecordKind;
use serde::Serialize;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Live object records.
    pub objects: u64,
    /// Live tree node records.
    pub nodes: u64,
    /// Tree headers.
    pub headers: u64,
    /// Highest OID in use.
    pub highest_oid: Option<u64>,
    /// Index trees (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trees: Option<Vec<TreeInfo>>,
}

/// One index tree.
#[derive(Debug, Serialize)]
pub struct TreeInfo {
    /// Header OID.
    pub header: u64,
    /// Tree name.
    pub name: String,
    /// Degree.
    pub degree: usize,
    /// Unique or multi-value.
    pub unique: bool,
    /// Stored values.
    pub size: u64,
    /// Root node OID.
    pub root: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_trees: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let stats = store.stats()?;

    let mut result = InspectResult {
        path: path.display().to_string(),
        file_size: stats.bytes,
        objects: stats.objects,
        nodes: stats.nodes,
        headers: stats.headers,
        highest_oid: stats.highest_oid,
        trees: None,
    };

    if show_trees {
        let mut trees = Vec::new();
        for oid in store.oids_of(RecordKind::TreeHeader) {
            let tree = open_tree(&store, oid.as_u64())?;
            let header = tree.header();
            trees.push(TreeInfo {
                header: oid.as_u64(),
                name: header.name,
                degree: header.degree,
                unique: header.unique,
                size: header.size,
                root: header.root.as_u64(),
            });
        }
        result.trees = Some(trees);
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Database: {}", result.path);
    println!();
    println!("Size:        {} bytes", result.file_size);
    println!("Objects:     {}", result.objects);
    println!("Tree nodes:  {}", result.nodes);
    println!("Trees:       {}", result.headers);
    match result.highest_oid {
        Some(oid) => println!("Highest OID: {oid}"),
        None => println!("Highest OID: -"),
    }

    if let Some(trees) = &result.trees {
        println!();
        println!(
            "{:>8}  {:<24} {:>6} {:>7} {:>10} {:>8}",
            "header", "name", "degree", "kind", "size", "root"
        );
        for tree in trees {
            println!(
                "{:>8}  {:<24} {:>6} {:>7} {:>10} {:>8}",
                tree.header,
                tree.name,
                tree.degree,
                if tree.unique { "unique" } else { "multi" },
                tree.size,
                tree.root
            );
        }
    }
}

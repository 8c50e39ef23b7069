//! Verify command implementation.

use super::{open_store, open_tree};
use objdb_core::TreeReport;
use objdb_storage::RecordKind;
use std::path::Path;
use tracing::debug;

/// Runs the verify command.
pub fn run(path: &Path, tree: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying database at {:?}", path);
    println!();

    let store = open_store(path)?;
    let headers: Vec<u64> = match tree {
        Some(header) => vec![header],
        None => store
            .oids_of(RecordKind::TreeHeader)
            .into_iter()
            .map(|oid| oid.as_u64())
            .collect(),
    };

    let mut failures = 0usize;
    for header in headers {
        let mut tree = open_tree(&store, header)?;
        debug!(header, name = tree.name(), "validating tree");
        match tree.validate() {
            Ok(report) => print_report(header, tree.name(), &report),
            Err(err) => {
                failures += 1;
                println!("✗ {} (header {}): {}", tree.name(), header, err);
            }
        }
    }

    println!();
    if failures == 0 {
        println!("✓ Tree verification passed");
        Ok(())
    } else {
        println!("✗ Tree verification failed");
        Err(format!("{failures} tree(s) failed verification").into())
    }
}

fn print_report(header: u64, name: &str, report: &TreeReport) {
    println!(
        "✓ {} (header {}): depth {}, {} nodes, {} keys, {} values",
        name, header, report.depth, report.nodes, report.keys, report.values
    );
}

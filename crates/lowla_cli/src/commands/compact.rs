//! Compact command implementation.

use super::open_log;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_log(path)?;
    let before = log.log_size()?;

    println!("Compacting log at {}", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
        println!("  Size: {before} bytes");
        return Ok(());
    }

    log.compact()?;
    let after = log.log_size()?;
    println!("  Size before: {before} bytes");
    println!("  Size after:  {after} bytes");
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        before.saturating_sub(after),
        if before > 0 {
            (before.saturating_sub(after) as f64 / before as f64) * 100.0
        } else {
            0.0
        }
    );
    println!("✓ Compaction complete");
    Ok(())
}

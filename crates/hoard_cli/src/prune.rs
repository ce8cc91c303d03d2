//! `hoard prune`: trims a project's entries in the local cache.

use hoard_common::ProjectId;
use hoard_store::eviction::retain_newest;
use hoard_store::CacheLayout;

use crate::{GlobalArgs, PruneArgs};

/// Runs the `hoard prune` command.
///
/// Keeps the `--keep` most recently modified fingerprint directories of the
/// project and deletes the rest.
pub fn run(args: &PruneArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = global.load_config()?;
    let layout = CacheLayout::new(
        &config.local.resolve_root(&global.root),
        config.record_format,
    );
    let project = ProjectId::new(&args.group, &args.artifact, "");
    let dir = layout.project_dir(&project);
    let removed = retain_newest(&dir, args.keep, None)?;
    tracing::info!(dir = %dir.display(), removed, "pruned local cache");
    if !global.quiet {
        eprintln!(
            "    Removed {removed} cached builds of {}:{}",
            args.group, args.artifact
        );
    }
    Ok(0)
}

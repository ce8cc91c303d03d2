//! `hoard check-config`: validates a cache configuration.

use std::path::Path;

use hoard_config::{CacheConfig, CacheRules};

use crate::GlobalArgs;

/// Runs the `hoard check-config` command.
///
/// Loads and validates the configuration at `path`, or the one `--config`
/// and the build root select, and prints its effective settings.
pub fn run(path: Option<&Path>, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let global = GlobalArgs {
        quiet: global.quiet,
        config: path.map(Path::to_path_buf).or_else(|| global.config.clone()),
        root: global.root.clone(),
    };
    let config = global.load_config()?;
    CacheRules::resolve(&config)?;
    if !global.quiet {
        print!("{}", describe(&config, &global.root));
    }
    Ok(0)
}

fn describe(config: &CacheConfig, root: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!("enabled:          {}\n", config.enabled));
    out.push_str(&format!("hash algorithm:   {}\n", config.hash_algorithm()));
    out.push_str(&format!("record format:    {}\n", config.record_format.extension()));
    out.push_str(&format!(
        "local cache:      {} (keeps {} builds)\n",
        config.local.resolve_root(root).display(),
        config.local.max_builds_cached
    ));
    match config.remote.url.as_deref().filter(|_| config.remote_enabled()) {
        Some(url) => out.push_str(&format!(
            "remote:           {url}{}\n",
            if config.save_to_remote() { " (saving)" } else { "" }
        )),
        None => out.push_str("remote:           disabled\n"),
    }
    if let Some(url) = &config.baseline.url {
        out.push_str(&format!("baseline report:  {url}\n"));
    }
    if config.fail_fast {
        out.push_str("fail-fast:        on\n");
    }
    out.push_str(&format!(
        "tracked goals:    {}\n",
        config.execution.reconcile.goals.len()
    ));
    out
}

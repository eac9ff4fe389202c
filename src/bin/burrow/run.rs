//! Shared implementation of every verb.

use std::path::Path;

use anyhow::{bail, Context, Result};

use burrow::targets::{project_name, ProjectFactory};
use burrow::util::config::{global_config_path, load_config, project_config_path, ALL_TARGETS};
use burrow::{BuildConfig, DependencyGraph, RemoteCache, Verb};

use crate::cli::RunArgs;

/// Merge file configuration and command-line options. Command-line options
/// win.
fn build_config(verb: Verb, args: &RunArgs, root_dir: &Path) -> BuildConfig {
    let file_config = load_config(
        global_config_path().as_deref(),
        &project_config_path(root_dir),
    );

    let mut config = BuildConfig::for_verb(verb);
    config.apply_file_config(&file_config);

    config.target = args.target.clone();
    if verb == Verb::Update && config.target.is_none() {
        config.target = Some(ALL_TARGETS.to_string());
    }
    if args.release {
        config.release = true;
    }
    if args.debug {
        config.release = false;
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs.max(1);
    }
    if args.parallel {
        config.parallel = true;
    }
    if args.remote.is_some() {
        config.remote_url = args.remote.clone();
    }
    if args.workspaces_root.is_some() {
        config.workspaces_root = args.workspaces_root.clone();
    }
    config.no_remote = args.no_remote;
    config.force_remote = args.force_remote;
    config.upload_if_needed |= args.if_needed;
    config
}

pub fn execute(verb: Verb, args: &RunArgs) -> Result<()> {
    let root_dir = std::env::current_dir().context("failed to determine current directory")?;
    let config = build_config(verb, args, &root_dir);

    let remote = match (&config.remote_url, config.no_remote) {
        (Some(url), false) => Some(RemoteCache::from_url(url, config.remote_timeout)?),
        _ => None,
    };
    if config.upload && remote.is_none() {
        bail!("`upload` needs a remote cache: pass --remote or set `[remote] url`");
    }

    let name = project_name(&root_dir)?;
    tracing::debug!("project `{}` in {}", name, root_dir.display());
    let graph = DependencyGraph::new(&name, &root_dir, config, Box::new(ProjectFactory), remote);

    graph.load()?;

    if graph.config().list {
        for line in graph.list() {
            println!("{}", line);
        }
        return Ok(());
    }

    if graph.config().build {
        graph.execute()?;
        tracing::info!("{} finished", name);
    }
    Ok(())
}

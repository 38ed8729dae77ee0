// src/commands.rs
//! Command handlers for the rdfbundle CLI

use anyhow::{Context as _, Result};
use rdfbundle::bundle::{find_bundle_directory, installed_versions};
use rdfbundle::{
    archive, retrieve_remotes, verify_bundle, AccessorConfig, Bundle, Descriptor, Fetcher,
    Installer, LoaderRegistry, MemoryStore, Remote, Settings,
};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// Settings shared by every command
pub struct Context {
    pub project_dir: PathBuf,
    pub settings: Settings,
}

impl Context {
    fn registry(&self) -> LoaderRegistry {
        LoaderRegistry::with_defaults(self.settings.loader_options())
    }

    fn bundle(&self, id: &str, version: Option<u64>) -> Bundle {
        let bundle = Bundle::new(id, &self.settings.bundles_directory)
            .with_project_dir(&self.project_dir)
            .with_registry(self.registry());
        match version {
            Some(v) => bundle.with_version(v),
            None => bundle,
        }
    }
}

/// Install a bundle from a descriptor and an N-Quads source
pub fn cmd_install(
    ctx: &Context,
    descriptor_path: &Path,
    source: &Path,
    source_dir: &Path,
    imports_context: Option<String>,
    default_context: Option<String>,
) -> Result<()> {
    let descriptor = Descriptor::load(descriptor_path)?;
    info!("Loading source graphs from {}", source.display());
    let file = File::open(source).with_context(|| format!("Cannot open {}", source.display()))?;
    let store = MemoryStore::load_nquads(BufReader::new(file), default_context.as_deref())?;

    let mut installer = Installer::new(source_dir, &ctx.settings.bundles_directory, &store)
        .with_project_dir(&ctx.project_dir)
        .with_registry(ctx.registry());
    if let Some(id) = &ctx.settings.installer_id {
        installer = installer.with_installer_id(id);
    }
    if let Some(imports) = imports_context {
        installer = installer.with_imports_context(imports);
    }
    if let Some(default) = default_context {
        installer = installer.with_default_context(default);
    }

    let dir = installer.install(&descriptor)?;
    println!("Installed {} at {}", descriptor, dir.display());
    Ok(())
}

pub fn cmd_fetch(ctx: &Context, bundle: &str, version: Option<u64>) -> Result<()> {
    let remotes = retrieve_remotes(&ctx.project_dir)?;
    if remotes.is_empty() {
        anyhow::bail!("No remotes configured in {}", ctx.project_dir.display());
    }
    let registry = ctx.registry();
    let mut fetcher = Fetcher::new(&ctx.settings.bundles_directory, &registry);
    if let Some(id) = &ctx.settings.installer_id {
        fetcher = fetcher.with_holder(id);
    }
    let dir = fetcher.fetch(&remotes, bundle, version)?;
    println!("Fetched {} into {}", bundle, dir.display());
    Ok(())
}

pub fn cmd_contexts(ctx: &Context, bundle: &str, version: Option<u64>) -> Result<()> {
    let mut handle = ctx.bundle(bundle, version);
    for context in handle.contexts()? {
        println!("{}", context);
    }
    Ok(())
}

pub fn cmd_versions(ctx: &Context, bundle: &str, remote: bool) -> Result<()> {
    let installed = installed_versions(&ctx.settings.bundles_directory, bundle)?;
    if installed.is_empty() {
        println!("No installed versions of {}", bundle);
    } else {
        println!("Installed: {}", join(&installed));
    }

    if remote {
        let registry = ctx.registry();
        for r in retrieve_remotes(&ctx.project_dir)? {
            for mut loader in r.generate_loaders(&registry) {
                match loader.bundle_versions(bundle) {
                    Ok(versions) if !versions.is_empty() => {
                        println!("{} ({}): {}", r.name, loader.describe(), join(&versions))
                    }
                    Ok(_) => println!("{} ({}): none", r.name, loader.describe()),
                    Err(e) => println!("{} ({}): error: {}", r.name, loader.describe(), e),
                }
            }
        }
    }
    Ok(())
}

pub fn cmd_pack(ctx: &Context, bundle: &str, version: Option<u64>, output: &Path) -> Result<()> {
    let dir = find_bundle_directory(&ctx.settings.bundles_directory, bundle, version)?;
    archive::pack_bundle(&dir, output)?;
    println!("Packed {} into {}", dir.display(), output.display());
    Ok(())
}

pub fn cmd_verify(ctx: &Context, bundle: &str, version: Option<u64>) -> Result<()> {
    let dir = find_bundle_directory(&ctx.settings.bundles_directory, bundle, version)?;
    let report = verify_bundle(&dir)?;
    println!(
        "Checked {} graphs and {} files in {}",
        report.graphs_checked,
        report.files_checked,
        dir.display()
    );
    if report.is_ok() {
        return Ok(());
    }
    for problem in &report.problems {
        println!("  {}", problem);
    }
    anyhow::bail!("{} problems found", report.problems.len())
}

pub fn cmd_remote_add(ctx: &Context, name: &str, url: &str) -> Result<()> {
    let existing = Remote::new(name).file_path(&rdfbundle::config::remotes_dir(&ctx.project_dir));
    let mut remote = if existing.exists() {
        Remote::load(&existing)?
    } else {
        Remote::new(name)
    };
    if !remote.add_config(AccessorConfig::url(url)?) {
        println!("Remote {} already has {}", name, url);
        return Ok(());
    }
    let path = remote.save(&ctx.project_dir)?;
    println!("Saved remote {} to {}", name, path.display());
    Ok(())
}

pub fn cmd_remote_list(ctx: &Context) -> Result<()> {
    let remotes = retrieve_remotes(&ctx.project_dir)?;
    if remotes.is_empty() {
        println!("No remotes configured");
    }
    for remote in remotes {
        println!("{}", remote);
    }
    Ok(())
}

fn join(versions: &[u64]) -> String {
    versions
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

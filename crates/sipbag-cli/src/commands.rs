use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use sipbag_bag::{BagVerifier, VerifyReport};
use sipbag_manifest::TreeManifest;
use sipbag_migrate::{target_locator, DirectoryTarget, InMemoryRepository, MigrateConfig, Migrator, Scope};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.scratch)?;
    match cli.command {
        Command::Export(args) => cmd_export(config, args),
        Command::Import(args) => cmd_import(config, args).await,
        Command::Replay(args) => cmd_replay(config, args),
        Command::Verify(args) => cmd_verify(config, args),
    }
}

/// File settings first, then command-line overrides.
fn load_config(path: Option<&Path>, scratch: Option<PathBuf>) -> anyhow::Result<MigrateConfig> {
    let mut config = match path {
        Some(path) => MigrateConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => MigrateConfig::default(),
    };
    if let Some(scratch) = scratch {
        config.scratch_dir = scratch;
    }
    Ok(config)
}

fn cmd_export(mut config: MigrateConfig, args: ExportArgs) -> anyhow::Result<()> {
    config.migrate |= args.migrate;
    if let Some(algorithm) = args.algorithm {
        config.digest_algorithm = algorithm;
    }
    let scope: Scope = args.identifier.parse()?;
    let source = InMemoryRepository::from_json_file(&args.source)
        .with_context(|| format!("reading source {}", args.source.display()))?;

    let mut migrator = Migrator::new(config)?;
    let summary = migrator.export(&source, &scope)?;

    for entry in migrator.manifest() {
        let indent = "  ".repeat(entry.depth as usize);
        println!("  {}{} {}", indent, entry.kind.to_string().cyan(), entry.id);
    }
    println!(
        "{} Exported {} ({} packages, {})",
        "✓".green().bold(),
        scope.to_string().yellow(),
        summary.packages.len().to_string().bold(),
        migrator.config().digest_algorithm,
    );
    println!("  Manifest: {}", summary.manifest_path.display());
    Ok(())
}

async fn cmd_import(config: MigrateConfig, args: ImportArgs) -> anyhow::Result<()> {
    let target = DirectoryTarget::new(&args.drop_dir)
        .with_context(|| format!("opening drop directory {}", args.drop_dir.display()))?;
    let mut migrator = Migrator::new(config)?;
    let summary = migrator.import_to(&target, &args.target).await?;

    for delivery in &summary.deliveries {
        let retried = if delivery.attempts > 1 {
            format!(" (attempt {})", delivery.attempts).yellow().to_string()
        } else {
            String::new()
        };
        println!("  {} {} → {}{}", "uploaded:".green(), delivery.id, delivery.locator.blue(), retried);
    }
    println!(
        "{} Imported {} packages into {}",
        "✓".green().bold(),
        summary.deliveries.len().to_string().bold(),
        target.root().display(),
    );
    Ok(())
}

fn cmd_replay(config: MigrateConfig, args: ReplayArgs) -> anyhow::Result<()> {
    let path = config.manifest_path();
    let manifest = TreeManifest::load(&path).with_context(|| format!("loading {}", path.display()))?;
    if config.strict_manifest {
        manifest.validate()?;
    }
    for step in manifest.replay() {
        let parent = step.parent.unwrap_or("-");
        print!(
            "{:>4} {} {} {} {}",
            step.index,
            step.entry.depth,
            step.entry.kind.to_string().cyan(),
            step.entry.id,
            parent.dimmed(),
        );
        match &args.target {
            Some(base) => println!(" {}", target_locator(base, step.parent, step.entry.kind).blue()),
            None => println!(),
        }
    }
    println!("{} Replayed {} entries", "✓".green().bold(), manifest.len());
    Ok(())
}

fn cmd_verify(config: MigrateConfig, args: VerifyArgs) -> anyhow::Result<()> {
    let bags = if args.bags.is_empty() {
        discover_bags(&config.scratch_dir)?
    } else {
        args.bags
    };
    if bags.is_empty() {
        println!("No packages in {}.", config.scratch_dir.display());
        return Ok(());
    }

    let mut failed = 0;
    for bag in &bags {
        let report = BagVerifier::open(bag)?.verify()?;
        if report.is_valid() {
            println!("  {} {} ({} files)", "ok".green(), bag.display(), report.checked);
        } else {
            failed += 1;
            println!("  {} {}", "FAILED".red().bold(), bag.display());
            print_problems(&report);
        }
    }
    if failed > 0 {
        bail!("{failed} of {} packages failed verification", bags.len());
    }
    println!("{} {} packages verified", "✓".green().bold(), bags.len());
    Ok(())
}

fn print_problems(report: &VerifyReport) {
    for path in &report.missing {
        println!("    missing: {path}");
    }
    for m in &report.mismatched {
        println!("    changed: {} (expected {}, found {})", m.path, m.expected.dimmed(), m.actual);
    }
    for path in &report.unlisted {
        println!("    unlisted: {path}");
    }
    if let Some((declared, actual)) = &report.oxum_mismatch {
        println!("    Payload-Oxum: declared {declared}, actual {actual}");
    }
}

/// Package directories directly under `scratch`, sorted by name.
fn discover_bags(scratch: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !scratch.is_dir() {
        return Ok(Vec::new());
    }
    let mut bags = Vec::new();
    for entry in std::fs::read_dir(scratch)? {
        let path = entry?.path();
        if path.join("bagit.txt").is_file() {
            bags.push(path);
        }
    }
    bags.sort();
    Ok(bags)
}

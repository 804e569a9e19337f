use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dom::snapshot::outline_from_dom;
use dom::{DomPatch, Session};
use review::{LabelCheck, ReviewConfig, VerificationReport, start_annotation_service, verify_field};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Review configuration (TOML); built-in defaults when omitted
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a page script, annotate it, then run field checks
    Run {
        /// JSON list of patch batches; the first one builds the initial page
        #[arg(long, value_name = "FILE")]
        page: PathBuf,
        /// Named set of checks from the configuration
        #[arg(long)]
        preset: Option<String>,
        /// Extra check (format: LABEL=EXPECTED)
        #[arg(long = "check", value_name = "LABEL=EXPECTED", value_parser = parse_check)]
        checks: Vec<LabelCheck>,
        /// Maximum number of nodes in the printed outline
        #[arg(long, default_value_t = 200)]
        outline_cap: usize,
    },
    /// List configured presets
    Presets,
}

fn parse_check(raw: &str) -> Result<LabelCheck, String> {
    let (label, expected) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=EXPECTED, got {raw:?}"))?;
    if label.trim().is_empty() {
        return Err("label must not be empty".to_string());
    }
    Ok(LabelCheck {
        label: label.to_string(),
        expected: expected.to_string(),
    })
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ReviewConfig> {
    // `load` validates; the built-in defaults are covered by config tests.
    Ok(match path {
        Some(path) => ReviewConfig::load(path)?,
        None => ReviewConfig::default(),
    })
}

fn load_page(path: &Path) -> anyhow::Result<Vec<Vec<DomPatch>>> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("parsing page script {}", path.display()))
}

fn run(
    config: &ReviewConfig,
    page: &Path,
    preset: Option<&str>,
    extra: &[LabelCheck],
    outline_cap: usize,
) -> anyhow::Result<ExitCode> {
    let mut checks = Vec::new();
    if let Some(name) = preset {
        let Some(preset) = config.preset(name) else {
            bail!("unknown preset {name:?}");
        };
        checks.extend(preset.checks.iter().cloned());
    }
    checks.extend(extra.iter().cloned());

    let batches = load_page(page)?;
    let Some((first, rest)) = batches.split_first() else {
        bail!("page script {} has no batches", page.display());
    };

    let mut session = Session::new();
    session.apply(first).context("applying initial page batch")?;
    let service = start_annotation_service(&mut session, &config.annotator)?;
    for (i, batch) in rest.iter().enumerate() {
        let stats = session
            .apply(batch)
            .with_context(|| format!("applying batch {}", i + 1))?;
        log::debug!("batch {}: {stats:?}", i + 1);
    }

    let mut report = VerificationReport::default();
    for check in &checks {
        let found = verify_field(session.tree_mut(), config, &check.label, &check.expected);
        if found.is_empty() {
            log::warn!("no container labelled {:?}", check.label);
        }
        report.extend(found);
    }

    let root = session.tree().materialize_root()?;
    for line in outline_from_dom(&root, outline_cap) {
        println!("{line}");
    }
    println!();
    for outcome in &report.outcomes {
        println!(
            "{} {} {}: actual {:?}, expected {:?}",
            outcome.container, outcome.label, outcome.classification, outcome.actual, outcome.expected
        );
    }
    let totals = service.stop(&session);
    println!(
        "{} checked, {} matched, {} mismatched; {} blocks annotated ({} occurrences)",
        report.outcomes.len(),
        report.matched(),
        report.mismatched(),
        totals.highlighted,
        totals.occurrences
    );

    Ok(if report.mismatched() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            page,
            preset,
            checks,
            outline_cap,
        } => run(&config, &page, preset.as_deref(), &checks, outline_cap),
        Commands::Presets => {
            for preset in &config.presets {
                println!("{}", preset.name);
                for check in &preset.checks {
                    println!("  {} = {}", check.label, check.expected);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_check;

    #[test]
    fn check_argument_splits_on_first_equals() {
        let check = parse_check("Workflow:=a=b").unwrap();
        assert_eq!(check.label, "Workflow:");
        assert_eq!(check.expected, "a=b");
        assert!(parse_check("Workflow:").is_err());
        assert!(parse_check("=x").is_err());
    }
}

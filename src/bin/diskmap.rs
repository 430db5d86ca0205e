//! Disk map compactor CLI
//!
//! Loads a compressed disk map, compacts it with one or both policies and
//! prints the resulting filesystem checksums.

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use diskmap_rs::{checksum, CompactionReport, Compactor, DiskMap, Policy};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "diskmap")]
#[command(about = "Compact a run-length disk map and report its checksum")]
struct Args {
    /// Input file holding the disk map on its first non-blank line ("-" for stdin)
    input: PathBuf,

    /// Compaction policy to run: fragmenting, whole-extent or both
    #[arg(short, long, value_parser = parse_policies, default_value = "both")]
    policy: PolicySelection,

    /// Print the block layout before and after each pass
    #[arg(short, long)]
    show: bool,

    /// Emit a JSON document instead of plain text
    #[arg(long)]
    json: bool,

    /// Check the partition invariant after every relocated file
    #[arg(long)]
    verify_steps: bool,

    /// Fail unless the fragmenting checksum equals this value
    #[arg(long)]
    expect_fragmenting: Option<u128>,

    /// Fail unless the whole-extent checksum equals this value
    #[arg(long)]
    expect_whole_extent: Option<u128>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Policies selected on the command line, in the order they run
#[derive(Clone, Debug, PartialEq, Eq)]
struct PolicySelection(Vec<Policy>);

fn parse_policies(s: &str) -> Result<PolicySelection, String> {
    if s.eq_ignore_ascii_case("both") {
        return Ok(PolicySelection(vec![
            Policy::Fragmenting,
            Policy::WholeExtent,
        ]));
    }

    s.parse::<Policy>()
        .map(|policy| PolicySelection(vec![policy]))
        .map_err(|e| format!("{}, both", e))
}

#[derive(Serialize)]
struct PassOutput {
    checksum: u128,
    report: CompactionReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    layout: Option<String>,
}

#[derive(Serialize)]
struct Output {
    input: String,
    files: usize,
    total_blocks: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    layout: Option<String>,
    passes: Vec<PassOutput>,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load(input: &Path) -> anyhow::Result<DiskMap> {
    if input.as_os_str() == "-" {
        return DiskMap::from_reader(std::io::stdin().lock())
            .context("failed to load disk map from stdin");
    }

    DiskMap::from_path(input).with_context(|| format!("failed to load disk map from {:?}", input))
}

fn expected_for(args: &Args, policy: Policy) -> Option<u128> {
    match policy {
        Policy::Fragmenting => args.expect_fragmenting,
        Policy::WholeExtent => args.expect_whole_extent,
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    info!("Loading disk map: {:?}", args.input);
    let map = load(&args.input)?;
    info!(
        "Disk map has {} files over {} blocks",
        map.files().len(),
        map.total_blocks()
    );

    let mut output = Output {
        input: args.input.display().to_string(),
        files: map.files().len(),
        total_blocks: map.total_blocks(),
        layout: args.show.then(|| map.render_blocks()),
        passes: Vec::new(),
    };

    for &policy in &args.policy.0 {
        let mut working = map.clone();
        let report = Compactor::builder()
            .policy(policy)
            .verify_each_step(args.verify_steps)
            .build()
            .run(&mut working);

        output.passes.push(PassOutput {
            checksum: checksum(working.files()),
            report,
            layout: args.show.then(|| working.render_blocks()),
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        if let Some(layout) = &output.layout {
            println!("initial:      {}", layout);
        }
        for pass in &output.passes {
            if let Some(layout) = &pass.layout {
                println!("{:<13} {}", format!("{}:", pass.report.policy), layout);
            }
        }
        for pass in &output.passes {
            println!("{} checksum: {}", pass.report.policy, pass.checksum);
        }
    }

    for pass in &output.passes {
        if let Some(expected) = expected_for(&args, pass.report.policy) {
            if pass.checksum != expected {
                bail!(
                    "{} checksum mismatch: got {}, expected {}",
                    pass.report.policy,
                    pass.checksum,
                    expected
                );
            }
            info!("{} checksum matches expected value", pass.report.policy);
        }
    }

    Ok(())
}

//! `pge` command-line interface
//!
//! Subcommands: `ci` (governance pipeline, exit 0 iff all executed
//! stages pass), `artifact` (lifecycle operations), `execute` (run one
//! executor variant) and `ledger` (inspection).

mod config;

use std::collections::BTreeSet;
use std::path::Path;
use std::process::exit;

use clap::{value_parser, Arg, ArgAction, Command};

use pge_artifact::{
    ApprovalBook, ArtifactId, ArtifactKind, ArtifactLifecycle, ArtifactStore, FsArtifactStore,
};
use pge_capability::CapabilityRegistry;
use pge_executor::{
    DiffApplyExecutor, ExecutionMode, ExecutorEngine, ExecutorVariant, RefactorExecutor,
    ScaffoldExecutor,
};
use pge_governance::{
    CommandTestRunner, GitVcs, GovernanceContext, GovernancePipeline,
};
use pge_ledger::{DiffArchive, Ledger};

use config::PgeConfig;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Command::new("pge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plan Governance Engine")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .default_value("pge.toml")
                .help("Path to the configuration file"),
        )
        .subcommand(
            Command::new("ci")
                .about("Run the governance pipeline")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the CI result document as JSON"),
                )
                .arg(
                    Arg::new("keep-going")
                        .long("keep-going")
                        .action(ArgAction::SetTrue)
                        .help("Run all stages instead of stopping at the first failure"),
                ),
        )
        .subcommand(
            Command::new("artifact")
                .about("Artifact lifecycle operations")
                .subcommand_required(true)
                .subcommand(
                    Command::new("create")
                        .about("Create a DRAFT artifact from a payload file")
                        .arg(Arg::new("kind").long("kind").required(true).help(
                            "Artifact kind slug (e.g. scaffold-plan, implementation-plan)",
                        ))
                        .arg(
                            Arg::new("payload")
                                .long("payload")
                                .required(true)
                                .help("Path to the JSON payload"),
                        )
                        .arg(
                            Arg::new("depends-on")
                                .long("depends-on")
                                .action(ArgAction::Append)
                                .help("Dependency artifact id (repeatable)"),
                        ),
                )
                .subcommand(
                    Command::new("approve")
                        .about("Approve a DRAFT artifact")
                        .arg(Arg::new("id").required(true))
                        .arg(
                            Arg::new("by")
                                .long("by")
                                .required(true)
                                .help("Approver identity"),
                        ),
                )
                .subcommand(
                    Command::new("lock")
                        .about("Lock an APPROVED test plan")
                        .arg(Arg::new("id").required(true)),
                )
                .subcommand(
                    Command::new("review")
                        .about("Record a review without changing status")
                        .arg(Arg::new("id").required(true))
                        .arg(Arg::new("notes").long("notes").required(true)),
                )
                .subcommand(
                    Command::new("list").about("List artifacts").arg(
                        Arg::new("kind")
                            .long("kind")
                            .help("Only list this kind slug"),
                    ),
                ),
        )
        .subcommand(
            Command::new("execute")
                .about("Run one executor variant against an approved artifact")
                .arg(
                    Arg::new("variant")
                        .required(true)
                        .value_parser(["scaffold", "apply-diff", "refactor"]),
                )
                .arg(
                    Arg::new("artifact")
                        .long("artifact")
                        .required(true)
                        .help("Artifact id to execute"),
                )
                .arg(
                    Arg::new("apply")
                        .long("apply")
                        .action(ArgAction::SetTrue)
                        .help("Apply the diff; default is a dry run"),
                ),
        )
        .subcommand(
            Command::new("ledger")
                .about("Audit ledger inspection")
                .subcommand_required(true)
                .subcommand(Command::new("verify").about("Verify the ledger hash chain"))
                .subcommand(
                    Command::new("tail").about("Show recent entries").arg(
                        Arg::new("limit")
                            .long("limit")
                            .default_value("10")
                            .value_parser(value_parser!(usize)),
                    ),
                ),
        );

    let matches = cli.get_matches();
    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("pge.toml");

    let outcome = run(&matches, Path::new(config_path));
    match outcome {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            exit(2);
        }
    }
}

fn run(matches: &clap::ArgMatches, config_path: &Path) -> anyhow::Result<i32> {
    let config = PgeConfig::load(config_path)?;

    match matches.subcommand() {
        Some(("ci", args)) => run_ci(&config, args.get_flag("json"), args.get_flag("keep-going")),
        Some(("artifact", args)) => run_artifact(&config, args),
        Some(("execute", args)) => run_execute(&config, args),
        Some(("ledger", args)) => run_ledger(&config, args),
        _ => Ok(2),
    }
}

fn lifecycle(config: &PgeConfig) -> anyhow::Result<ArtifactLifecycle<FsArtifactStore>> {
    let store = FsArtifactStore::open(&config.artifacts_dir)?;
    let book = ApprovalBook::new(&config.approvals_path);
    Ok(ArtifactLifecycle::new(store, book))
}

fn registry(config: &PgeConfig) -> anyhow::Result<CapabilityRegistry> {
    Ok(match &config.capability_override {
        Some(path) => CapabilityRegistry::from_override_file(path)?,
        None => CapabilityRegistry::bundled(),
    })
}

fn run_ci(config: &PgeConfig, json: bool, keep_going: bool) -> anyhow::Result<i32> {
    let store = FsArtifactStore::open(&config.artifacts_dir)?;
    let book = ApprovalBook::new(&config.approvals_path);
    let ledger = Ledger::new(&config.ledger_path);
    let archive = DiffArchive::open(&config.diffs_dir)?;
    let vcs = GitVcs::new(&config.repo_root);
    let (program, args) = config
        .test_command
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("test_command must not be empty"))?;
    let runner = CommandTestRunner::new(program, args.iter().cloned(), &config.repo_root);

    let ctx = GovernanceContext {
        store: &store,
        book: &book,
        ledger: &ledger,
        archive: &archive,
        vcs: &vcs,
        runner: &runner,
        base_ref: &config.vcs_base_ref,
        governed_paths: &config.governed_paths,
    };

    let mut pipeline = GovernancePipeline::new();
    if keep_going {
        pipeline = pipeline.keep_going();
    }
    let result = pipeline.run(&ctx);

    if json {
        println!("{}", result.to_json());
    } else {
        for stage in &result.stages {
            let verdict = if stage.passed { "PASS" } else { "FAIL" };
            println!("{:<24} {} ({} ms)", stage.stage, verdict, stage.duration_ms);
            for failure in &stage.failures {
                let code = serde_json::to_string(&failure.code)?;
                println!("  {} {}", code.trim_matches('"'), failure.message);
                println!("    remediation: {}", failure.remediation);
            }
        }
        println!();
        println!(
            "governance: {} ({} ms)",
            if result.passed { "PASS" } else { "FAIL" },
            result.total_duration_ms
        );
    }

    Ok(i32::from(!result.passed))
}

fn run_artifact(config: &PgeConfig, args: &clap::ArgMatches) -> anyhow::Result<i32> {
    let lifecycle = lifecycle(config)?;
    match args.subcommand() {
        Some(("create", sub)) => {
            let kind: ArtifactKind = sub
                .get_one::<String>("kind")
                .map(String::as_str)
                .unwrap_or_default()
                .parse()?;
            let payload_path = sub.get_one::<String>("payload").map(String::as_str).unwrap_or_default();
            let payload: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(payload_path)?)?;
            let depends_on: BTreeSet<ArtifactId> = sub
                .get_many::<String>("depends-on")
                .unwrap_or_default()
                .map(|s| ArtifactId::new(s.clone()))
                .collect();

            let envelope = lifecycle.create(kind, payload, depends_on)?;
            println!("{}", envelope.id);
            Ok(0)
        }
        Some(("approve", sub)) => {
            let id = artifact_id(sub);
            let approver = sub.get_one::<String>("by").map(String::as_str).unwrap_or_default();
            let envelope = lifecycle.approve(&id, approver)?;
            println!("{} {}", envelope.id, envelope.status);
            Ok(0)
        }
        Some(("lock", sub)) => {
            let envelope = lifecycle.lock(&artifact_id(sub))?;
            println!("{} {}", envelope.id, envelope.status);
            Ok(0)
        }
        Some(("review", sub)) => {
            let notes = sub.get_one::<String>("notes").map(String::as_str).unwrap_or_default();
            let envelope = lifecycle.record_review(&artifact_id(sub), notes)?;
            println!("{} reviewed", envelope.id);
            Ok(0)
        }
        Some(("list", sub)) => {
            let envelopes = match sub.get_one::<String>("kind") {
                Some(slug) => lifecycle.store().list_by_kind(slug.parse()?)?,
                None => lifecycle.store().list_all()?,
            };
            for envelope in envelopes {
                println!("{:<10} {}", envelope.status.to_string(), envelope.id);
            }
            Ok(0)
        }
        _ => Ok(2),
    }
}

fn run_execute(config: &PgeConfig, args: &clap::ArgMatches) -> anyhow::Result<i32> {
    let store = FsArtifactStore::open(&config.artifacts_dir)?;
    let book = ApprovalBook::new(&config.approvals_path);
    let engine = ExecutorEngine::new(
        store,
        book,
        registry(config)?,
        Ledger::new(&config.ledger_path),
        DiffArchive::open(&config.diffs_dir)?,
        &config.repo_root,
    );

    let scaffold = ScaffoldExecutor::new();
    let diff_apply = DiffApplyExecutor::new();
    let refactor = RefactorExecutor::new();
    let variant: &dyn ExecutorVariant = match args
        .get_one::<String>("variant")
        .map(String::as_str)
        .unwrap_or_default()
    {
        "scaffold" => &scaffold,
        "apply-diff" => &diff_apply,
        "refactor" => &refactor,
        other => anyhow::bail!("unknown executor variant: {other}"),
    };

    let id = ArtifactId::new(
        args.get_one::<String>("artifact")
            .map(String::as_str)
            .unwrap_or_default(),
    );
    let mode = if args.get_flag("apply") {
        ExecutionMode::Apply
    } else {
        ExecutionMode::DryRun
    };

    let result = engine.execute(variant, &id, mode);
    for log in &result.logs {
        println!("{log}");
    }
    for diff in &result.diffs {
        println!("diff: {diff}");
    }
    for error in &result.errors {
        eprintln!("{error}");
    }
    Ok(i32::from(!result.succeeded()))
}

fn run_ledger(config: &PgeConfig, args: &clap::ArgMatches) -> anyhow::Result<i32> {
    let ledger = Ledger::new(&config.ledger_path);
    match args.subcommand() {
        Some(("verify", _)) => {
            let count = ledger.verify_chain()?;
            println!("ledger chain OK ({count} entries)");
            Ok(0)
        }
        Some(("tail", sub)) => {
            let limit = *sub.get_one::<usize>("limit").unwrap_or(&10);
            for entry in ledger.read_recent(limit)? {
                println!(
                    "{} {:<10} {:<8} {:<8} {} ({} ms)",
                    entry.timestamp_ms,
                    entry.executor,
                    entry.status.as_str(),
                    entry.mode.as_str(),
                    entry.artifact_id,
                    entry.duration_ms
                );
            }
            Ok(0)
        }
        _ => Ok(2),
    }
}

fn artifact_id(args: &clap::ArgMatches) -> ArtifactId {
    ArtifactId::new(
        args.get_one::<String>("id")
            .map(String::as_str)
            .unwrap_or_default(),
    )
}

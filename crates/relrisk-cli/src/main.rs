//! relrisk - Release Risk Gate CLI
//!
//! ## Commands
//!
//! - `assess`: run the full model-backed assessment for one release
//! - `policy check`: evaluate policy against a saved model response
//! - `policy show`: print the effective rule set

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

use relrisk_core::metrics::METRICS;
use relrisk_core::telemetry::init_tracing;
use relrisk_core::{
    emit_policy_evaluated, load_rule_set, parse_candidate, AssessmentSpan, Assessor,
    InputContextAssembler, JsonIncidentLoader,
    ModelConfig, OpenAiChatClient, PolicyEngine, ReleaseInput, ReleaseOutput, RetryPolicy,
    TemplatePromptRenderer,
};

/// Process exit code when `--fail-on-no-go` is set and the decision is NO_GO.
const NO_GO_EXIT_CODE: i32 = 2;

#[derive(Parser)]
#[command(name = "relrisk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Release risk gate: model judgment with a deterministic policy backstop", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a release and print the policy-checked result
    Assess(AssessArgs),

    /// Policy operations that never call the model
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
}

#[derive(clap::Args, Debug)]
struct AssessArgs {
    /// Release input JSON (reads stdin when omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Policy YAML file
    #[arg(long, env = "RELRISK_POLICY")]
    policy: Option<PathBuf>,

    /// Incident JSON file merged into the context
    #[arg(long, env = "RELRISK_INCIDENTS")]
    incidents: Option<PathBuf>,

    /// Total model attempts, including the first
    #[arg(long, default_value = "3")]
    max_attempts: u32,

    /// Per-attempt model timeout in milliseconds
    #[arg(long, default_value = "60000")]
    model_timeout_ms: u64,

    /// Model name (overrides RELRISK_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Model API base URL (overrides RELRISK_MODEL_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Exit with code 2 when the decision is NO_GO
    #[arg(long)]
    fail_on_no_go: bool,
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Evaluate policy against a saved model response
    Check {
        /// Release input JSON
        #[arg(short, long)]
        input: PathBuf,

        /// Raw model response to parse strictly
        #[arg(short, long)]
        candidate: PathBuf,

        /// Policy YAML file
        #[arg(long, env = "RELRISK_POLICY")]
        policy: Option<PathBuf>,
    },

    /// Print the effective rule set
    Show {
        /// Policy YAML file
        #[arg(long, env = "RELRISK_POLICY")]
        policy: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Assess(args) => cmd_assess(&args).await,
        Commands::Policy { action } => match action {
            PolicyAction::Check {
                input,
                candidate,
                policy,
            } => cmd_policy_check(&input, &candidate, policy.as_deref())
                .and_then(|out| print_json(&out))
                .map(|()| true),
            PolicyAction::Show { policy } => cmd_policy_show(policy.as_deref()).map(|_| true),
        },
    };

    METRICS.flush();

    match result {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(NO_GO_EXIT_CODE),
        Err(e) => Err(e),
    }
}

/// Returns `Ok(false)` only when `--fail-on-no-go` is set and the decision is NO_GO.
async fn cmd_assess(args: &AssessArgs) -> Result<bool> {
    let input = read_input(args.input.as_deref())?;
    let assessor = build_assessor(args)?;

    let token = CancellationToken::new();
    let _interrupt = cancel_on_interrupt(token.clone());

    let output = assessor
        .assess_cancellable(&input, &token)
        .await
        .with_context(|| format!("Assessment failed for {}#{}", input.repo, input.pr_number))?;

    print_json(&output)?;
    info!(decision = %output.decision, risk_score = output.risk_score, "assessment complete");

    Ok(!(args.fail_on_no_go && !output.is_go()))
}

fn build_assessor(args: &AssessArgs) -> Result<Assessor> {
    let rules = load_rule_set(args.policy.as_deref()).context("Failed to load policy config")?;

    let mut config = ModelConfig::from_env().context("Failed to configure model client")?;
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url.clone());
    }

    let mut context = InputContextAssembler::new();
    if let Some(path) = &args.incidents {
        context = context.with_incident_source(JsonIncidentLoader::new(path.clone()));
    }

    let retry = RetryPolicy {
        max_attempts: args.max_attempts,
        model_timeout_ms: args.model_timeout_ms,
        ..RetryPolicy::default()
    };
    retry.validate().context("Invalid retry settings")?;

    Ok(Assessor::new(
        context,
        TemplatePromptRenderer::new(),
        OpenAiChatClient::new(config),
    )
    .with_policy(PolicyEngine::new(rules))
    .with_retry(retry))
}

fn cmd_policy_check(
    input_path: &Path,
    candidate_path: &Path,
    policy: Option<&Path>,
) -> Result<ReleaseOutput> {
    let input = read_input(Some(input_path))?;
    let raw = std::fs::read_to_string(candidate_path)
        .with_context(|| format!("Failed to read candidate {}", candidate_path.display()))?;
    let candidate = parse_candidate(&raw).context("Candidate rejected by the response parser")?;

    let rules = load_rule_set(policy).context("Failed to load policy config")?;
    let context = InputContextAssembler::from_input(&input);

    let check_id = uuid::Uuid::new_v4().to_string();
    let _span = AssessmentSpan::enter(&check_id, &input.repo, input.pr_number);
    let output = PolicyEngine::new(rules).evaluate(&input, &context, &candidate);
    emit_policy_evaluated(&check_id, &output);
    Ok(output)
}

fn cmd_policy_show(policy: Option<&Path>) -> Result<relrisk_core::PolicyRuleSet> {
    let rules = load_rule_set(policy).context("Failed to load policy config")?;
    print_json(&rules)?;
    Ok(rules)
}

/// Read and validate a release input from `path`, or stdin when `None`.
fn read_input(path: Option<&Path>) -> Result<ReleaseInput> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read input from stdin")?;
            buf
        }
    };
    parse_input(&content)
}

fn parse_input(content: &str) -> Result<ReleaseInput> {
    let input: ReleaseInput =
        serde_json::from_str(content).context("Release input is not valid JSON")?;
    input.validate().context("Release input rejected")?;
    Ok(input)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Cancel `token` on Ctrl-C. Dropping the guard stops listening.
fn cancel_on_interrupt(token: CancellationToken) -> tokio_util::sync::DropGuard {
    let guard = CancellationToken::new();
    let stop = guard.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = stop.cancelled() => {}
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    tracing::warn!("interrupt received, cancelling assessment");
                    token.cancel();
                }
            }
        }
    });
    guard.drop_guard()
}

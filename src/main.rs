// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dspactl::check;
use dspactl::config::{Config, SubmitStrategy};
use dspactl::constants::{defaults, timing};
use dspactl::deploy::{manifests, Applier, Manifest};
use dspactl::error::DeployError;
use dspactl::kubernetes::{create_client, resolve_bearer_token, Tunnel};
use dspactl::report::Report;
use dspactl::submit::params::{self, parse_assignment, PipelineParameters};
use dspactl::submit::{
    watch, ManagedApiSubmitter, PipelineApiClient, RunRequest, RunSubmitter, WorkflowSubmitter,
};
use dspactl::validate::Validator;

#[derive(Parser)]
#[command(name = "dspactl", version)]
#[command(about = "Deploy Data Science Pipelines and submit InstructLab runs", long_about = None)]
struct Cli {
    /// Target namespace
    #[arg(long, short = 'n', global = true)]
    namespace: Option<String>,

    /// Name of the DataSciencePipelinesApplication
    #[arg(long, global = true)]
    name: Option<String>,

    /// Pipeline API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token for the pipeline API
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check local tools and cluster prerequisites
    Check,
    /// Apply namespace, identity, secrets and the pipelines application
    Deploy {
        /// Directory of secret manifests to apply
        #[arg(long)]
        secrets_dir: Option<PathBuf>,
        /// Directory of extra manifests to apply
        #[arg(long)]
        manifests_dir: Option<PathBuf>,
        /// Seconds to wait for the application to become Ready
        #[arg(long)]
        timeout: Option<u64>,
        /// Seconds between readiness checks
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Verify a deployment
    Validate {
        /// Skip the tunnelled API liveness probe
        #[arg(long)]
        skip_liveness: bool,
    },
    /// Submit an InstructLab pipeline run
    Submit {
        #[arg(long)]
        repo_url: Option<String>,
        #[arg(long)]
        taxonomy_path: Option<String>,
        #[arg(long)]
        base_model: Option<String>,
        #[arg(long)]
        output_model_name: Option<String>,
        /// Extra parameter as name=value; typed per the parameter schema
        #[arg(long = "param", value_name = "NAME=VALUE")]
        extra_params: Vec<String>,
        /// Start from an empty parameter set instead of the training profile
        #[arg(long)]
        no_profile: bool,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long, value_enum)]
        strategy: Option<SubmitStrategy>,
        /// Workflow template for the workflow strategy
        #[arg(long)]
        workflow_template: Option<PathBuf>,
        /// Reach the API through a temporary port-forward
        #[arg(long)]
        tunnel: bool,
        /// Poll the run until it finishes
        #[arg(long)]
        watch: bool,
    },
    /// Show the state of a run
    Status {
        run_id: String,
        #[arg(long, value_enum)]
        strategy: Option<SubmitStrategy>,
        #[arg(long)]
        tunnel: bool,
        /// Poll until the run finishes
        #[arg(long)]
        watch: bool,
        /// Seconds to keep watching
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Create or update a credential secret from literal values
    CreateSecret {
        name: String,
        #[arg(long = "from-literal", value_name = "KEY=VALUE", required = true)]
        literals: Vec<String>,
    },
    /// Mark the InstructLab pipeline as managed on the application
    EnablePipeline,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            let hint = e
                .downcast_ref::<DeployError>()
                .and_then(DeployError::remediation);
            if let Some(hint) = hint {
                eprintln!("hint: {}", hint);
            }
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = Config::from_env()?;
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }
    if let Some(name) = cli.name {
        config.application_name = name;
    }
    if cli.api_url.is_some() {
        config.api_url = cli.api_url;
    }
    if cli.token.is_some() {
        config.token = cli.token;
    }
    info!(
        "Configuration loaded: namespace={}, application={}",
        config.namespace, config.application_name
    );

    match cli.command {
        Commands::Check => Ok(print_report(&check::run(&config).await)),
        Commands::Deploy {
            secrets_dir,
            manifests_dir,
            timeout,
            interval,
        } => {
            if let Some(secs) = timeout {
                config.ready_timeout = Duration::from_secs(secs);
            }
            if let Some(secs) = interval {
                config.poll_interval = Duration::from_secs(secs);
            }
            deploy(config, secrets_dir, manifests_dir).await
        }
        Commands::Validate { skip_liveness } => {
            let client = create_client().await?;
            let report = Validator::new(client, config).run(!skip_liveness).await;
            Ok(print_report(&report))
        }
        Commands::Submit {
            repo_url,
            taxonomy_path,
            base_model,
            output_model_name,
            extra_params,
            no_profile,
            display_name,
            strategy,
            workflow_template,
            tunnel,
            watch,
        } => {
            if let Some(strategy) = strategy {
                config.submit_strategy = strategy;
            }
            if workflow_template.is_some() {
                config.workflow_template = workflow_template;
            }

            let mut parameters = if no_profile {
                PipelineParameters::new()
            } else {
                PipelineParameters::training_profile(&config)
            };
            parameters
                .set_opt(params::REPO_URL, repo_url.as_deref())
                .set_opt(params::TAXONOMY_PATH, taxonomy_path.as_deref())
                .set_opt(params::BASE_MODEL, base_model.as_deref())
                .set_opt(params::OUTPUT_MODEL_NAME, output_model_name.as_deref());
            for raw in &extra_params {
                let (name, value) = parse_assignment(raw)?;
                parameters.set(name, value);
            }

            let display_name = display_name.unwrap_or_else(|| {
                format!("instructlab-{}", output_model_name.as_deref().unwrap_or("run"))
            });
            let request = RunRequest::new(display_name, "Submitted by dspactl", parameters)?;
            let config = &config;
            with_submitter(config, tunnel, |submitter| async move {
                let submitted = submitter.submit(&request).await?;
                println!("Run submitted: {}", submitted.run_id);
                if watch {
                    watch_run(submitter.as_ref(), &submitted.run_id, config, None).await
                } else {
                    Ok(0)
                }
            })
            .await
        }
        Commands::Status {
            run_id,
            strategy,
            tunnel,
            watch,
            timeout,
        } => {
            if let Some(strategy) = strategy {
                config.submit_strategy = strategy;
            }
            let config = &config;
            with_submitter(config, tunnel, |submitter| async move {
                if watch {
                    watch_run(submitter.as_ref(), &run_id, config, timeout).await
                } else {
                    let status = submitter.status(&run_id).await?;
                    println!("{}", status);
                    Ok(if status.finished && !status.succeeded { 1 } else { 0 })
                }
            })
            .await
        }
        Commands::CreateSecret { name, literals } => {
            let pairs = literals
                .iter()
                .map(|raw| manifests::parse_literal(raw))
                .collect::<Result<Vec<_>, _>>()?;
            let applier = Applier::new(create_client().await?, config.clone());
            applier.apply(&manifests::namespace(&config)).await?;
            applier
                .apply(&manifests::secret_from_literals(&config, &name, &pairs))
                .await?;
            println!("Secret {}/{} applied ({} keys)", config.namespace, name, pairs.len());
            Ok(0)
        }
        Commands::EnablePipeline => {
            let applier = Applier::new(create_client().await?, config.clone());
            applier.enable_managed_pipeline().await?;
            println!(
                "InstructLab pipeline set to Managed on {}/{}",
                config.namespace, config.application_name
            );
            Ok(0)
        }
    }
}

async fn deploy(
    config: Config,
    secrets_dir: Option<PathBuf>,
    manifests_dir: Option<PathBuf>,
) -> Result<i32> {
    let mut plan = manifests::default_plan(&config);
    for dir in [secrets_dir, manifests_dir].into_iter().flatten() {
        let loaded = Manifest::load_dir(&dir, &config.namespace)
            .with_context(|| format!("Failed to load manifests from {}", dir.display()))?;
        info!("Loaded {} manifests from {}", loaded.len(), dir.display());
        if loaded.iter().any(|m| matches!(m, Manifest::Application(_))) {
            plan.retain(|m| !matches!(m, Manifest::Application(_)));
        }
        plan.extend(loaded);
    }
    if !plan.iter().any(|m| matches!(m, Manifest::Secret(_))) {
        warn!("No secrets in the plan; create them with `dspactl create-secret` before submitting");
    }

    let applier = Applier::new(create_client().await?, config);
    let summary = applier.deploy(plan).await?;
    for applied in &summary.applied {
        println!("applied {}", applied);
    }
    if !summary.ready() {
        println!("Application not Ready yet; run `dspactl validate` once it converges");
    }
    Ok(0)
}

/// Build the configured submitter and hand it to `f`, inside a tunnel when requested
async fn with_submitter<F, Fut>(config: &Config, tunnel: bool, f: F) -> Result<i32>
where
    F: FnOnce(Box<dyn RunSubmitter>) -> Fut,
    Fut: std::future::Future<Output = Result<i32>>,
{
    if tunnel && !config.submit_strategy.uses_pipeline_api() {
        warn!(
            "--tunnel is ignored with the {} strategy, which talks to the cluster API directly",
            config.submit_strategy
        );
    }

    if tunnel && config.submit_strategy.uses_pipeline_api() {
        let startup = Duration::from_secs(timing::TUNNEL_STARTUP_SECS);
        let service = config.api_service_name();
        let tunnel = Tunnel::open(config, &service, defaults::API_PORT, startup).await?;
        return tunnel
            .scoped(|url| async move {
                let submitter = build_submitter(config, Some(url)).await?;
                f(submitter).await
            })
            .await;
    }

    let submitter = build_submitter(config, None).await?;
    f(submitter).await
}

async fn build_submitter(
    config: &Config,
    tunnel_url: Option<String>,
) -> Result<Box<dyn RunSubmitter>> {
    match config.submit_strategy {
        SubmitStrategy::ManagedApi => {
            let base_url = match tunnel_url {
                Some(url) => url,
                None => config.api_base_url()?.to_string(),
            };
            let token = resolve_bearer_token(config.token.as_deref()).await?;
            let timeout = Duration::from_secs(timing::API_REQUEST_TIMEOUT_SECS);
            let api = PipelineApiClient::new(base_url, Some(token), config.insecure_tls, timeout)?;
            Ok(Box::new(ManagedApiSubmitter::new(api, &config.pipeline_display_name)))
        }
        SubmitStrategy::Workflow => {
            let Some(template) = &config.workflow_template else {
                bail!("the workflow strategy needs --workflow-template or DSPA_WORKFLOW_TEMPLATE");
            };
            let client = create_client().await?;
            Ok(Box::new(WorkflowSubmitter::from_template_file(
                client,
                &config.namespace,
                template,
            )?))
        }
    }
}

async fn watch_run(
    submitter: &dyn RunSubmitter,
    run_id: &str,
    config: &Config,
    timeout: Option<u64>,
) -> Result<i32> {
    let timeout = Duration::from_secs(timeout.unwrap_or(timing::RUN_WATCH_TIMEOUT_SECS));
    let (outcome, status) = watch(submitter, run_id, timeout, config.poll_interval).await?;

    println!("{}", status);
    if !outcome.is_ready() {
        println!("Stopped watching after {:?}; the run continues", timeout);
        return Ok(0);
    }
    Ok(if status.succeeded { 0 } else { 1 })
}

fn print_report(report: &Report) -> i32 {
    println!("{}", report);
    if !report.passed() {
        println!("{} required check(s) failed", report.failures());
    }
    report.exit_code()
}

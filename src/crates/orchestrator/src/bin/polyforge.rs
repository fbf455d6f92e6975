//! polyforge CLI
//!
//! Fans a build prompt out to several models, reconciles the answers and
//! writes the resulting app as a `.tar.gz`. Also serves the HTTP API.

use anyhow::{bail, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Parser, Subcommand};
use llm::{AdapterRegistry, CapabilityRegistry};
use orchestrator::config::{load_from_env, load_pipeline_config};
use orchestrator::consensus::ConsensusStrategy;
use orchestrator::packaging::{self, ProgressStage};
use orchestrator::policy::PolicyGate;
use orchestrator::{GenerationRequest, Orchestrator, PipelineConfig, TaskType};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polyforge")]
#[command(about = "polyforge - multi-model code generation with consensus", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Pipeline configuration file (YAML, JSON or TOML)
    #[arg(short, long, global = true, env = "POLYFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an app from a prompt
    Generate {
        /// What to build
        prompt: String,
        /// Model id or alias; repeat for several models
        #[arg(short, long = "model", required = true)]
        models: Vec<String>,
        /// System instruction
        #[arg(long)]
        system: Option<String>,
        /// Subscription tier selecting the content policy (1-5)
        #[arg(long, default_value_t = 1)]
        tier: u8,
        /// Consensus strategy: cluster-majority, weighted-best, hybrid
        #[arg(short, long)]
        strategy: Option<ConsensusStrategy>,
        /// Task type: code (default) or text
        #[arg(long, default_value = "code")]
        task: TaskType,
        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f32>,
        /// Output token budget per model
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Concurrent calls per batch
        #[arg(long)]
        max_parallel: Option<usize>,
        /// Archive path (default: <app-name>.tar.gz)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Print progress frames while generating
        #[arg(long)]
        stream: bool,
        /// Output format: text (default), json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the model catalog
    Models {
        /// Only list models of this provider
        #[arg(short, long)]
        provider: Option<String>,
        /// Output format: text (default), json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the content policy over a file
    Scan {
        /// File to scan
        file: PathBuf,
        /// Subscription tier (1-5)
        #[arg(long, default_value_t = 3)]
        tier: u8,
        /// Treat the file as manually flagged
        #[arg(long)]
        manual: bool,
        /// Output format: text (default), json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => load_pipeline_config(path)?,
        None => load_from_env()?.unwrap_or_default(),
    };
    Ok(config)
}

fn build_orchestrator(config: PipelineConfig) -> anyhow::Result<Arc<Orchestrator>> {
    let capabilities = Arc::new(CapabilityRegistry::builtin());
    let adapters =
        AdapterRegistry::from_env(&capabilities).context("failed to configure providers")?;
    if adapters.is_empty() {
        tracing::warn!(
            "No provider credentials found; set OPENAI_API_KEY, ANTHROPIC_API_KEY or OLLAMA_HOST"
        );
    } else {
        tracing::info!(models = adapters.len(), "Providers configured");
    }
    Ok(Arc::new(Orchestrator::from_config(Arc::new(adapters), capabilities, config)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate {
            prompt,
            models,
            system,
            tier,
            strategy,
            task,
            temperature,
            max_tokens,
            max_parallel,
            out,
            stream,
            format,
        } => {
            let mut request = GenerationRequest::new(prompt)
                .with_models(models)
                .with_tier(tier)
                .with_task_type(task);
            if let Some(system) = system {
                request = request.with_system(system);
            }
            if let Some(strategy) = strategy {
                request = request.with_strategy(strategy);
            }
            if let Some(temperature) = temperature {
                request = request.with_temperature(temperature);
            }
            if let Some(max_tokens) = max_tokens {
                request = request.with_max_tokens(max_tokens);
            }
            if let Some(max_parallel) = max_parallel {
                request = request.with_max_parallel(max_parallel);
            }

            let orchestrator = build_orchestrator(config)?;
            if stream {
                generate_streaming(&orchestrator, request, out).await
            } else {
                generate_batch(&orchestrator, &request, out, &format).await
            }
        }
        Commands::Models { provider, format } => {
            let capabilities = CapabilityRegistry::builtin();
            let entries: Vec<_> = capabilities
                .all()
                .iter()
                .filter(|c| {
                    provider
                        .as_deref()
                        .map_or(true, |p| c.provider.eq_ignore_ascii_case(p))
                })
                .collect();

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!(
                    "{:<12} {:<36} {:<8} {:<8} {}",
                    "Provider", "Model", "Kind", "Speed", "$/1k"
                );
                println!("{}", "-".repeat(76));
                for c in entries {
                    println!(
                        "{:<12} {:<36} {:<8} {:<8} {:.4}",
                        c.provider,
                        c.model,
                        format!("{:?}", c.output_kind).to_lowercase(),
                        format!("{:?}", c.speed).to_lowercase(),
                        c.cost_per_1k_tokens
                    );
                }
            }
            Ok(())
        }
        Commands::Scan {
            file,
            tier,
            manual,
            format,
        } => {
            let code = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let gate = PolicyGate::from_config(config.policy);
            let result = if manual {
                gate.flag_manual(&code, tier, None)?
            } else {
                gate.enforce(&code, tier, None)?
            };

            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.message);
                for finding in &result.scan.findings {
                    println!(
                        "  line {:>4}: {} ({})",
                        finding.line, finding.excerpt, finding.marker
                    );
                }
                println!("Credits awarded: {}", result.credits_awarded);
            }

            if result.allowed {
                Ok(())
            } else {
                bail!("content policy blocked {}", file.display())
            }
        }
        Commands::Serve { host, port } => {
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("invalid listen address {}:{}", host, port))?;
            let orchestrator = build_orchestrator(config)?;
            let router = orchestrator::api::create_router(orchestrator);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!("polyforge API listening on http://{}", addr);
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    tracing::info!("Shutting down");
                })
                .await?;
            Ok(())
        }
    }
}

async fn generate_batch(
    orchestrator: &Orchestrator,
    request: &GenerationRequest,
    out: Option<PathBuf>,
    format: &str,
) -> anyhow::Result<()> {
    let report = orchestrator.generate(request).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} ({} files)", report.app.name, report.app.files.len());
        println!("  {}", report.consensus.reasoning);
        for file in &report.app.files {
            println!("  {}", file.path);
        }
        for warning in &report.warnings {
            println!("  warning: {}", warning);
        }
        println!("  policy: {}", report.enforcement.message);
    }

    if !report.is_deliverable() {
        bail!("content policy blocked delivery: {}", report.enforcement.message);
    }

    let archive = packaging::package(&report.app)?;
    let path = out.unwrap_or_else(|| PathBuf::from(format!("{}.tar.gz", report.app.name)));
    std::fs::write(&path, &archive).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {} ({} bytes)", path.display(), archive.len());
    Ok(())
}

async fn generate_streaming(
    orchestrator: &Arc<Orchestrator>,
    request: GenerationRequest,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut frames = orchestrator.generate_stream(request);

    while let Some(frame) = frames.next().await {
        eprintln!("[{:>3}%] {:<12} {}", frame.progress, frame.stage.as_str(), frame.message);
        match frame.stage {
            ProgressStage::Complete => {
                let data = frame.data.context("complete frame without data")?;
                let encoded = data["archive"].as_str().context("complete frame without archive")?;
                let archive = BASE64.decode(encoded)?;
                let name = data["app"]["name"].as_str().unwrap_or("generated-app");
                let path = out.unwrap_or_else(|| PathBuf::from(format!("{}.tar.gz", name)));
                std::fs::write(&path, &archive)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Wrote {} ({} bytes)", path.display(), archive.len());
                return Ok(());
            }
            ProgressStage::Error => bail!("{}", frame.message),
            _ => {}
        }
    }

    bail!("generation stream ended without a result")
}

//! CLI binary for icmje-agent.
//!
//! Maps CLI flags to `AgentConfig`, runs one review turn, an interactive
//! review session, or a single tool, and prints the result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use icmje_agent::pipeline::input::load_attachment;
use icmje_agent::{
    extract_images_from_local, reconstruct_and_generate_pdf, save_ui_file_to_local,
    search_icmje_policy, AgentConfig, ExtractionProgressCallback, InlineData, Part,
    ProgressCallback, ReviewSession, ToolContext, ToolEnv, ToolRegistry, UserContent,
    VertexRagRetriever, VisionClassifier, Workspace,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress for figure extraction. The bar stays hidden until an
/// extraction starts, so review turns in the same process are not cluttered.
struct CliProgressCallback {
    bar: ProgressBar,
    artifacts: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: ProgressBar::new(0),
            artifacts: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_images: usize) {
        self.artifacts.store(0, Ordering::SeqCst);
        self.bar.reset();
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&TICKS),
        );
        self.bar.set_length(total_images as u64);
        self.bar.set_prefix("Classifying");
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_images} embedded images found"))
        ));
    }

    fn on_image_classified(&self, index: usize, total: usize, kept: bool) {
        let (mark, verdict) = if kept {
            (green("✓"), green("figure"))
        } else {
            self.artifacts.fetch_add(1, Ordering::SeqCst);
            (dim("·"), dim("artifact"))
        };
        self.bar
            .println(format!("  {mark} Image {:>3}/{:<3}  {verdict}", index, total));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_images: usize, kept: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} of {} images kept as figures  ({} artifacts)",
            green("✔"),
            bold(&kept.to_string()),
            total_images,
            dim(&self.artifacts.load(Ordering::SeqCst).to_string()),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One compliance review of a manuscript
  icmje-agent review paper.pdf -m "Please review this manuscript"

  # Interactive review session
  icmje-agent chat paper.pdf

  # Extract scientific figures into the workspace
  icmje-agent extract paper.pdf

  # Build a PDF from reconstructed text and attached figures
  icmje-agent reconstruct reconstructed.txt --image fig1.png --image fig2.png

  # Query the ICMJE policy corpus
  icmje-agent search "authorship criteria"

  # Run a tool the way an agent host would
  icmje-agent tools
  icmje-agent tool search_icmje_policy '{"query": "AI disclosure"}'

CHAT COMMANDS:
  /attach <path|url>   attach a file to the next message
  /extract <filename>  extract figures from a saved PDF
  /search <query>      query the ICMJE policy corpus
  /pdf                 build a PDF from the last reply
  /quit                leave the session

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY            Google Gemini API key
  OPENAI_API_KEY            OpenAI API key
  ANTHROPIC_API_KEY         Anthropic API key
  EDGEQUAKE_LLM_PROVIDER    Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL           Override model ID
  RAG_CORPUS                projects/<p>/locations/<l>/ragCorpora/<id>
  VERTEX_ACCESS_TOKEN       Bearer token for the RAG endpoint
  PDFIUM_LIB_PATH           Directory containing libpdfium

A .env file in the working directory is loaded at startup.
"#;

/// ICMJE manuscript compliance agent.
#[derive(Parser, Debug)]
#[command(
    name = "icmje-agent",
    version,
    about = "Review manuscripts against the ICMJE Recommendations and rebuild them as PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Workspace holding inputs/, temp_figures/ and outputs/.
    #[arg(long, global = true, env = "ICMJE_WORKSPACE", default_value = "workspace")]
    workspace: PathBuf,

    /// Review model ID (default: gemini-2.0-flash).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Vision model ID for figure classification (default: the review model).
    #[arg(long, global = true, env = "ICMJE_VISION_MODEL")]
    vision_model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Vertex AI RAG corpus resource name.
    #[arg(long, global = true, env = "RAG_CORPUS")]
    rag_corpus: Option<String>,

    /// Directory containing the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Path to a text file containing a custom instruction prompt.
    #[arg(long, global = true, env = "ICMJE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature for review turns (0.0–2.0).
    #[arg(long, global = true, env = "ICMJE_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per review turn.
    #[arg(long, global = true, env = "ICMJE_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Policy contexts per query.
    #[arg(long, global = true, env = "ICMJE_TOP_K", default_value_t = 5)]
    top_k: u32,

    /// Vector distance threshold for policy contexts.
    #[arg(long, global = true, env = "ICMJE_DISTANCE_THRESHOLD", default_value_t = 0.6)]
    threshold: f64,

    /// HTTP timeout in seconds for downloads and retrieval.
    #[arg(long, global = true, env = "ICMJE_HTTP_TIMEOUT", default_value_t = 60)]
    http_timeout: u64,

    /// Disable progress bars.
    #[arg(long, global = true, env = "ICMJE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ICMJE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ICMJE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one compliance review turn.
    Review {
        /// Manuscript PDF and images (paths or URLs).
        files: Vec<String>,
        /// Message to send with the files.
        #[arg(short, long, default_value = "Please review this manuscript for ICMJE compliance.")]
        message: String,
    },

    /// Interactive review session.
    Chat {
        /// Files attached to the first message (paths or URLs).
        files: Vec<String>,
    },

    /// Extract scientific figures from a PDF into temp_figures/.
    Extract {
        /// Manuscript PDF (path or URL).
        input: String,
    },

    /// Build a PDF from reconstructed manuscript text.
    Reconstruct {
        /// Text file with the reconstructed manuscript ("-" for stdin).
        text: PathBuf,
        /// Figure images to attach, in figure order.
        #[arg(long = "image")]
        images: Vec<PathBuf>,
        /// The manuscript PDF the figures were extracted from.
        #[arg(long)]
        pdf: Option<PathBuf>,
    },

    /// Query the ICMJE policy corpus.
    Search {
        /// What to look up.
        query: String,
    },

    /// Run one tool with JSON arguments, as an agent host would.
    Tool {
        /// Tool name (see `icmje-agent tools`).
        name: String,
        /// Arguments as a JSON object.
        #[arg(default_value = "{}")]
        args: String,
        /// Files attached to the message the tool sees (paths or URLs).
        #[arg(long = "attach")]
        attachments: Vec<String>,
    },

    /// Print the tool definitions as JSON.
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let show_progress = !cli.quiet && !cli.no_progress;
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress).await?;

    match &cli.command {
        Command::Review { files, message } => {
            let ctx = message_context(Some(message), files, cli.http_timeout).await?;
            let mut session =
                ReviewSession::from_config(config).context("Failed to start review session")?;
            let out = session.turn(&ctx).await.context("Review failed")?;
            println!("{}", out.reply);
            if !cli.quiet {
                eprintln!(
                    "{}  {} images  {}  {}ms",
                    green("✔"),
                    out.images_sent,
                    if out.policy_included { "policy ✓" } else { "no policy" },
                    out.duration_ms
                );
                eprintln!(
                    "   {} tokens in  /  {} tokens out",
                    dim(&out.input_tokens.to_string()),
                    dim(&out.output_tokens.to_string()),
                );
            }
        }

        Command::Chat { files } => run_chat(config, files.clone(), cli.http_timeout).await?,

        Command::Extract { input } => {
            let ctx = message_context(None, std::slice::from_ref(input), cli.http_timeout).await?;
            let ws = Workspace::open(&config.workspace_root).context("Failed to open workspace")?;
            let filename = first_attachment_name(&ctx).context("Nothing to extract from")?;
            let saved = save_ui_file_to_local(&filename, &ctx, &ws).context("Failed to save input")?;
            if !cli.quiet {
                eprintln!("{}", dim(&saved));
            }

            let provider = icmje_agent::provider::resolve_classifier_provider(&config)
                .context("No vision model available")?;
            let classifier = VisionClassifier::new(provider);
            let status = extract_images_from_local(
                &icmje_agent::workspace::safe_file_name(&filename),
                &ws,
                &classifier,
                config.pdfium_lib_dir.as_deref(),
                config.progress_callback.as_ref(),
            )
            .await
            .context("Figure extraction failed")?;
            println!("{status}");
        }

        Command::Reconstruct { text, images, pdf } => {
            let content = read_text(text).await?;
            let mut paths: Vec<PathBuf> = pdf.iter().cloned().collect();
            paths.extend(images.iter().cloned());
            let ctx = ToolContext::new(Some(
                UserContent::from_paths(None, &paths).context("Failed to read attachments")?,
            ));
            let ws = Workspace::open(&config.workspace_root).context("Failed to open workspace")?;
            let status =
                reconstruct_and_generate_pdf(&content, &ctx, &ws, config.pdfium_lib_dir.as_deref())
                    .await
                    .context("PDF generation failed")?;
            println!("{status}");
        }

        Command::Search { query } => {
            let retriever =
                VertexRagRetriever::from_config(&config).context("Policy retrieval unavailable")?;
            let excerpts = search_icmje_policy(&retriever, query)
                .await
                .context("Policy search failed")?;
            println!("{excerpts}");
        }

        Command::Tool {
            name,
            args,
            attachments,
        } => {
            let arguments: serde_json::Value =
                serde_json::from_str(args).context("Tool arguments must be a JSON object")?;
            let ctx = message_context(None, attachments, cli.http_timeout).await?;
            let registry = ToolRegistry::new(ToolEnv::from_config(&config)?);
            let out = registry.execute(name, arguments, &ctx).await;
            println!("{out}");
            if out.starts_with("ERROR:") {
                std::process::exit(1);
            }
        }

        Command::Tools => {
            let registry = ToolRegistry::new(ToolEnv::from_config(&config)?);
            println!(
                "{}",
                serde_json::to_string_pretty(&registry.definitions())
                    .context("Failed to serialise tool definitions")?
            );
        }
    }

    Ok(())
}

/// Map CLI args to `AgentConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AgentConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = AgentConfig::builder()
        .workspace_root(&cli.workspace)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .retrieval_top_k(cli.top_k)
        .vector_distance_threshold(cli.threshold)
        .retrieval_timeout_secs(cli.http_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    config.model = cli.model.clone();
    config.vision_model = cli.vision_model.clone();
    config.provider_name = cli.provider.clone();
    config.rag_corpus = cli.rag_corpus.clone();
    config.pdfium_lib_dir = cli.pdfium_lib_path.clone();
    config.system_prompt = system_prompt;

    Ok(config)
}

/// Build a tool context from optional text and files or URLs.
async fn message_context(text: Option<&str>, inputs: &[String], timeout_secs: u64) -> Result<ToolContext> {
    let mut parts = Vec::new();
    if let Some(text) = text {
        parts.push(Part::Text(text.to_string()));
    }
    for input in inputs {
        let data: InlineData = load_attachment(input, timeout_secs)
            .await
            .with_context(|| format!("Failed to load '{input}'"))?;
        parts.push(Part::InlineData(data));
    }
    Ok(ToolContext::new(Some(UserContent::new(parts))))
}

fn first_attachment_name(ctx: &ToolContext) -> Option<String> {
    ctx.user_content
        .as_ref()?
        .attachments()
        .next()
        .map(|d| d.display_name.clone())
}

async fn read_text(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            buf.push_str(&line);
            buf.push('\n');
        }
        return Ok(buf);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))
}

// ── Interactive session ──────────────────────────────────────────────────────

async fn run_chat(config: AgentConfig, files: Vec<String>, timeout_secs: u64) -> Result<()> {
    let pdfium_lib_dir = config.pdfium_lib_dir.clone();
    let registry = ToolRegistry::new(ToolEnv::from_config(&config)?);
    let mut session = ReviewSession::from_config(config).context("Failed to start review session")?;

    let mut pending: Vec<String> = files;
    let mut last_ctx = ToolContext::default();

    eprintln!(
        "{} {}",
        cyan("◆"),
        bold("ICMJE review session. /quit to leave, /attach <file> to add a file.")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", cyan("›"));
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        let rest = rest.trim();
        match command {
            "/quit" | "/exit" => break,
            "/attach" => {
                pending.push(rest.to_string());
                eprintln!("{}", dim(&format!("attached {rest} to the next message")));
            }
            "/search" => {
                let out = registry
                    .execute("search_icmje_policy", serde_json::json!({ "query": rest }), &last_ctx)
                    .await;
                println!("{out}");
            }
            "/extract" => {
                let out = registry
                    .execute("extract_images_from_local", serde_json::json!({ "filename": rest }), &last_ctx)
                    .await;
                println!("{out}");
            }
            "/pdf" => match session.last_reply() {
                Some(reply) => {
                    match reconstruct_and_generate_pdf(reply, &last_ctx, session.workspace(), pdfium_lib_dir.as_deref()).await {
                        Ok(status) => println!("{} {}", green("✔"), status),
                        Err(e) => eprintln!("{} {}", red("✘"), e),
                    }
                }
                None => eprintln!("{}", dim("no reply to render yet")),
            },
            _ => {
                let inputs = std::mem::take(&mut pending);
                let ctx = match message_context(Some(&line), &inputs, timeout_secs).await {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        eprintln!("{} {:#}", red("✘"), e);
                        continue;
                    }
                };
                match session.turn(&ctx).await {
                    Ok(out) => {
                        println!("{}", out.reply);
                        eprintln!(
                            "{}",
                            dim(&format!(
                                "{} in / {} out  {}ms",
                                out.input_tokens, out.output_tokens, out.duration_ms
                            ))
                        );
                    }
                    Err(e) => eprintln!("{} {}", red("✘"), e),
                }
                last_ctx = ctx;
            }
        }
    }

    Ok(())
}

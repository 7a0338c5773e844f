//! CLI for Fusion Studio - photo fusion via Gemini.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fusion_studio::{
    ApiKeyStore, AspectRatio, CredentialSource, GeminiModel, GeminiProvider, GeneratedImage,
    ImageCategory, ImageId, Outcome, Preset, Resolution, Studio, StudioConfig, TemplateChoice,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fusion-studio")]
#[command(about = "Fuse subject, scene and style photos into one image via Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fuse uploads with a template and render the result
    Generate(GenerateArgs),

    /// Apply an edit instruction to an existing image
    Edit(EditArgs),

    /// List built-in templates
    Templates,

    /// Interactive session with history
    Session(ProviderArgs),
}

#[derive(Args, Clone)]
struct ProviderArgs {
    /// Image model
    #[arg(short, long, value_enum, default_value = "pro")]
    model: ModelArg,

    /// Gemini API key (defaults to GOOGLE_API_KEY / GEMINI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Retries of transient generation failures (overrides FUSION_RETRIES)
    #[arg(long)]
    retries: Option<u32>,
}

#[derive(Args)]
struct GenerateArgs {
    /// Subject photos (the person to keep)
    #[arg(long = "subject")]
    subjects: Vec<PathBuf>,

    /// Scene photos (the place)
    #[arg(long = "scene")]
    scenes: Vec<PathBuf>,

    /// Style reference photos (override the template)
    #[arg(long = "style")]
    styles: Vec<PathBuf>,

    /// Template key, or "custom"
    #[arg(short, long, default_value = "giant")]
    template: TemplateChoice,

    /// Custom template text (implies --template custom)
    #[arg(long)]
    custom_template: Option<String>,

    /// Additional instructions
    #[arg(short, long, default_value = "")]
    instructions: String,

    /// Aspect ratio (1:1, 3:4, 4:3, 9:16, 16:9)
    #[arg(long, default_value = "3:4")]
    aspect_ratio: AspectRatio,

    /// Resolution (1K, 2K, 4K)
    #[arg(long, default_value = "1K")]
    resolution: Resolution,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Args)]
struct EditArgs {
    /// The edit instruction
    instruction: String,

    /// Image to edit
    #[arg(short, long)]
    input: PathBuf,

    /// Aspect ratio of the edited image
    #[arg(long, default_value = "3:4")]
    aspect_ratio: AspectRatio,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    /// gemini-2.5-flash-image
    Flash,
    /// gemini-3.1-flash-image-preview
    Flash2,
    /// gemini-3-pro-image-preview
    Pro,
}

impl From<ModelArg> for GeminiModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Flash => GeminiModel::NanoBanana,
            ModelArg::Flash2 => GeminiModel::NanoBanana2,
            ModelArg::Pro => GeminiModel::NanoBananaPro,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fusion_studio=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate(args, cli.json).await?,
        Commands::Edit(args) => edit(args, cli.json).await?,
        Commands::Templates => list_templates(cli.json)?,
        Commands::Session(args) => session(args, cli.json).await?,
    }

    Ok(())
}

async fn build_studio(args: &ProviderArgs) -> anyhow::Result<Studio> {
    let credentials: Arc<dyn CredentialSource> = match &args.api_key {
        Some(key) => Arc::new(ApiKeyStore::with_key(key.as_str())),
        None => Arc::new(ApiKeyStore::from_env()),
    };
    let provider = GeminiProvider::builder()
        .credentials(Arc::clone(&credentials))
        .model(args.model.into())
        .build()?;

    let mut config = StudioConfig::from_env();
    if let Some(retries) = args.retries {
        config = config.with_retries(retries);
    }

    let studio = Studio::new(Arc::new(provider), credentials, config);
    studio.refresh_credentials().await;
    Ok(studio)
}

/// Runs a flow, retrying once after the user has been asked for a key.
async fn run_with_credentials<F, Fut>(mut flow: F) -> Outcome
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Outcome>,
{
    match flow().await {
        Outcome::CredentialRequired => flow().await,
        outcome => outcome,
    }
}

async fn add_all(studio: &Studio, category: ImageCategory, paths: Vec<PathBuf>) {
    let requested = paths.len();
    if requested == 0 {
        return;
    }
    let added = studio.add_files(category, paths).await;
    if added < requested {
        tracing::warn!(%category, requested, added, "some images were not added");
    }
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let studio = build_studio(&args.provider).await?;

    add_all(&studio, ImageCategory::Subject, args.subjects).await;
    add_all(&studio, ImageCategory::Scene, args.scenes).await;
    add_all(&studio, ImageCategory::Style, args.styles).await;

    match args.custom_template {
        Some(text) => {
            studio.select_template(TemplateChoice::Custom);
            studio.set_custom_template(text);
        }
        None => studio.select_template(args.template),
    }
    studio.set_instructions(args.instructions);
    studio.set_aspect_ratio(args.aspect_ratio);
    studio.set_resolution(args.resolution);

    let outcome = run_with_credentials(|| studio.generate()).await;
    finish(&studio, outcome, &args.output, json_output)
}

async fn edit(args: EditArgs, json_output: bool) -> anyhow::Result<()> {
    let studio = build_studio(&args.provider).await?;

    let data = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("reading {}", args.input.display()))?;
    studio.adopt_image(GeneratedImage::from_bytes(data, Default::default())?);
    studio.set_aspect_ratio(args.aspect_ratio);

    let outcome = run_with_credentials(|| studio.edit(&args.instruction)).await;
    finish(&studio, outcome, &args.output, json_output)
}

/// Saves a completed result and reports it; any other outcome is an error.
fn finish(studio: &Studio, outcome: Outcome, dir: &Path, json_output: bool) -> anyhow::Result<()> {
    match outcome {
        Outcome::Completed(image) => {
            let path = studio.save_current(dir)?;
            print_saved(&image, &path, json_output)
        }
        Outcome::Failed(message) => anyhow::bail!(message),
        Outcome::CredentialRequired => anyhow::bail!("no API key available"),
        Outcome::Busy => anyhow::bail!("another request is already running"),
    }
}

fn print_saved(image: &GeneratedImage, path: &Path, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let result = serde_json::json!({
            "success": true,
            "output": path.display().to_string(),
            "size_bytes": image.size(),
            "format": image.format.extension(),
            "model": image.metadata.model,
            "duration_ms": image.metadata.duration_ms,
            "prompt": image.metadata.prompt,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Saved image: {} ({} bytes)", path.display(), image.size());
        if let Some(duration) = image.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }
    Ok(())
}

fn list_templates(json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let templates: Vec<_> = Preset::ALL
            .iter()
            .map(|p| {
                serde_json::json!({
                    "key": p.key(),
                    "label": p.label(),
                    "text": p.text(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&templates)?);
    } else {
        println!("Templates:\n");
        for preset in Preset::ALL {
            println!("  {:<10} {}", preset.key(), preset.label());
        }
        println!("  {:<10} Your own template text", "custom");
    }
    Ok(())
}

const SESSION_HELP: &str = "\
Commands:
  add <subject|scene|style> <file>...   upload images
  rm <subject|scene|style> <id>         remove an upload
  template <key|custom>                 choose a template
  custom <text>                         set the custom template text
  aspect <ratio>                        1:1, 3:4, 4:3, 9:16, 16:9
  res <1K|2K|4K>                        output resolution
  say <text>                            additional instructions
  generate                              fuse and render
  edit <instruction>                    edit the current image
  history                               list results
  show <n>                              make history entry n current
  save [dir]                            save the current image
  key                                   enter and check an API key
  status                                check the key, show session state
  quit";

async fn read_line() -> anyhow::Result<Option<String>> {
    let line = tokio::task::spawn_blocking(|| -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        Ok((read > 0).then_some(line))
    })
    .await??;
    Ok(line)
}

async fn session(args: ProviderArgs, json_output: bool) -> anyhow::Result<()> {
    let studio = build_studio(&args).await?;
    if !json_output {
        println!("Fusion Studio session. Type 'help' for commands.");
        if !studio.has_credential() {
            println!("No API key found; you will be asked for one on first use.");
        }
    }

    while let Some(line) = read_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        let result = match command {
            "quit" | "exit" => break,
            "help" => {
                println!("{SESSION_HELP}");
                Ok(())
            }
            _ => session_command(&studio, command, rest, json_output).await,
        };
        if let Err(e) = result {
            if json_output {
                println!("{}", serde_json::json!({ "success": false, "error": e.to_string() }));
            } else {
                println!("error: {e}");
            }
        }
    }
    Ok(())
}

async fn session_command(
    studio: &Studio,
    command: &str,
    rest: &str,
    json_output: bool,
) -> anyhow::Result<()> {
    match command {
        "add" => {
            let mut words = rest.split_whitespace();
            let category: ImageCategory = words.next().unwrap_or_default().parse()?;
            let paths: Vec<PathBuf> = words.map(PathBuf::from).collect();
            let requested = paths.len();
            let added = studio.add_files(category, paths).await;
            println!("Added {added} of {requested} to {}", category.label());
            print_uploads(studio, category);
        }
        "rm" => {
            let (category, id) = rest
                .split_once(' ')
                .context("usage: rm <category> <id>")?;
            let category: ImageCategory = category.parse()?;
            let id = ImageId(id.trim().trim_start_matches('#').parse()?);
            if !studio.remove_image(category, id) {
                anyhow::bail!("no image {id} in {}", category.label());
            }
            print_uploads(studio, category);
        }
        "template" => {
            let choice: TemplateChoice = rest.parse()?;
            studio.select_template(choice);
        }
        "custom" => {
            studio.set_custom_template(rest);
            studio.select_template(TemplateChoice::Custom);
        }
        "aspect" => studio.set_aspect_ratio(rest.parse()?),
        "res" => studio.set_resolution(rest.parse()?),
        "say" => studio.set_instructions(rest),
        "key" => {
            if !studio.select_credentials().await {
                anyhow::bail!("no API key selected");
            }
            studio.verify_credentials().await?;
            println!("API key accepted");
        }
        "generate" => report(studio, run_with_credentials(|| studio.generate()).await, json_output)?,
        "edit" => report(studio, run_with_credentials(|| studio.edit(rest)).await, json_output)?,
        "history" => {
            for (i, image) in studio.history().iter().enumerate() {
                println!(
                    "  [{i}] {} {} bytes {}",
                    image.format.extension(),
                    image.size(),
                    image.metadata.model.as_deref().unwrap_or("-")
                );
            }
        }
        "show" => {
            let index: usize = rest.parse()?;
            if !studio.select_history(index) {
                anyhow::bail!("no history entry {index}");
            }
        }
        "save" => {
            let dir = if rest.is_empty() { "." } else { rest };
            let path = studio.save_current(dir)?;
            println!("Saved {}", path.display());
        }
        "status" => {
            if studio.has_credential() {
                if let Err(e) = studio.verify_credentials().await {
                    println!("API key check failed: {e}");
                }
            }
            print_status(studio);
        }
        other => anyhow::bail!("unknown command: {other} (try 'help')"),
    }
    Ok(())
}

fn report(studio: &Studio, outcome: Outcome, json_output: bool) -> anyhow::Result<()> {
    match outcome {
        Outcome::Completed(image) => {
            if json_output {
                let result = serde_json::json!({
                    "success": true,
                    "size_bytes": image.size(),
                    "format": image.format.extension(),
                    "history": studio.history().len(),
                });
                println!("{result}");
            } else {
                println!(
                    "Done: {} bytes, {} in history. Use 'save' to write it out.",
                    image.size(),
                    studio.history().len()
                );
            }
            Ok(())
        }
        Outcome::Failed(message) => anyhow::bail!(message),
        Outcome::CredentialRequired => anyhow::bail!("an API key is required"),
        Outcome::Busy => anyhow::bail!("busy"),
    }
}

fn print_uploads(studio: &Studio, category: ImageCategory) {
    for image in studio.images(category) {
        println!("  {} {} ({}x{})", image.id, image.name, image.width, image.height);
    }
}

fn print_status(studio: &Studio) {
    let state = studio.snapshot();
    for category in ImageCategory::ALL {
        let list = state.list(category);
        println!("{}: {}/{}", category.label(), list.len(), list.max());
    }
    let template = match state.template {
        TemplateChoice::Preset(preset) => preset.label().to_string(),
        TemplateChoice::Custom => "custom".to_string(),
    };
    let (provider, model) = studio.provider_info();
    println!("Provider: {provider} ({model})");
    println!("Template: {template}");
    println!(
        "Output: {} at {}",
        state.settings.aspect_ratio.label(),
        state.settings.resolution.label()
    );
    if !state.settings.instructions.is_empty() {
        println!("Instructions: {}", state.settings.instructions);
    }
    println!("History: {}", state.history.len());
    println!("API key: {}", if state.has_credential { "set" } else { "missing" });
    if let Some(status) = state.status {
        println!("Status: {status}");
    }
}

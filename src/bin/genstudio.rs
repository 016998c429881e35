//! CLI for genstudio - generate and edit images from a prompt.

use clap::{Args, Parser, Subcommand, ValueEnum};
use genstudio::studio::{self, download_all, Command, GalleryView, PromptForm, Studio};
use genstudio::{AspectRatio, GeminiService, ImageService, StudioConfig, MAX_IMAGES};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const TITLE: &str = "AI Professional Image Generator";
const SUBTITLE: &str = "Transform your ideas into stunning visuals with Gemini";

#[derive(Parser)]
#[command(name = "genstudio")]
#[command(about = "Generate images from text, or edit your own images, with Google Imagen and Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    service: ServiceArgs,
}

#[derive(Args)]
struct ServiceArgs {
    /// Google AI API key (falls back to API_KEY)
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API host
    #[arg(long, global = true, env = "GENSTUDIO_BASE_URL")]
    base_url: Option<String>,

    /// Text-to-image model
    #[arg(long, global = true)]
    generation_model: Option<String>,

    /// Image editing model
    #[arg(long, global = true)]
    edit_model: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "GENSTUDIO_TIMEOUT_SECS")]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate images from a prompt, or edit images when --image is given
    Generate(GenerateArgs),

    /// Interactive studio session
    Studio {
        /// Default directory for :save
        #[arg(short, long, env = "GENSTUDIO_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,
    },

    /// Run as MCP server (for AI agent integration)
    Mcp,
}

#[derive(Args)]
struct GenerateArgs {
    /// Describe the image you want to create or edit
    prompt: String,

    /// Number of images to generate (ignored when editing)
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=MAX_IMAGES as i64))]
    count: u8,

    /// Aspect ratio (ignored when editing)
    #[arg(short, long, value_enum, default_value = "1:1")]
    aspect_ratio: AspectRatioArg,

    /// Image to edit (PNG, JPG or WEBP); repeat for several
    #[arg(short, long = "image")]
    images: Vec<PathBuf>,

    /// Directory to save results into
    #[arg(short, long, env = "GENSTUDIO_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "16:9")]
    Widescreen,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "4:3")]
    Landscape,
    #[value(name = "3:4")]
    Vertical,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Widescreen => AspectRatio::Widescreen,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Vertical => AspectRatio::Vertical,
        }
    }
}

impl ServiceArgs {
    fn build(&self) -> anyhow::Result<GeminiService> {
        let mut config = StudioConfig::from_env();
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key);
        }
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url);
        }
        if let Some(model) = &self.generation_model {
            config = config.with_generation_model(model);
        }
        if let Some(model) = &self.edit_model {
            config = config.with_edit_model(model);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(genstudio::GeminiServiceBuilder::from_config(config).build()?)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => {
            let service = cli.service.build()?;
            generate(service, args).await?;
        }
        Commands::Studio { output_dir } => {
            let service = cli.service.build()?;
            run_studio(service, output_dir).await?;
        }
        Commands::Mcp => {
            let service = cli.service.build()?;
            tracing::info!("starting MCP server");
            let mut server = genstudio::mcp::McpServer::new(Arc::new(service));
            server.run().await?;
        }
    }

    Ok(())
}

async fn generate(service: GeminiService, args: GenerateArgs) -> anyhow::Result<()> {
    let mut app = Studio::new(service);
    let form = app.form_mut();
    form.set_prompt(&args.prompt);
    form.set_number_of_images(args.count)?;
    form.set_aspect_ratio(args.aspect_ratio.into());
    form.attach_paths(args.images.as_slice())?;

    let Some(submission) = app.begin() else {
        anyhow::bail!("prompt must not be empty");
    };

    if !args.json {
        eprint!("{}", app.gallery());
    }
    app.complete(&submission).await;

    let images = match app.gallery() {
        GalleryView::Error(message) => anyhow::bail!("{message}"),
        view => view.images(),
    };
    let paths = download_all(images, &args.output_dir)?;

    if args.json {
        let result = serde_json::json!({
            "success": true,
            "mode": if submission.is_edit() { "edit" } else { "generate" },
            "provider": app.service().name(),
            "count": paths.len(),
            "saved_to": paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", app.gallery());
        for path in &paths {
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}

async fn run_studio(service: GeminiService, output_dir: PathBuf) -> anyhow::Result<()> {
    println!("{TITLE}\n{SUBTITLE}\n");
    println!("{}\n", studio::HELP);

    let mut app = Studio::new(service);
    print!("{}", app.gallery());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match studio::apply_to_form(app.form_mut(), &command) {
            Ok(true) => {
                print_form(app.form());
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                println!("{e}");
                continue;
            }
        }

        match command {
            Command::Submit => {
                let Some(submission) = app.begin() else {
                    println!("Describe the image you want to create or edit first.");
                    continue;
                };
                println!("{}", app.form().submit_label(app.state().loading));
                print!("{}", app.gallery());
                std::io::stdout().flush()?;
                app.complete(&submission).await;
                print!("{}", app.gallery());
            }
            Command::Save(dir) => {
                let images = app.gallery().images();
                if images.is_empty() {
                    println!("Nothing to save yet.");
                    continue;
                }
                let dir = dir.unwrap_or_else(|| output_dir.clone());
                match download_all(images, &dir) {
                    Ok(paths) => {
                        for path in paths {
                            println!("Saved {}", path.display());
                        }
                    }
                    Err(e) => println!("{e}"),
                }
            }
            Command::Status => {
                print_form(app.form());
                print!("{}", app.gallery());
            }
            Command::Help => println!("{}", studio::HELP),
            Command::Quit => break,
            _ => {}
        }
    }

    println!("Powered by Google Gemini.");
    Ok(())
}

fn print_form(form: &PromptForm) {
    let prompt = if form.has_prompt() { form.prompt() } else { "(empty)" };
    println!("Prompt: {prompt}");

    if form.is_edit_mode() {
        println!("Images to edit:");
        for (i, attachment) in form.attachments().iter().enumerate() {
            println!(
                "  {}. {} ({}, {} bytes)",
                i + 1,
                attachment.name(),
                attachment.mime_type(),
                attachment.size()
            );
        }
        println!("Aspect ratio and count: disabled while editing");
    } else {
        let config = form.config();
        println!(
            "Aspect ratio: {} ({})  Number of images: {}",
            config.aspect_ratio().label(),
            config.aspect_ratio(),
            config.number_of_images()
        );
    }
    println!("[{}]", form.submit_label(false));
}

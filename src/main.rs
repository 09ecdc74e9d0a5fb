use anyhow::{Context, Result};
use certbatch::config::BatchConfig;
use certbatch::export::entry_name;
use certbatch::{
    check_preconditions, Alignment, Anchor, BatchRunner, Color, Dataset, ExportFormat, FontManager,
    RenderEngine, Template,
};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the data file (.json or .csv)
    #[arg(short, long, global = true)]
    data: Option<PathBuf>,

    /// Output directory (overrides config if provided)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a sample certbatch.yaml and data.csv
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// List the columns and record count of the data file
    Columns,
    /// Render one certificate per row (default command)
    Generate(GenerateArgs),
}

#[derive(Args, Default)]
struct GenerateArgs {
    /// Template image (PNG or JPEG)
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Column holding the text to print
    #[arg(short, long)]
    field: Option<String>,

    /// Output format: png (zip of images) or pdf; repeat for both
    #[arg(long = "format")]
    formats: Vec<ExportFormat>,

    #[arg(long)]
    font_size: Option<f32>,

    #[arg(long)]
    font_family: Option<String>,

    /// Text color as #rrggbb
    #[arg(long)]
    color: Option<Color>,

    /// start, center or end
    #[arg(long)]
    align: Option<Alignment>,

    /// Horizontal anchor, 0.0 (left) to 1.0 (right)
    #[arg(long)]
    x: Option<f32>,

    /// Vertical anchor, 0.0 (top) to 1.0 (bottom)
    #[arg(long)]
    y: Option<f32>,

    /// Extra directory to search for fonts
    #[arg(long)]
    font_dir: Vec<PathBuf>,

    /// Rows rendered between scheduler yields (0 disables)
    #[arg(long)]
    yield_every: Option<usize>,

    /// Dry run mode - list the outputs without rendering
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { ref path }) => init_project(path)?,
        Some(Commands::Columns) => list_columns(&cli)?,
        Some(Commands::Generate(ref args)) => generate(&cli, args).await?,
        None => generate(&cli, &GenerateArgs::default()).await?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<BatchConfig> {
    match &cli.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            BatchConfig::load(path).context("Failed to load config")
        }
        None => Ok(BatchConfig::default()),
    }
}

fn apply_overrides(config: &mut BatchConfig, cli: &Cli, args: &GenerateArgs) {
    if let Some(ref data) = cli.data {
        config.data = Some(data.clone());
    }
    if let Some(ref output) = cli.output {
        config.output = Some(output.clone());
    }
    if let Some(ref template) = args.template {
        config.template = Some(template.clone());
    }
    if let Some(ref field) = args.field {
        config.field = Some(field.clone());
    }
    if !args.formats.is_empty() {
        config.formats = args.formats.clone();
    }
    if let Some(size) = args.font_size {
        config.style.font_size = size;
    }
    if let Some(ref family) = args.font_family {
        config.style.font_family = family.clone();
    }
    if let Some(color) = args.color {
        config.style.color = color;
    }
    if let Some(align) = args.align {
        config.style.align = align;
    }
    if args.x.is_some() || args.y.is_some() {
        config.anchor = Anchor::new(
            args.x.unwrap_or(config.anchor.x()),
            args.y.unwrap_or(config.anchor.y()),
        );
    }
    config.fonts.dirs.extend(args.font_dir.iter().cloned());
    if let Some(every) = args.yield_every {
        config.yield_every = every;
    }
}

fn load_dataset(path: Option<&Path>) -> Result<Dataset> {
    match path {
        Some(path) => {
            info!("Loading data from {:?}", path);
            Dataset::load(path).with_context(|| format!("Failed to load data from {:?}", path))
        }
        None => Ok(Dataset::default()),
    }
}

fn load_fonts(config: &BatchConfig) -> Result<FontManager> {
    let mut fonts = if config.fonts.system {
        FontManager::with_system_fonts()
    } else {
        FontManager::new()
    };
    for dir in &config.fonts.dirs {
        fonts.add_font_dir(dir);
    }
    for file in &config.fonts.files {
        fonts
            .add_font_file(file)
            .with_context(|| format!("Failed to load font file {:?}", file))?;
    }
    Ok(fonts)
}

async fn generate(cli: &Cli, args: &GenerateArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    apply_overrides(&mut config, cli, args);
    if config.style.font_size <= 0.0 || !config.style.font_size.is_finite() {
        anyhow::bail!("--font-size must be a positive number");
    }

    let template = match &config.template {
        Some(path) => {
            info!("Loading template from {:?}", path);
            Some(Template::open(path).with_context(|| format!("Failed to load template {:?}", path))?)
        }
        None => None,
    };
    let dataset = load_dataset(config.data.as_deref())?;
    let render_config = config.render_config();
    let (template, _) = check_preconditions(template.as_ref(), &dataset, &render_config)?;

    let formats = if config.formats.is_empty() {
        vec![ExportFormat::Png]
    } else {
        config.formats.clone()
    };
    let output_dir = config.output.clone().unwrap_or_else(|| PathBuf::from("."));

    if args.dry_run {
        info!("=== DRY RUN MODE ===");
        dry_run(&dataset, &render_config, &formats);
        info!("=== DRY RUN COMPLETE ===");
        return Ok(());
    }

    let fonts = load_fonts(&config)?;
    let font = fonts
        .resolve(&render_config.style.font_family)
        .context("Failed to load a font")?;
    info!("Using font '{}'", font.name());
    let runner = BatchRunner::new(RenderEngine::new(Arc::new(font)));

    for format in formats {
        let adapter = format.adapter(template);
        let mut last_percent = None;
        let artifact = runner
            .run(Some(template), &dataset, &render_config, adapter, |progress| {
                let percent = progress.percent();
                if last_percent != Some(percent) {
                    info!("Progress: {}%", percent);
                    last_percent = Some(percent);
                }
            })
            .await
            .with_context(|| format!("Failed to generate {}", format))?;
        artifact.write_to_dir(&output_dir)?;
    }

    Ok(())
}

fn dry_run(dataset: &Dataset, config: &certbatch::RenderConfig, formats: &[ExportFormat]) {
    let field = config.field_key.as_deref().unwrap_or_default().trim();
    if !dataset.has_column(field) {
        warn!("Column '{}' not found; every row will use a fallback name", field);
    }
    for format in formats {
        info!("[DRY RUN] Would write {}", format.file_name());
        for (index, record) in dataset.records().iter().enumerate() {
            let text = certbatch::resolve_text(record, field, index);
            match format {
                ExportFormat::Png => info!("[DRY RUN]   {}", entry_name(index, &text)),
                ExportFormat::Pdf => info!("[DRY RUN]   page {}: {}", index + 1, text),
            }
        }
    }
}

fn list_columns(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let path = cli
        .data
        .clone()
        .or(config.data)
        .ok_or_else(|| anyhow::anyhow!("--data is required"))?;
    let dataset = load_dataset(Some(&path))?;

    for column in dataset.columns() {
        println!("{}", column);
    }
    println!("{} Records Found", dataset.len());
    Ok(())
}

fn init_project(path: &Path) -> Result<()> {
    info!("Initializing certbatch project at {:?}", path);
    std::fs::create_dir_all(path)?;

    let config_content = r##"# Place your certificate background next to this file.
template: template.png
data: data.csv
field: Name
formats: [png, pdf]
output: out

style:
  font_size: 80
  font_family: Poppins
  color: "#1a1a1a"
  align: center

# Normalized text position, (0, 0) is the top-left corner.
anchor:
  x: 0.5
  y: 0.5

fonts:
  system: true
  dirs: []

yield_every: 5
"##;
    std::fs::write(path.join("certbatch.yaml"), config_content)?;

    let data_content = "Name,Course\nAda Lovelace,Analytical Engines\nAlan Turing,Computability\n";
    std::fs::write(path.join("data.csv"), data_content)?;

    info!("✓ Project initialized successfully!");
    info!("  Add template.png, then run: certbatch -c certbatch.yaml");

    Ok(())
}

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "randomart", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an image as a PNG.
    Render(RenderArgs),
    /// Print the canonical form of a derived or parsed expression.
    Expr(ExprArgs),
    /// List the built-in grammar presets.
    Presets(PresetsArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Grammar file. Takes precedence over `--preset`.
    #[arg(long)]
    grammar: Option<PathBuf>,

    /// Built-in grammar preset.
    #[arg(long, default_value = randomart::grammar::presets::DEFAULT_PRESET)]
    preset: String,

    /// Seed for derivation. Random when omitted.
    #[arg(long)]
    seed: Option<u32>,

    /// Maximum derivation depth. Defaults to the preset's depth, or 12 for grammar files.
    #[arg(long)]
    depth: Option<u32>,

    /// Canonical expression to use instead of deriving one.
    #[arg(long)]
    expr: Option<String>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output width in pixels.
    #[arg(long, default_value_t = 512)]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = 512)]
    height: u32,

    /// Backend to use.
    #[arg(long, value_enum, default_value_t = BackendChoice::Cpu)]
    backend: BackendChoice,

    /// Value of the `t` coordinate.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    time: f32,

    /// Variable value as `name=value`, repeatable.
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, f32)>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Also write the generated WGSL compute shader here.
    #[arg(long)]
    shader_out: Option<PathBuf>,

    /// Start request as JSON; replaces the source, size, backend and time flags.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExprArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Print the WGSL compute shader instead of the canonical form.
    #[arg(long)]
    shader: bool,
}

#[derive(Parser, Debug)]
struct PresetsArgs {
    /// Also print each preset's grammar text.
    #[arg(long)]
    show: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    /// Progressive per-pixel interpretation.
    Interpreted,
    /// Compiled single pass on the CPU.
    Cpu,
    /// Compiled single pass on the GPU (needs the `gpu` feature).
    Gpu,
}

impl From<BackendChoice> for randomart::Backend {
    fn from(choice: BackendChoice) -> Self {
        match choice {
            BackendChoice::Interpreted => randomart::Backend::Interpreted,
            BackendChoice::Cpu => randomart::Backend::Compiled(randomart::Executor::Cpu),
            BackendChoice::Gpu => randomart::Backend::Compiled(randomart::Executor::Gpu),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Expr(args) => cmd_expr(args),
        Command::Presets(args) => cmd_presets(args),
    }
}

fn parse_var(s: &str) -> Result<(String, f32), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    if randomart::Variable::from_name(name).is_none() {
        return Err(format!("unknown variable '{name}'"));
    }
    let value = value
        .parse::<f32>()
        .map_err(|e| format!("invalid value for '{name}': {e}"))?;
    Ok((name.to_owned(), value))
}

fn resolve_source(args: &SourceArgs) -> anyhow::Result<randomart::ExpressionSource> {
    if let Some(expr) = &args.expr {
        return Ok(randomart::ExpressionSource::Expression(expr.clone()));
    }

    let (text, default_depth) = match &args.grammar {
        Some(path) => (
            std::fs::read_to_string(path)
                .with_context(|| format!("read grammar '{}'", path.display()))?,
            12,
        ),
        None => {
            let preset = randomart::preset(&args.preset).with_context(|| {
                let names: Vec<&str> = randomart::PRESETS.iter().map(|p| p.name).collect();
                format!(
                    "unknown preset '{}' (available: {})",
                    args.preset,
                    names.join(", ")
                )
            })?;
            (preset.text.to_owned(), preset.depth)
        }
    };

    let seed = args.seed.unwrap_or_else(random_seed);
    eprintln!("seed {seed}");
    Ok(randomart::ExpressionSource::Grammar {
        text,
        depth: args.depth.unwrap_or(default_depth),
        seed,
    })
}

fn random_seed() -> u32 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    (nanos as u32) ^ std::process::id().rotate_left(16)
}

fn read_config(path: &Path) -> anyhow::Result<randomart::StartRequest> {
    let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
    let r = BufReader::new(f);
    let req: randomart::StartRequest =
        serde_json::from_reader(r).with_context(|| "parse start request JSON")?;
    Ok(req)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut request = match &args.config {
        Some(path) => read_config(path)?,
        None => randomart::StartRequest {
            source: resolve_source(&args.source)?,
            ..randomart::StartRequest::default()
        }
        .with_size(args.width, args.height)
        .with_backend(args.backend.into())
        .with_time(args.time),
    };
    for (name, value) in &args.vars {
        request.variables.set_named(name, *value);
    }

    let mut engine = randomart::Engine::default();
    engine.start(request)?;

    let frame = loop {
        let event = engine
            .recv()
            .context("session ended without producing an image")?;
        match event {
            randomart::Event::Expression {
                canonical, shader, ..
            } => {
                println!("{canonical}");
                if let Some(path) = &args.shader_out {
                    write_parent_dirs(path)?;
                    std::fs::write(path, shader)
                        .with_context(|| format!("write shader '{}'", path.display()))?;
                }
            }
            randomart::Event::Progress {
                current,
                total,
                image,
                elapsed,
                ..
            } => {
                tracing::info!(current, total, ?elapsed, "progress");
                if current == total {
                    break image;
                }
                engine.next()?;
            }
            randomart::Event::Failed { error, .. } => {
                return Err(anyhow::Error::new(error).context("render session failed"));
            }
        }
    };

    write_parent_dirs(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_expr(args: ExprArgs) -> anyhow::Result<()> {
    let source = resolve_source(&args.source)?;
    let root = randomart::session::build_tree(&source)?;
    if args.shader {
        print!("{}", randomart::render::shader::compute_shader(&root));
    } else {
        println!("{root}");
    }
    Ok(())
}

fn cmd_presets(args: PresetsArgs) -> anyhow::Result<()> {
    for p in randomart::PRESETS {
        println!("{} (depth {})", p.name, p.depth);
        if args.show {
            for line in p.text.lines() {
                println!("    {line}");
            }
        }
    }
    Ok(())
}

fn write_parent_dirs(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

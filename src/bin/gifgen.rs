use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gifgen", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble still images into an animated GIF.
    Assemble(AssembleArgs),
    /// Reconstruct an animation and print a JSON summary.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct AssembleArgs {
    /// Output GIF path.
    #[arg(long)]
    out: PathBuf,

    /// Delay between frames in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Number of loops; 0 loops forever.
    #[arg(long)]
    loop_count: Option<u16>,

    /// Bound for the longer side of every frame, in pixels.
    #[arg(long)]
    max_size: Option<u32>,

    /// Replace the output file if it already exists.
    #[arg(long)]
    force: bool,

    /// Generator config JSON; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input frames in display order.
    #[arg(required = true)]
    frames: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Bound for the longer side of every frame, in pixels.
    #[arg(long)]
    max_size: Option<u32>,

    /// JPEG quality factor in (0, 1]; 1 disables recompression.
    #[arg(long)]
    quality: Option<f32>,

    /// Delay to assume when the input declares none, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Local path or file:// URL.
    input: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Assemble(args) => cmd_assemble(args),
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<gifgen::GeneratorConfig> {
    match path {
        Some(p) => Ok(gifgen::GeneratorConfig::from_json_file(p)?),
        None => Ok(gifgen::GeneratorConfig::default()),
    }
}

fn cmd_assemble(args: AssembleArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(ms) = args.delay_ms {
        cfg.frame_delay_ms = ms;
    }
    if let Some(n) = args.loop_count {
        cfg.loop_count = n;
    }
    if args.max_size.is_some() {
        cfg.frame_max_pixel_size = args.max_size;
    }
    cfg.validate()?;

    let sources = args
        .frames
        .iter()
        .map(|p| gifgen::FrameSource::from_path(p))
        .collect::<Result<Vec<_>, _>>()?;

    let file_name = args
        .out
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("output path '{}' has no usable file name", args.out.display()))?
        .to_string();
    let directory = match args.out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    // With --force, assemble under a scratch name next to the output and rename over it only
    // once the container is complete.
    let opts = gifgen::AssembleOpts {
        directory,
        file_name: (!args.force).then_some(file_name),
        ..gifgen::AssembleOpts::from_config(&cfg)
    };
    let container = gifgen::assemble(&sources, &opts)?;
    let path = if args.force {
        container.persist_as(&args.out)?
    } else {
        container.persist()
    };
    println!("{}", path.display());
    Ok(())
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let generator = gifgen::Generator::new(gifgen::GeneratorConfig::default(), move |g| {
        let _ = tx.send(g);
    })?;

    let mut params = generator.default_params();
    if args.max_size.is_some() {
        params.frame_max_pixel_size = args.max_size;
    }
    if let Some(q) = args.quality {
        params.compression_quality = q;
    }
    if let Some(ms) = args.delay_ms {
        params.frame_delay = Duration::from_millis(ms);
    }

    let request = generator.generate_url(&args.input, params);
    let generated = rx
        .recv_timeout(Duration::from_secs(60))
        .context("no result from generator")?;
    let anim = generated
        .animation
        .with_context(|| format!("could not build an animation from '{}' (request {request})", args.input))?;

    let sizes: Vec<[u32; 2]> = anim
        .frames()
        .iter()
        .map(|f| [f.width(), f.height()])
        .collect();
    let summary = serde_json::json!({
        "input": args.input,
        "frames": anim.frame_count(),
        "declared_frames": anim.declared_frame_count(),
        "frame_delay_ms": anim.frame_delay().as_millis() as u64,
        "duration_ms": anim.duration().as_millis() as u64,
        "frame_sizes": sizes,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

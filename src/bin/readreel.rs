use std::{fs, path::PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use readreel::{
    BookRecord, ExportOptions, ExportOutcome, ExportStage, GifSource, PngReceipt, ReadingStats,
    export_social,
    scene::ExportPlan,
};

#[derive(Parser, Debug)]
#[command(name = "readreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export the social clip: animated GIF background + receipt overlay to
    /// MP4 (requires `ffmpeg` on PATH; falls back to a PNG still).
    Export(ExportArgs),
    /// Print aggregate reading stats from a book list.
    Stats(StatsArgs),
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Animated GIF background: a URL or a local path.
    #[arg(long)]
    gif: String,

    /// Rendered receipt image (PNG) to overlay.
    #[arg(long)]
    receipt: PathBuf,

    /// Output path. Defaults to the canonical
    /// read-receipt-social-<timestamp> name in the current directory.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Output width in pixels (must be even).
    #[arg(long, default_value_t = 1200)]
    width: u32,

    /// Output height in pixels (must be even).
    #[arg(long, default_value_t = 1200)]
    height: u32,

    /// Fraction of the output width the receipt may occupy, in (0, 1].
    #[arg(long, default_value_t = 0.5)]
    receipt_width_ratio: f32,

    /// Fraction of the output height the receipt may occupy, in (0, 1].
    #[arg(long, default_value_t = 0.9)]
    receipt_height_ratio: f32,

    /// Video bitrate in kbit/s.
    #[arg(long, default_value_t = readreel::DEFAULT_BITRATE_KBPS)]
    bitrate_kbps: u32,
}

#[derive(Parser, Debug)]
struct StatsArgs {
    /// Book list JSON (array of book records).
    #[arg(long)]
    books: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Export(args) => cmd_export(args),
        Command::Stats(args) => cmd_stats(args),
    }
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let receipt_bytes = fs::read(&args.receipt)
        .with_context(|| format!("read receipt '{}'", args.receipt.display()))?;
    let receipt = PngReceipt::new(receipt_bytes);

    let opts = ExportOptions {
        plan: ExportPlan {
            output_width: args.width,
            output_height: args.height,
            receipt_width_ratio: args.receipt_width_ratio,
            receipt_height_ratio: args.receipt_height_ratio,
        },
        bitrate_kbps: args.bitrate_kbps,
    };

    let source = GifSource::from_arg(&args.gif);
    let mut progress = |event: readreel::ProgressEvent| match event.stage {
        ExportStage::EncodingFrame { index, total } => {
            eprintln!("frame {}/{total} ({}%)", index + 1, event.percent);
        }
        stage => eprintln!("{stage:?} ({}%)", event.percent),
    };

    let outcome = export_social(&source, &receipt, &opts, &mut progress)?;

    if matches!(outcome, ExportOutcome::Png { .. }) {
        eprintln!("mp4 export unavailable, wrote the image fallback instead");
    }

    let out_path = args
        .out
        .unwrap_or_else(|| PathBuf::from(outcome.file_name()));
    fs::write(&out_path, outcome.bytes())
        .with_context(|| format!("write output '{}'", out_path.display()))?;

    eprintln!("wrote {}", out_path.display());
    Ok(())
}

fn cmd_stats(args: StatsArgs) -> anyhow::Result<()> {
    let json = fs::read_to_string(&args.books)
        .with_context(|| format!("read book list '{}'", args.books.display()))?;
    let books: Vec<BookRecord> = serde_json::from_str(&json).context("parse book list JSON")?;

    let stats = ReadingStats::from_books(&books);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use clearview::client::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use clearview::{
    is_supported_image, GeminiClient, GeminiConfig, NotificationKind, Phase, ProcessingOptions,
    Session, View,
};

#[derive(Parser)]
#[command(
    name = "clearview",
    about = "Remove watermarks from images with a Gemini image model",
    version,
    after_help = "Simple usage: API_KEY=... clearview <image>  (writes clearview-cleaned-<millis>.png)\n\n\
                  Accepts PNG, JPEG and WebP files up to 5MB."
)]
struct Cli {
    /// Input image file or directory
    input: PathBuf,

    /// Output file or directory (default: current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// How aggressively to remove overlays (0-100)
    #[arg(short, long, default_value_t = clearview::DEFAULT_AGGRESSIVENESS,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    aggressiveness: u8,

    /// Only detect watermarks (reserved, currently has no effect)
    #[arg(long)]
    detect_only: bool,

    /// Model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// API base URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Access credential for the model API
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

/// What happened to one input file.
struct Outcome {
    path: PathBuf,
    success: bool,
    skipped: bool,
    message: String,
}

fn main() {
    let cli = Cli::parse();
    init_logger(&cli);

    if !cli.input.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input.display());
        process::exit(1);
    }

    let config = GeminiConfig {
        model: cli.model.clone(),
        endpoint: cli.endpoint.clone(),
        ..GeminiConfig::default()
    }
    .with_api_key(cli.api_key.clone());

    let client = match GeminiClient::new(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Fatal: Failed to initialize client: {e}");
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal: Failed to start runtime: {e}");
            process::exit(1);
        }
    };

    let options = ProcessingOptions::new(cli.aggressiveness, cli.detect_only);
    if !cli.quiet {
        eprintln!(
            "{} removal ({}% aggressiveness) with {}",
            options.instruction().label(),
            options.aggressiveness,
            cli.model
        );
        eprintln!();
    }

    let mut session = Session::new(client);
    let results = runtime.block_on(async {
        if cli.input.is_dir() {
            let Some(output_dir) = &cli.output else {
                eprintln!("Error: Output directory is required for batch processing");
                eprintln!("Usage: clearview <input_dir> -o <output_dir>");
                process::exit(1);
            };
            run_directory(&mut session, options, &cli.input, output_dir).await
        } else {
            let target = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
            vec![run_file(&mut session, options, &cli.input, &target, None).await]
        }
    });

    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_outcome(r, &cli);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn init_logger(cli: &Cli) {
    let level = if cli.quiet {
        log::LevelFilter::Error
    } else if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// Run one file through the session: select, process, save.
///
/// `name` overrides the generated download filename and marks a batch run,
/// where oversized files are skipped instead of failing the run.
async fn run_file(
    session: &mut Session<GeminiClient>,
    options: ProcessingOptions,
    input: &Path,
    target: &Path,
    name: Option<String>,
) -> Outcome {
    let mut outcome = Outcome {
        path: input.to_path_buf(),
        success: false,
        skipped: false,
        message: String::new(),
    };

    session.reset();
    if let Err(e) = session.update_options(options) {
        outcome.message = e.to_string();
        return outcome;
    }

    if !session.select_file(input).await {
        let note = session.notification();
        let oversized = input
            .metadata()
            .is_ok_and(|m| m.len() > clearview::MAX_UPLOAD_BYTES);
        outcome.skipped = name.is_some() && oversized;
        outcome.success = outcome.skipped;
        outcome.message = note.map(|n| n.message.clone()).unwrap_or_default();
        return outcome;
    }
    log::info!("{}", View::of(session).status_line());

    session.process().await;
    if session.phase() != Phase::Completed {
        outcome.message = session
            .notification()
            .filter(|n| n.kind == NotificationKind::Error)
            .map(|n| n.message.clone())
            .unwrap_or_else(|| clearview::session::GENERIC_FAILURE_MESSAGE.to_string());
        return outcome;
    }
    log::info!("{}", View::of(session).status_line());

    let download = match session.download(chrono::Utc::now().timestamp_millis()) {
        Ok(Some(d)) => d,
        Ok(None) => {
            outcome.message = "No processed image to save".to_string();
            return outcome;
        }
        Err(e) => {
            outcome.message = format!("Failed to decode result: {e}");
            return outcome;
        }
    };

    let target = match name {
        Some(name) => target.join(name),
        None => target.to_path_buf(),
    };
    match download.save_to(&target) {
        Ok(path) => {
            outcome.success = true;
            outcome.message = format!("Saved to {}", path.display());
        }
        Err(e) => outcome.message = format!("Failed to save: {e}"),
    }
    outcome
}

/// Process every supported image in `input_dir`, one at a time.
async fn run_directory(
    session: &mut Session<GeminiClient>,
    options: ProcessingOptions,
    input_dir: &Path,
    output_dir: &Path,
) -> Vec<Outcome> {
    let mut entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
        Ok(rd) => rd
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| is_supported_image(p))
            .collect(),
        Err(e) => {
            return vec![Outcome {
                path: input_dir.to_path_buf(),
                success: false,
                skipped: false,
                message: format!("Failed to read directory: {e}"),
            }];
        }
    };
    entries.sort();

    if let Err(e) = std::fs::create_dir_all(output_dir) {
        return vec![Outcome {
            path: output_dir.to_path_buf(),
            success: false,
            skipped: false,
            message: format!("Failed to create output directory: {e}"),
        }];
    }

    let mut results = Vec::with_capacity(entries.len());
    for path in entries {
        let stem = path.file_stem().unwrap_or_default().to_string_lossy();
        let name = format!("{stem}_cleaned.png");
        results.push(run_file(session, options, &path, output_dir, Some(name)).await);
    }
    results
}

fn print_outcome(outcome: &Outcome, cli: &Cli) {
    if cli.quiet && outcome.success {
        return;
    }

    let filename = outcome.path.file_name().map_or_else(
        || outcome.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if outcome.skipped {
        if !cli.quiet {
            eprintln!("[SKIP] {filename}: {}", outcome.message);
        }
    } else if outcome.success {
        if !cli.quiet {
            eprintln!("[OK] {filename}");
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", outcome.message);
    }

    if cli.verbose && !outcome.message.is_empty() {
        eprintln!("  -> {}", outcome.message);
    }
}

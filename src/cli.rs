// Command-line interface for ipsdelta.
//
// Subcommands: `create` (diff two files into a patch), `apply` (replay a
// patch onto a source file), `info` (list the hunks of a patch). Output
// paths default to sensible derivations of the input names, and existing
// files are never overwritten without --force.

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::io::{self, ApplyFileOptions, CreateFileOptions};
use crate::ips::decoder::{HunkPayload, HunkReader};
use crate::ips::format::format_hex;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// IPS binary patch creator/applier.
#[derive(Parser, Debug)]
#[command(
    name = "ipsdelta",
    version,
    about = "IPS binary patch creator/applier",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Allow overwriting existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (per-hunk diagnostics on stderr).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stdout.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a patch from a source file and a target file.
    Create(CreateArgs),
    /// Apply a patch to a source file.
    Apply(ApplyArgs),
    /// Print the hunks of a patch file.
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Original file.
    #[arg(value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// Modified file the patch should produce.
    #[arg(value_hint = ValueHint::FilePath)]
    target: PathBuf,

    /// Output patch file (default: target name with an .ips extension).
    #[arg(value_hint = ValueHint::FilePath)]
    patch: Option<PathBuf>,

    /// Emit regular hunks only, never RLE.
    #[arg(long = "no-rle")]
    no_rle: bool,

    /// Stop before writing the output file.
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// File to patch.
    #[arg(value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// IPS patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Output file (default: patch name with the source's extension).
    #[arg(value_hint = ValueHint::FilePath)]
    target: Option<PathBuf>,

    /// Check the source file against this SHA-256 digest before patching.
    #[arg(long = "sha256", value_name = "HEX")]
    sha256: Option<String>,

    /// Stop before writing the output file.
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// IPS patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,
}

// ---------------------------------------------------------------------------
// Default output paths
// ---------------------------------------------------------------------------

/// `apply smiley.bin fix.ips` writes to `fix.bin`.
fn default_apply_output(source: &Path, patch: &Path) -> PathBuf {
    let mut out = patch.with_extension("");
    if let Some(ext) = source.extension() {
        out.set_extension(ext);
    }
    out
}

/// `create smiley.bin frowny.bin` writes to `frowny.ips`.
fn default_patch_output(target: &Path) -> PathBuf {
    target.with_extension("ips")
}

/// Refuse to clobber an input, and an existing output without --force.
fn check_output(output: &Path, inputs: &[&Path], cli: &Cli, dry_run: bool) -> Result<(), String> {
    if inputs.iter().any(|input| *input == output) {
        return Err(format!(
            "not overwriting input file: {}",
            output.display()
        ));
    }
    if output.exists() && !cli.force && !dry_run {
        return Err(format!(
            "output file exists, use -f to overwrite: {}",
            output.display()
        ));
    }
    Ok(())
}

fn opt_hex(digest: &Option<[u8; 32]>) -> Option<String> {
    digest.as_ref().map(io::digest_hex)
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

fn cmd_create(cli: &Cli, args: &CreateArgs) -> i32 {
    let patch_path = args
        .patch
        .clone()
        .unwrap_or_else(|| default_patch_output(&args.target));

    if let Err(msg) = check_output(&patch_path, &[&args.source, &args.target], cli, args.dry_run) {
        eprintln!("ipsdelta: create: {msg}");
        return 1;
    }

    let stats = match io::create_file(
        &args.source,
        &args.target,
        &patch_path,
        CreateFileOptions {
            use_rle: !args.no_rle,
            dry_run: args.dry_run,
        },
    ) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("ipsdelta: create: {e}");
            return 1;
        }
    };

    if cli.json_output {
        let json = serde_json::json!({
            "command": "create",
            "source": args.source.display().to_string(),
            "target": args.target.display().to_string(),
            "patch": patch_path.display().to_string(),
            "source_size": stats.source_size,
            "target_size": stats.target_size,
            "patch_size": stats.patch_size,
            "hunks": stats.hunks,
            "source_sha256": opt_hex(&stats.source_sha256),
            "target_sha256": opt_hex(&stats.target_sha256),
            "patch_sha256": opt_hex(&stats.patch_sha256),
            "dry_run": args.dry_run,
        });
        println!("{json}");
    } else if !cli.quiet {
        if args.dry_run {
            eprintln!("ipsdelta: dry run, not writing: {}", patch_path.display());
        }
        eprintln!(
            "ipsdelta: create: {} hunks, {} bytes -> {}",
            stats.hunks,
            stats.patch_size,
            patch_path.display()
        );
        if cli.verbose > 0 {
            for (name, digest) in [
                ("source", &stats.source_sha256),
                ("target", &stats.target_sha256),
                ("patch", &stats.patch_sha256),
            ] {
                if let Some(hex) = opt_hex(digest) {
                    eprintln!("ipsdelta: {name} sha256: {hex}");
                }
            }
        }
    }

    0
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

fn cmd_apply(cli: &Cli, args: &ApplyArgs) -> i32 {
    let output_path = args
        .target
        .clone()
        .unwrap_or_else(|| default_apply_output(&args.source, &args.patch));

    if let Err(msg) = check_output(&output_path, &[&args.source, &args.patch], cli, args.dry_run) {
        eprintln!("ipsdelta: apply: {msg}");
        return 1;
    }

    let expected_source_sha256 = match args.sha256.as_deref().map(io::parse_digest) {
        Some(None) => {
            eprintln!("ipsdelta: apply: --sha256 expects 64 hex digits");
            return 1;
        }
        Some(Some(digest)) => Some(digest),
        None => None,
    };

    let stats = match io::apply_file(
        &args.source,
        &args.patch,
        &output_path,
        ApplyFileOptions {
            dry_run: args.dry_run,
            expected_source_sha256,
        },
    ) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("ipsdelta: apply: {e}");
            return 1;
        }
    };

    if cli.json_output {
        let json = serde_json::json!({
            "command": "apply",
            "source": args.source.display().to_string(),
            "patch": args.patch.display().to_string(),
            "output": output_path.display().to_string(),
            "source_size": stats.source_size,
            "patch_size": stats.patch_size,
            "output_size": stats.output_size,
            "hunks": stats.hunks,
            "source_sha256": opt_hex(&stats.source_sha256),
            "patch_sha256": opt_hex(&stats.patch_sha256),
            "output_sha256": opt_hex(&stats.output_sha256),
            "dry_run": args.dry_run,
        });
        println!("{json}");
    } else if !cli.quiet {
        if args.dry_run {
            eprintln!("ipsdelta: dry run, not writing: {}", output_path.display());
        }
        eprintln!(
            "ipsdelta: apply: {} hunks, {} bytes -> {}",
            stats.hunks,
            stats.output_size,
            output_path.display()
        );
        if cli.verbose > 0 {
            for (name, digest) in [
                ("source", &stats.source_sha256),
                ("patch", &stats.patch_sha256),
                ("output", &stats.output_sha256),
            ] {
                if let Some(hex) = opt_hex(digest) {
                    eprintln!("ipsdelta: {name} sha256: {hex}");
                }
            }
        }
    }

    0
}

// ---------------------------------------------------------------------------
// info
// ---------------------------------------------------------------------------

fn cmd_info(cli: &Cli, args: &InfoArgs) -> i32 {
    let patch = match std::fs::read(&args.patch) {
        Ok(patch) => patch,
        Err(e) => {
            eprintln!("ipsdelta: info: {}: {e}", args.patch.display());
            return 1;
        }
    };

    let mut reader = match HunkReader::new(&patch) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("ipsdelta: info: {e}");
            return 1;
        }
    };

    let mut hunks: u64 = 0;
    let mut written: u64 = 0;
    loop {
        match reader.next_hunk() {
            Ok(Some(hunk)) => {
                hunks += 1;
                written += hunk.payload.len() as u64;
                match hunk.payload {
                    HunkPayload::Literal(bytes) => println!(
                        "{}  regular  {:>5} bytes",
                        format_hex(hunk.offset, 3),
                        bytes.len()
                    ),
                    HunkPayload::Run { length, value } => println!(
                        "{}  rle      {:>5} bytes of {}",
                        format_hex(hunk.offset, 3),
                        length,
                        format_hex(u32::from(value), 1)
                    ),
                }
            }
            Ok(None) => break,
            Err(e) => {
                eprintln!("ipsdelta: info: {e}");
                return 1;
            }
        }
    }

    let trailing = reader.trailing_bytes();
    if !cli.quiet {
        eprintln!("ipsdelta: info: {hunks} hunks, {written} bytes written");
        if trailing > 0 {
            eprintln!("ipsdelta: info: {trailing} trailing bytes after EOF");
        }
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();

    // -v surfaces the codec's per-hunk diagnostics, -q errors only.
    let default_filter = if cli.quiet {
        "error"
    } else if cli.verbose > 0 {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match &cli.command {
        Cmd::Create(args) => cmd_create(&cli, args),
        Cmd::Apply(args) => cmd_apply(&cli, args),
        Cmd::Info(args) => cmd_info(&cli, args),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

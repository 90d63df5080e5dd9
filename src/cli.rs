// Command-line front end for sdiff.
//
// Subcommands map onto the file-level operations in `io`:
//   create   new + old -> patch
//   apply    patch + target -> output
//   inspect  print the header and command stream of a patch
//   config   print build/configuration details

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::apply::ApplyOptions;
use crate::compress::{self, Compression};
use crate::diff::{DEFAULT_LOOKAHEAD, DiffOptions};
use crate::engine::{self, PatchOptions};
use crate::error::{Hex, PatchError};
use crate::io::{self as patch_io, IoError, Overwrite};
use crate::patch::{self, CommandRef, HEADER_LEN};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Greedy binary diff/patch tool.
#[derive(Parser, Debug)]
#[command(
    name = "sdiff",
    version,
    about = "Greedy binary diff/patch tool",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Replace an existing output file once the result has been built.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a patch that turns OLD into NEW.
    Create(CreateArgs),
    /// Apply a patch to a target file.
    Apply(ApplyArgs),
    /// Print the header and commands of a patch.
    Inspect(InspectArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CompressionArg {
    /// Pick by the patch file's extension, else none.
    Auto,
    None,
    Deflate,
    Gzip,
    Lzma,
    Zstd,
    Brotli,
}

#[derive(Args, Debug)]
struct CompressionFlags {
    /// Compression wrapped around the patch.
    #[arg(long, short = 'z', value_enum, default_value_t = CompressionArg::Auto)]
    compression: CompressionArg,

    /// Compression level (deflate/gzip: 0-9, zstd: 1-22, brotli: 0-11).
    #[arg(long, short = 'l', allow_negative_numbers = true)]
    level: Option<i32>,
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// The updated file the patch reconstructs.
    #[arg(long, short = 'n', value_hint = ValueHint::FilePath)]
    new: PathBuf,

    /// The base file the patch is applied to.
    #[arg(long, short = 'o', value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// Patch file (default: a fresh diff*.sdiff temp file).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Resynchronization window of the differencer.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..), default_value_t = DEFAULT_LOOKAHEAD as u32)]
    lookahead: u32,

    #[command(flatten)]
    compression: CompressionFlags,

    /// Patch file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Patch file.
    #[arg(long, short = 'p', value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Base file to apply the patch to.
    #[arg(long, short = 't', value_hint = ValueHint::FilePath)]
    target: PathBuf,

    /// Output file (default: a fresh diff*.tmp temp file).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Fail when the rebuilt length differs from the recorded length.
    #[arg(long = "strict-length")]
    strict_length: bool,

    #[command(flatten)]
    compression: CompressionFlags,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    #[command(flatten)]
    compression: CompressionFlags,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Create,
    Apply,
    Inspect,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    compression: CompressionArg,
    level: Option<i32>,
    lookahead: usize,
    strict_length: bool,
    new_file: Option<PathBuf>,
    old_file: Option<PathBuf>,
    patch_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

impl Options {
    fn base(command: Command, cli: &Cli) -> Self {
        Self {
            command,
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            json_output: cli.json_output,
            compression: CompressionArg::Auto,
            level: None,
            lookahead: DEFAULT_LOOKAHEAD,
            strict_length: false,
            new_file: None,
            old_file: None,
            patch_file: None,
            output_file: None,
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    match &cli.command {
        Cmd::Create(args) => Options {
            compression: args.compression.compression,
            level: args.compression.level,
            lookahead: args.lookahead as usize,
            new_file: Some(args.new.clone()),
            old_file: Some(args.old.clone()),
            output_file: args.output.clone().or_else(|| args.output_pos.clone()),
            ..Options::base(Command::Create, &cli)
        },
        Cmd::Apply(args) => Options {
            compression: args.compression.compression,
            level: args.compression.level,
            strict_length: args.strict_length,
            patch_file: Some(args.patch.clone()),
            old_file: Some(args.target.clone()),
            output_file: args.output.clone().or_else(|| args.output_pos.clone()),
            ..Options::base(Command::Apply, &cli)
        },
        Cmd::Inspect(args) => Options {
            compression: args.compression.compression,
            level: args.compression.level,
            patch_file: Some(args.input.clone()),
            ..Options::base(Command::Inspect, &cli)
        },
        Cmd::Config => Options::base(Command::Config, &cli),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("sdiff".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = build_compression(opts.compression, opts.level, opts.patch_file.as_deref());
    }
}

// ---------------------------------------------------------------------------
// Option mapping
// ---------------------------------------------------------------------------

/// Pick the built-in backend whose extension matches `path`.
fn compression_for_path(path: &Path) -> Compression {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
    let Some(name) = name else {
        return Compression::None;
    };
    compress::available_names()
        .into_iter()
        .filter_map(|n| Compression::from_name(n).ok())
        .find(|c| {
            c.backend()
                .is_some_and(|b| !b.file_extension().is_empty() && name.ends_with(b.file_extension()))
        })
        .unwrap_or(Compression::None)
}

fn build_compression(
    arg: CompressionArg,
    level: Option<i32>,
    patch_path: Option<&Path>,
) -> Result<Compression, PatchError> {
    let selected = match arg {
        CompressionArg::Auto => patch_path.map_or(Compression::None, compression_for_path),
        CompressionArg::None => Compression::None,
        CompressionArg::Deflate => Compression::from_name("deflate")?,
        CompressionArg::Gzip => Compression::from_name("gzip")?,
        CompressionArg::Lzma => Compression::from_name("lzma")?,
        CompressionArg::Zstd => Compression::from_name("zstd")?,
        CompressionArg::Brotli => Compression::from_name("brotli")?,
    };
    let Some(level) = level else {
        return Ok(selected);
    };
    match selected {
        #[cfg(feature = "deflate")]
        Compression::Deflate { .. } => Ok(Compression::Deflate {
            level: deflate_level(level)?,
        }),
        #[cfg(feature = "deflate")]
        Compression::Gzip { .. } => Ok(Compression::Gzip {
            level: deflate_level(level)?,
        }),
        #[cfg(feature = "zstd")]
        Compression::Zstd { .. } => Ok(Compression::Zstd { level }),
        #[cfg(feature = "brotli")]
        Compression::Brotli { .. } => Ok(Compression::Brotli {
            quality: brotli_quality(level)?,
        }),
        other => Ok(other),
    }
}

#[cfg(feature = "deflate")]
fn deflate_level(level: i32) -> Result<u32, PatchError> {
    u32::try_from(level)
        .ok()
        .filter(|l| *l <= 9)
        .ok_or_else(|| PatchError::InvalidOptions(format!("deflate level {level} is not in 0-9")))
}

#[cfg(feature = "brotli")]
fn brotli_quality(level: i32) -> Result<u32, PatchError> {
    u32::try_from(level)
        .ok()
        .filter(|q| *q <= 11)
        .ok_or_else(|| PatchError::InvalidOptions(format!("brotli quality {level} is not in 0-11")))
}

fn build_patch_options(opts: &Options) -> Result<PatchOptions, PatchError> {
    let patch_path = match opts.command {
        Command::Create => opts.output_file.as_deref(),
        _ => opts.patch_file.as_deref(),
    };
    Ok(PatchOptions {
        diff: DiffOptions {
            lookahead: opts.lookahead,
        },
        apply: ApplyOptions {
            strict_length: opts.strict_length,
        },
        compression: build_compression(opts.compression, opts.level, patch_path)?,
    })
}

fn overwrite_policy(force: bool) -> Overwrite {
    if force {
        Overwrite::Always
    } else {
        Overwrite::ScratchOnly
    }
}

fn report_error(context: &str, e: &IoError) {
    match e {
        IoError::AlreadyExists { path, .. } => {
            eprintln!(
                "sdiff: output file exists, use -f to overwrite: {}",
                path.display()
            );
        }
        IoError::Patch(pe) if pe.is_base_mismatch() => {
            eprintln!("sdiff: {context}: {e} (wrong base file?)");
        }
        IoError::Patch(pe) if pe.is_corrupt_patch() => {
            eprintln!("sdiff: {context}: {e} (corrupted patch or wrong compression?)");
        }
        _ => eprintln!("sdiff: {context}: {e}"),
    }
}

fn print_json(json: &serde_json::Value) {
    if let Ok(text) = serde_json::to_string_pretty(json) {
        eprintln!("{text}");
    }
}

fn hex_opt(digest: Option<[u8; 32]>) -> Option<String> {
    digest.map(|d| Hex(&d).to_string())
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("sdiff version {version}");

    let md5 = cfg!(feature = "md5") as u8;
    let deflate = cfg!(feature = "deflate") as u8;
    let lzma = cfg!(feature = "lzma") as u8;
    let zstd = cfg!(feature = "zstd") as u8;
    let brotli = cfg!(feature = "brotli") as u8;
    let file_io = cfg!(feature = "file-io") as u8;

    eprintln!("DIGEST_MD5={md5}");
    eprintln!("COMPRESS_DEFLATE={deflate}");
    eprintln!("COMPRESS_LZMA={lzma}");
    eprintln!("COMPRESS_ZSTD={zstd}");
    eprintln!("COMPRESS_BROTLI={brotli}");
    eprintln!("FILE_IO={file_io}");
    eprintln!("COMPRESSION_BACKENDS={}", compress::available_names().join(","));
    eprintln!("DEFAULT_LOOKAHEAD={DEFAULT_LOOKAHEAD}");
    eprintln!("DEFAULT_DEFLATE_LEVEL={}", compress::DEFAULT_DEFLATE_LEVEL);
    eprintln!("DEFAULT_ZSTD_LEVEL={}", compress::DEFAULT_ZSTD_LEVEL);
    eprintln!("DEFAULT_BROTLI_QUALITY={}", compress::DEFAULT_BROTLI_QUALITY);
    eprintln!("HEADER_LEN={HEADER_LEN}");
    eprintln!("MAX_LEN={}", patch::MAX_LEN);

    0
}

// ---------------------------------------------------------------------------
// Create command
// ---------------------------------------------------------------------------

fn cmd_create(opts: &Options) -> i32 {
    let (Some(new_file), Some(old_file)) = (&opts.new_file, &opts.old_file) else {
        eprintln!("sdiff: create requires --new and --old");
        return 1;
    };
    let patch_opts = match build_patch_options(opts) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("sdiff: {e}");
            return 1;
        }
    };

    let (patch_path, stats) = match &opts.output_file {
        Some(path) => {
            let result = patch_io::create_patch_file_with(
                new_file,
                old_file,
                path,
                &patch_opts,
                overwrite_policy(opts.force),
            );
            match result {
                Ok(stats) => (path.clone(), Some(stats)),
                Err(e) => {
                    report_error("create", &e);
                    return 1;
                }
            }
        }
        None => match patch_io::create_patch_temp(new_file, old_file, &patch_opts) {
            Ok(path) => {
                println!("{}", path.display());
                (path, None)
            }
            Err(e) => {
                report_error("create", &e);
                return 1;
            }
        },
    };

    if let Some(stats) = &stats {
        if opts.verbose > 0 && !opts.quiet {
            eprintln!(
                "sdiff: create: new size: {}, old size: {}, patch size: {}, commands: {}",
                stats.new_size, stats.old_size, stats.patch_size, stats.commands
            );
        }
        if opts.json_output {
            print_json(&serde_json::json!({
                "command": "create",
                "patch": patch_path.display().to_string(),
                "new_size": stats.new_size,
                "old_size": stats.old_size,
                "serialized_size": stats.serialized_size,
                "patch_size": stats.patch_size,
                "commands": stats.commands,
                "inserted_bytes": stats.inserted_bytes,
                "deleted_bytes": stats.deleted_bytes,
                "compression": patch_opts.compression.name(),
                "lookahead": opts.lookahead,
                "new_sha256": hex_opt(stats.new_sha256),
            }));
        }
    } else if opts.json_output {
        print_json(&serde_json::json!({
            "command": "create",
            "patch": patch_path.display().to_string(),
            "compression": patch_opts.compression.name(),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn cmd_apply(opts: &Options) -> i32 {
    let (Some(patch_file), Some(target_file)) = (&opts.patch_file, &opts.old_file) else {
        eprintln!("sdiff: apply requires --patch and --target");
        return 1;
    };
    let patch_opts = match build_patch_options(opts) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("sdiff: {e}");
            return 1;
        }
    };

    let result = match &opts.output_file {
        Some(path) => patch_io::apply_patch_file_with(
            patch_file,
            target_file,
            path,
            &patch_opts,
            overwrite_policy(opts.force),
        )
        .map(|stats| (path.clone(), Some(stats))),
        None => patch_io::apply_patch_temp(patch_file, target_file, &patch_opts).map(|path| {
            println!("{}", path.display());
            (path, None)
        }),
    };

    let (output_path, stats) = match result {
        Ok(r) => r,
        Err(e) => {
            report_error("apply", &e);
            return 1;
        }
    };

    if let Some(stats) = &stats {
        if opts.verbose > 0 && !opts.quiet {
            eprintln!(
                "sdiff: apply: patch size: {}, target size: {}, output size: {}",
                stats.patch_size, stats.old_size, stats.output_size
            );
        }
        if opts.json_output {
            print_json(&serde_json::json!({
                "command": "apply",
                "output": output_path.display().to_string(),
                "patch_size": stats.patch_size,
                "target_size": stats.old_size,
                "output_size": stats.output_size,
                "compression": patch_opts.compression.name(),
                "output_sha256": hex_opt(stats.output_sha256),
            }));
        }
    } else if opts.json_output {
        print_json(&serde_json::json!({
            "command": "apply",
            "output": output_path.display().to_string(),
            "compression": patch_opts.compression.name(),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn cmd_inspect(opts: &Options) -> i32 {
    let Some(input_file) = &opts.patch_file else {
        eprintln!("sdiff: inspect requires an input file");
        return 1;
    };
    let compression = match build_compression(opts.compression, opts.level, Some(input_file)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("sdiff: {e}");
            return 1;
        }
    };

    let blob = match fs::read(input_file) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("sdiff: {}: {e}", input_file.display());
            return 1;
        }
    };
    let serialized = match engine::unwrap_blob(&blob, &compression) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("sdiff: {}: {e}", input_file.display());
            return 1;
        }
    };
    let (header, commands) = match patch::split(&serialized) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("sdiff: invalid patch header: {e}");
            return 1;
        }
    };

    println!("patch file:                   {}", input_file.display());
    println!("compression:                  {}", compression.name());
    println!("patch size:                   {}", blob.len());
    println!("serialized size:              {}", serialized.len());
    println!("target length:                {}", header.new_len);
    println!("base length:                  {}", header.old_len);
    println!("target digest (md5):          {}", Hex(&header.new_digest));

    let verbose_listing = !opts.quiet;
    if verbose_listing {
        println!();
        println!("  Offset  Command       Length");
    }

    let (mut equal, mut inserted, mut deleted, mut count) = (0u64, 0u64, 0u64, 0usize);
    let mut offset = HEADER_LEN;
    for item in commands {
        let command = match item {
            Ok(c) => c,
            Err(e) => {
                eprintln!("sdiff: {e}");
                return 1;
            }
        };
        if verbose_listing {
            let name = match command {
                CommandRef::Equal { .. } => "EQUAL",
                CommandRef::Insert { .. } => "INSERT",
                CommandRef::Delete { .. } => "DELETE",
            };
            println!("{offset:>8}  {name:<12}  {}", command.len());
        }
        match command {
            CommandRef::Equal { len } => equal += u64::from(len),
            CommandRef::Insert { data } => inserted += data.len() as u64,
            CommandRef::Delete { data } => deleted += data.len() as u64,
        }
        offset += command.encoded_len();
        count += 1;
    }

    if verbose_listing {
        println!();
    }
    println!("commands:                     {count}");
    println!("equal bytes:                  {equal}");
    println!("inserted bytes:               {inserted}");
    println!("deleted bytes:                {deleted}");

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "inspect",
            "patch_size": blob.len(),
            "serialized_size": serialized.len(),
            "new_len": header.new_len,
            "old_len": header.old_len,
            "new_md5": Hex(&header.new_digest).to_string(),
            "commands": count,
            "equal_bytes": equal,
            "inserted_bytes": inserted,
            "deleted_bytes": deleted,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run the CLI. Parses arguments, dispatches the subcommand, exits.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let default_filter = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Create => cmd_create(&opts),
        Command::Apply => cmd_apply(&opts),
        Command::Inspect => cmd_inspect(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

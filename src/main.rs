use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::Level;

use namb::architectures;
use namb::format::{HEADER_SIZE, NAMB_MAGIC};
use namb::{BinaryReader, LoadOptions, ModelMetadata, NambHeader, NambModel, registry};

/// Command line interface for NAMB file inspection
#[derive(Debug, Parser)]
#[command(name = "namb", version, about = "Inspect NAMB model files")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Show detailed output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show basic file information
    Info { file: PathBuf },
    /// Display all metadata fields
    Metadata { file: PathBuf },
    /// Show the parsed architecture configuration
    Config { file: PathBuf },
    /// Validate the file by loading it with all checks enabled
    Validate { file: PathBuf },
    /// List the registered architectures
    Architectures,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(args) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    registry::ensure_initialized();

    match args.command {
        Command::Info { file } => show_info(&file, args.verbose)?,
        Command::Metadata { file } => show_metadata(&file)?,
        Command::Config { file } => show_config(&file)?,
        Command::Validate { file } => validate_file(&file)?,
        Command::Architectures => list_architectures(),
    }

    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()).into());
    }
    Ok(std::fs::read(path)?)
}

fn architecture_label(arch_id: u8) -> String {
    match architectures::name_of(arch_id) {
        Some(name) => format!("{} ({})", name, arch_id),
        None if registry::global().has(arch_id) => format!("custom ({})", arch_id),
        None => format!("unknown ({})", arch_id),
    }
}

fn show_info(path: &Path, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = read_file(path)?;
    let mut reader = BinaryReader::new(&bytes);
    let header = NambHeader::parse(&mut reader)?;

    if !header.is_version_supported() {
        println!("⚠️  Warning: NAMB version {} may not be fully supported", header.version);
    }

    println!("📄 NAMB File Information");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("File: {}", path.display());
    println!("Version: {}", header.version);
    println!("Architecture: {}", architecture_label(header.architecture));
    println!("Payload: {} bytes", header.payload_len);

    let options = LoadOptions::default().allow_unsupported_version(true);
    let model = NambModel::from_bytes_with(registry::global(), &bytes, &options)?;
    println!("Weights: {}", model.weights.len());

    if verbose {
        println!("File size: {} bytes ({:.2} MB)", bytes.len(), bytes.len() as f64 / 1_048_576.0);
        println!("Flags: 0x{:02X}", header.flags);
        println!("Header size: {} bytes", HEADER_SIZE);
        if let Some(expected) = model.config.weight_count() {
            println!("Expected weights: {}", expected);
        }
    }

    Ok(())
}

fn show_metadata(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = read_file(path)?;
    let mut reader = BinaryReader::new(&bytes);
    NambHeader::parse(&mut reader)?;
    let metadata = ModelMetadata::parse(&mut reader)?;

    println!("🔍 NAMB Metadata ({} fields)", metadata.fields.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("version: \"{}\"", metadata.version);
    print_optional("sample_rate", metadata.sample_rate);
    print_optional("loudness", metadata.loudness);
    print_optional("input_level_dbu", metadata.input_level_dbu);
    print_optional("output_level_dbu", metadata.output_level_dbu);

    // BTreeMap keeps keys sorted
    for (key, value) in &metadata.fields {
        println!("{}: \"{}\"", key, value);
    }

    Ok(())
}

fn print_optional<T: std::fmt::Display>(label: &str, value: Option<T>) {
    if let Some(value) = value {
        println!("{}: {}", label, value);
    }
}

fn show_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let model = NambModel::load(path)?;

    println!("🧩 {} configuration", model.architecture_name());
    println!("━━━━━━━━━━━━━━━━━━━━");
    println!("{:#?}", model.config);

    Ok(())
}

fn validate_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("✅ NAMB File Validation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("File: {}", path.display());

    let bytes = read_file(path)?;
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if bytes.len() < HEADER_SIZE {
        issues.push(format!("File too small to be a valid NAMB file ({} bytes)", bytes.len()));
    } else if bytes[..NAMB_MAGIC.len()] != NAMB_MAGIC {
        issues.push("Invalid magic bytes".to_string());
    } else {
        println!("✓ Magic bytes are valid");
        let header = NambHeader::parse(&mut BinaryReader::new(&bytes))?;

        if header.is_version_supported() {
            println!("✓ Version {} is supported", header.version);
        } else {
            warnings.push(format!("Version {} may not be fully supported", header.version));
        }

        if registry::global().has(header.architecture) {
            println!("✓ Architecture {} is registered", architecture_label(header.architecture));
        } else {
            issues.push(format!("Architecture {} has no parser", header.architecture));
        }

        if issues.is_empty() {
            let options = LoadOptions::default().allow_unsupported_version(true);
            match NambModel::from_bytes_with(registry::global(), &bytes, &options) {
                Ok(model) => println!("✓ Loaded {} weights", model.weights.len()),
                Err(err) => issues.push(err.to_string()),
            }
        }
    }

    if !warnings.is_empty() {
        println!("\n⚠️  Warnings:");
        for warning in warnings {
            println!("  - {}", warning);
        }
    }

    if !issues.is_empty() {
        println!("\n❌ Issues found:");
        for issue in issues {
            println!("  - {}", issue);
        }
        return Err("File validation failed".into());
    }

    println!("\n🎉 File appears to be a valid NAMB file!");
    Ok(())
}

fn list_architectures() {
    let ids = registry::global().ids();
    println!("📜 Architectures ({} registered)", ids.len());
    println!("━━━━━━━━━━━━━━━━━━━━");
    for id in ids {
        println!("{:>4}: {}", id, architecture_label(id));
    }
}

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use orient_binary::stream::Writer;
use orient_binary::varint::{read_varint, write_varint};
use orient_binary::{
    BinaryError, CodecConfig, ConfigError, Document, GlobalProperties, ParseRidError,
    RecordSerializer, Rid, SchemaFile,
};

mod json;

use json::{
    ConvertError, DocumentJson, bytes_to_hex, document_from_json, document_to_json, hex_to_bytes,
};

/// CLI-specific errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Codec error
    #[error(transparent)]
    Codec(#[from] BinaryError),

    /// Config or schema file error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or writing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document description does not match its declared types
    #[error("Invalid document description: {0}")]
    Convert(#[from] ConvertError),

    /// Bad hex input
    #[error("Invalid hex input: {0}")]
    Hex(String),

    /// Bad RID text
    #[error(transparent)]
    Rid(#[from] ParseRidError),
}

#[derive(Parser)]
#[command(name = "orient-record")]
#[command(about = "Inspect and build OrientDB binary records")]
struct Cli {
    /// Log codec activity to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a binary record and print it as JSON
    Decode {
        /// Input file containing the record bytes
        input: PathBuf,

        /// Input is a bare document without the version byte
        #[arg(long)]
        document: bool,

        /// Offset of the document inside the input (with --document)
        #[arg(long, default_value_t = 0, requires = "document")]
        offset: usize,

        /// TOML file with the database's global properties
        #[arg(long, env = "ORIENT_RECORD_SCHEMA")]
        schema: Option<PathBuf>,

        /// TOML file with codec limits
        #[arg(long, env = "ORIENT_RECORD_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Encode a JSON document description to a binary record
    Encode {
        /// JSON file describing the document
        input: PathBuf,

        /// Output file for the record bytes
        #[arg(short, long)]
        output: PathBuf,

        /// Write a bare document without the version byte
        #[arg(long)]
        document: bool,

        /// TOML file with codec limits
        #[arg(long, env = "ORIENT_RECORD_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Zigzag varint conversions
    Varint {
        #[command(subcommand)]
        command: VarintCommands,
    },

    /// Print the fixed 10-byte wire form of a RID such as #12:4
    Rid {
        /// RID text
        rid: String,
    },
}

#[derive(Subcommand)]
enum VarintCommands {
    /// Print the varint bytes of a signed integer as hex
    Encode {
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },

    /// Decode hex varint bytes to a signed integer
    Decode { hex: String },
}

/// Render an error for stderr, followed by a hint line when one applies.
/// Labels are colored only when stderr is a terminal.
fn format_error(err: &AppError) -> String {
    use std::io::IsTerminal;

    let tty = std::io::stderr().is_terminal();
    let label = |ansi: &str, text: &str| {
        if tty {
            format!("\x1b[{ansi}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    };

    let mut lines = vec![format!("{} {err}", label("1;31", "error:"))];
    if let Some(hint) = get_error_hint(err) {
        lines.push(format!("{} {hint}", label("36", "hint:")));
    }
    lines.join("\n") + "\n"
}

/// Suggest the flag or input change that usually fixes `err`.
fn get_error_hint(err: &AppError) -> Option<&'static str> {
    let AppError::Codec(codec) = err else {
        return match err {
            AppError::Convert(convert) if matches!(convert.root_cause(), ConvertError::Bag(_)) => {
                Some("Raise embedded_threshold under [bag] in the --config file")
            }
            AppError::Convert(_) => Some(
                "Fields look like {\"name\": \"age\", \"type\": \"INTEGER\", \"value\": 36}",
            ),
            AppError::Hex(_) => Some("Give bytes as hex digits, e.g. ac02"),
            _ => None,
        };
    };
    match codec.root_cause() {
        BinaryError::UnsupportedVersion(_) => {
            Some("Pass --document if the input is a nested document without a version byte")
        }
        BinaryError::GlobalPropertyNotFound(_) => {
            Some("Pass --schema with the database's global property table")
        }
        BinaryError::DepthLimitExceeded(_) => Some("Raise max_depth in the --config file"),
        _ => None,
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "orient_binary=debug",
        _ => "orient_binary=trace",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    } else {
        EnvFilter::new(default)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli.command) {
        eprint!("{}", format_error(&err));
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<CodecConfig, AppError> {
    match path {
        Some(path) => Ok(CodecConfig::from_file(path)?),
        None => Ok(CodecConfig::default()),
    }
}

fn load_schema(path: Option<&Path>) -> Result<GlobalProperties, AppError> {
    match path {
        Some(path) => Ok(SchemaFile::from_file(path)?),
        None => Ok(GlobalProperties::default()),
    }
}

fn decode(
    bytes: &[u8],
    document: bool,
    offset: usize,
    schema: &GlobalProperties,
    config: CodecConfig,
) -> Result<Document, AppError> {
    let serializer = RecordSerializer::with_config(schema, config);
    let mut doc = Document::new();
    if document {
        let end = serializer.deserialize_document_at(bytes, offset, &mut doc)?;
        tracing::debug!(offset, end, "decoded bare document");
    } else {
        serializer.deserialize_record(bytes, &mut doc)?;
    }
    Ok(doc)
}

fn encode(input: &DocumentJson, document: bool, config: CodecConfig) -> Result<Vec<u8>, AppError> {
    let doc = document_from_json(input, &config.bag)?;
    let serializer = RecordSerializer::with_config(&orient_binary::NoGlobalProperties, config);
    let bytes = if document {
        serializer.serialize_document(&doc, 0)?
    } else {
        serializer.serialize_record(&doc)?
    };
    Ok(bytes)
}

fn run(command: Commands) -> Result<(), AppError> {
    match command {
        Commands::Decode {
            input,
            document,
            offset,
            schema,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let schema = load_schema(schema.as_deref())?;
            let bytes = std::fs::read(&input)?;
            tracing::info!(path = %input.display(), len = bytes.len(), "decoding");

            let doc = decode(&bytes, document, offset, &schema, config)?;
            println!("{}", serde_json::to_string_pretty(&document_to_json(&doc))?);
            Ok(())
        }
        Commands::Encode {
            input,
            output,
            document,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let description: DocumentJson = serde_json::from_slice(&std::fs::read(&input)?)?;
            let bytes = encode(&description, document, config)?;
            std::fs::write(&output, &bytes)?;

            println!(
                "Encoded {} fields to {} ({} bytes)",
                description.fields.len(),
                output.display(),
                bytes.len()
            );
            Ok(())
        }
        Commands::Varint { command } => {
            match command {
                VarintCommands::Encode { value } => {
                    println!("{}", bytes_to_hex(&write_varint(value)));
                }
                VarintCommands::Decode { hex } => {
                    let bytes = hex_to_bytes(&hex).map_err(AppError::Hex)?;
                    let (value, consumed) = read_varint(&bytes)?;
                    if consumed < bytes.len() {
                        tracing::warn!(
                            trailing = bytes.len() - consumed,
                            "ignoring bytes after the varint"
                        );
                    }
                    println!("{value}");
                }
            }
            Ok(())
        }
        Commands::Rid { rid } => {
            let rid: Rid = rid.parse()?;
            let mut w = Writer::new();
            rid.to_stream(&mut w);
            println!("{}", bytes_to_hex(w.as_bytes()));
            Ok(())
        }
    }
}

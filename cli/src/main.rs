use clap::{Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use brine_pb::schema::DefKind;
use brine_pb::{compile_sources, describe_to_json, CompileOptions, ProtoError, Schema};

#[derive(Parser)]
#[command(name = "bpb")]
#[command(about = "Check, describe, or decode data against `.proto` schemas", long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SchemaArgs {
    /// Input `.proto` files, compiled together
    #[arg(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Accept `import` statements (imported files must also be passed with --input)
    #[arg(long)]
    allow_imports: bool,

    /// JSON file with compile options, e.g. `{"allow_imports": true}`
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the schema and list every type it defines
    Check {
        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Print the compiled descriptors as JSON
    Describe {
        #[command(flatten)]
        schema: SchemaArgs,
    },

    /// Decode a binary message and print it
    Decode {
        #[command(flatten)]
        schema: SchemaArgs,

        /// Fully-qualified message type, e.g. `my.game.Player`
        #[arg(short, long = "type")]
        type_name: String,

        /// File holding the encoded bytes
        #[arg(short, long)]
        data: PathBuf,

        /// Read the message from a frame with a length prefix of this integer type
        #[arg(long, conflicts_with = "frame_length")]
        length_type: Option<String>,

        /// Read the message from a frame of exactly this many bytes
        #[arg(long)]
        frame_length: Option<usize>,
    },
}

fn main() -> Result<(), ProtoError> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .init();

    match &cli.command {
        Commands::Check { schema } => {
            let schema = load_schema(schema)?;
            for def in &schema.defs {
                let kind = match def.kind {
                    DefKind::Message(ref message) => format!("message ({} fields)", message.fields.len()),
                    DefKind::Enum(ref enum_def) => format!("enum ({} values)", enum_def.values.len()),
                    DefKind::Framed(_) => "framed".to_string(),
                };
                println!("{} {}", def.name, kind);
            }
            Ok(())
        }

        Commands::Describe { schema } => {
            let schema = load_schema(schema)?;
            let json = describe_to_json(&schema).map_err(|e| ProtoError::Io(e.into()))?;
            println!("{}", json);
            Ok(())
        }

        Commands::Decode {
            schema,
            type_name,
            data,
            length_type,
            frame_length,
        } => {
            let mut schema = load_schema(schema)?;
            let bytes = fs::read(data)?;

            let read_as = if length_type.is_some() || frame_length.is_some() {
                let framed = format!("{}.frame", type_name);
                schema.add_framed(&framed, type_name, length_type.as_deref(), *frame_length)?;
                framed
            } else {
                type_name.clone()
            };

            let (value, consumed) = schema.read(&read_as, &bytes)?;
            debug!(consumed, total = bytes.len(), "decoded message");
            println!("{:?}", value);
            if consumed < bytes.len() {
                eprintln!("{} trailing bytes after the frame", bytes.len() - consumed);
            }
            Ok(())
        }
    }
}

fn load_schema(args: &SchemaArgs) -> Result<Schema, ProtoError> {
    let mut options = match args.config {
        Some(ref path) => read_options(path)?,
        None => CompileOptions::default(),
    };
    options.allow_imports |= args.allow_imports;

    let mut texts = Vec::with_capacity(args.input.len());
    for path in &args.input {
        texts.push(fs::read_to_string(path)?);
    }
    let sources: Vec<&str> = texts.iter().map(String::as_str).collect();

    let schema = compile_sources(&sources, &options)?;
    debug!(files = sources.len(), types = schema.defs.len(), "compiled schema");
    Ok(schema)
}

fn read_options(path: &Path) -> Result<CompileOptions, ProtoError> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| ProtoError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

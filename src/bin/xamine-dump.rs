use clap::Parser;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use xamine::wire::{compile_sources, examine, Conversation, ConversationFlags, Context, Direction, Item};

/// Loads XML-XCB schema files and dissects a single hex-encoded buffer.
///
/// This binary plays the role of the "host application" the core library
/// deliberately does not design: it owns `XAMINE_PATH` resolution, file I/O,
/// and presentation, none of which the dissector itself touches.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hex-encoded bytes to dissect (e.g. "0200070009000000...").
    hex: String,
    #[arg(long, value_enum, default_value = "response")]
    direction: CliDirection,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CliDirection {
    Request,
    Response,
}

impl From<CliDirection> for Direction {
    fn from(value: CliDirection) -> Direction {
        match value {
            CliDirection::Request => Direction::Request,
            CliDirection::Response => Direction::Response,
        }
    }
}

/// Resolves `XAMINE_PATH` (colon-separated directories, default `/usr/share/xcb`)
/// into the `*.xml` files it names, in the order encountered.
fn schema_paths() -> Vec<PathBuf> {
    let raw = std::env::var("XAMINE_PATH").unwrap_or_else(|_| "/usr/share/xcb".to_string());
    let mut paths = Vec::new();
    for dir in raw.split(':').filter(|s| !s.is_empty()) {
        let Ok(entries) = fs::read_dir(dir) else {
            tracing::warn!(dir, "could not read XAMINE_PATH entry");
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("xml") {
                paths.push(path);
            }
        }
    }
    paths
}

fn load_context() -> Context {
    let paths = schema_paths();
    let sources: Vec<(String, String)> = paths
        .iter()
        .filter_map(|path| {
            let text = fs::read_to_string(path).ok()?;
            Some((path.display().to_string(), text))
        })
        .collect();
    let borrowed: Vec<(&str, &str)> = sources
        .iter()
        .map(|(name, text)| (name.as_str(), text.as_str()))
        .collect();
    let (context, diagnostics) = compile_sources(&borrowed);
    for diagnostic in &diagnostics {
        tracing::warn!(%diagnostic, "schema diagnostic");
    }
    context
}

fn print_tree(item: &Item, context: &Context, depth: usize) {
    let definition_name = &context.registry().get(item.definition).name;
    let indent = "  ".repeat(depth);
    match item.value {
        Some(value) => println!("{indent}{definition_name} {} = {value:?}", item.name),
        None => println!("{indent}{definition_name} {}", item.name),
    }
    for child in &item.children {
        print_tree(child, context, depth + 1);
    }
}

fn parse_hex(hex: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    if hex.len() % 2 != 0 {
        return Err("hex input must have an even number of digits".into());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| e.into()))
        .collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let buffer = parse_hex(&args.hex)?;
    let context = load_context();
    let conversation = Conversation::new(context.clone(), ConversationFlags::default())
        .ok_or("failed to open conversation")?;

    match examine(&conversation, args.direction.into(), &buffer) {
        Some(outcome) => {
            print_tree(&outcome.item, &context, 0);
            if let Some(error) = outcome.error {
                eprintln!("incomplete: {error:?}");
            }
        }
        None => eprintln!("could not dissect buffer (too short, unimplemented direction, or no matching definition)"),
    }

    Ok(())
}

use std::error::Error as _;
use std::io::Read;

use clap::Parser;
use erslice::{FilterOption, Format, RenderOptions};

#[derive(Parser)]
#[command(
    name = "erslice",
    about = "Slice a Mermaid ER diagram down to the tables you care about"
)]
struct Cli {
    /// Input file (reads from stdin if not provided)
    file: Option<std::path::PathBuf>,

    /// Table name patterns to keep (`*` wildcard)
    #[arg(long, short = 'i', value_delimiter = ',')]
    include: Vec<String>,

    /// Table name patterns to drop (`*` wildcard)
    #[arg(long, short = 'e', value_delimiter = ',')]
    exclude: Vec<String>,

    /// Label patterns whose tables are kept (`*` wildcard)
    #[arg(long = "include-labels", short = 'l', value_delimiter = ',')]
    include_labels: Vec<String>,

    /// Keep dropped tables within this many relations of a kept table
    #[arg(long, short = 'd', default_value_t = 0)]
    distance: usize,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = Format::Mermaid)]
    format: Format,

    /// Maximum output width in columns (ascii format)
    #[arg(long, short = 'w')]
    width: Option<usize>,

    /// Log filtering decisions to stderr
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let input = match &cli.file {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("ERROR: failed to read {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).unwrap_or_else(|e| {
                eprintln!("ERROR: failed to read stdin: {e}");
                std::process::exit(1);
            });
            buf
        }
    };

    let opt = FilterOption {
        include: cli.include,
        exclude: cli.exclude,
        include_labels: cli.include_labels,
        distance: cli.distance,
    };
    let render_opts = RenderOptions {
        format: cli.format,
        max_width: cli.width,
    };

    match erslice::run(&input, &opt, &render_opts) {
        Ok(output) => println!("{}", output.trim_end()),
        Err(e) => {
            let mut message = e.to_string();
            let mut source = e.source();
            while let Some(cause) = source {
                message.push_str(&format!(": {cause}"));
                source = cause.source();
            }
            eprintln!("ERROR: {message}");
            std::process::exit(1);
        }
    }
}

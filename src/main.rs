mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Hybrid keyword + semantic search over conversational entries", long_about = None)]
#[command(version)]
struct Cli {
    /// Workspace root (default: $RECALL_ROOT or the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Show info-level logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workspace (.recall/ and the entries dir)
    Init {
        #[arg(long, help = "Overwrite an existing config with defaults")]
        force: bool,
    },
    /// Add an entry from a file or stdin
    Add {
        #[arg(help = "Read the body from this file instead of stdin")]
        file: Option<PathBuf>,
        #[arg(long, short)]
        title: String,
        #[arg(long, short, default_value = "chat", help = "Entry kind: chat|note")]
        kind: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long = "tag", help = "Tag (repeatable)")]
        tags: Vec<String>,
        #[arg(long, help = "Where the entry came from (URL, export file, ...)")]
        source: Option<String>,
    },
    /// Build or refresh the search index
    Index {
        #[arg(long, help = "Show index status only")]
        status: bool,
        #[arg(long, help = "Recompute every embedding")]
        rebuild: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Hybrid keyword + semantic search
    #[command(alias = "s")]
    Search {
        query: String,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "Minimum combined score")]
        threshold: Option<f64>,
        #[arg(long, help = "Weight of the keyword score (weights sum to 1)")]
        text_weight: Option<f64>,
        #[arg(long, help = "Weight of the semantic score (weights sum to 1)")]
        vector_weight: Option<f64>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, help = "chat|note")]
        kind: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, help = "Keyword matching only (no embeddings)")]
        lexical: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Entries similar to a given entry
    Similar {
        entry: String,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, help = "Minimum cosine similarity (0..=1)")]
        threshold: Option<f64>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, help = "chat|note")]
        kind: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Workspace and embedding status
    Status {
        #[arg(short, long, help = "List entries whose embedding is not fresh")]
        details: bool,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, help = "chat|note")]
        kind: Option<String>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Re-index whenever entry files change
    #[cfg(feature = "watch")]
    Watch {
        #[arg(long, default_value_t = 500, help = "Quiet period before re-indexing (ms)")]
        debounce_ms: u64,
    },

    // ===== MCP Server =====
    /// Start MCP server for AI assistants
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout belongs to command output (and the MCP transport); logs go to stderr
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = cli.root;

    match cli.command {
        Commands::Init { force } => commands::init::run(root, force),
        Commands::Add {
            file,
            title,
            kind,
            owner,
            tags,
            source,
        } => commands::add::run(
            root,
            commands::add::AddArgs {
                file,
                title,
                kind,
                owner,
                tags,
                source,
            },
        ),
        Commands::Index {
            status,
            rebuild,
            json,
        } => commands::index::run(root, status, rebuild, json),
        Commands::Search {
            query,
            limit,
            threshold,
            text_weight,
            vector_weight,
            owner,
            kind,
            tag,
            lexical,
            json,
        } => commands::search::run(
            root,
            commands::search::SearchArgs {
                query,
                limit,
                threshold,
                text_weight,
                vector_weight,
                owner,
                kind,
                tag,
                lexical,
                json,
            },
        ),
        Commands::Similar {
            entry,
            limit,
            threshold,
            owner,
            kind,
            tag,
            json,
        } => commands::similar::run(
            root,
            commands::similar::SimilarArgs {
                entry,
                limit,
                threshold,
                owner,
                kind,
                tag,
                json,
            },
        ),
        Commands::Status {
            details,
            owner,
            kind,
            json,
        } => commands::status::run(root, details, owner, kind, json),
        #[cfg(feature = "watch")]
        Commands::Watch { debounce_ms } => commands::watch::run(root, debounce_ms),

        // MCP Server
        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions(root);
                Ok(())
            } else {
                run_mcp_server(root)
            }
        }
    }
}

#[cfg(feature = "mcp")]
fn run_mcp_server(root: Option<PathBuf>) -> anyhow::Result<()> {
    let (paths, _config) = commands::open_workspace(root)?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(recall_search::mcp::run_mcp_server(paths))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(root: Option<PathBuf>) {
    use colored::Colorize;

    let workspace = root
        .or_else(|| std::env::current_dir().ok())
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "/path/to/your/workspace".to_string());

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "recall".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(r#"{{
  "mcpServers": {{
    "recall": {{
      "command": "{}",
      "args": ["mcp", "--root", "{}"]
    }}
  }}
}}"#, binary_path, workspace);
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Hybrid keyword + semantic search", "recall_search".green());
    println!("  • {} - Entries similar to a given entry", "recall_similar".green());
    println!("  • {} - Full entry content", "recall_get_entry".green());
    println!("  • {} - Index and embedding status", "recall_status".green());
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use pddikti_collector::batch::{self, BatchConfig};
use pddikti_collector::{
    logging, mcp, BatchOutput, ClientConfig, FetchFailure, Fetched, PddiktiClient, StudentSource,
    TracingObserver,
};

#[derive(Parser)]
#[command(name = "pddikti-collector")]
#[command(about = "Collect and filter student records from the PDDIKTI public API", long_about = None)]
struct Cli {
    /// Override the API base URL (also PDDIKTI_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Delay before every request in milliseconds (also PDDIKTI_DELAY_MS)
    #[arg(long, global = true)]
    delay_ms: Option<u64>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search students by name, NIM or institution and print the summaries
    Search { query: String },
    /// Print the full record for one student id
    Detail { id: String },
    /// Run the search/filter pipeline for a batch of queries
    Run {
        /// JSON batch config with queries and filter rules
        #[arg(long)]
        config: Option<PathBuf>,
        /// Queries to run instead of the config's list
        #[arg(long = "query")]
        queries: Vec<String>,
        #[arg(long, default_value = "pddikti_results.json")]
        out: PathBuf,
        /// Also write the matches as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Convert a saved results file to CSV
    Export {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Serve the search and detail tools to an MCP host over stdio
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let mut config = ClientConfig::from_env().with_overrides(cli.base_url, None);
    if let Some(ms) = cli.delay_ms {
        config.delay = Duration::from_millis(ms);
    }

    match cli.command {
        Commands::Search { query } => {
            let client = PddiktiClient::new(config);
            let results = client.search(&query).await.found().unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Detail { id } => {
            let client = PddiktiClient::new(config);
            match client.get_detail(&id).await {
                Fetched::Found(detail) => println!("{}", serde_json::to_string_pretty(&detail)?),
                Fetched::Absent(reason) => report_missing(&id, &reason)?,
            }
        }
        Commands::Run {
            config: config_path,
            queries,
            out,
            csv,
        } => {
            let mut batch = match &config_path {
                Some(path) => BatchConfig::load(path)
                    .with_context(|| format!("failed to load batch config {}", path.display()))?,
                None => BatchConfig::default(),
            };
            if !queries.is_empty() {
                batch.queries = queries;
            }

            let client = PddiktiClient::new(config);
            let results = batch::scrape(&batch, &client, &TracingObserver).await;
            let output = BatchOutput::new(results, &batch.queries);

            batch::save_json(&output, &out)?;
            println!(
                "Saved {} matches across {} queries to {}.",
                output.total_count,
                output.queries.len(),
                out.display()
            );

            if let Some(csv_path) = csv {
                let rows = batch::export_csv(&output.results, &csv_path)?;
                println!("Wrote {rows} rows to {}.", csv_path.display());
            }
        }
        Commands::Export { input, csv } => {
            let output = batch::load_output(&input)?;
            let rows = batch::export_csv(&output.results, &csv)?;
            println!("Wrote {rows} rows to {}.", csv.display());
        }
        Commands::Serve => {
            let server = mcp::ToolServer::new(PddiktiClient::new(config));
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            server
                .serve(stdin, tokio::io::stdout())
                .await
                .context("tool server stopped on an I/O error")?;
        }
    }

    Ok(())
}

fn report_missing(id: &str, reason: &FetchFailure) -> anyhow::Result<()> {
    anyhow::bail!("student {id} not found or error fetching details ({reason})")
}

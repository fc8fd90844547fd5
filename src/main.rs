mod assistant;
mod dashboard;
mod data;
mod llm_client;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use assistant::{AssistantBehavior, AssistantRequest, DashboardAssistant, DataSummary};
use dashboard::{format_number, ToolDispatcher};
use data::{
    apply, price_bucket_distribution, property_type_summary, town_sale_summary,
    yearly_sales_counts, FilterState, SaleRecord, SalesApiClient, SalesApiConfig,
};
use llm_client::build_llm_client_from_env;

#[derive(Parser, Debug)]
#[command(
    name = "estate-deck",
    about = "CLI entrypoint into the Estate Deck real-estate sales dashboard assistant"
)]
struct Cli {
    /// Optional one-shot prompt; if omitted the CLI enters interactive mode.
    #[arg(short, long)]
    prompt: Option<String>,

    /// Load the dataset from a local JSON file instead of the sales API.
    #[arg(long)]
    data_file: Option<String>,

    /// Use the built-in demo dataset; no network access required.
    #[arg(long, default_value_t = false)]
    mock: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hit the sales API and report row count plus towns to verify connectivity.
    FetchSmoke,
    /// Print the chart summaries and price-bucket distribution for the loaded dataset.
    Summary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    if let Some(Commands::FetchSmoke) = cli.command {
        run_fetch_smoke().await?;
        return Ok(());
    }

    let records = load_records(&cli).await?;
    info!(count = records.len(), "Dataset loaded");
    let records = Arc::new(records);

    if let Some(Commands::Summary) = cli.command {
        print!("{}", summary_report(&records));
        return Ok(());
    }

    let llm_client =
        build_llm_client_from_env(false).context("LLM client initialization failed")?;
    let dispatcher = Arc::new(ToolDispatcher::new(records.clone()));
    let summary = DataSummary::from_records(&records);
    let assistant = DashboardAssistant::new(llm_client, dispatcher, summary);

    if let Some(prompt) = cli.prompt {
        run_single(&assistant, prompt).await;
        return Ok(());
    }

    run_repl(&assistant).await
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

async fn load_records(cli: &Cli) -> anyhow::Result<Vec<SaleRecord>> {
    if cli.mock {
        info!("Using the built-in demo dataset");
        return Ok(data::mock::sample_records());
    }

    if let Some(path) = &cli.data_file {
        return data::load_records_file(path);
    }

    let config = SalesApiConfig::from_env().context("Sales API configuration missing")?;
    let client = SalesApiClient::new(config)?;
    client
        .fetch_records()
        .await
        .context("Failed to fetch the dataset from the sales API")
}

/// A single assistant turn. Upstream failures are terminal for this turn
/// only: they print as a chat-style apology and never crash the session.
async fn run_single(assistant: &DashboardAssistant, prompt: String) {
    match assistant.handle(AssistantRequest::new(prompt)).await {
        Ok(response) => println!("\nAssistant:\n{}\n", response.output),
        Err(err) => {
            error!(?err, "Assistant turn failed");
            println!("\nAssistant:\nSorry, I ran into an issue: {err}\n");
        }
    }
}

async fn run_repl(assistant: &DashboardAssistant) -> anyhow::Result<()> {
    println!("Estate Deck CLI ready. Type 'exit' to quit.\n");
    let stdin = io::stdin();

    loop {
        print!("You > ");
        io::stdout().flush()?;

        let mut buffer = String::new();
        stdin.read_line(&mut buffer)?;
        let trimmed = buffer.trim();

        if trimmed.eq_ignore_ascii_case("exit") {
            info!("User exited CLI");
            break;
        }

        if trimmed.is_empty() {
            continue;
        }

        run_single(assistant, trimmed.to_owned()).await;
    }

    Ok(())
}

async fn run_fetch_smoke() -> anyhow::Result<()> {
    let config = SalesApiConfig::from_env().context("Sales API configuration missing")?;
    let client = SalesApiClient::new(config)?;
    println!("Checking sales API connectivity at {}...", client.base_url());

    let records = client.fetch_records().await?;
    let towns = data::distinct_towns(&records);

    println!(
        "✔ Sales API responded with {} records across {} towns.",
        records.len(),
        towns.len()
    );
    Ok(())
}

/// Offline rendering of the four chart shapes, used by the `summary` command.
fn summary_report(records: &[SaleRecord]) -> String {
    let subset = apply(records, &FilterState::default());
    let mut out = String::new();

    out.push_str(&format!("Loaded {} records.\n", records.len()));

    out.push_str("\nAverage sale amount by town:\n");
    for row in town_sale_summary(&subset) {
        out.push_str(&format!(
            "- {}: {} ({} sales, {} total)\n",
            row.town,
            format_number(row.avg_sale_amount),
            row.count,
            format_number(row.total_sale_amount)
        ));
    }

    out.push_str("\nSales by property type:\n");
    for row in property_type_summary(&subset) {
        let sale = row
            .avg_sale_amount
            .map(|avg| {
                format!(
                    "sale avg {} / total {}",
                    format_number(avg),
                    format_number(row.total_sale_amount)
                )
            })
            .unwrap_or_else(|| "no usable sale amounts".to_string());
        let assessed = row
            .avg_assessed_value
            .map(|avg| {
                format!(
                    "assessed avg {} / total {}",
                    format_number(avg),
                    format_number(row.total_assessed_value)
                )
            })
            .unwrap_or_else(|| "no usable assessed values".to_string());
        out.push_str(&format!(
            "- {}: {} sales, {sale}, {assessed}\n",
            row.property_type, row.count
        ));
    }

    out.push_str("\nSales by year:\n");
    for row in yearly_sales_counts(&subset) {
        out.push_str(&format!("- {}: {}\n", row.year, row.count));
    }

    out.push_str("\nPrice distribution:\n");
    for bucket in price_bucket_distribution(&subset) {
        out.push_str(&format!("- {}: {}\n", bucket.label, bucket.count));
    }

    out
}

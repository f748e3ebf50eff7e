//! Command-line front end: load a file or a query result, print its summary, or ask a question.
//!
//! ## Usage
//!
//! ```sh
//! tabular-insight summarize data/people.csv --markdown
//! tabular-insight ask data/sales.xlsx --question "Which region sold the most?"
//! tabular-insight sql --query "SELECT * FROM orders" --question "average order value?"
//! ```
//!
//! Provider and database settings come from the environment (or `.env`); see `AppConfig`.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tabular_insight::analysis::{
    AnalysisOutput, AnalyzerOptions, DataAnalyzer, HttpChatModel, OutputFormat,
};
use tabular_insight::config::AppConfig;
use tabular_insight::ingestion::{load_with_report, IngestionOptions, Source, SourceFormat};
use tabular_insight::summary::{markdown_table, summarize};
use tabular_insight::types::{DataSet, Value};

#[derive(Parser, Debug)]
#[command(name = "tabular-insight", about = "Summarize tabular data and ask questions about it")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a file and print its summary.
    Summarize {
        path: PathBuf,

        /// Source format (csv, excel, xml); inferred from the extension when omitted.
        #[arg(long)]
        format: Option<SourceFormat>,

        /// Print a Markdown report instead of JSON.
        #[arg(long)]
        markdown: bool,
    },
    /// Load a file and ask a question about it.
    Ask {
        path: PathBuf,

        #[arg(long)]
        question: String,

        /// Answer format: text, markdown or json.
        #[arg(long, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Source format (csv, excel, xml); inferred from the extension when omitted.
        #[arg(long)]
        source_format: Option<SourceFormat>,
    },
    /// Run a query against the configured database; summarize it or ask a question.
    Sql {
        #[arg(long)]
        query: String,

        #[arg(long)]
        question: Option<String>,

        /// Answer format: text, markdown or json.
        #[arg(long, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    let ingestion = IngestionOptions {
        policy: config.ingestion,
        ..IngestionOptions::default()
    };

    match cli.command {
        Command::Summarize {
            path,
            format,
            markdown,
        } => {
            let dataset = load_dataset(
                Source::Path(path),
                IngestionOptions {
                    format,
                    ..ingestion
                },
            )?;
            let summary = summarize(&dataset, &config.summary);
            if markdown {
                println!("{}", summary.to_markdown());
            } else {
                println!("{}", summary.to_json_pretty());
            }
        }
        Command::Ask {
            path,
            question,
            format,
            source_format,
        } => {
            let dataset = load_dataset(
                Source::Path(path),
                IngestionOptions {
                    format: source_format,
                    ..ingestion
                },
            )?;
            answer(&config, dataset, &question, format)?;
        }
        Command::Sql {
            query,
            question,
            format,
        } => {
            let dataset = load_dataset(Source::Sql(config.database.sql_source(query)), ingestion)?;
            match question {
                Some(question) => answer(&config, dataset, &question, format)?,
                None => println!("{}", summarize(&dataset, &config.summary).to_json_pretty()),
            }
        }
    }
    Ok(())
}

fn load_dataset(source: Source, options: IngestionOptions) -> anyhow::Result<DataSet> {
    let report = load_with_report(&source, &options).context("failed to load data")?;
    info!(
        rows = report.dataset.row_count(),
        columns = report.dataset.column_count(),
        format = %report.format,
        parse_path = ?report.parse_path,
        "data loaded"
    );
    Ok(report.dataset)
}

fn answer(
    config: &AppConfig,
    dataset: DataSet,
    question: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let model = HttpChatModel::from_config(&config.provider)?;
    info!(provider = config.provider.name(), model = model.model(), "model ready");

    let options = AnalyzerOptions {
        format,
        summary: config.summary.clone(),
        chart_path: config.chart_output_path.clone(),
        ..AnalyzerOptions::default()
    };
    let mut analyzer = DataAnalyzer::new(model, options);
    analyzer.load_dataset(dataset);

    match analyzer.ask(question)? {
        AnalysisOutput::Text(text) | AnalysisOutput::Markdown(text) => println!("{text}"),
        AnalysisOutput::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        AnalysisOutput::Table(table) => println!("{}", render_table(&table)),
        AnalysisOutput::Chart(path) => println!("chart written to {}", path.display()),
    }
    Ok(())
}

fn render_table(table: &DataSet) -> String {
    let headers: Vec<String> = table.schema.field_names().map(str::to_owned).collect();
    let rows = table.rows.iter().map(|row| {
        row.iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => other.to_display_string(),
            })
            .collect()
    });
    markdown_table(&headers, rows)
}

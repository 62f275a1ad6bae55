//! Brand assignment CLI.
//!
//! Usage:
//!     assign-brands assign --brands brandConnections.json --items pharmacyItems.json --source MDE --country ee
//!     assign-brands debug --brands brandConnections.json "Bayer Aspirin 100mg"
//!     assign-brands graph --brands brandConnections.json

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pharmabrand_assign::{assign_brands, AssignContext};
use pharmabrand_dataset::{JsonDataset, JsonLinesSink, ProductSource, RelationshipSource};
use pharmabrand_graph::BrandGraph;
use pharmabrand_matcher::BrandMatcher;
use pharmabrand_model::ExceptionLists;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "assign-brands")]
#[command(about = "Assign canonical brands to pharmacy products")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Brand connections JSON file
    #[arg(long, global = true, default_value = "brandConnections.json")]
    brands: PathBuf,

    /// TOML file overriding the exception lists
    #[arg(long, global = true)]
    exceptions: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Match every product and write mappings as JSON lines
    Assign {
        /// Pharmacy items JSON file
        #[arg(long, default_value = "pharmacyItems.json")]
        items: PathBuf,

        /// Source system name
        #[arg(long)]
        source: String,

        /// Country code
        #[arg(long)]
        country: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Match a single title and show why each brand matched
    Debug {
        /// Product title
        title: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the brand equivalence graph as JSON
    Graph,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pharmabrand=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let exceptions = match &cli.exceptions {
        Some(path) => ExceptionLists::from_path(path)?,
        None => ExceptionLists::default(),
    };

    match cli.command {
        Commands::Assign {
            items,
            source,
            country,
            output,
        } => {
            let dataset = JsonDataset::new(&cli.brands).with_items(items);
            run_assign(&dataset, &exceptions, AssignContext::new(source, country), output)?;
        }
        Commands::Debug { title, format } => {
            let graph = load_graph(&JsonDataset::new(&cli.brands))?;
            run_debug(&graph, &exceptions, &title, &format)?;
        }
        Commands::Graph => {
            let graph = load_graph(&JsonDataset::new(&cli.brands))?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
    }

    Ok(())
}

fn load_graph(source: &impl RelationshipSource) -> Result<BrandGraph> {
    let relationships = source
        .relationships()
        .with_context(|| format!("loading relationships from {} source", source.name()))?;
    Ok(BrandGraph::from_relationships(&relationships))
}

fn run_assign(
    dataset: &JsonDataset,
    exceptions: &ExceptionLists,
    context: AssignContext,
    output: Option<PathBuf>,
) -> Result<()> {
    let graph = load_graph(dataset)?;
    let matcher = BrandMatcher::new(&graph, exceptions);
    let products = dataset.products().context("loading products")?;

    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut sink = JsonLinesSink::new(writer);

    let summary = assign_brands(&matcher, &products, &context, &mut sink)?;
    eprintln!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

fn run_debug(graph: &BrandGraph, exceptions: &ExceptionLists, title: &str, format: &str) -> Result<()> {
    let matcher = BrandMatcher::new(graph, exceptions);
    let result = matcher.match_title(title);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Title: {}", title);
    if matcher.is_ignored_title(title) {
        println!("Ignored title, no brand assigned");
        return Ok(());
    }
    println!("---");
    for hit in &result.matched {
        println!("   {} ({})", hit.brand, hit.rule.label());
    }
    println!("---");
    match &result.canonical_brand {
        Some(brand) => println!("Brand: {}", brand),
        None => println!("Brand: none"),
    }

    Ok(())
}

//! Tabflow CLI - edit the pipeline config and run it
//!
//! # Config Commands
//!
//! ```bash
//! tabflow init input.csv output.csv          # Set data source and destination
//! tabflow include id name                    # Keep only these columns
//! tabflow join a.csv b.csv --on id           # Join sources on key columns
//! tabflow join a.csv b.csv --fuzzy           # Fuzzy join by column correspondence
//! tabflow aggregate sum --columns n --group g --alias total
//! tabflow sort --ascending g --descending total
//! ```
//!
//! # Run Commands
//!
//! ```bash
//! tabflow columns                            # List source columns
//! tabflow preview --rows 10                  # Print the first rows of the result
//! tabflow apply                              # Save the result to data.dest
//! ```
//!
//! Files are resolved under `.exporter/`; the config file name comes from
//! `EXPORTER_CONFIG_NAME` (default `config.yml`).

use clap::{Parser, Subcommand};
use std::path::Path;
use tabflow::{
    missing_columns, AggregateEntry, AggregateFunction, Config, CsvStore, JoinSection, Pipeline, Plan,
    SortSection, Table, DEFAULT_PREVIEW_LIMIT,
};
use tabflow::transform::fuzzy::DEFAULT_THRESHOLD;
use tabflow::transform::join::DEFAULT_PREVIEW_ROWS;

#[derive(Parser)]
#[command(name = "tabflow")]
#[command(about = "Config-driven joins, aggregates and sorts over CSV files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set the data source and destination
    Init {
        /// Source CSV file (relative to .exporter/)
        src: String,

        /// Destination CSV file (relative to .exporter/)
        dest: String,
    },

    /// List the columns of the configured source
    Columns,

    /// Keep only the given columns, in this order
    Include {
        /// Column names
        #[arg(required = true)]
        columns: Vec<String>,
    },

    /// Join several sources instead of a single data source
    Join {
        /// Source CSV files, joined left to right
        #[arg(required = true)]
        sources: Vec<String>,

        /// Key columns (exact join)
        #[arg(long, num_args = 1..)]
        on: Vec<String>,

        /// Join mode: left, right, inner or outer
        #[arg(long, default_value = "left")]
        how: String,

        /// Match columns and values by similarity instead of keys
        #[arg(long)]
        fuzzy: bool,

        /// Minimum similarity score (0-100) for fuzzy matches
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,

        /// Values per column used to discover fuzzy correspondences
        #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
        preview_rows: usize,
    },

    /// Add an aggregate
    Aggregate {
        /// Function: count, sum, avg, max or min
        function: String,

        /// Target columns
        #[arg(short, long, num_args = 1..)]
        columns: Vec<String>,

        /// Group-by columns (whole table if omitted)
        #[arg(short, long, num_args = 1..)]
        group: Vec<String>,

        /// Name of the result column
        #[arg(short, long)]
        alias: String,
    },

    /// Set the sort order (ascending keys first)
    Sort {
        #[arg(long, num_args = 1..)]
        ascending: Vec<String>,

        #[arg(long, num_args = 1..)]
        descending: Vec<String>,
    },

    /// Run the pipeline and print the first rows
    Preview {
        /// Number of rows to print
        #[arg(short, long, default_value_t = DEFAULT_PREVIEW_LIMIT)]
        rows: usize,
    },

    /// Run the pipeline and save the result to the destination
    Apply,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config_path = Config::default_path();

    let result = match cli.command {
        Commands::Init { src, dest } => cmd_init(&config_path, &src, &dest),

        Commands::Columns => cmd_columns(&config_path),

        Commands::Include { columns } => cmd_include(&config_path, columns),

        Commands::Join {
            sources,
            on,
            how,
            fuzzy,
            threshold,
            preview_rows,
        } => cmd_join(
            &config_path,
            JoinSection {
                src: sources,
                on,
                how,
                fuzzy,
                threshold,
                preview_rows,
            },
        ),

        Commands::Aggregate {
            function,
            columns,
            group,
            alias,
        } => cmd_aggregate(&config_path, &function, columns, group, &alias),

        Commands::Sort { ascending, descending } => cmd_sort(&config_path, ascending, descending),

        Commands::Preview { rows } => cmd_preview(&config_path, rows),

        Commands::Apply => cmd_apply(&config_path),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_init(config_path: &Path, src: &str, dest: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_or_default(config_path)?;
    config.init(src, dest);
    config.write(config_path)?;

    eprintln!("✅ Config initialized: {}", config_path.display());
    eprintln!("   Source: {}", src);
    eprintln!("   Destination: {}", dest);
    Ok(())
}

fn cmd_columns(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(config_path)?;
    let table = source_table(&config)?;

    eprintln!("📄 {} columns, {} rows", table.width(), table.len());
    for column in table.columns() {
        println!("{}", column);
    }
    Ok(())
}

fn cmd_include(config_path: &Path, columns: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(config_path)?;
    let table = source_table(&config)?;
    ensure_columns(&table, &columns)?;

    config.set_include(columns.clone());
    config.write(config_path)?;
    eprintln!("✅ Included columns: {}", columns.join(", "));
    Ok(())
}

fn cmd_join(config_path: &Path, join: JoinSection) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load_or_default(config_path)?;

    // Reject the section before writing it
    join.to_spec()?;

    eprintln!("🔗 Join: {}", join.src.join(" ⋈ "));
    if join.fuzzy {
        eprintln!("   Fuzzy, threshold {}, {} preview rows", join.threshold, join.preview_rows);
    } else {
        eprintln!("   On: {} ({})", join.on.join(", "), join.how);
    }

    config.set_join(join);
    config.write(config_path)?;
    eprintln!("✅ Join saved");
    Ok(())
}

fn cmd_aggregate(
    config_path: &Path,
    function: &str,
    columns: Vec<String>,
    group: Vec<String>,
    alias: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(config_path)?;
    let parsed: AggregateFunction = function.parse()?;

    if !group.is_empty() {
        let table = source_table(&config)?;
        ensure_columns(&table, &group)?;
    }

    let grouped = (!group.is_empty()).then_some(group);
    let entry = AggregateEntry::new(parsed.as_str(), columns, grouped, alias);
    entry.to_spec()?;

    config.push_aggregate(entry);
    // Alias uniqueness across the whole document
    config.aggregate_specs()?;
    config.write(config_path)?;

    eprintln!("✅ Aggregate added: {} → {}", parsed, alias);
    Ok(())
}

fn cmd_sort(
    config_path: &Path,
    ascending: Vec<String>,
    descending: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    if ascending.is_empty() && descending.is_empty() {
        return Err("Provide at least one --ascending or --descending column".into());
    }

    let mut config = Config::load(config_path)?;
    config.set_sort(SortSection { ascending, descending });
    config.write(config_path)?;
    eprintln!("✅ Sort saved");
    Ok(())
}

fn cmd_preview(config_path: &Path, rows: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(config_path)?;
    let store = CsvStore::from_cwd()?;

    let table = Pipeline::new(&config)?.preview(&store, rows)?;
    eprintln!("📊 Preview ({} rows)\n", table.len());
    println!("{}", table);
    Ok(())
}

fn cmd_apply(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(config_path)?;
    let store = CsvStore::from_cwd()?;

    let table = Pipeline::new(&config)?.apply(&store)?;
    eprintln!("\n✨ Done! {} rows written", table.len());
    Ok(())
}

/// The table the stages start from: the data source, or the joined sources.
fn source_table(config: &Config) -> Result<Table, Box<dyn std::error::Error>> {
    let plan = Plan::from_config(config)?;
    let loading_only = Plan {
        include: None,
        aggregates: None,
        sort: None,
        ..plan
    };
    let store = CsvStore::from_cwd()?;
    Ok(Pipeline::from_plan(loading_only).run(&store)?)
}

fn ensure_columns(table: &Table, columns: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let missing = missing_columns(table, columns);
    if !missing.is_empty() {
        for column in &missing {
            eprintln!("   Column '{}' does not exist in the dataset.", column);
        }
        return Err(format!("Unknown columns: {}", missing.join(", ")).into());
    }
    Ok(())
}

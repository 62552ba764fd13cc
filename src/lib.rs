pub mod aggregate;
pub mod category;
pub mod cli;
pub mod columns;
pub mod data;
pub mod dates;
pub mod error;
pub mod fiscal;
pub mod header;
pub mod query;
pub mod render;
pub mod store;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, DetectArgs, ListArgs, PreviewArgs, QueryArgs},
    query::{QueryParams, RemapRule},
    store::{DirectoryStore, FileStore},
    table::{FileKind, Table},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabquery", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Query(args) => handle_query(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Detect(args) => handle_detect(&args),
        Commands::List(args) => handle_list(&args),
    }
}

/// Splits an input path into its store directory and file name, then fetches
/// the bytes through the store collaborator.
fn fetch_input(input: &Path) -> Result<(Vec<u8>, FileKind)> {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Input path {input:?} has no file name"))?;
    let root = match input.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
        Some(parent) => parent,
        None => Path::new("."),
    };
    let store = DirectoryStore::new(root);
    let bytes = store
        .fetch(name)
        .with_context(|| format!("Fetching '{name}' from {root:?}"))?;
    Ok((bytes, FileKind::from_name(name)))
}

fn handle_query(args: &QueryArgs) -> Result<()> {
    info!(
        "Querying '{}' grouped by {:?} over category '{}'",
        args.input.display(),
        args.group_by,
        args.category_column
    );
    let (bytes, kind) = fetch_input(&args.input)?;

    let mut params = QueryParams::new(
        &args.date_column,
        args.group_by.clone(),
        &args.category_column,
        &args.metric_column,
    );
    params.skip_rows = args.skip_rows;
    params.auto_detect_header = !args.no_header_detect;
    params.top_n = args.top_n;
    params.reference_date = args.as_of;
    params.classify = args.classify.clone();
    params.filter = args.filter.clone();
    if !args.priority_labels.is_empty() {
        params.category_prefix = args.priority_labels.clone();
    }
    params.remap = collect_remaps(&args.remaps)?;

    let response = query::run_query(&bytes, kind, &params)
        .with_context(|| format!("Querying {:?}", args.input))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let mut headers = args.group_by.clone();
    headers.push(args.category_column.clone());
    headers.push("total".to_string());
    let rows: Vec<Vec<String>> = response
        .rows
        .iter()
        .map(|row| {
            let mut cells = row.keys.clone();
            cells.push(row.category.clone());
            cells.push(format_total(row.total));
            cells
        })
        .collect();
    render::print_table(&headers, &rows);
    info!(
        "Window {} .. {} | {} of {} row(s) had valid dates ({} skipped metric cell(s))",
        response.window.start,
        response.window.end,
        response.diagnostics.valid_date_rows,
        response.diagnostics.total_rows,
        response.diagnostics.skipped_metric_cells
    );
    Ok(())
}

fn collect_remaps(specs: &[cli::RemapSpec]) -> Result<Option<RemapRule>> {
    let Some(first) = specs.first() else {
        return Ok(None);
    };
    if let Some(other) = specs.iter().find(|s| s.column != first.column) {
        bail!(
            "--remap directives must target one column, found '{}' and '{}'",
            first.column,
            other.column
        );
    }
    Ok(Some(RemapRule {
        column: first.column.clone(),
        pairs: specs
            .iter()
            .map(|s| (s.from.clone(), s.to.clone()))
            .collect(),
    }))
}

fn format_total(total: f64) -> String {
    if total.fract() == 0.0 && total.abs() < 1e15 {
        format!("{total:.0}")
    } else {
        format!("{total:.2}")
    }
}

fn handle_preview(args: &PreviewArgs) -> Result<()> {
    let (bytes, kind) = fetch_input(&args.input)?;
    let skip_rows = match args.skip_rows {
        Some(explicit) => explicit,
        None => header::locate_header(&bytes, kind)?.skip_rows,
    };
    let table = Table::parse(&bytes, kind, skip_rows)
        .with_context(|| format!("Parsing {:?}", args.input))?;

    let rows: Vec<Vec<String>> = (0..table.row_count().min(args.rows))
        .map(|row| {
            (0..table.column_names().len())
                .map(|col| {
                    table
                        .cell(row, col)
                        .map(|cell| cell.as_display())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();
    render::print_table(table.column_names(), &rows);
    info!(
        "Displayed {} row(s) from {:?} (header at row {})",
        rows.len(),
        args.input,
        skip_rows
    );
    Ok(())
}

fn handle_detect(args: &DetectArgs) -> Result<()> {
    let (bytes, kind) = fetch_input(&args.input)?;
    let scan = header::locate_header(&bytes, kind)?;
    match scan.columns {
        Some(columns) => {
            println!("header row offset: {}", scan.skip_rows);
            println!("columns: {}", columns.join(", "));
        }
        None => {
            println!(
                "no header accepted within the first {} row(s); falling back to offset 0",
                header::MAX_LOOKAHEAD + 1
            );
        }
    }
    Ok(())
}

fn handle_list(args: &ListArgs) -> Result<()> {
    let store = DirectoryStore::new(&args.store);
    let names = store
        .list()
        .with_context(|| format!("Listing store {:?}", args.store))?;
    for name in &names {
        println!("{name}");
    }
    info!("{} file(s) in {:?}", names.len(), args.store);
    Ok(())
}

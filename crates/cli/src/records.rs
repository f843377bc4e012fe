// Record commands: list, insert, delete, move

use std::path::Path;

use chrono::Utc;
use serde_json::json;

use seatkeeper_io::csv::{export_listing, export_records, load_source, write_lines};
use seatkeeper_recon::listing::{audio_worklist, export_row, missing, select, MissingTarget, SELECTION_COLUMNS};
use seatkeeper_recon::{Field, LegislatorRecord};
use seatkeeper_recon::pipeline::{self, MoveMode};
use seatkeeper_recon::{import_records, ImportOptions};

use crate::exit_codes::EXIT_IMPORT_PENDING;
use crate::{check_outcome, print_json, CliError, Context, DeleteCommands, ListCommands, ScopeArgs};

// ============================================================================
// list
// ============================================================================

pub fn cmd_list(ctx: &Context, command: ListCommands) -> Result<(), CliError> {
    let store = ctx.store()?;
    match command {
        ListCommands::Missing { target, output, json, scope } => {
            let records = missing(&store, &scope.filters(), target);
            if let Some(path) = output {
                let written = export_listing(&records, target, &path)
                    .map_err(|e| CliError::io(format!("{}: {e}", path.display())))?;
                eprintln!("wrote {written} records to {}", path.display());
            } else if json {
                print_json(&records)?;
            } else {
                print_table(&records, target.export_columns());
            }
            Ok(())
        }
        ListCommands::Filter { conditions, output, json } => {
            let records = select(&store, &conditions);
            if records.is_empty() {
                eprintln!("This list is empty.");
            }
            if let Some(path) = output {
                let written = export_records(&records, SELECTION_COLUMNS, &path)
                    .map_err(|e| CliError::io(format!("{}: {e}", path.display())))?;
                eprintln!("wrote {written} records to {}", path.display());
            } else if json {
                print_json(&records)?;
            } else if !records.is_empty() {
                print_table(&records, SELECTION_COLUMNS);
            }
            Ok(())
        }
        ListCommands::Worklist { output, scope } => {
            let lines = audio_worklist(&missing(&store, &scope.filters(), MissingTarget::Audio));
            match output {
                Some(path) => {
                    write_lines(&lines, &path).map_err(|e| CliError::io(format!("{}: {e}", path.display())))?;
                    eprintln!("wrote {} names to {}", lines.len(), path.display());
                }
                None => {
                    for line in &lines {
                        println!("{line}");
                    }
                }
            }
            Ok(())
        }
    }
}

fn print_table(records: &[LegislatorRecord], columns: &[Field]) {
    let header: Vec<&str> = columns.iter().map(|f| f.key()).collect();
    println!("{}", header.join("\t"));
    for record in records {
        println!("{}", export_row(record, columns).join("\t"));
    }
}

// ============================================================================
// insert
// ============================================================================

pub fn cmd_insert(ctx: &Context, file: &Path, merge: bool, json: bool) -> Result<(), CliError> {
    let source = load_source(file)?;
    let registry = ctx.registry()?;
    let mut store = ctx.store()?;
    let mut oracle = ctx.oracle();

    // New people are not in the store yet, so names are taken as given.
    let options = ImportOptions { resolve_names: false };
    let batch = import_records(&source, &registry, &store, oracle.as_mut(), options)?;
    let corrections = batch.corrections.clone();
    let discarded = batch.discarded.clone();
    let pending_rows: Vec<usize> = batch.pending.iter().map(|p| p.row).collect();

    let report = pipeline::insert(batch, &mut store, oracle.as_mut(), &ctx.settings.engine, merge, Utc::now());

    if json {
        print_json(&json!({
            "corrections": corrections,
            "discarded": discarded,
            "pending": pending_rows,
            "insert": report,
        }))?;
    } else {
        for c in &corrections {
            println!("row {}: {} '{}' -> '{}'", c.row, c.field, c.from, c.to);
        }
        for row in &discarded {
            println!("row {row}: discarded");
        }
        if merge {
            let skipped = report.decisions.iter().filter(|d| !d.admits()).count();
            println!("{} of {} candidates already present", skipped, report.candidates);
        }
        println!("{}", report.outcome);
    }

    check_outcome(&report.outcome)?;
    if !pending_rows.is_empty() {
        let rows: Vec<String> = pending_rows.iter().map(|r| r.to_string()).collect();
        return Err(CliError::new(
            EXIT_IMPORT_PENDING,
            format!("{} rows left undecided and not inserted (rows {})", rows.len(), rows.join(", ")),
        )
        .with_hint("fix those rows or rerun them interactively"));
    }
    Ok(())
}

// ============================================================================
// delete
// ============================================================================

pub fn cmd_delete(ctx: &Context, command: DeleteCommands) -> Result<(), CliError> {
    match command {
        DeleteCommands::Criteria { scope } => {
            if scope.is_empty() {
                return Err(CliError::args("refusing to delete every record in the store")
                    .with_hint("narrow the selection with --level and/or --state"));
            }
            let mut store = ctx.store()?;
            let outcome = pipeline::delete_by_criteria(&mut store, &scope.filters());
            println!("{outcome}");
            check_outcome(&outcome)
        }
        DeleteCommands::List { file } => {
            let source = load_source(&file)?;
            let registry = ctx.registry()?;
            let mut store = ctx.store()?;
            let mut oracle = ctx.oracle();

            let batch = import_records(&source, &registry, &store, oracle.as_mut(), ImportOptions::default())?;
            for p in &batch.pending {
                eprintln!("row {}: '{}' unresolved, not deleted", p.row, p.record.name);
            }
            let outcome = pipeline::delete_listed(&batch, &mut store);
            println!("{outcome}");
            check_outcome(&outcome)
        }
    }
}

// ============================================================================
// move
// ============================================================================

pub fn cmd_move(ctx: &Context, from: &str, to: &str, mode: MoveMode, scope: &ScopeArgs) -> Result<(), CliError> {
    if from == to {
        return Err(CliError::args(format!("source and destination are both '{from}'")));
    }
    let source = ctx.open_store(Some(from))?;
    let mut dest = ctx.open_store(Some(to))?;

    let outcome = pipeline::move_records(&source, &mut dest, &scope.filters(), mode);
    println!("{outcome}");
    check_outcome(&outcome)
}

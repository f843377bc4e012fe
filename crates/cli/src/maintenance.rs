// Maintenance commands: seat audit, repairs, duplicate consolidation

use chrono::Utc;

use seatkeeper_io::csv::write_lines;
use seatkeeper_io::SqliteStore;
use seatkeeper_recon::audit::{audit, repair_districts, repair_seats, RepairReport};
use seatkeeper_recon::consolidate::remove_duplicates;
use seatkeeper_recon::RecordStore;

use crate::exit_codes::EXIT_AUDIT_FINDINGS;
use crate::{check_outcome, print_json, AuditCommands, CliError, Context, ScopeArgs};

// ============================================================================
// audit
// ============================================================================

pub fn cmd_audit(ctx: &Context, command: AuditCommands) -> Result<(), CliError> {
    let registry = ctx.registry()?;
    let mut store = ctx.store()?;

    match command {
        AuditCommands::Seats { strict, output, json, scope } => {
            let report = audit(&scope.levels(), scope.states(), &registry, &store);
            let text = report.to_string();
            if let Some(path) = &output {
                write_lines(text.lines(), path).map_err(|e| CliError::io(format!("{}: {e}", path.display())))?;
            }
            if json {
                print_json(&report)?;
            } else if output.is_none() {
                print!("{text}");
            }
            eprintln!("{} findings", report.finding_count());

            if strict && !report.is_clean() {
                return Err(CliError::new(
                    EXIT_AUDIT_FINDINGS,
                    format!("{} seats need attention", report.finding_count()),
                ));
            }
            Ok(())
        }
        AuditCommands::RepairSeats { scope } => {
            if ctx.is_batch() {
                return Err(CliError::args("repair-seats needs a name or a choice for every seat")
                    .with_hint("run it without --batch"));
            }
            let mut oracle = ctx.oracle();
            let defaults = &ctx.settings.engine.new_seat;
            let now = Utc::now();
            let report = for_each_scope(&scope, |level, state| {
                repair_seats(level, state, &registry, &mut store, oracle.as_mut(), defaults, now)
            });
            for name in &report.added {
                println!("added {name}");
            }
            for name in &report.retained {
                println!("kept {name}");
            }
            println!("{}", report.outcome);
            check_outcome(&report.outcome)
        }
        AuditCommands::RepairDistricts { scope } => {
            let mut oracle = ctx.oracle();
            let report = for_each_scope(&scope, |level, state| {
                repair_districts(level, state, &registry, &mut store, oracle.as_mut())
            });
            for (from, to) in &report.renamed {
                println!("{from} -> {to}");
            }
            println!("{}", report.outcome);
            check_outcome(&report.outcome)
        }
    }
}

/// Run a repair over every level x state in scope, folding the reports.
fn for_each_scope<F>(scope: &ScopeArgs, mut repair: F) -> RepairReport
where
    F: FnMut(seatkeeper_recon::Level, &str) -> RepairReport,
{
    let mut total = RepairReport::default();
    for level in scope.levels() {
        if !level.is_district_based() {
            continue;
        }
        for state in scope.state_codes() {
            let report = repair(level, &state);
            total.added.extend(report.added);
            total.retained.extend(report.retained);
            total.renamed.extend(report.renamed);
            total.outcome.absorb(report.outcome);
        }
    }
    total
}

// ============================================================================
// dedupe
// ============================================================================

pub fn cmd_dedupe(ctx: &Context, peers: &[String], scope: &ScopeArgs) -> Result<(), CliError> {
    let mut store = ctx.store()?;
    let opened: Vec<SqliteStore> = peers
        .iter()
        .map(|name| {
            if name == store.name() {
                return Err(CliError::args(format!("'{name}' is the store being deduplicated")));
            }
            ctx.open_store(Some(name))
        })
        .collect::<Result<_, _>>()?;
    let peer_refs: Vec<&dyn RecordStore> = opened.iter().map(|s| s as &dyn RecordStore).collect();

    let report = remove_duplicates(&mut store, &peer_refs, &scope.filters());
    for name in &report.consolidated {
        println!("consolidated {name}");
    }
    println!("{}", report.outcome);
    check_outcome(&report.outcome)
}

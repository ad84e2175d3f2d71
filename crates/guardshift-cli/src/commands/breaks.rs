use chrono::Utc;
use clap::Subcommand;
use guardshift_core::clock;
use guardshift_core::BreakType;

use crate::app::{block_on, ensure_active, report, App, CliResult, LocationArgs};

#[derive(Subcommand)]
pub enum BreakAction {
    /// Start a break under the active shift
    Start {
        /// LUNCH, REST, BATHROOM, EMERGENCY or OTHER
        break_type: BreakType,
        #[arg(long)]
        notes: Option<String>,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// End the open break
    End {
        /// Break id; defaults to the open break
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Show the open break, if any
    Status,
}

pub fn run(action: BreakAction, app: &App) -> CliResult {
    match action {
        BreakAction::Start {
            break_type,
            notes,
            location,
        } => {
            let store = app.store(location.source())?;
            ensure_active(&store)?;
            let outcome = block_on(store.start_break(break_type, notes.as_deref()))?;
            app.finish(&store)?;
            let limit = clock::format_duration(break_type.max_duration());
            report(outcome, &format!("{break_type} break started ({limit} allowed)"))?;
        }
        BreakAction::End { id, notes } => {
            let store = app.store(Default::default())?;
            let outcome = block_on(store.end_break(id.as_deref(), notes.as_deref()))?;
            app.finish(&store)?;
            report(outcome, "break ended")?;
        }
        BreakAction::Status => {
            let state = app.snapshot.load();
            match state.open_break() {
                Some(brk) if app.opts.json => println!("{}", serde_json::to_string_pretty(brk)?),
                Some(brk) => {
                    let now = Utc::now();
                    let overrun = if brk.is_overrun(now) { "  OVERRUN" } else { "" };
                    println!(
                        "{} {} break, {} elapsed, {} left{overrun}",
                        brk.id,
                        brk.break_type,
                        clock::format_duration(clock::break_elapsed(brk, now)),
                        clock::format_duration(clock::break_remaining(brk, now)),
                    );
                }
                None if app.opts.json => println!("null"),
                None => println!("no open break"),
            }
        }
    }
    Ok(())
}

use chrono::NaiveDate;
use clap::Args;
use guardshift_core::StatisticsRange;

use guardshift_core::lifecycle::Dispatch;

use crate::app::{block_on, App, CliResult};

#[derive(Args)]
pub struct StatsArgs {
    /// First day of the range (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,
    /// Last day of the range (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
}

pub fn run(args: StatsArgs, app: &App) -> CliResult {
    let range = match (args.from, args.to) {
        (Some(from), Some(to)) => Some(StatisticsRange::new(from, to)?),
        _ => None,
    };

    let store = app.store(Default::default())?;
    let outcome = block_on(store.fetch_statistics(range))?;
    app.finish(&store)?;
    match outcome {
        Ok(Dispatch::Skipped) => return Err("not signed in; run `guardshift session login`".into()),
        Ok(_) => {}
        Err(e) => eprintln!("warning: showing last known statistics: {e}"),
    }

    let state = store.snapshot();
    let stats = &state.statistics;
    if app.opts.json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }
    if !state.statistics_loaded {
        println!("no statistics yet");
        return Ok(());
    }
    println!("completed shifts: {}", stats.completed_shifts);
    println!("missed shifts:    {}", stats.missed_shifts);
    println!("sites:            {}", stats.total_sites);
    println!("incident reports: {}", stats.incident_reports);
    if let Some(hours) = stats.total_hours {
        println!("hours:            {hours:.1}");
    }
    Ok(())
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs one stage of the spawner against a stage file.

mod report;
mod stage_file;

use std::{path::PathBuf, time::Duration};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::info;
use stage_spawner_core::{Command, Event, StageId};
use stage_spawner_system_spawning::SpawnScheduler;
use stage_spawner_world::{self as world, query, World};

use report::{EventTally, RunSummary};
use stage_file::StageFile;

/// Simulates a stage with a fixed tick and reports what was spawned.
#[derive(Debug, Parser)]
#[command(name = "stage-spawner", version, about)]
struct Args {
    /// Path to the TOML stage file.
    #[arg(long)]
    stage_file: PathBuf,
    /// Stage to run instead of the one named in the stage file.
    #[arg(long)]
    stage: Option<u32>,
    /// Seed every spawn task's random stream is derived from.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Length of a simulation tick in milliseconds.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    /// Simulated time to run for.
    #[arg(long, default_value_t = 30.0)]
    duration_secs: f32,
    /// Ends the stage after this much simulated time.
    #[arg(long)]
    end_after_secs: Option<f32>,
    /// Prints the summary as JSON.
    #[arg(long)]
    json: bool,
}

/// Entry point for the stage spawner command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let stage_file = StageFile::load(&args.stage_file)?;
    let summary = run(&stage_file, &args)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&summary).context("failed to serialize run summary")?;
        println!("{json}");
    } else {
        print!("{summary}");
    }
    Ok(())
}

fn run(stage_file: &StageFile, args: &Args) -> Result<RunSummary> {
    ensure!(args.tick_ms > 0, "--tick-ms must be positive");
    let tick = Duration::from_millis(args.tick_ms);
    let duration = Duration::try_from_secs_f32(args.duration_secs)
        .context("--duration-secs must be a finite, non-negative number")?;
    let end_after = args
        .end_after_secs
        .map(|secs| {
            Duration::try_from_secs_f32(secs)
                .context("--end-after-secs must be a finite, non-negative number")
        })
        .transpose()?;
    let ends_early = end_after.is_some_and(|end| end <= duration);
    let horizon = end_after.map_or(duration, |end| end.min(duration));

    let stage = args.stage.map_or(stage_file.stage(), StageId::new);
    let mut session = Session {
        world: World::new(
            stage_file.rules().to_vec(),
            stage_file.units().to_vec(),
            stage_file.pool().iter().cloned(),
        ),
        scheduler: SpawnScheduler::new(stage_file.config(args.seed)),
        tally: EventTally::default(),
    };

    info!("running stage {stage} for {:.2}s", horizon.as_secs_f32());
    session.submit(Command::StartStage { stage });
    let mut elapsed = Duration::ZERO;
    while elapsed < horizon {
        session.submit(Command::Tick { dt: tick });
        elapsed += tick;
    }

    let units = query::active_units(&session.world);
    if ends_early {
        session.submit(Command::EndStage);
    }

    Ok(RunSummary::new(
        stage,
        args.seed,
        elapsed.as_secs_f32(),
        ends_early,
        session.tally,
        session.scheduler.progress(),
        units,
        query::pool_stats(&session.world),
    ))
}

struct Session {
    world: World,
    scheduler: SpawnScheduler,
    tally: EventTally,
}

impl Session {
    fn submit(&mut self, command: Command) {
        let mut world_events = Vec::new();
        world::apply(&mut self.world, command, &mut world_events);

        let mut system_events: Vec<Event> = Vec::new();
        let resources = world::spawn_resources(&mut self.world);
        self.scheduler.handle(
            &world_events,
            resources.rules,
            resources.catalog,
            resources.pool,
            &mut system_events,
        );

        self.tally.observe(&world_events);
        self.tally.observe(&system_events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["stage-spawner", "--stage-file", "unused.toml"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("arguments parse")
    }

    fn stage_file() -> StageFile {
        StageFile::parse(
            r#"
            version = 1
            stage = 1

            [[rules]]
            stage = 1
            unit = "slime"
            interval = [1.0, 1.0]
            batch = [2, 2]
            count = 4

            [[units]]
            key = "slime"
            attack = 3
            speed = 1.25
            health = 20

            [pool]
            slime = 8
            "#,
        )
        .expect("stage file parses")
    }

    #[test]
    fn bounded_rule_spawns_its_quota() {
        let summary = run(&stage_file(), &args(&["--duration-secs", "5"])).expect("run succeeds");
        let json = serde_json::to_value(&summary).expect("summary serializes");

        assert_eq!(json["units_spawned"], 4);
        assert_eq!(json["tasks"][0]["status"], "completed");
        assert_eq!(json["units_on_field"].as_array().map(Vec::len), Some(4));
        assert_eq!(json["warnings"], 0);
    }

    #[test]
    fn early_end_cancels_running_tasks() {
        let summary = run(
            &stage_file(),
            &args(&["--duration-secs", "10", "--end-after-secs", "1.5"]),
        )
        .expect("run succeeds");
        let json = serde_json::to_value(&summary).expect("summary serializes");

        assert_eq!(json["ended_early"], true);
        assert_eq!(json["units_spawned"], 2);
        assert_eq!(json["tasks"][0]["status"], "cancelled");
        assert_eq!(json["pool"]["released"], 2);
    }

    #[test]
    fn unknown_stage_reports_missing_rules() {
        let summary = run(&stage_file(), &args(&["--stage", "9"])).expect("run succeeds");
        let json = serde_json::to_value(&summary).expect("summary serializes");

        assert_eq!(json["rules_missing"], true);
        assert_eq!(json["tasks"].as_array().map(Vec::len), Some(0));
        assert_eq!(json["pool"]["acquired"], 0);
    }

    #[test]
    fn zero_tick_is_rejected() {
        let error = run(&stage_file(), &args(&["--tick-ms", "0"])).expect_err("tick must be positive");
        assert!(error.to_string().contains("--tick-ms"));
    }
}

mod companion;
mod console;

use clap::{Parser, Subcommand};
use setpace_core::config::DataConfig;
use setpace_core::parser::{parse_rest_time, parse_set_count, target_reps_from_sets, RepRange};
use setpace_core::*;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, TryRecvError};
use std::time::Duration;

use companion::CompanionFactory;
use console::{format_seconds, ConsoleListener, FinishedSlot, TerminalBell};

/// Simulated seconds spent on each set in `--auto` mode
const AUTO_SET_SECONDS: u32 = 30;

/// RPE reported for every set in `--auto` mode
const AUTO_RPE: u8 = 8;

#[derive(Parser)]
#[command(name = "setpace")]
#[command(about = "Guided set and rest timer for strength workouts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a guided workout (default)
    Guide {
        /// Workout plan (TOML); a built-in sample is used otherwise
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Run the whole plan on a simulated clock, hitting the top of every rep range
        #[arg(long)]
        auto: bool,

        /// Disable audible cues
        #[arg(long)]
        no_cues: bool,

        /// Mirror the workout into this JSON file for a companion display
        #[arg(long)]
        companion: Option<PathBuf>,
    },

    /// Show how set and rest text is interpreted
    Parse {
        /// Set text, e.g. "4 x 8-10"
        sets: String,

        /// Rest text, e.g. "90 sec", "3 min" or "N/A"
        rest: String,
    },

    /// Roll up logged sessions to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

#[derive(Default)]
struct GuideArgs {
    plan: Option<PathBuf>,
    auto: bool,
    no_cues: bool,
    companion: Option<PathBuf>,
}

fn main() -> Result<()> {
    setpace_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data = DataConfig {
        data_dir: cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone()),
    };

    match cli.command {
        Some(Commands::Guide {
            plan,
            auto,
            no_cues,
            companion,
        }) => cmd_guide(
            &data,
            &config,
            GuideArgs {
                plan,
                auto,
                no_cues,
                companion,
            },
        ),
        Some(Commands::Parse { sets, rest }) => {
            cmd_parse(&sets, &rest);
            Ok(())
        }
        Some(Commands::Rollup { cleanup }) => cmd_rollup(&data, cleanup),
        None => cmd_guide(&data, &config, GuideArgs::default()),
    }
}

fn cmd_parse(sets: &str, rest: &str) {
    println!("Sets: {}", parse_set_count(sets));
    let target = target_reps_from_sets(sets);
    match RepRange::parse(&target) {
        Some(range) if range.lower == range.upper => {
            println!("Target reps: {}", range.lower)
        }
        Some(range) => println!("Target reps: {} to {}", range.lower, range.upper),
        None => println!("Target: {}", target),
    }
    println!("Rest: {} seconds", parse_rest_time(rest));
}

fn cmd_guide(data: &DataConfig, config: &Config, args: GuideArgs) -> Result<()> {
    std::fs::create_dir_all(data.wal_dir())?;
    let state_path = data.state_path();

    let plan = match &args.plan {
        Some(path) => WorkoutPlan::load_from(path)?,
        None => sample_plan(),
    };
    let user_state = UserTrainingState::load(&state_path)?;

    let engine = TimingEngine::new(&plan, config.rewards.clone())?
        .with_personal_bests(user_state.personal_bests.clone());

    let mut options = WorkoutOptions::from_config(config);
    if args.no_cues {
        options.cues_enabled = false;
    }

    let finished: FinishedSlot = Rc::default();
    let names = plan.exercises.iter().map(|e| e.name.clone()).collect();
    let listener = ConsoleListener::new(names, finished.clone());

    print_plan(&plan);

    let manual = Rc::new(ManualScheduler::new());
    let event_loop = Rc::new(EventLoop::new());
    let scheduler: Rc<dyn Scheduler> = if args.auto {
        manual.clone() as Rc<dyn Scheduler>
    } else {
        event_loop.clone() as Rc<dyn Scheduler>
    };

    let workout = GuidedWorkout::builder(engine, scheduler.clone())
        .options(options)
        .listener(listener)
        .cues(TerminalBell)
        .sink(JsonlSink::new(data.wal_path()))
        .build();

    if args.companion.is_some() || !args.auto {
        let surface = SurfaceSynchronizer::new(
            Box::new(CompanionFactory::new(args.companion.clone())),
            scheduler,
            Duration::from_millis(config.surface.keep_alive_ms),
        );
        let mode = workout.open_surface(surface);
        tracing::info!("Companion surface: {:?}", mode);
    }

    if args.auto {
        run_auto(&workout, &manual, options.tick_interval);
    } else {
        run_interactive(&workout, &event_loop, data)?;
    }

    let session = finished.borrow_mut().take();
    match session {
        Some(session) => {
            UserTrainingState::update(&state_path, |state| {
                state.absorb(&session);
                Ok(())
            })?;
            print_summary(&session);
        }
        None => {
            let checkpoint = workout.checkpoint();
            let path = data.wal_dir().join("checkpoint.json");
            std::fs::write(&path, serde_json::to_string_pretty(&checkpoint)?)?;
            let totals = SessionAggregator::totals(&checkpoint.exercises);
            println!(
                "Progress saved: {}/{} sets, {} XP so far ({})",
                totals.sets_completed,
                totals.sets_planned,
                checkpoint.xp_earned,
                path.display()
            );
        }
    }

    workout.close();
    Ok(())
}

/// Drive the workout on a simulated clock until it finishes
fn run_auto(workout: &GuidedWorkout, clock: &ManualScheduler, tick: Duration) {
    loop {
        match workout.phase() {
            EnginePhase::Idle => {
                if workout.start_set().is_empty() {
                    tracing::warn!("Auto mode could not start a set, abandoning");
                    workout.abandon();
                }
            }
            EnginePhase::SetActive => {
                clock.advance(tick * AUTO_SET_SECONDS);
                let snapshot = workout.snapshot();
                let performance = SetPerformance {
                    reps: RepRange::parse(&snapshot.target_reps).map(|r| r.upper),
                    rpe: Some(AUTO_RPE),
                    ..SetPerformance::default()
                };
                workout.complete_set(performance);
            }
            EnginePhase::Resting => {
                let remaining = workout.snapshot().timer.countdown_remaining;
                clock.advance(tick * remaining.max(1));
            }
            EnginePhase::Paused { .. } => {
                workout.resume();
            }
            EnginePhase::Complete | EnginePhase::Abandoned => break,
        }
    }
}

/// Real-time workout driven by commands typed on stdin
fn run_interactive(workout: &GuidedWorkout, event_loop: &EventLoop, data: &DataConfig) -> Result<()> {
    let (tx, rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    print_help();
    let mut closed = false;
    event_loop.run_until(|| {
        workout.pump_surface();
        loop {
            match rx.try_recv() {
                Ok(line) => {
                    if handle_command(workout, line.trim()) == Flow::Close {
                        closed = true;
                        return true;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    println!("Input closed");
                    closed = true;
                    return true;
                }
            }
        }
        workout.is_finished()
    });

    if closed && !workout.is_finished() {
        tracing::info!("Leaving unfinished workout; progress goes to {:?}", data.wal_dir());
    }
    Ok(())
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Close,
}

fn handle_command(workout: &GuidedWorkout, line: &str) -> Flow {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("").to_lowercase();
    let numbers: Vec<f64> = parts.filter_map(|p| p.parse().ok()).collect();

    match command.as_str() {
        "" | "s" => {
            if workout.start_set().is_empty() {
                println!("  Nothing to start right now");
            }
        }
        "d" => {
            let target = workout.snapshot().target_reps;
            let performance = SetPerformance {
                reps: numbers
                    .first()
                    .map(|r| *r as u32)
                    .or_else(|| RepRange::parse(&target).map(|r| r.upper)),
                rpe: numbers.get(1).map(|r| *r as u8),
                weight: numbers.get(2).copied(),
                notes: None,
            };
            if workout.complete_set(performance).is_empty() {
                println!("  No set in progress");
            }
        }
        "p" => {
            let events = workout.pause();
            if events.is_empty() {
                workout.resume();
            }
        }
        "n" => {
            workout.skip_rest();
        }
        "w" => match numbers.first() {
            Some(weight) => {
                if workout.adjust_current_weight(*weight).is_empty() {
                    println!("  Weight not changed");
                }
            }
            None => println!("  Usage: w <weight>"),
        },
        "g" => match numbers.as_slice() {
            [exercise, set, ..] if *exercise >= 1.0 => {
                workout.navigate_to(*exercise as usize - 1, *set as u32);
            }
            _ => println!("  Usage: g <exercise#> <set#>"),
        },
        "fix" => match numbers.as_slice() {
            [exercise, set, reps, ..] if *exercise >= 1.0 => {
                let events =
                    workout.correct_set(*exercise as usize - 1, *set as u32, SetPerformance::reps(*reps as u32));
                if events.is_empty() {
                    println!("  Only completed sets can be corrected");
                }
            }
            _ => println!("  Usage: fix <exercise#> <set#> <reps>"),
        },
        "q" => {
            workout.abandon();
        }
        "c" => return Flow::Close,
        _ => print_help(),
    }
    Flow::Continue
}

fn print_help() {
    println!("─────────────────────────────────────────");
    println!("  Enter / s           start the next set");
    println!("  d [reps] [rpe] [kg] finish the current set");
    println!("  p                   pause / resume");
    println!("  n                   skip the rest period");
    println!("  w <kg>              change weight for remaining sets");
    println!("  g <ex#> <set#>      jump to a set");
    println!("  fix <ex#> <set#> <reps>  correct a finished set");
    println!("  q                   abandon the workout");
    println!("  c                   close, keeping progress");
    println!("─────────────────────────────────────────");
}

fn print_plan(plan: &WorkoutPlan) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {} (week {})", plan.day_name, plan.week_number);
    println!("╰─────────────────────────────────────────╯");
    for (i, exercise) in plan.exercises.iter().enumerate() {
        println!(
            "  {}. {}: {} sets of {}, rest {}",
            i + 1,
            exercise.name,
            parse_set_count(&exercise.sets),
            target_reps_from_sets(&exercise.sets),
            format_seconds(parse_rest_time(&exercise.rest))
        );
    }
    println!();
}

fn print_summary(session: &SessionRecord) {
    let totals = SessionAggregator::totals(&session.exercises);
    let headline = match session.status {
        SessionStatus::Completed => "Workout complete",
        _ => "Workout abandoned",
    };
    println!();
    println!("✓ {}: {} XP", headline, session.xp_earned);
    println!(
        "  {}/{} sets, {}/{} exercises",
        totals.sets_completed,
        totals.sets_planned,
        totals.exercises_completed,
        totals.exercises_planned
    );
    println!(
        "  Started {}, {}",
        session
            .started_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M"),
        format_seconds(session.total_duration_seconds.unwrap_or(0))
    );
}

fn cmd_rollup(data: &DataConfig, cleanup: bool) -> Result<()> {
    let wal_path = data.wal_path();
    let csv_path = data.csv_path();

    if !wal_path.exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count = setpace_core::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path)?;

    println!("✓ Rolled up {} sessions to CSV", count);
    println!("  CSV: {}", csv_path.display());

    if cleanup {
        let cleaned = setpace_core::csv_rollup::cleanup_processed_wals(&data.wal_dir())?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}

fn sample_plan() -> WorkoutPlan {
    let exercise = |id: &str, name: &str, sets: &str, rest: &str, weight: Option<f64>| {
        ExerciseDefinition {
            id: id.into(),
            name: name.into(),
            sets: sets.into(),
            rest: rest.into(),
            starting_weight: weight,
        }
    };

    WorkoutPlan {
        program_id: "setpace_sample".into(),
        day_name: "Full Body".into(),
        week_number: 1,
        phase_name: "Base".into(),
        exercises: vec![
            exercise("goblet_squat", "Goblet Squat", "3 x 8-10", "90 sec", Some(24.0)),
            exercise("push_up", "Push-up", "2 x 10-12", "60 sec", None),
            exercise("plank", "Plank", "1 x 45s", "N/A", None),
        ],
    }
}

//! Occupancy Bench entry point
//!
//! Sweeps entity counts for the selected strategy and prints one
//! `<count> <ms> <hits>` line per run.
//!
//! Usage: `occupancy-bench [settings.json] [--strategy NAME] [--backend NAME]
//! [--ticks N] [--counts N,N,...] [--cooldown-ms N]`

use std::process::ExitCode;

use occupancy_bench::runner;
use occupancy_bench::{BackendKind, BenchSettings, Strategy};

fn parse_args(args: &[String]) -> Result<BenchSettings, String> {
    let mut settings = None;
    let mut overrides = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(flag) = arg.strip_prefix("--") {
            let value = iter
                .next()
                .ok_or_else(|| format!("missing value for --{flag}"))?;
            overrides.push((flag, value));
        } else if settings.is_none() {
            settings = Some(BenchSettings::load(arg).map_err(|e| e.to_string())?);
        } else {
            return Err(format!("unexpected argument: {arg}"));
        }
    }

    let mut settings = settings.unwrap_or_default();
    for (flag, value) in overrides {
        match flag {
            "strategy" => {
                settings.strategy =
                    Strategy::from_str(value).ok_or_else(|| format!("unknown strategy: {value}"))?;
            }
            "backend" => {
                settings.backend =
                    BackendKind::from_str(value).ok_or_else(|| format!("unknown backend: {value}"))?;
            }
            "ticks" => {
                settings.ticks = value.parse().map_err(|_| format!("bad tick count: {value}"))?;
            }
            "counts" => {
                settings.entity_counts = value
                    .split(',')
                    .map(|n| n.trim().parse())
                    .collect::<Result<_, _>>()
                    .map_err(|_| format!("bad entity counts: {value}"))?;
            }
            "cooldown-ms" => {
                settings.cooldown_ms =
                    value.parse().map_err(|_| format!("bad cooldown: {value}"))?;
            }
            _ => return Err(format!("unknown option: --{flag}")),
        }
    }

    settings.validate().map_err(|e| e.to_string())?;
    Ok(settings)
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let settings = match parse_args(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            eprintln!(
                "usage: occupancy-bench [settings.json] [--strategy NAME] [--backend NAME] \
                 [--ticks N] [--counts N,N,...] [--cooldown-ms N]"
            );
            return ExitCode::FAILURE;
        }
    };

    log::info!(
        "Occupancy Bench: strategy {}, backend {}, {} ticks per run",
        settings.strategy.as_str(),
        settings.backend.as_str(),
        settings.ticks
    );

    let runs = settings.entity_counts.len();
    for (i, &count) in settings.entity_counts.iter().enumerate() {
        match runner::run(&settings, count) {
            Ok(result) => println!("{result}"),
            Err(e) => {
                log::error!("run with {count} entities failed: {e}");
                return ExitCode::FAILURE;
            }
        }

        if i + 1 < runs {
            std::thread::sleep(settings.cooldown());
        }
    }

    ExitCode::SUCCESS
}

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use swerve_core::config::DrivetrainConfig;
use swerve_core::subsystems::swerve::kinematics::ChassisVelocity;
use swerve_core::{DriveCommand, SimBot, cycle};
use tokio::task::{self, spawn_local};
use tokio::time::{Duration, Instant, interval, sleep};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uom::si::angle::degree;
use uom::si::f64::Velocity;
use uom::si::length::meter;
use uom::si::velocity::meter_per_second;

/// Runs the swerve drivetrain against simulated hardware
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Drivetrain configuration (JSON). Defaults are used if not specified
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How long to run the scripted drive (seconds)
    #[arg(short, long, default_value = "8.0")]
    seconds: f64,
}

/// Precision mode ceiling (m/s).
const PRECISION_MAX_SPEED: f64 = 1.0;

/// Scripted drive: forward, strafe while spinning, then a capped sprint, then stop.
fn scripted_command(elapsed: f64) -> DriveCommand {
    match elapsed {
        t if t < 2.0 => DriveCommand::field_relative(ChassisVelocity::from_si(1.0, 0.0, 0.0)),
        t if t < 4.0 => DriveCommand::field_relative(ChassisVelocity::from_si(0.0, 1.0, 1.0)),
        t if t < 6.0 => DriveCommand::robot_relative(ChassisVelocity::from_si(3.0, 0.0, 0.0)),
        _ => DriveCommand::robot_relative(ChassisVelocity::zero()),
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DrivetrainConfig::load(path),
        None => Ok(DrivetrainConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid drivetrain config: {}", e);
            std::process::exit(1);
        }
    };

    let bot = match SimBot::new(&config) {
        Ok(bot) => bot,
        Err(e) => {
            error!("Failed to build drivetrain: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    let local = task::LocalSet::new();

    runtime.block_on(local.run_until(async {
        // Watchdog setup
        let last_loop_time = Arc::new(AtomicU64::new(0));
        let watchdog_last_loop = Arc::clone(&last_loop_time);
        let watchdog_bot = bot.clone();

        spawn_local(async move {
            loop {
                sleep(Duration::from_millis(20)).await;
                let last = watchdog_last_loop.load(Ordering::Relaxed);
                let now = now_millis();

                // if more than 150 ms has passed the loop has overrun
                if last != 0 && now.saturating_sub(last) > 150 {
                    warn!("Loop overrun: {}ms, stopping drivetrain", now - last);
                    watchdog_bot.stop();
                }
            }
        });

        // pose readers only ever see whole poses
        let pose_handle = bot
            .drivetrain
            .try_borrow()
            .map(|drivetrain| drivetrain.pose_handle())
            .ok();
        let reporter = pose_handle.map(|pose_handle| {
            tokio::spawn(async move {
                let mut ticker = interval(Duration::from_millis(500));
                loop {
                    ticker.tick().await;
                    let pose = pose_handle.get();
                    info!(
                        "pose x: {:.3} m, y: {:.3} m, heading: {:.1} deg",
                        pose.x.get::<meter>(),
                        pose.y.get::<meter>(),
                        pose.heading.get::<degree>()
                    );
                }
            })
        });

        let start = Instant::now();
        let mut precision = false;
        info!("Running for {} s at {:?} per cycle", args.seconds, bot.period);

        loop {
            let loop_start = Instant::now();
            let elapsed = start.elapsed().as_secs_f64();
            if elapsed >= args.seconds {
                break;
            }

            // precision mode for the sprint
            let want_precision = (4.0..6.0).contains(&elapsed);
            if want_precision != precision {
                let ceiling = if want_precision {
                    PRECISION_MAX_SPEED
                } else {
                    config.max_module_speed_mps
                };
                if let Ok(mut drivetrain) = bot.drivetrain.try_borrow_mut() {
                    match drivetrain.set_max_module_speed(Velocity::new::<meter_per_second>(ceiling)) {
                        Ok(()) => precision = want_precision,
                        Err(e) => warn!("Could not change max module speed: {}", e),
                    }
                }
            }

            if cycle(&bot, &scripted_command(elapsed)).is_none() {
                warn!("Drivetrain busy, skipping cycle");
            }

            last_loop_time.store(now_millis(), Ordering::Relaxed);

            // enforce the configured period
            let left = bot.period.saturating_sub(loop_start.elapsed());
            sleep(left).await;
        }

        bot.stop();
        if let Some(reporter) = reporter {
            reporter.abort();
        }

        if let Ok(drivetrain) = bot.drivetrain.try_borrow() {
            let pose = drivetrain.pose();
            info!(
                "Final pose x: {:.3} m, y: {:.3} m, heading: {:.1} deg",
                pose.x.get::<meter>(),
                pose.y.get::<meter>(),
                pose.heading.get::<degree>()
            );
        }
    }));
}

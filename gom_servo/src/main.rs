//! # gomond - the Go Motion controller daemon
//!
//! Wires the comm cells, the selected external interface backend, the
//! traj loop and one servo loop per joint, then runs everything on its
//! periodic schedule until a SHUTDOWN command arrives (or the requested
//! cycle count runs out, which is how smoke tests use it).
//!
//! The servo loops share one thread: they are phase-locked to a common
//! tick by contract, and the backend is a single shared resource. The
//! traj loop runs in its own thread at the slower coordinated period.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use gom_common::comm::{ServoComm, TrajCmd, TrajCmdMsg, TrajComm};
use gom_servo::{CycleStats, ServoLoop, TrajLoop, load_config, run_periodic};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "gomond", about = "Go Motion controller daemon")]
struct Args {
    /// Path to the controller TOML configuration.
    #[arg(short, long, default_value = "gomotion.toml")]
    config: PathBuf,

    /// Override the configured external interface backend.
    #[arg(long)]
    backend: Option<String>,

    /// Exit after this many traj cycles (0 = run until shutdown).
    #[arg(long, default_value_t = 0)]
    cycles: u64,

    /// Emit logs as JSON.
    #[arg(long)]
    json: bool,
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env());
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() {
    let args = Args::parse();
    init_tracing(args.json);

    let mut cfg = match load_config(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    if let Some(backend) = args.backend {
        cfg.backend.name = backend;
    }
    let joint_num = cfg.joint_num();

    // External interface: owned by the servo thread, initialized here so
    // config errors surface before anything starts cycling.
    let mut ext = match gom_hal::select(&cfg.backend.name) {
        Ok(ext) => ext,
        Err(e) => {
            error!(backend = %cfg.backend.name, "unknown external interface: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = ext.init(&cfg.backend.init) {
        error!("external interface init failed: {e}");
        std::process::exit(1);
    }
    for j in 0..joint_num {
        if let Err(e) = ext.joint_init(j, cfg.traj.servo_cycle_time) {
            error!(joint = j, "joint init failed: {e}");
            std::process::exit(1);
        }
    }

    let traj_comm = Arc::new(TrajComm::new());
    let servo_comms: Arc<Vec<ServoComm>> =
        Arc::new((0..joint_num).map(|_| ServoComm::new()).collect());

    let mut traj = match TrajLoop::new(&cfg) {
        Ok(t) => t,
        Err(e) => {
            error!("traj init failed: {e}");
            std::process::exit(1);
        }
    };

    let mut servo_loops: Vec<ServoLoop> = cfg
        .servo
        .iter()
        .enumerate()
        .map(|(i, s)| ServoLoop::new(i, s, cfg.traj.servo_cycle_time))
        .collect();

    let running = Arc::new(AtomicBool::new(true));

    // Servo thread: all joints on one phase-locked tick.
    let servo_thread = {
        let comms = Arc::clone(&servo_comms);
        let running = Arc::clone(&running);
        let period = Duration::from_secs_f64(cfg.traj.servo_cycle_time);
        std::thread::Builder::new()
            .name("gom-servo".into())
            .spawn(move || {
                let mut stats = CycleStats::new();
                run_periodic(period, &mut stats, || {
                    let mut alive = false;
                    for (servo, comm) in servo_loops.iter_mut().zip(comms.iter()) {
                        alive |= servo.cycle(comm, ext.as_mut());
                    }
                    alive && running.load(Ordering::Relaxed)
                });
                let _ = ext.quit();
                info!(
                    cycles = stats.cycle_count,
                    avg_ns = stats.avg_cycle_ns(),
                    max_ns = stats.max_cycle_ns,
                    overruns = stats.overruns,
                    "servo loops finished"
                );
            })
            .expect("spawn servo thread")
    };

    // Traj thread.
    let traj_thread = {
        let traj_comm = Arc::clone(&traj_comm);
        let servo_comms = Arc::clone(&servo_comms);
        let running = Arc::clone(&running);
        let period = Duration::from_secs_f64(cfg.traj.cycle_time);
        let cycle_limit = args.cycles;
        std::thread::Builder::new()
            .name("gom-traj".into())
            .spawn(move || {
                let mut stats = CycleStats::new();
                let mut ran = 0u64;
                run_periodic(period, &mut stats, || {
                    let alive = traj.cycle(&traj_comm, &servo_comms);
                    ran += 1;
                    let spent = cycle_limit != 0 && ran >= cycle_limit;
                    alive && !spent && running.load(Ordering::Relaxed)
                });
                running.store(false, Ordering::Relaxed);
                info!(
                    cycles = stats.cycle_count,
                    avg_ns = stats.avg_cycle_ns(),
                    max_ns = stats.max_cycle_ns,
                    overruns = stats.overruns,
                    "traj loop finished"
                );
            })
            .expect("spawn traj thread")
    };

    info!(
        joints = joint_num,
        backend = %cfg.backend.name,
        kinematics = %cfg.traj.kinematics,
        "gomond running"
    );

    // Kick the pipeline awake; everything else arrives over the command
    // cell from external shells.
    traj_comm.cmd.write(&TrajCmdMsg { serial: 1, cmd: TrajCmd::Init });

    traj_thread.join().expect("traj thread");
    servo_thread.join().expect("servo thread");
    info!("gomond exiting");
}

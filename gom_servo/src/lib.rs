//! # Go Motion Control Loops
//!
//! The two cooperating real-time tasks: one coordinated traj loop and one
//! servo loop per joint, exchanging state through the ping-pong comm
//! cells in `gom_common`.
//!
//! Per cycle, the traj loop consumes at most one command, interpolates
//! the motion queue, applies the pose correction, runs inverse
//! kinematics, and writes per-joint setpoints. Each servo loop reads its
//! setpoint, runs PID with feedforward against the measured position from
//! the external interface, and publishes its status last.
//!
//! The loops themselves never block and never allocate after
//! construction; pacing lives in [`cycle`] and all wiring in the `gomond`
//! binary.

pub mod config;
pub mod cycle;
pub mod pid;
pub mod servo;
pub mod traj;

pub use config::{ConfigError, load_config};
pub use cycle::{CycleStats, run_periodic};
pub use pid::{Pid, PidGains};
pub use servo::ServoLoop;
pub use traj::TrajLoop;

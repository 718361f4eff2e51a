//! Capacity and timing constants.

/// Maximum number of joints a mechanism may have.
///
/// Comm records and the motion queue carry fixed arrays of this size;
/// every loop iterates only over the configured joint count.
pub const MAX_JOINTS: usize = 8;

/// Default traj cycle time [s].
pub const DEFAULT_TRAJ_CYCLE_TIME: f64 = 0.004;

/// Default servo cycle time [s]. Must divide the traj cycle time.
pub const DEFAULT_SERVO_CYCLE_TIME: f64 = 0.001;

/// Default motion queue capacity, in segments.
pub const DEFAULT_QUEUE_SIZE: usize = 32;

/// How many analog inputs/outputs and digital inputs/outputs the
/// simulated external interface exposes.
pub const SIM_AIN_NUM: usize = 8;
pub const SIM_AOUT_NUM: usize = 8;
pub const SIM_DIN_NUM: usize = 16;
pub const SIM_DOUT_NUM: usize = 16;

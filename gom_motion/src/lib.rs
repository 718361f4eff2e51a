//! # Go Motion Trajectory Layer
//!
//! Scalar motion profiles, polynomial interpolators, the walked-in time
//! scale, and the motion queue that turns queued segments into one
//! interpolated position per cycle.
//!
//! Everything here is allocation-free after construction and returns
//! [`gom_math::GoResult`] instead of panicking; the traj loop decides what
//! a failure does to the motion.

pub mod interp;
pub mod profile;
pub mod queue;
pub mod scale;

pub use interp::Interp;
pub use profile::{CaProfile, CjProfile, ProfileInterp};
pub use queue::{MotionParams, MotionQueue, MotionSpec, MotionType, Position, QueueType};
pub use scale::TimeScale;

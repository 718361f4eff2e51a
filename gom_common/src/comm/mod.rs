//! Comm blocks: the only shared resource between the loops.
//!
//! Each real-time task owns a trio of records (command in, status out,
//! config in / settings out) plus, for traj, the optional pose-correction
//! reference. All of them ride in [`cell::CommCell`], the single-writer
//! tear-free ping-pong cell.

pub mod cell;
pub mod servo;
pub mod traj;

pub use cell::{CommCell, PingPongReader};
pub use servo::{
    ServoCfg, ServoCfgMsg, ServoCmdMsg, ServoCmdType, ServoComm, ServoFaultFlags, ServoSetMsg,
    ServoState, ServoStatMsg,
};
pub use traj::{
    Frame, TrajCfg, TrajCfgMsg, TrajCmd, TrajCmdMsg, TrajComm, TrajLogSeries, TrajRefMsg,
    TrajSetMsg, TrajState, TrajStatMsg, WorldMoveKind,
};

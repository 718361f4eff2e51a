//! Common re-exports for consumers of the comm and config layers.

pub use crate::comm::{
    CommCell, PingPongReader, ServoCfg, ServoCfgMsg, ServoCmdMsg, ServoCmdType, ServoComm,
    ServoFaultFlags, ServoSetMsg, ServoState, ServoStatMsg, TrajCfg, TrajCfgMsg, TrajCmd,
    TrajCmdMsg, TrajComm, TrajRefMsg, TrajSetMsg, TrajState, TrajStatMsg, WorldMoveKind,
};
pub use crate::config::{GomConfig, ServoSection, TrajSection};
pub use crate::consts::MAX_JOINTS;
pub use crate::units::Units;

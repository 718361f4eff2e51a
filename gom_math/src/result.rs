//! Result taxonomy shared by every computational layer.
//!
//! No exceptions cross component boundaries: fallible math, profile, queue
//! and kinematics operations return [`GoResult`], and the caller decides
//! whether the failure halts a motion or aborts startup.

use thiserror::Error;

/// Error codes for the motion core.
///
/// The discriminants are stable so comm-block consumers can report them
/// numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[repr(u8)]
pub enum GoError {
    /// Generic failure with no more specific code.
    #[error("error")]
    Error = 1,
    /// Operation not implemented for this backend or type.
    #[error("not implemented")]
    ImplError = 2,
    /// Caller passed arguments that can never succeed.
    #[error("bad arguments")]
    BadArgs = 3,
    /// An index or value fell outside its allowed range.
    #[error("range error")]
    RangeError = 4,
    /// Input outside the mathematical domain, e.g. normalizing a zero vector.
    #[error("domain error")]
    DomainError = 5,
    /// A matrix inversion, trilateration or iterative solve hit a singularity.
    #[error("singular")]
    Singular = 6,
    /// Division by zero detected before it happened.
    #[error("divide by zero")]
    DivideByZero = 7,
    /// Floating-point computation produced a non-finite value.
    #[error("arithmetic error")]
    ArithmeticError = 8,
    /// A quantity that must have unit norm does not.
    #[error("norm error")]
    NormError = 9,
    /// A leading coefficient or divisor vanished.
    #[error("div error")]
    DivError = 10,
}

impl GoError {
    /// Convert from a raw code. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Error),
            2 => Some(Self::ImplError),
            3 => Some(Self::BadArgs),
            4 => Some(Self::RangeError),
            5 => Some(Self::DomainError),
            6 => Some(Self::Singular),
            7 => Some(Self::DivideByZero),
            8 => Some(Self::ArithmeticError),
            9 => Some(Self::NormError),
            10 => Some(Self::DivError),
            _ => None,
        }
    }
}

/// Result alias used across the motion core.
pub type GoResult<T> = Result<T, GoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_roundtrip() {
        for v in 1..=10u8 {
            let e = GoError::from_u8(v).unwrap();
            assert_eq!(e as u8, v);
        }
        assert!(GoError::from_u8(0).is_none());
        assert!(GoError::from_u8(11).is_none());
    }
}

//! # Go Motion Math Kernel
//!
//! Pure functions and value types for the geometric and algebraic needs of
//! the motion controller: Cartesian vectors and their spherical/cylindrical
//! forms, rotations in six interconvertible representations, poses and
//! twists, link parameterizations, general small-matrix linear algebra with
//! a symmetric eigensolver, kinematics-helper geometry, and closed-form
//! polynomial root finders.
//!
//! ## Conventions
//!
//! - All angles are radians, all lengths are meters (or whatever consistent
//!   unit the configuration scales into).
//! - Quaternions are kept canonical: unit norm, scalar part `s >= 0`.
//! - Rotation matrices are column-major triples of unit vectors.
//! - Nothing in this crate logs, blocks, or allocates; every fallible
//!   operation returns a [`GoResult`].

pub mod cart;
pub mod eigen;
pub mod geom;
pub mod linkage;
pub mod matrix;
pub mod poly;
pub mod pose;
pub mod result;
pub mod rot;
pub mod scalar;

pub use cart::{Cart, Cyl, Sph};
pub use geom::{Line, Plane};
pub use linkage::{Body, Dh, Link, LinkGeom, Pk, Pp, Quantity};
pub use matrix::Matrix;
pub use poly::{Complex, Cubic, Quadratic, Quartic};
pub use pose::{Hom, Pose, Twist};
pub use result::{GoError, GoResult};
pub use rot::{Mat, Quat, Rpy, Rvec, Uxz, Zyx, Zyz};

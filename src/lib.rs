//! Radiative energy transport through a layered cylinder: a plasma column,
//! optionally clad in quartz, behind a partially reflecting mirror.
//!
//! Emission of every radial shell is integrated along a hemisphere of directions
//! and traced through the shells with Beer-Lambert absorption and Fresnel
//! splitting at every interface. The result is the energy absorbed per shell and
//! at the mirror.

pub mod config;
pub mod equation;
pub mod error;
pub mod fibonacci_sphere;
pub mod float_cmp;
pub mod layer;
pub mod optics;
pub mod physics;
pub mod rand_gen;
pub mod shape;
pub mod smoothing;
pub mod solver;
pub mod vec3;
pub mod worker;

/// Floating point type of the geometry and the physics.
pub type F = f64;

pub use config::{Config, PlasmaConfig, QuartzConfig, SolverSettings};
pub use error::{TransportError, TransportResult};
pub use layer::{HollowParams, LayerKind, LayerModel, Shell, SolidParams};
pub use solver::{DirectionFailure, RadiationSolver, Solution};
pub use worker::{RayState, Worker, WorkerResult};

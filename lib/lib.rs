#![allow(non_snake_case)]

//! Ground states of one-dimensional XXZ spin chains via the density matrix
//! renormalization group (DMRG), with total *S*<sub>*z*</sub> conservation.
//!
//! The chain is grown from a single site by the infinite-system algorithm and
//! then refined by finite-system sweeps, in which the system block grows at the
//! expense of the environment until it reaches the end of the chain and the
//! roles are reversed. Every block carries the *S*<sub>*z*</sub> sector of each
//! of its basis states, so that the superblock Hamiltonian is only ever
//! diagonalized in the target sector and the reduced density matrix is only
//! ever diagonalized sector by sector. Between sweep steps, the previous ground
//! state is carried over into the new superblock basis and used as the starting
//! vector for the eigensolver.
//!
//! ```text
//!   system block      two free sites     environment block
//! [= = = = = = =]----[*]----[*]----[- - - - - - -]
//!  \___________________/      \__________________/
//!    enlarged system           enlarged environment
//! ```
//!
//! # Example
//! ```no_run
//! use sz_dmrg::{
//!     eigen::Lanczos,
//!     model::Model,
//!     sector::Sector,
//!     step::Dmrg,
//!     sweep::{ FiniteConfig, SweepSpec },
//! };
//!
//! let dmrg = Dmrg::new(Model::heisenberg(), Lanczos::default());
//! let config = FiniteConfig::new(
//!     20,                                       // chain length
//!     20,                                       // warmup truncation
//!     [SweepSpec::new(30)],                     // sweep schedule
//!     Sector::ZERO,                             // target total Sz
//! );
//! let output = dmrg.finite_system(&config).unwrap();
//! println!("E/L = {}", output.energy / 20.0);
//! ```

use ndarray as nd;
use ndarray_linalg::error::LinalgError;
use thiserror::Error;

pub mod sparse;
pub mod eigen;

pub mod sector;
pub mod model;
pub mod block;
pub mod store;

pub mod step;
pub mod predict;
pub mod sweep;

use crate::{
    eigen::EigenError,
    sector::Sector,
    sparse::SpError,
    store::Side,
};

#[derive(Debug, Error)]
pub enum DMRGError {
    /// Returned when a block's operators or sector labels disagree with its
    /// basis size. This always indicates a programming error.
    #[error("error in block validation: block of length {length} is malformed: {reason}")]
    InvalidBlock { length: usize, reason: String },

    /// Returned when a block is missing one of the operators needed to enlarge
    /// it.
    #[error("error in block validation: missing operator {0}")]
    MissingOperator(&'static str),

    /// Returned when a block expected in the block store is absent.
    #[error("error in sweep: no stored block at ({side}, {length})")]
    MissingBlock { side: Side, length: usize },

    /// Returned when a transformation operator expected in the transformation
    /// store is absent.
    #[error("error in sweep: no stored transformation at ({side}, {length})")]
    MissingTransformation { side: Side, length: usize },

    /// Returned when no pair of enlarged system/environment states sums to the
    /// target sector, i.e. the restricted superblock Hamiltonian would be
    /// empty.
    #[error("error in superblock restriction: target sector Sz = {target} is unreachable")]
    IncompatibleSector { target: Sector },

    /// Returned when a starting vector does not live in the superblock basis
    /// it is applied to.
    #[error("error in wavefunction guess: expected length {expected}, got {got}")]
    InvalidGuess { expected: usize, got: usize },

    /// Returned when the requested chain length is odd or too short.
    #[error("error in configuration: chain length must be even and at least {min}, got {length}")]
    InvalidChainLength { length: usize, min: usize },

    /// Returned when constructing a site with zero spin.
    #[error("error in model creation: spin must be at least 1/2")]
    InvalidSpin,

    /// Returned when a quantum number is not a half-integer or cannot be
    /// reached by the chain.
    #[error("error in configuration: invalid sector: {0}")]
    InvalidSector(String),

    /// Returned when asked to keep zero states.
    #[error("error in configuration: truncation bound must be at least 1")]
    ZeroTruncation,

    /// Returned when a sweep schedule entry asks for zero states or zero
    /// passes.
    #[error("error in configuration: invalid sweep schedule: {0}")]
    InvalidSchedule(String),

    #[error("sparse matrix error: {0}")]
    Sparse(#[from] SpError),

    #[error("eigensolver error: {0}")]
    Solver(#[from] EigenError),

    #[error("linear algebra error: {0}")]
    Linalg(#[from] LinalgError),

    #[error("array shape error: {0}")]
    Shape(#[from] nd::ShapeError),
}
pub type DMRGResult<T> = Result<T, DMRGError>;

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

//! Digital peak current-mode control for switch-mode power converters.
//!
//! This crate implements the compute side of a current-mode buck converter
//! loop running at a fixed switching frequency: a fixed-point two-pole
//! two-zero compensator (with a three-pole three-zero variant), a soft-start
//! ramp that bounds the output during power-up, a slope-compensation ramp
//! generator, and the per-period orchestration that ties them to the
//! converter hardware through small peripheral traits.
//!
//! The hot path is allocation-free, branch-predictable and infallible; all
//! configuration is validated once up front.

pub mod compensator;
mod error;
pub mod hal;
pub mod iq;
pub mod orchestrator;
pub mod slope;
pub mod soft_start;
pub mod timing;

pub use compensator::{Compensator, Compensator2p2z, Compensator3p3z, CompensatorConfig};
pub use error::ConfigError;
pub use orchestrator::{CycleOrchestrator, CycleState, Peripherals};
pub use slope::SlopeRamp;
pub use soft_start::{RampDirection, SoftStart};
pub use timing::CycleTiming;

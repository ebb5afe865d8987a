//! Simulated motion-axis engine.
//!
//! Emulates motorized axes for exercising motion-control software without
//! hardware: a bounded-acceleration route planner, a per-axis state
//! machine, and a controller aggregate with deferred-move coordination.
//! This crate intentionally performs no I/O and holds no clocks; callers
//! feed it elapsed simulated time through `poll`.

pub mod axis;
pub mod controller;
pub mod error;
pub mod route;

pub use axis::{AxisConfig, AxisState, SimAxis, StatusFlags};
pub use controller::SimController;
pub use error::{MotionError, Result};
pub use route::{MotionLimits, Replan, Route, RoutePoint};

//! Controller aggregate: an ordered set of simulated axes plus the
//! deferred-move gate used for synchronized multi-axis starts.

use crate::axis::{AxisConfig, SimAxis};
use crate::error::{MotionError, Result};

/// Owns the axes of one simulated controller. Axes are index-addressed
/// and their indices are stable for the aggregate's lifetime.
///
/// While the deferred gate is set, per-axis move requests are buffered
/// instead of retargeting the endpoint; releasing the gate commits every
/// buffered move in index order, so a client can issue N single-axis
/// moves and start them together on the next poll.
pub struct SimController {
    axes: Vec<SimAxis>,
    moves_deferred: bool,
}

impl SimController {
    pub fn new() -> Self {
        Self {
            axes: Vec::new(),
            moves_deferred: false,
        }
    }

    /// Configure a new axis and return its index.
    pub fn add_axis(&mut self, config: AxisConfig) -> Result<usize> {
        let index = self.axes.len();
        let mut axis = SimAxis::new(index, config)?;
        axis.set_deferring(self.moves_deferred);
        self.axes.push(axis);
        Ok(index)
    }

    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    pub fn axis(&self, index: usize) -> Result<&SimAxis> {
        self.axes.get(index).ok_or(MotionError::IndexOutOfRange {
            index,
            count: self.axes.len(),
        })
    }

    pub fn axis_mut(&mut self, index: usize) -> Result<&mut SimAxis> {
        let count = self.axes.len();
        self.axes
            .get_mut(index)
            .ok_or(MotionError::IndexOutOfRange { index, count })
    }

    pub fn moves_deferred(&self) -> bool {
        self.moves_deferred
    }

    /// Set or clear the deferred-move gate. Setting it does not affect
    /// axes already in motion. Clearing it walks every axis in index
    /// order and commits any buffered move as an ordinary move.
    pub fn defer_moves(&mut self, enable: bool) {
        self.moves_deferred = enable;
        for axis in &mut self.axes {
            axis.set_deferring(enable);
        }
        if !enable {
            for axis in &mut self.axes {
                axis.commit_deferred();
            }
        }
    }

    /// Advance every axis by `elapsed` simulated seconds, in index order.
    /// Returns true while any axis is still in motion.
    pub fn poll(&mut self, elapsed: f64) -> bool {
        let mut moving = false;
        for axis in &mut self.axes {
            moving |= axis.poll(elapsed);
        }
        moving
    }
}

impl Default for SimController {
    fn default() -> Self {
        Self::new()
    }
}

// Module params - parameter groups, change tracking and range tables

pub mod add;
pub mod base;
pub mod envelope;
pub mod filter;
pub mod lfo;
pub mod limits;
pub mod master;
pub mod oscillator;
pub mod part;

use crate::messaging::command::CommandBlock;
use base::ParamBase;
use limits::Limits;

/// A group of parameters addressed by CommandBlocks.
///
/// `read` and `apply` only look at the block fields; `apply` receives a
/// value that has already been clamped against `limits`.
pub trait ParamGroup {
    /// Range of the addressed control, `None` if it does not exist here
    fn limits(block: &CommandBlock) -> Option<Limits>
    where
        Self: Sized;

    fn base(&self) -> &ParamBase;

    fn read(&self, block: &CommandBlock) -> Option<f32>;

    /// Store a write; returns false for an unknown control
    fn apply(&mut self, block: &CommandBlock) -> bool;

    fn defaults(&mut self);
}

/// Byte-sized parameter value from a clamped float
#[inline]
pub(crate) fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Signed byte-sized parameter value from a clamped float
#[inline]
pub(crate) fn to_i8(value: f32) -> i8 {
    value.round().clamp(-128.0, 127.0) as i8
}

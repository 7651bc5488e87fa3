//! Board bindings.
//!
//! `inputs` is plain arithmetic and builds everywhere; `board` owns the
//! STM32 peripherals and only exists on the target.

pub mod inputs;

#[cfg(target_os = "none")]
pub mod board;

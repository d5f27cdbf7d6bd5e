//! Inbound chat control.

pub mod commands;
pub mod listener;

//! Heapscope command-line inspector
//!
//! Loads a JSON dump image, attaches a session to it and prints either the
//! captured layout or a decoded object.

pub mod commands;
pub mod output;

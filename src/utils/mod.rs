//! Small helpers shared by the Discord and HTTP layers.

pub mod format;
pub mod validation;

pub mod bootstrap;
pub mod commands;
pub mod insights;
pub mod reflection_gate;

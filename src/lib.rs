pub mod actuator;
pub mod config;
pub mod control;
pub mod error;
pub mod gate;
pub mod remote;
pub mod sensor;
pub mod slot;
pub mod state;

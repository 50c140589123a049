mod controller;
mod logs;

#[cfg(test)]
mod tests;

pub use controller::{AvState, Directive, Phase, SessionController};
pub use logs::{EventLog, SensorLog};

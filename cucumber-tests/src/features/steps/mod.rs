pub mod authorization_steps;
pub mod gating_steps;
pub mod session_steps;

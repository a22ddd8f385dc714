pub mod paper;
pub mod run_state;

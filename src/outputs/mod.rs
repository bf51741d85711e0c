// Outputs: propulsion side of the board.
// The supervisor owns the actuator driver and is the only path to it; every
// pulse-width write and power transition goes through its state lock.

pub mod state;
pub mod actuator;
pub mod supervisor;

//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one part of the board
//! against mock adapters. Nothing here needs a serial port.

mod dispatcher_tests;
mod mock_hw;
mod supervisor_tests;

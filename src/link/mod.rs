// Link: host-facing side of the board.
// `protocol` knows the byte layout, `dispatcher` drives commands from any
// Read + Write transport, `serial` opens the real one.

pub mod protocol;
pub mod dispatcher;
pub mod serial;

//! Crate-wide error type.
//!
//! Protocol conditions (unknown headers, idle link, writes while not armed)
//! are not errors and never reach this type.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("i/o: {0}")]
    Io(#[from] io::Error),

    #[error("failed to open serial port: {0}")]
    Serial(#[from] serialport::Error),

    #[error("failed to spawn {task} task: {source}")]
    Spawn {
        task: &'static str,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

//! Serial transport to the host computer.

use log::info;
use serialport::SerialPort;

use crate::config::LinkConfig;
use crate::error::Result;

/// Opens the port with the configured read timeout so an idle link returns
/// `TimedOut` instead of blocking the dispatcher forever.
pub fn open(config: &LinkConfig) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(config.port.as_str(), config.baud)
        .timeout(config.read_timeout)
        .open()?;
    info!(
        "[Link] opened {} at {} baud (read timeout {:?})",
        config.port, config.baud, config.read_timeout
    );
    Ok(port)
}

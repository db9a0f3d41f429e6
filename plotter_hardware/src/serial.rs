//! USB serial link to the EiBotBoard-style controller (feature `hardware`).

use std::io::Write;
use std::time::Duration;

use plotter_traits::Transport;
use serialport::{SerialPort, SerialPortType};
use tracing::{debug, info};

use crate::error::{HwError, Result};
use crate::util::read_line_with_deadline;

/// USB vendor id of the controller board.
pub const EBB_VID: u16 = 0x04D8;
/// USB product id of the controller board.
pub const EBB_PID: u16 = 0xFD92;

/// Locate the first serial port whose USB ids match the controller board.
pub fn find_port() -> Result<Option<String>> {
    let ports = serialport::available_ports().map_err(|e| HwError::Serial(e.to_string()))?;
    for port in ports {
        if let SerialPortType::UsbPort(usb) = &port.port_type
            && usb.vid == EBB_VID
            && usb.pid == EBB_PID
        {
            debug!(port = %port.port_name, "matched plotter usb ids");
            return Ok(Some(port.port_name));
        }
    }
    Ok(None)
}

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    timeout: Duration,
    name: String,
}

impl SerialTransport {
    /// Open a specific port.
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(|e| HwError::Serial(format!("open {path}: {e}")))?;
        info!(port = path, baud, "serial port opened");
        Ok(Self {
            port,
            timeout,
            name: path.to_string(),
        })
    }

    /// Discover the plotter by USB ids and open it.
    pub fn discover(baud: u32, timeout: Duration) -> Result<Self> {
        let path = find_port()?.ok_or(HwError::NotFound)?;
        Self::open(&path, baud, timeout)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Transport for SerialTransport {
    fn write_frame(&mut self, frame: &str) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.port.write_all(frame.as_bytes()).map_err(HwError::Io)?;
        self.port.flush().map_err(HwError::Io)?;
        Ok(())
    }

    fn read_line(&mut self) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(read_line_with_deadline(&mut self.port, self.timeout)?)
    }
}

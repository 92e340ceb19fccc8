//! Serial ports as a transport for [`crate::StreamSession`], using the `serialport` crate.
//!
//! Ports are opened with 9600 baud, 8 data bits, no parity, and one stop bit. All of these can be
//! changed with resource parameters, see [`crate::ConnectionBuilder::resource_param`]:
//!
//! - `baud_rate`: integer
//! - `data_bits`: 5, 6, 7, or 8
//! - `parity`: `"none"`, `"odd"`, or `"even"`
//! - `stop_bits`: 1 or 2
//! - `flow_control`: `"none"`, `"software"`, or `"hardware"`

use std::time::Duration;

use log::debug;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::{ResourceAddress, ResourceParam, ScpiError, stream::Port};

const DEFAULT_BAUD_RATE: u32 = 9600;

impl Port for Box<dyn SerialPort> {
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScpiError> {
        SerialPort::set_timeout(self.as_mut(), timeout)?;
        Ok(())
    }

    fn set_option(&mut self, name: &str, value: &ResourceParam) -> Result<bool, ScpiError> {
        let invalid = || value.invalid(name);
        match name {
            "baud_rate" => {
                let baud = value.as_u32().ok_or_else(invalid)?;
                self.set_baud_rate(baud)?;
            }
            "data_bits" => {
                let bits = match value.as_u32().ok_or_else(invalid)? {
                    5 => DataBits::Five,
                    6 => DataBits::Six,
                    7 => DataBits::Seven,
                    8 => DataBits::Eight,
                    _ => return Err(invalid()),
                };
                self.set_data_bits(bits)?;
            }
            "parity" => {
                let parity = match value.as_str().map(str::to_lowercase).as_deref() {
                    Some("none") => Parity::None,
                    Some("odd") => Parity::Odd,
                    Some("even") => Parity::Even,
                    _ => return Err(invalid()),
                };
                self.set_parity(parity)?;
            }
            "stop_bits" => {
                let bits = match value.as_u32().ok_or_else(invalid)? {
                    1 => StopBits::One,
                    2 => StopBits::Two,
                    _ => return Err(invalid()),
                };
                self.set_stop_bits(bits)?;
            }
            "flow_control" => {
                let flow = match value.as_str().map(str::to_lowercase).as_deref() {
                    Some("none") => FlowControl::None,
                    Some("software") => FlowControl::Software,
                    Some("hardware") => FlowControl::Hardware,
                    _ => return Err(invalid()),
                };
                self.set_flow_control(flow)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Open the serial port for an `ASRL<device>::INSTR` resource id.
pub(crate) fn open_port(resource_id: &str) -> Result<Box<dyn SerialPort>, ScpiError> {
    match ResourceAddress::parse(resource_id)? {
        ResourceAddress::Serial { device } => {
            debug!("opening serial port {device}");
            Ok(serialport::new(device, DEFAULT_BAUD_RATE)
                .timeout(Duration::from_secs(3))
                .open()?)
        }
        ResourceAddress::Socket { .. } => {
            Err(ScpiError::UnsupportedResource(resource_id.to_string()))
        }
    }
}

/// List all serial ports of the system as `ASRL<device>::INSTR` resource ids.
pub(crate) fn list_resources() -> Result<Vec<String>, ScpiError> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|info| format!("ASRL{}::INSTR", info.port_name))
        .collect())
}

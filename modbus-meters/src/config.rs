//! Device configuration file.
//!
//! ```json5
//! {
//!   devices: [
//!     { name: "grid", model: "CGEM24_E1", slave_id: 1, transport: { type: "tcp", address: "10.0.0.7" } },
//!     { name: "pv", model: "SDM", slave_id: 2, transport: { type: "rtuovertcp", address: "10.0.0.8:8899" } },
//!   ],
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::{Bus, Connection};
use crate::registry::Registry;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Meter(#[from] crate::Error),
}

/// Complete configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetersConfig {
    /// Meters to poll
    pub devices: Vec<DeviceConfig>,
}

/// Configuration for a single meter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name
    pub name: String,

    /// Registered meter model, e.g. `"CGEM24_E1"`
    pub model: String,

    /// Modbus slave ID (1-247)
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,

    /// Physical transport
    pub transport: TransportConfig,

    /// Transaction timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between opening the link and the first request, in milliseconds
    #[serde(default)]
    pub connect_delay_ms: u64,
}

fn default_slave_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    1000
}

/// Transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Modbus TCP, port 502 unless given
    Tcp { address: String },
    /// RTU framing over a TCP gateway
    RtuOverTcp { address: String },
    /// Modbus RTU over a serial port
    Rtu {
        /// Serial port path (e.g., "/dev/ttyUSB0")
        device: String,
        /// Baud rate (default: 9600)
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        /// Data bits (default: 8)
        #[serde(default = "default_data_bits")]
        data_bits: u8,
        /// Parity: "none", "even", or "odd" (default: "none")
        #[serde(default = "default_parity")]
        parity: String,
        /// Stop bits: 1 or 2 (default: 1)
        #[serde(default = "default_stop_bits")]
        stop_bits: u8,
    },
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_parity() -> String {
    "none".to_string()
}

fn default_stop_bits() -> u8 {
    1
}

impl MetersConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json5(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn from_json5(content: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(content)?)
    }

    /// Check devices against the models known to `registry`.
    pub fn validate(&self, registry: &Registry) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Validation(
                "At least one device must be configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for device in &self.devices {
            if !names.insert(device.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate device name '{}'",
                    device.name
                )));
            }
            if !(1..=247).contains(&device.slave_id) {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': slave_id {} out of range 1-247",
                    device.name, device.slave_id
                )));
            }
            if device.timeout_ms == 0 {
                return Err(ConfigError::Validation(format!(
                    "Device '{}': timeout_ms must be greater than 0",
                    device.name
                )));
            }
            device.transport.validate().map_err(|msg| {
                ConfigError::Validation(format!("Device '{}': {msg}", device.name))
            })?;
            registry.lookup(&device.model)?;
        }

        Ok(())
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    /// Build the connection for this device, already addressing its slave.
    pub async fn connect(&self) -> Result<Box<dyn Connection>, ConfigError> {
        let mut conn = self.transport.connection()?;
        conn.timeout(self.timeout());
        conn.connect_delay(self.connect_delay());
        conn.slave(self.slave_id).await;
        Ok(conn)
    }
}

impl TransportConfig {
    /// Check serial framing settings.
    fn validate(&self) -> Result<(), String> {
        let TransportConfig::Rtu {
            data_bits,
            parity,
            stop_bits,
            ..
        } = self
        else {
            return Ok(());
        };

        if !(5..=8).contains(data_bits) {
            return Err(format!("data_bits {data_bits} out of range 5-8"));
        }
        if !matches!(parity.to_lowercase().as_str(), "none" | "even" | "odd") {
            return Err(format!(
                "Invalid parity '{parity}'. Must be 'none', 'even', or 'odd'"
            ));
        }
        if !matches!(stop_bits, 1 | 2) {
            return Err(format!("stop_bits must be 1 or 2, got {stop_bits}"));
        }
        Ok(())
    }

    /// Unaddressed connection over this transport.
    pub fn connection(&self) -> Result<Box<dyn Connection>, ConfigError> {
        match self {
            TransportConfig::Tcp { address } => Ok(Box::new(Bus::tcp(address))),
            TransportConfig::RtuOverTcp { address } => Ok(Box::new(Bus::rtu_over_tcp(address))),
            #[cfg(feature = "serial")]
            TransportConfig::Rtu {
                device,
                baud_rate,
                data_bits,
                parity,
                stop_bits,
            } => {
                let parity = match parity.to_lowercase().as_str() {
                    "none" => tokio_serial::Parity::None,
                    "even" => tokio_serial::Parity::Even,
                    "odd" => tokio_serial::Parity::Odd,
                    other => {
                        return Err(ConfigError::Validation(format!(
                            "Invalid parity '{}'",
                            other
                        )))
                    }
                };
                let stop_bits = match stop_bits {
                    1 => tokio_serial::StopBits::One,
                    2 => tokio_serial::StopBits::Two,
                    other => {
                        return Err(ConfigError::Validation(format!(
                            "Invalid stop_bits {}",
                            other
                        )))
                    }
                };
                let data_bits = match data_bits {
                    5 => tokio_serial::DataBits::Five,
                    6 => tokio_serial::DataBits::Six,
                    7 => tokio_serial::DataBits::Seven,
                    8 => tokio_serial::DataBits::Eight,
                    other => {
                        return Err(ConfigError::Validation(format!(
                            "Invalid data_bits {}",
                            other
                        )))
                    }
                };

                let link = crate::link::RtuLink::new(device, *baud_rate)
                    .data_bits(data_bits)
                    .parity(parity)
                    .stop_bits(stop_bits);
                Ok(Box::new(Bus::new(link)))
            }
            #[cfg(not(feature = "serial"))]
            TransportConfig::Rtu { device, .. } => Err(ConfigError::Validation(format!(
                "Serial device '{}' requires the `serial` feature",
                device
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::Error;

    const CONFIG: &str = r#"{
        // grid meter
        devices: [
            { name: "grid", model: "CGEM24_E1", transport: { type: "tcp", address: "127.0.0.1" } },
            {
                name: "pv",
                model: "SDM",
                slave_id: 2,
                timeout_ms: 250,
                connect_delay_ms: 50,
                transport: { type: "rtuovertcp", address: "127.0.0.1:8899" },
            },
        ],
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = MetersConfig::from_json5(CONFIG).unwrap();
        assert_eq!(config.devices.len(), 2);

        let grid = &config.devices[0];
        assert_eq!(grid.slave_id, 1);
        assert_eq!(grid.timeout(), Duration::from_secs(1));
        assert_eq!(grid.connect_delay(), Duration::ZERO);
        assert_eq!(
            grid.transport,
            TransportConfig::Tcp {
                address: "127.0.0.1".to_string()
            }
        );

        let pv = &config.devices[1];
        assert_eq!(pv.timeout(), Duration::from_millis(250));
        assert_eq!(pv.connect_delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = MetersConfig::load_from_file(file.path()).unwrap();
        let registry = Registry::with_builtin_models().unwrap();
        config.validate(&registry).unwrap();
    }

    #[test]
    fn test_rtu_defaults() {
        let config = MetersConfig::from_json5(
            r#"{ devices: [{ name: "a", model: "SDM", transport: { type: "rtu", device: "/dev/ttyUSB0" } }] }"#,
        )
        .unwrap();
        match &config.devices[0].transport {
            TransportConfig::Rtu {
                baud_rate,
                data_bits,
                parity,
                stop_bits,
                ..
            } => {
                assert_eq!(*baud_rate, 9600);
                assert_eq!(*data_bits, 8);
                assert_eq!(parity, "none");
                assert_eq!(*stop_bits, 1);
            }
            other => panic!("unexpected transport {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_unknown_model() {
        let mut config = MetersConfig::from_json5(CONFIG).unwrap();
        config.devices[1].model = "SDM630".to_string();

        let registry = Registry::with_builtin_models().unwrap();
        let err = config.validate(&registry).unwrap_err();
        assert!(matches!(err, ConfigError::Meter(Error::UnknownModel(ref m)) if m == "SDM630"));
    }

    #[test]
    fn test_validate_rejects_bad_devices() {
        let registry = Registry::with_builtin_models().unwrap();

        let mut config = MetersConfig::from_json5(CONFIG).unwrap();
        config.devices[1].name = "grid".to_string();
        assert!(matches!(
            config.validate(&registry),
            Err(ConfigError::Validation(_))
        ));

        let mut config = MetersConfig::from_json5(CONFIG).unwrap();
        config.devices[0].slave_id = 0;
        assert!(matches!(
            config.validate(&registry),
            Err(ConfigError::Validation(_))
        ));

        let config = MetersConfig { devices: vec![] };
        assert!(config.validate(&registry).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_serial_settings() {
        let registry = Registry::with_builtin_models().unwrap();
        let rtu = |settings: &str| {
            MetersConfig::from_json5(&format!(
                r#"{{ devices: [{{ name: "a", model: "SDM", transport: {{ type: "rtu", device: "/dev/ttyUSB0", {settings} }} }}] }}"#
            ))
            .unwrap()
        };

        rtu("data_bits: 7, parity: \"Even\", stop_bits: 2")
            .validate(&registry)
            .unwrap();
        let invalid = [
            "data_bits: 9",
            "data_bits: 4",
            "stop_bits: 3",
            "stop_bits: 0",
            "parity: \"mark\"",
        ];
        for settings in invalid {
            let result = rtu(settings).validate(&registry);
            assert!(
                matches!(result, Err(ConfigError::Validation(_))),
                "accepted {settings}"
            );
        }
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let registry = Registry::with_builtin_models().unwrap();
        let mut config = MetersConfig::from_json5(CONFIG).unwrap();
        config.devices[0].timeout_ms = 0;
        assert!(matches!(
            config.validate(&registry),
            Err(ConfigError::Validation(_))
        ));
    }

    #[cfg(feature = "serial")]
    #[test]
    fn test_serial_connection_rejects_bad_framing() {
        let transport = TransportConfig::Rtu {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            data_bits: 9,
            parity: "none".to_string(),
            stop_bits: 1,
        };
        assert!(matches!(
            transport.connection(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_applies_settings() {
        let config = MetersConfig::from_json5(CONFIG).unwrap();
        let mut conn = config.devices[1].connect().await.unwrap();

        assert_eq!(conn.to_string(), "127.0.0.1:8899");
        assert_eq!(conn.timeout(Duration::from_secs(3)), Duration::from_millis(250));
    }
}

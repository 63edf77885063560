use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! measurements {
    ($($variant:ident => ($description:literal, $unit:literal)),* $(,)?) => {
        /// Semantic quantity read from a meter, shared by all meter models.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Measurement {
            $($variant,)*
        }

        impl Measurement {
            /// Every measurement, in declaration order.
            pub const ALL: &'static [Measurement] = &[$(Measurement::$variant,)*];

            /// Symbolic name, identical to the variant name.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Measurement::$variant => stringify!($variant),)*
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $(Measurement::$variant => $description,)*
                }
            }

            /// Physical unit of the scaled value. Empty for dimensionless quantities.
            pub fn unit(&self) -> &'static str {
                match self {
                    $(Measurement::$variant => $unit,)*
                }
            }
        }
    };
}

measurements! {
    VoltageL1 => ("L1 Voltage", "V"),
    VoltageL2 => ("L2 Voltage", "V"),
    VoltageL3 => ("L3 Voltage", "V"),
    CurrentL1 => ("L1 Current", "A"),
    CurrentL2 => ("L2 Current", "A"),
    CurrentL3 => ("L3 Current", "A"),
    Power => ("Power", "W"),
    PowerL1 => ("L1 Power", "W"),
    PowerL2 => ("L2 Power", "W"),
    PowerL3 => ("L3 Power", "W"),
    ReactivePower => ("Reactive Power", "var"),
    ReactivePowerL1 => ("L1 Reactive Power", "var"),
    ReactivePowerL2 => ("L2 Reactive Power", "var"),
    ReactivePowerL3 => ("L3 Reactive Power", "var"),
    ApparentPower => ("Apparent Power", "VA"),
    ApparentPowerL1 => ("L1 Apparent Power", "VA"),
    ApparentPowerL2 => ("L2 Apparent Power", "VA"),
    ApparentPowerL3 => ("L3 Apparent Power", "VA"),
    Cosphi => ("Average Cosphi", ""),
    CosphiL1 => ("L1 Cosphi", ""),
    CosphiL2 => ("L2 Cosphi", ""),
    CosphiL3 => ("L3 Cosphi", ""),
    Frequency => ("Frequency", "Hz"),
    Import => ("Total Import", "kWh"),
    ImportL1 => ("L1 Import", "kWh"),
    ImportL2 => ("L2 Import", "kWh"),
    ImportL3 => ("L3 Import", "kWh"),
    Export => ("Total Export", "kWh"),
    ExportL1 => ("L1 Export", "kWh"),
    ExportL2 => ("L2 Export", "kWh"),
    ExportL3 => ("L3 Export", "kWh"),
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid measurement: {0}")]
pub struct ParseMeasurementError(pub String);

impl FromStr for Measurement {
    type Err = ParseMeasurementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Measurement::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| ParseMeasurementError(s.to_string()))
    }
}

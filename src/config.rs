//! Platform-neutral line configuration for a serial session.

/// Canonical baud rates this crate will configure a terminal for. An unrecognized rate is
/// rejected rather than silently substituted — see the baud-rate handling in `termios`.
pub const CANONICAL_BAUD_RATES: &[u32] = &[
    9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    RtsCts,
    XonXoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// 5-8; values outside this range are normalized to 8 with a logged warning.
    pub data_bits: u8,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    pub rx_buffer_size: usize,
    pub tx_buffer_size: usize,
    pub read_timeout_ms: u32,
    pub write_timeout_ms: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baud_rate: 9600,
            data_bits: 8,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            rx_buffer_size: 4096,
            tx_buffer_size: 4096,
            read_timeout_ms: 100,
            write_timeout_ms: 0,
        }
    }
}

impl SerialConfig {
    pub(crate) fn normalized_data_bits(&self) -> u8 {
        match self.data_bits {
            5 | 6 | 7 | 8 => self.data_bits,
            other => {
                warn!("unsupported data_bits {}, defaulting to 8", other);
                8
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conventional() {
        let cfg = SerialConfig::default();
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.data_bits, 8);
        assert_eq!(cfg.stop_bits, StopBits::One);
        assert_eq!(cfg.parity, Parity::None);
    }

    #[test]
    fn normalizes_bad_data_bits() {
        let mut cfg = SerialConfig::default();
        cfg.data_bits = 3;
        assert_eq!(cfg.normalized_data_bits(), 8);
    }
}

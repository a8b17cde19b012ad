//! Shared state of the exported device object.

use std::sync::atomic::{AtomicU64, Ordering};

/// Current value of the device plus its unit.
///
/// The value is kept as `f64` bits in a single atomic word, so bus handlers
/// can read it while the supervisor writes it. `Text` is derived on every read.
#[derive(Debug)]
pub struct DeviceState {
    bits: AtomicU64,
    unit: String,
}

impl DeviceState {
    /// Create a state holding `initial`.
    pub fn new(initial: f64, unit: impl Into<String>) -> Self {
        Self {
            bits: AtomicU64::new(initial.to_bits()),
            unit: unit.into(),
        }
    }

    /// Store a new value.
    pub fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    /// The current value.
    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// The unit suffix used by [`text`](Self::text).
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// The current value with one decimal and the unit, e.g. `22.5 °C`.
    pub fn text(&self) -> String {
        format_text(self.value(), &self.unit)
    }
}

/// Format a value the way the `Text` property renders it.
pub fn format_text(value: f64, unit: &str) -> String {
    format!("{:.1} {}", value, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_tracks_value() {
        let state = DeviceState::new(25.0, "°C");
        assert_eq!(state.text(), "25.0 °C");

        for (value, expected) in [
            (22.5, "22.5 °C"),
            (4.0, "4.0 °C"),
            (-18.0, "-18.0 °C"),
            (3.96, "4.0 °C"),
            (100.0, "100.0 °C"),
        ] {
            state.store(value);
            assert_eq!(state.value(), value);
            assert_eq!(state.text(), expected);
        }
    }

    #[test]
    fn test_custom_unit() {
        let state = DeviceState::new(12.34, "%");
        assert_eq!(state.unit(), "%");
        assert_eq!(state.text(), "12.3 %");
    }
}

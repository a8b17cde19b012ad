//! Venus D-Bus bridge for a temperature sensor.
//!
//! Polls a sample source and publishes the reading as a
//! `com.victronenergy.temperature.*` device.
//!
//! # Bus layout
//!
//! ```text
//! com.victronenergy.settings
//!   /Settings/Temperature/BrassMonkey                  initial value
//!   /Settings/Temperature/BrassMonkey/DeviceInstance   245
//!   /Settings/Temperature/BrassMonkey/ProductId        0xB104
//!   /Settings/Temperature/BrassMonkey/ProductName      "Brass Monkey Fridge Monitor"
//!   /Settings/Temperature/BrassMonkey/CustomName       product name
//!
//! com.victronenergy.temperature.brass_monkey
//!   /Settings/Temperature/BrassMonkey                  Value, Text
//!   /DeviceInstance /ProductId /ProductName /CustomName
//!   /Mgmt/ProcessName /Mgmt/ProcessVersion /Mgmt/Connection /Connected
//! ```

pub mod config;
pub mod source;

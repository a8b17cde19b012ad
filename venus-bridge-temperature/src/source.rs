//! Concrete sample sources.
//!
//! The source is picked from configuration, never from the platform the
//! bridge happens to run on.

use std::path::{Path, PathBuf};

use venus_bridge_framework::{SampleError, SampleSource};

use crate::config::SourceConfig;

/// Returns the same reading every time.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    value: f64,
}

impl SimulatedSource {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl SampleSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn sample(&mut self) -> Result<f64, SampleError> {
        Ok(self.value)
    }
}

/// Reads a DS18B20 probe through the Linux w1-therm driver.
///
/// The first device directory under `devices_dir` whose name starts with
/// `device_prefix` is used. Its `w1_slave` file looks like:
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
#[derive(Debug, Clone)]
pub struct W1ThermSource {
    devices_dir: PathBuf,
    device_prefix: String,
}

impl W1ThermSource {
    pub fn new(devices_dir: impl Into<PathBuf>, device_prefix: impl Into<String>) -> Self {
        Self {
            devices_dir: devices_dir.into(),
            device_prefix: device_prefix.into(),
        }
    }

    /// Locate the probe directory.
    async fn find_device(&self) -> Result<PathBuf, SampleError> {
        let mut entries = match tokio::fs::read_dir(&self.devices_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SampleError::NotFound(format!(
                    "{} does not exist (is the w1-therm module loaded?)",
                    self.devices_dir.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let mut matches = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry
                .file_name()
                .to_string_lossy()
                .starts_with(&self.device_prefix)
            {
                matches.push(entry.path());
            }
        }
        matches.sort();

        matches.into_iter().next().ok_or_else(|| {
            SampleError::NotFound(format!(
                "no {}* device in {}",
                self.device_prefix,
                self.devices_dir.display()
            ))
        })
    }
}

impl SampleSource for W1ThermSource {
    fn name(&self) -> &str {
        "w1_therm"
    }

    async fn sample(&mut self) -> Result<f64, SampleError> {
        let device = self.find_device().await?;
        let contents = read_slave(&device).await?;
        let value = parse_w1_slave(&contents)?;
        tracing::trace!(device = %device.display(), value, "Read probe");
        Ok(value)
    }
}

async fn read_slave(device: &Path) -> Result<String, SampleError> {
    Ok(tokio::fs::read_to_string(device.join("w1_slave")).await?)
}

/// Parse the contents of a `w1_slave` file into degrees.
pub fn parse_w1_slave(contents: &str) -> Result<f64, SampleError> {
    let mut lines = contents.lines();

    let status = lines
        .next()
        .ok_or_else(|| SampleError::Invalid("empty w1_slave".to_string()))?;
    if !status.trim_end().ends_with("YES") {
        return Err(SampleError::Invalid(format!("CRC check failed: {}", status.trim())));
    }

    let data = lines
        .next()
        .ok_or_else(|| SampleError::Invalid("missing data line".to_string()))?;
    let (_, raw) = data
        .split_once("t=")
        .ok_or_else(|| SampleError::Invalid(format!("no t= field in '{}'", data.trim())))?;
    let millis: f64 = raw
        .trim()
        .parse()
        .map_err(|_| SampleError::Invalid(format!("unparsable temperature '{}'", raw.trim())))?;

    Ok(millis / 1000.0)
}

/// The source selected by `source.kind`.
#[derive(Debug, Clone)]
pub enum ConfiguredSource {
    Simulated(SimulatedSource),
    W1Therm(W1ThermSource),
}

impl ConfiguredSource {
    pub fn from_config(config: &SourceConfig) -> Self {
        match config {
            SourceConfig::Simulated { value } => Self::Simulated(SimulatedSource::new(*value)),
            SourceConfig::W1Therm {
                devices_dir,
                device_prefix,
            } => Self::W1Therm(W1ThermSource::new(devices_dir, device_prefix.clone())),
        }
    }
}

impl SampleSource for ConfiguredSource {
    fn name(&self) -> &str {
        match self {
            Self::Simulated(source) => source.name(),
            Self::W1Therm(source) => source.name(),
        }
    }

    async fn sample(&mut self) -> Result<f64, SampleError> {
        match self {
            Self::Simulated(source) => source.sample().await,
            Self::W1Therm(source) => source.sample().await,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sample of system resource utilisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// CPU utilisation in percent (0.0 - 100.0).
    pub cpu_percent: f64,
    /// Memory utilisation in percent (0.0 - 100.0).
    pub memory_percent: f64,
    /// Temperature in degrees Celsius, when a sensor could be read.
    pub temperature: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl SystemMetrics {
    pub fn new(cpu_percent: f64, memory_percent: f64) -> Self {
        Self {
            cpu_percent,
            memory_percent,
            temperature: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_temperature(mut self, celsius: Option<f64>) -> Self {
        self.temperature = celsius;
        self
    }
}

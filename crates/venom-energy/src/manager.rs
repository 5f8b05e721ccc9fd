use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use venom_types::{Result, SideEffect, SystemMetrics};

use crate::alert::AlertCallback;
use crate::priority;
use crate::sampler::{MetricsSampler, ProcfsSampler};

/// Configuration for the energy manager.
#[derive(Debug, Clone)]
pub struct EnergyConfig {
    /// CPU utilisation above which the system is busy (0.0 - 1.0).
    pub cpu_threshold: f64,
    /// Memory utilisation above which the system is busy (0.0 - 1.0).
    pub memory_threshold: f64,
    /// How often the monitoring loop checks for a busy system.
    pub check_interval: Duration,
    /// Window over which one CPU sample is measured.
    pub cpu_sample_window: Duration,
    /// Inactivity after which the user counts as idle, in minutes.
    pub idle_threshold_minutes: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            cpu_threshold: 0.8,
            memory_threshold: 0.85,
            check_interval: Duration::from_secs(5),
            cpu_sample_window: Duration::from_secs(1),
            idle_threshold_minutes: 10.0,
        }
    }
}

impl EnergyConfig {
    pub fn with_thresholds(mut self, cpu: f64, memory: f64) -> Self {
        self.cpu_threshold = cpu;
        self.memory_threshold = memory;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_cpu_sample_window(mut self, window: Duration) -> Self {
        self.cpu_sample_window = window;
        self
    }
}

/// Observational snapshot of the manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyStatus {
    pub metrics: Option<SystemMetrics>,
    pub cpu_threshold_percent: f64,
    pub memory_threshold_percent: f64,
    pub is_busy: bool,
    pub is_idle: bool,
    pub idle_seconds: f64,
    pub callbacks: usize,
    pub monitoring: bool,
    pub sensors_active: bool,
}

/// Watches resource usage and user activity, alerting registered callbacks
/// when the machine becomes busy.
pub struct EnergyManager {
    config: EnergyConfig,
    sampler: Arc<dyn MetricsSampler>,
    callbacks: RwLock<Vec<Arc<dyn AlertCallback>>>,
    last_activity: Mutex<Instant>,
    sensors_active: AtomicBool,
    sensor_status: Mutex<SideEffect>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl EnergyManager {
    pub fn new(config: EnergyConfig) -> Self {
        Self::with_sampler(config, Arc::new(ProcfsSampler::default()))
    }

    pub fn with_sampler(config: EnergyConfig, sampler: Arc<dyn MetricsSampler>) -> Self {
        Self {
            config,
            sampler,
            callbacks: RwLock::new(Vec::new()),
            last_activity: Mutex::new(Instant::now()),
            sensors_active: AtomicBool::new(true),
            sensor_status: Mutex::new(SideEffect::Ok),
            monitor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EnergyConfig {
        &self.config
    }

    /// Sample CPU, memory and (best-effort) temperature.
    ///
    /// Takes about `cpu_sample_window` to complete.
    pub async fn get_metrics(&self) -> Result<SystemMetrics> {
        let cpu = self
            .sampler
            .cpu_percent(self.config.cpu_sample_window)
            .await?;
        let memory = self.sampler.memory_percent()?;
        Ok(SystemMetrics::new(cpu, memory).with_temperature(self.read_temperature()))
    }

    fn read_temperature(&self) -> Option<f64> {
        let (temperature, status) = match self.sampler.temperature() {
            Ok(t) => (Some(t), SideEffect::Ok),
            Err(e) => {
                if self.sensors_active.load(Ordering::Relaxed) {
                    tracing::debug!("Temperature sensor unavailable: {}", e);
                }
                (None, SideEffect::degraded(e.to_string()))
            }
        };
        self.sensors_active.store(status.is_ok(), Ordering::Relaxed);
        *lock(&self.sensor_status) = status;
        temperature
    }

    pub fn sensors_active(&self) -> bool {
        self.sensors_active.load(Ordering::Relaxed)
    }

    /// Outcome of the most recent temperature read.
    pub fn sensor_status(&self) -> SideEffect {
        lock(&self.sensor_status).clone()
    }

    fn exceeds_thresholds(&self, metrics: &SystemMetrics) -> bool {
        metrics.cpu_percent > self.config.cpu_threshold * 100.0
            || metrics.memory_percent > self.config.memory_threshold * 100.0
    }

    /// Whether CPU or memory use is above its threshold.
    ///
    /// A sampler failure is logged and treated as not busy.
    pub async fn is_system_busy(&self) -> bool {
        match self.get_metrics().await {
            Ok(metrics) => self.exceeds_thresholds(&metrics),
            Err(e) => {
                tracing::warn!("Failed to sample system metrics: {}", e);
                false
            }
        }
    }

    pub fn set_low_priority(&self, pid: Option<u32>) -> bool {
        priority::set_low_priority(pid)
    }

    pub fn mark_activity(&self) {
        *lock(&self.last_activity) = Instant::now();
    }

    /// Seconds since the last recorded activity.
    pub fn get_idle_time(&self) -> f64 {
        lock(&self.last_activity).elapsed().as_secs_f64()
    }

    pub fn is_idle(&self, threshold_minutes: f64) -> bool {
        self.get_idle_time() >= threshold_minutes * 60.0
    }

    /// Idle for at least `threshold_minutes` and not busy.
    pub async fn should_dream(&self, threshold_minutes: f64) -> bool {
        self.is_idle(threshold_minutes) && !self.is_system_busy().await
    }

    pub fn register_alert_callback(&self, callback: Arc<dyn AlertCallback>) {
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        callbacks.push(callback);
        tracing::debug!("Registered alert callback ({} total)", callbacks.len());
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Invoke every callback; a failing callback does not stop the others.
    /// Returns how many callbacks succeeded.
    pub async fn dispatch_alerts(&self) -> usize {
        let callbacks: Vec<Arc<dyn AlertCallback>> = self
            .callbacks
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let mut ok = 0;
        for (i, callback) in callbacks.iter().enumerate() {
            match callback.on_alert().await {
                Ok(()) => ok += 1,
                Err(e) => tracing::error!("Alert callback #{} failed: {}", i, e),
            }
        }
        ok
    }

    /// Start the background busy check. Does nothing if already running.
    pub fn start_monitoring(self: &Arc<Self>) {
        let mut monitor = lock(&self.monitor);
        if monitor.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::warn!("Energy monitoring already running");
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.config.check_interval;
        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                if manager.is_system_busy().await {
                    tracing::info!("System busy, alerting {} callback(s)", manager.callback_count());
                    manager.dispatch_alerts().await;
                }
            }
        }));
        tracing::info!("Energy monitoring started (interval {:?})", interval);
    }

    /// Cancel the background check and wait for it to finish.
    pub async fn stop_monitoring(&self) {
        let handle = lock(&self.monitor).take();
        let Some(handle) = handle else {
            return;
        };
        handle.abort();
        match handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::error!("Energy monitoring task failed: {}", e),
        }
        tracing::info!("Energy monitoring stopped");
    }

    pub fn is_monitoring(&self) -> bool {
        lock(&self.monitor)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub async fn get_status(&self) -> EnergyStatus {
        let metrics = match self.get_metrics().await {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!("Failed to sample system metrics: {}", e);
                None
            }
        };
        EnergyStatus {
            is_busy: metrics.as_ref().is_some_and(|m| self.exceeds_thresholds(m)),
            metrics,
            cpu_threshold_percent: self.config.cpu_threshold * 100.0,
            memory_threshold_percent: self.config.memory_threshold * 100.0,
            is_idle: self.is_idle(self.config.idle_threshold_minutes),
            idle_seconds: self.get_idle_time(),
            callbacks: self.callback_count(),
            monitoring: self.is_monitoring(),
            sensors_active: self.sensors_active(),
        }
    }
}

impl Drop for EnergyManager {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.monitor).take() {
            handle.abort();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//! Benchmark settings
//!
//! Loaded from a JSON file or taken from defaults; individual fields may be
//! overridden from the command line.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Collision detection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Strategy {
    /// Pairwise circle test on the CPU
    BruteForce,
    /// Occupancy bitmap rendered per frame, sampled along each outline
    #[default]
    Bitmap,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::BruteForce => "BruteForce",
            Strategy::Bitmap => "Bitmap",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bruteforce" | "brute-force" | "brute" | "cpu" => Some(Strategy::BruteForce),
            "bitmap" | "gpu" => Some(Strategy::Bitmap),
            _ => None,
        }
    }
}

/// Device that renders occupancy bitmaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BackendKind {
    #[default]
    Wgpu,
    /// Worker-thread rasterizer, no GPU required
    Software,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Wgpu => "Wgpu",
            BackendKind::Software => "Software",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wgpu" | "gpu" => Some(BackendKind::Wgpu),
            "software" | "soft" | "cpu" => Some(BackendKind::Software),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Benchmark run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchSettings {
    pub strategy: Strategy,
    pub backend: BackendKind,

    // === Sweep ===
    /// Entities per group, one run each
    pub entity_counts: Vec<usize>,
    /// Ticks per run
    pub ticks: usize,
    /// Pause between runs so the device can cool down
    pub cooldown_ms: u64,

    /// Artificial per-submission latency of the software device (µs)
    pub soft_latency_us: u64,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::Bitmap,
            backend: BackendKind::Wgpu,

            entity_counts: vec![100, 500, 1000, 2000, 3000, 4000, 5000],
            ticks: 1000,
            cooldown_ms: 2000,

            soft_latency_us: 0,
        }
    }
}

impl BenchSettings {
    /// Load settings from a JSON file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.entity_counts.is_empty() {
            return Err(SettingsError::Invalid("entity_counts is empty".into()));
        }
        if self.ticks == 0 {
            return Err(SettingsError::Invalid("ticks must be positive".into()));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Software device latency, if any
    pub fn soft_latency(&self) -> Option<Duration> {
        (self.soft_latency_us > 0).then(|| Duration::from_micros(self.soft_latency_us))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_benchmark_sweep() {
        let settings = BenchSettings::default();
        assert_eq!(settings.entity_counts.len(), 7);
        assert_eq!(settings.ticks, 1000);
        assert_eq!(settings.cooldown(), Duration::from_secs(2));
        assert_eq!(settings.soft_latency(), None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            BenchSettings::from_json(r#"{ "strategy": "BruteForce", "ticks": 10 }"#).unwrap();
        assert_eq!(settings.strategy, Strategy::BruteForce);
        assert_eq!(settings.ticks, 10);
        assert_eq!(settings.backend, BackendKind::Wgpu);
        assert_eq!(settings.entity_counts, BenchSettings::default().entity_counts);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        assert!(matches!(
            BenchSettings::from_json(r#"{ "ticks": 0 }"#),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(
            BenchSettings::from_json(r#"{ "entity_counts": [] }"#),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(
            BenchSettings::from_json("{ not json"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_names_round_trip() {
        for strategy in [Strategy::BruteForce, Strategy::Bitmap] {
            assert_eq!(Strategy::from_str(strategy.as_str()), Some(strategy));
        }
        for backend in [BackendKind::Wgpu, BackendKind::Software] {
            assert_eq!(BackendKind::from_str(backend.as_str()), Some(backend));
        }
        assert_eq!(Strategy::from_str("brute-force"), Some(Strategy::BruteForce));
        assert_eq!(BackendKind::from_str("SOFT"), Some(BackendKind::Software));
        assert_eq!(Strategy::from_str("quadtree"), None);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            BenchSettings::load("/nonexistent/occupancy-bench.json"),
            Err(SettingsError::Io(_))
        ));
    }
}

//! Scheduler configuration.
//!
//! Loaded from YAML with a fallback chain and validated as a whole before it
//! is ever handed to a live scheduler.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::SlaLevel;
use crate::error::TriagrError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Base priority per task category
    pub priority_levels: BTreeMap<String, i64>,
    pub age_escalation: AgeEscalationConfig,
    pub sla: SlaConfig,
    /// Lane name to priority range
    pub lanes: BTreeMap<String, LaneRange>,
    pub starvation_prevention: StarvationConfig,
    pub preemption: PreemptionConfig,
    pub dynamic_adjustment: DynamicAdjustmentConfig,
    pub max_concurrent: usize,
    pub tick_interval_ms: u64,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgeEscalationConfig {
    pub enabled: bool,
    pub hourly_increase: f64,
    pub max_increase: i64,
    pub threshold_hours: f64,
}

impl Default for AgeEscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hourly_increase: 1.5,
            max_increase: 100,
            threshold_hours: 24.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SlaConfig {
    pub enabled: bool,
    pub levels: BTreeMap<SlaLevel, SlaLevelConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaLevelConfig {
    pub hours: f64,
    pub priority_boost: i64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        let levels = [
            (SlaLevel::Critical, 4.0, 200),
            (SlaLevel::High, 24.0, 100),
            (SlaLevel::Normal, 72.0, 50),
            (SlaLevel::Low, 168.0, 25),
        ]
        .into_iter()
        .map(|(level, hours, priority_boost)| (level, SlaLevelConfig { hours, priority_boost }))
        .collect();

        Self { enabled: true, levels }
    }
}

/// Inclusive priority range; `max: None` is unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneRange {
    pub min: i64,
    #[serde(default)]
    pub max: Option<i64>,
}

impl LaneRange {
    pub fn new(min: i64, max: Option<i64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, priority: i64) -> bool {
        priority >= self.min && self.max.is_none_or(|max| priority <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StarvationConfig {
    pub enabled: bool,
    /// Milliseconds a task may wait in the queue before the boost applies
    pub max_wait_time: u64,
    pub priority_boost: i64,
}

impl Default for StarvationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_wait_time: 48 * 60 * 60 * 1000,
            priority_boost: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreemptionConfig {
    pub enabled: bool,
    pub min_priority_difference: i64,
    /// Categories allowed to preempt running work
    pub allowed_task_types: Vec<String>,
}

impl Default for PreemptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_priority_difference: 300,
            allowed_task_types: vec!["urgent".to_string(), "critical".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DynamicAdjustmentConfig {
    pub enabled: bool,
    pub failure_increase: i64,
    pub success_decrease: i64,
    pub max_adjustment: i64,
}

impl Default for DynamicAdjustmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_increase: 10,
            success_decrease: 5,
            max_adjustment: 50,
        }
    }
}

/// Thresholds behind the advisory recommendations in reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsConfig {
    pub starvation_warn_threshold: u64,
    pub preemption_warn_threshold: u64,
    /// Fraction of finished attempts that failed
    pub failure_rate_warn: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            starvation_warn_threshold: 5,
            preemption_warn_threshold: 10,
            failure_rate_warn: 0.25,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let priority_levels = [
            ("urgent", 1000),
            ("critical", 900),
            ("bug", 75),
            ("feature", 50),
            ("enhancement", 40),
            ("documentation", 20),
            ("misc", 10),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

        let lanes = [
            ("urgent", LaneRange::new(800, None)),
            ("high", LaneRange::new(100, Some(799))),
            ("normal", LaneRange::new(30, Some(99))),
            ("low", LaneRange::new(0, Some(29))),
        ]
        .into_iter()
        .map(|(name, range)| (name.to_string(), range))
        .collect();

        Self {
            priority_levels,
            age_escalation: AgeEscalationConfig::default(),
            sla: SlaConfig::default(),
            lanes,
            starvation_prevention: StarvationConfig::default(),
            preemption: PreemptionConfig::default(),
            dynamic_adjustment: DynamicAdjustmentConfig::default(),
            max_concurrent: 3,
            tick_interval_ms: 1000,
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. ./triagr.yml
    /// 3. ~/.config/triagr/triagr.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        let project_config = PathBuf::from(format!("{}.yml", project_name));
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", project_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read, parse and validate one file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Config file failed validation")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate the configuration as a whole.
    pub fn validate(&self) -> crate::Result<()> {
        fn invalid(msg: String) -> crate::Result<()> {
            Err(TriagrError::InvalidConfig(msg))
        }

        if self.priority_levels.is_empty() {
            return invalid("priorityLevels must define at least one category".to_string());
        }
        if self.lanes.is_empty() {
            return invalid("lanes must define at least one lane".to_string());
        }
        for (name, range) in &self.lanes {
            if let Some(max) = range.max
                && range.min > max
            {
                return invalid(format!("lane '{}' has min {} > max {}", name, range.min, max));
            }
        }
        if self.max_concurrent == 0 {
            return invalid("maxConcurrent must be > 0".to_string());
        }

        let age = &self.age_escalation;
        if !(age.hourly_increase.is_finite() && age.hourly_increase >= 0.0) {
            return invalid("ageEscalation.hourlyIncrease must be a non-negative number".to_string());
        }
        if age.max_increase < 0 {
            return invalid("ageEscalation.maxIncrease must be >= 0".to_string());
        }
        if !(age.threshold_hours.is_finite() && age.threshold_hours >= 0.0) {
            return invalid("ageEscalation.thresholdHours must be a non-negative number".to_string());
        }

        for (level, sla) in &self.sla.levels {
            if !(sla.hours.is_finite() && sla.hours >= 0.0) {
                return invalid(format!("sla.levels.{}.hours must be a non-negative number", level));
            }
        }

        if self.preemption.min_priority_difference < 0 {
            return invalid("preemption.minPriorityDifference must be >= 0".to_string());
        }

        let dynamic = &self.dynamic_adjustment;
        if dynamic.failure_increase < 0 || dynamic.success_decrease < 0 || dynamic.max_adjustment < 0 {
            return invalid("dynamicAdjustment values must be >= 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.analytics.failure_rate_warn) {
            return invalid("analytics.failureRateWarn must be within [0, 1]".to_string());
        }

        Ok(())
    }

    /// The lowest configured tier, used as fallback and as the priority floor
    pub fn min_tier(&self) -> i64 {
        self.priority_levels.values().copied().min().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.min_tier(), 10);
        assert_eq!(config.priority_levels["bug"], 75);
    }

    #[test]
    fn test_lane_range_contains() {
        let bounded = LaneRange::new(100, Some(799));
        assert!(bounded.contains(100));
        assert!(bounded.contains(799));
        assert!(!bounded.contains(800));

        let open = LaneRange::new(800, None);
        assert!(open.contains(i64::MAX));
        assert!(!open.contains(799));
    }

    #[test]
    fn test_validate_rejects_inverted_lane() {
        let mut config = SchedulerConfig::default();
        config.lanes.insert("broken".to_string(), LaneRange::new(50, Some(10)));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = SchedulerConfig {
            max_concurrent: 0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(config.validate(), Err(TriagrError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_empty_tiers() {
        let config = SchedulerConfig {
            priority_levels: BTreeMap::new(),
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_hourly_increase() {
        let mut config = SchedulerConfig::default();
        config.age_escalation.hourly_increase = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_camel_case_yaml() {
        let yaml = r#"
priorityLevels:
  urgent: 1000
  bug: 75
  misc: 10
lanes:
  urgent: { min: 800 }
  high: { min: 100, max: 799 }
  normal: { min: 30, max: 99 }
  low: { min: 0, max: 29 }
starvationPrevention:
  enabled: true
  maxWaitTime: 172800000
  priorityBoost: 100
preemption:
  enabled: true
  minPriorityDifference: 300
  allowedTaskTypes: [urgent]
sla:
  enabled: true
  levels:
    critical: { hours: 4, priorityBoost: 200 }
maxConcurrent: 2
"#;
        let config: SchedulerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.lanes["urgent"].max, None);
        assert_eq!(config.preemption.allowed_task_types, vec!["urgent".to_string()]);
        assert_eq!(config.sla.levels[&SlaLevel::Critical].priority_boost, 200);
        // Sections not mentioned keep their defaults
        assert_eq!(config.dynamic_adjustment, DynamicAdjustmentConfig::default());
    }

    #[test]
    fn test_negative_max_concurrent_fails_to_parse() {
        let yaml = "maxConcurrent: -1\n";
        assert!(serde_yaml::from_str::<SchedulerConfig>(yaml).is_err());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "maxConcurrent: 7\ntickIntervalMs: 250").unwrap();

        let config = SchedulerConfig::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.max_concurrent, 7);
        assert_eq!(config.tick_interval_ms, 250);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "maxConcurrent: 0").unwrap();

        assert!(SchedulerConfig::load(Some(&file.path().to_path_buf())).is_err());
    }
}

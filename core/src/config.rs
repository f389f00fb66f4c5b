use crate::plan::TariffPlan;
use serde::{Deserialize, Serialize};

/// One machine-readable rate sheet to pull for a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateFeedConfig {
    pub plan:        TariffPlan,
    pub resource_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub meter_id: String,
    #[serde(default = "default_consumption_hard_limit")]
    pub consumption_hard_limit_days: i64,
    #[serde(default = "default_tempo_hard_limit")]
    pub tempo_hard_limit_days: i64,
    #[serde(default = "default_consumption_window")]
    pub consumption_window_days: i64,
    #[serde(default = "default_tempo_window")]
    pub tempo_window_days: i64,
    #[serde(default = "default_refresh_hours")]
    pub rate_refresh_hours: i64,
    #[serde(default)]
    pub rate_feeds: Vec<RateFeedConfig>,
}

fn default_consumption_hard_limit() -> i64 { 730 }
fn default_tempo_hard_limit() -> i64 { 731 }
fn default_consumption_window() -> i64 { 7 }
fn default_tempo_window() -> i64 { 100 }
fn default_refresh_hours() -> i64 { 24 }

impl AppConfig {
    /// Load from a JSON file.
    /// In tests, use AppConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate().map_err(|e| anyhow::anyhow!("{path}: {e}"))?;
        Ok(config)
    }

    /// Feed sheets carry no day kind, so a feed for a plan whose rates
    /// depend on the day kind could never be matched.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.consumption_window_days <= 0 || self.tempo_window_days <= 0 {
            anyhow::bail!("window sizes must be positive");
        }
        if let Some(feed) = self.rate_feeds.iter().find(|f| f.plan.descriptor().has_day_kind_rule()) {
            anyhow::bail!(
                "rate feed '{}' targets {}, whose rates depend on the day kind",
                feed.resource_id,
                feed.plan
            );
        }
        Ok(())
    }

    /// Built-in defaults, independent of the filesystem.
    pub fn default_test() -> Self {
        Self {
            meter_id: "test-meter".into(),
            consumption_hard_limit_days: default_consumption_hard_limit(),
            tempo_hard_limit_days: default_tempo_hard_limit(),
            consumption_window_days: default_consumption_window(),
            tempo_window_days: default_tempo_window(),
            rate_refresh_hours: default_refresh_hours(),
            rate_feeds: vec![
                RateFeedConfig { plan: TariffPlan::Base, resource_id: "base-feed".into() },
                RateFeedConfig { plan: TariffPlan::Hphc, resource_id: "hphc-feed".into() },
            ],
        }
    }
}

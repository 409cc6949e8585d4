use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HeyTrackConfig {
    pub system: SystemSection,
    pub paths: PathsSection,
    #[serde(default)]
    pub hpp: HppSection,
    #[serde(default)]
    pub budget: BudgetSection,
    #[serde(default)]
    pub reorder: ReorderSection,
    #[serde(default)]
    pub automation: AutomationSection,
}

impl HeyTrackConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.base_dir).join(path)
        }
    }

    /// Full path of the SQLite database shared by every store.
    pub fn database_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.data_dir)
            .join(&self.paths.database)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemSection {
    pub business_name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub base_dir: String,
    pub data_dir: String,
    #[serde(default = "default_database")]
    pub database: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    #[default]
    List,
    WeightedAverage,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PricingTierSection {
    pub tier: String,
    pub margin: f64,
    pub increment: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HppSection {
    pub price_basis: PriceBasis,
    /// Fraction of material cost added as overhead.
    pub overhead_rate: f64,
    /// Fraction of material cost added as labor.
    pub labor_rate: f64,
    pub labor_hourly_rate: f64,
    pub change_alert_percent: f64,
    pub pricing_tiers: Vec<PricingTierSection>,
}

impl Default for HppSection {
    fn default() -> Self {
        Self {
            price_basis: PriceBasis::List,
            overhead_rate: 0.15,
            labor_rate: 0.0,
            labor_hourly_rate: 0.0,
            change_alert_percent: 10.0,
            pricing_tiers: vec![
                PricingTierSection {
                    tier: "economy".into(),
                    margin: 0.30,
                    increment: 500.0,
                },
                PricingTierSection {
                    tier: "standard".into(),
                    margin: 0.60,
                    increment: 500.0,
                },
                PricingTierSection {
                    tier: "premium".into(),
                    margin: 1.00,
                    increment: 1000.0,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BudgetSection {
    pub default_alert_threshold: f64,
    pub renewal_grace_days: i64,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self {
            default_alert_threshold: 0.8,
            renewal_grace_days: 7,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReorderSection {
    pub default_multiplier: f64,
    pub high_ratio: f64,
    pub medium_ratio: f64,
    pub default_delivery_days: i64,
}

impl Default for ReorderSection {
    fn default() -> Self {
        Self {
            default_multiplier: 2.0,
            high_ratio: 0.5,
            medium_ratio: 0.8,
            default_delivery_days: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutomationSection {
    pub interval_minutes: u64,
    pub reorder_enabled: bool,
    pub budget_renewal_enabled: bool,
    pub hpp_refresh_enabled: bool,
}

impl Default for AutomationSection {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            reorder_enabled: true,
            budget_renewal_enabled: true,
            hpp_refresh_enabled: true,
        }
    }
}

fn default_currency() -> String {
    "IDR".to_string()
}

fn default_database() -> String {
    "heytrack.sqlite".to_string()
}

pub fn load_heytrack_config<P: AsRef<Path>>(path: P) -> Result<HeyTrackConfig> {
    load_toml(path)
}

pub fn parse_heytrack_config(content: &str) -> std::result::Result<HeyTrackConfig, toml::de::Error> {
    toml::from_str(content)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_fixture_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs/heytrack.toml");
        let config = load_heytrack_config(path).expect("config should parse");
        assert_eq!(config.system.currency, "IDR");
        assert_eq!(config.hpp.pricing_tiers.len(), 3);
        assert!((config.hpp.overhead_rate - 0.15).abs() < f64::EPSILON);
        assert_eq!(config.reorder.default_delivery_days, 3);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = parse_heytrack_config(
            r#"
            [system]
            business_name = "Dapur Bu Sri"
            environment = "dev"

            [paths]
            base_dir = "/srv/heytrack"
            data_dir = "data"
            "#,
        )
        .expect("minimal config");
        assert_eq!(config.budget, BudgetSection::default());
        assert_eq!(config.hpp.price_basis, PriceBasis::List);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/heytrack/data/heytrack.sqlite")
        );
    }

    #[test]
    fn unreadable_path_reports_io_error() {
        let err = load_heytrack_config("/nonexistent/heytrack.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

use medsupply_catalog::PatientShareDefaults;
use medsupply_shared::Payer;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub pricing: PricingConfig,
    pub fixtures: FixturesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub max_attachment_bytes: usize,
}

/// Patient share percent applied to new fee schedules
#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    pub default_patient_share_percent: u32,
    #[serde(default)]
    pub medicare_patient_share_percent: Option<u32>,
    #[serde(default)]
    pub bcbs_patient_share_percent: Option<u32>,
    #[serde(default)]
    pub aetna_patient_share_percent: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FixturesConfig {
    pub seed: bool,
}

impl PricingConfig {
    pub fn share_defaults(&self) -> PatientShareDefaults {
        let per_payer: HashMap<Payer, u32> = [
            (Payer::Medicare, self.medicare_patient_share_percent),
            (Payer::Bcbs, self.bcbs_patient_share_percent),
            (Payer::Aetna, self.aetna_patient_share_percent),
        ]
        .into_iter()
        .filter_map(|(payer, pct)| pct.map(|p| (payer, p)))
        .collect();

        PatientShareDefaults {
            fallback_percent: self.default_patient_share_percent,
            per_payer,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Self::defaults()?
            .add_source(config::File::with_name("config/default").required(false))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `MEDSUPPLY_SERVER__PORT=8080`
            .add_source(config::Environment::with_prefix("MEDSUPPLY").separator("__"));

        builder.build()?.try_deserialize()
    }

    /// Built-in values so the service starts without any config file
    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let defaults = PatientShareDefaults::default();
        config::Config::builder()
            .set_default("server.port", 3000)?
            .set_default("session.max_attachment_bytes", 4 * 1024 * 1024)?
            .set_default("pricing.default_patient_share_percent", i64::from(defaults.fallback_percent))?
            .set_default("pricing.medicare_patient_share_percent", i64::from(defaults.percent_for(Payer::Medicare)))?
            .set_default("pricing.bcbs_patient_share_percent", i64::from(defaults.percent_for(Payer::Bcbs)))?
            .set_default("pricing.aetna_patient_share_percent", i64::from(defaults.percent_for(Payer::Aetna)))?
            .set_default("fixtures.seed", true)
    }
}

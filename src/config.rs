use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::mapping::{field_key, Taxonomy};

pub const DEFAULT_STAGE_ALIASES: [&str; 4] = ["stage", "stages", "stato", "status"];

pub const DEFAULT_CATEGORIES: [&str; 12] = [
    "No Show Demo",
    "Trattative",
    "Dead Lead",
    "Setting",
    "Demo Set",
    "Non Qualificato",
    "New Lead",
    "Fuori Target",
    "No Show Diagnosi",
    "Won",
    "Lost",
    "Diagnosi Set",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub onboarding: OnboardingConfig,
    pub webhooks: WebhookConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OnboardingConfig {
    pub stage_aliases: Vec<String>,
    pub categories: Vec<String>,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            stage_aliases: DEFAULT_STAGE_ALIASES.iter().map(|s| s.to_string()).collect(),
            categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl OnboardingConfig {
    pub fn taxonomy(&self) -> Taxonomy {
        Taxonomy::new(self.categories.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub submit_url: Option<String>,
    pub clients_list_url: Option<String>,
    pub live_stats_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            submit_url: None,
            clients_list_url: None,
            live_stats_url: None,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Reads the optional TOML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_toml(&raw)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(raw)?;
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(url) = non_empty("CLIENT_OPS_SUBMIT_URL") {
            self.webhooks.submit_url = Some(url);
        }
        if let Some(url) = non_empty("CLIENT_OPS_CLIENTS_URL") {
            self.webhooks.clients_list_url = Some(url);
        }
        if let Some(url) = non_empty("CLIENT_OPS_STATS_URL") {
            self.webhooks.live_stats_url = Some(url);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.onboarding.stage_aliases.iter().all(|a| a.trim().is_empty()) {
            bail!("onboarding.stage_aliases must name at least one header");
        }
        if self.onboarding.categories.is_empty() {
            bail!("onboarding.categories must not be empty");
        }

        let mut keys = HashSet::new();
        for category in &self.onboarding.categories {
            if category.trim().is_empty() {
                bail!("onboarding.categories contains a blank label");
            }
            if !keys.insert(field_key(category)) {
                bail!("category \"{category}\" collides with another category's field name");
            }
        }
        Ok(())
    }

    pub fn submit_url(&self) -> anyhow::Result<&str> {
        self.webhooks
            .submit_url
            .as_deref()
            .context("no submit webhook configured: set webhooks.submit_url or CLIENT_OPS_SUBMIT_URL")
    }
}

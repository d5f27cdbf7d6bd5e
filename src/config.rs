use std::path::Path;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

use crate::alerts::notifier::SendFailurePolicy;
use crate::extract::ScorePick;
use crate::feed::models::Category;
use crate::rules::RuleConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub source: SourceConfig,
    pub categories: Vec<CategoryTarget>,
    pub extraction: ExtractionConfig,
    pub rules: RulesConfig,
    pub alerts: AlertsConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub poll_interval_seconds: u64,
    pub start_watching: bool,
    pub restrict_to_chat: bool,
    pub update_timeout_seconds: u64,
    pub telegram_base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Direct,
    Rendered,
    Dataset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub request_timeout_seconds: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub render_base_url: String,
    pub wait_selector: String,
    pub wait_timeout_ms: u64,
    pub dataset_base_url: String,
}

/// A tracked prediction page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryTarget {
    pub category: Category,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub row_selector: String,
    pub fallback_selector: String,
    pub score_pick: ScorePick,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    pub over25: RuleConfig,
    pub btts: RuleConfig,
}

impl RulesConfig {
    pub fn for_category(&self, category: Category) -> &RuleConfig {
        match category {
            Category::Over25 => &self.over25,
            Category::Btts => &self.btts,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    pub on_send_failure: SendFailurePolicy,
    pub messages_per_second: u32,
    pub burst_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub json_logs: bool,
    pub health_bind: String,
    pub health_port: u16,
}

impl MonitoringConfig {
    /// Bind address for the liveness server. `PORT` wins over the file,
    /// since hosting platforms inject it.
    pub fn health_addr(&self, port_override: Option<&str>) -> String {
        let port = port_override
            .and_then(|p| p.trim().parse::<u16>().ok())
            .unwrap_or(self.health_port);
        format!("{}:{port}", self.health_bind)
    }
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub bot_token: SecretString,
    pub chat_id: String,
    pub render_token: Option<SecretString>,
    pub dataset_token: Option<SecretString>,
    pub dataset_id: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("chat_id", &self.chat_id)
            .field("dataset_id", &self.dataset_id)
            .finish_non_exhaustive()
    }
}

impl Secrets {
    pub fn from_env(kind: SourceKind) -> Result<Self> {
        Self::from_lookup(kind, |name| std::env::var(name).ok())
    }

    /// Resolve secrets through `lookup`. Variables the selected source kind
    /// needs are required; a missing one is a startup error.
    pub fn from_lookup<F>(kind: SourceKind, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| {
            get(name).with_context(|| format!("Missing required environment variable {name}"))
        };

        let bot_token = SecretString::from(require("BOT_TOKEN")?);
        let chat_id = require("CHAT_ID")?;

        let render_token = match kind {
            SourceKind::Rendered => Some(SecretString::from(require("RENDER_TOKEN")?)),
            _ => get("RENDER_TOKEN").map(SecretString::from),
        };

        let (dataset_token, dataset_id) = match kind {
            SourceKind::Dataset => (
                Some(SecretString::from(require("DATASET_TOKEN")?)),
                Some(require("DATASET_ID")?),
            ),
            _ => (get("DATASET_TOKEN").map(SecretString::from), get("DATASET_ID")),
        };

        Ok(Self {
            bot_token,
            chat_id,
            render_token,
            dataset_token,
            dataset_id,
        })
    }
}

impl AppConfig {
    /// Load configuration from `path`, overlaying environment variables for secrets.
    pub fn load(path: &Path) -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let secrets = Secrets::from_env(config.source.kind)?;
        config.check_chat_id(&secrets)?;

        Ok((config, secrets))
    }

    /// Commands are matched against the numeric chat id Telegram reports,
    /// so a restricted bot cannot use an `@channel` style `CHAT_ID`.
    pub fn check_chat_id(&self, secrets: &Secrets) -> Result<()> {
        if self.bot.restrict_to_chat && secrets.chat_id.trim().parse::<i64>().is_err() {
            anyhow::bail!(
                "CHAT_ID must be a numeric chat id when bot.restrict_to_chat is set, got '{}'",
                secrets.chat_id
            );
        }
        Ok(())
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        if config.categories.is_empty() {
            anyhow::bail!("At least one [[categories]] entry is required");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::MinuteBound;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn default_config() -> AppConfig {
        let contents = std::fs::read_to_string("config/default.toml")
            .expect("config/default.toml should exist");
        AppConfig::from_toml(&contents).expect("should parse")
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_default_config() {
        let config = default_config();
        assert_eq!(config.bot.poll_interval_seconds, 60);
        assert!(!config.bot.start_watching);
        assert_eq!(config.source.kind, SourceKind::Direct);
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[0].category, Category::Over25);
        assert_eq!(config.categories[1].category, Category::Btts);
        assert_eq!(config.extraction.score_pick, ScorePick::First);
        assert_eq!(config.alerts.on_send_failure, SendFailurePolicy::KeepKey);
        assert_eq!(config.monitoring.health_port, 10000);
    }

    #[test]
    fn test_default_rules() {
        let config = default_config();
        let over = config.rules.for_category(Category::Over25);
        assert_eq!(over.min_probability, 60);
        assert_eq!(over.minute_bound, MinuteBound::Exclusive(30));
        assert_eq!(over.allowed_scores.len(), 3);

        let btts = config.rules.for_category(Category::Btts);
        assert_eq!(btts.minute_bound, MinuteBound::Inclusive(30));
        assert!(btts.allowed_scores.contains("0-0"));
    }

    #[test]
    fn test_empty_categories_rejected() {
        let contents = std::fs::read_to_string("config/default.toml").unwrap();
        let stripped: String = contents
            .split("[[categories]]")
            .enumerate()
            .map(|(i, part)| {
                if i == 0 {
                    part.to_string()
                } else {
                    // drop the blank remainder and the two key lines of the table
                    part.lines().skip(3).collect::<Vec<_>>().join("\n")
                }
            })
            .collect();
        let err = AppConfig::from_toml(&format!("categories = []\n{stripped}")).unwrap_err();
        assert!(err.to_string().contains("categories"));
    }

    #[test]
    fn test_health_addr_port_override() {
        let config = default_config();
        assert_eq!(config.monitoring.health_addr(None), "0.0.0.0:10000");
        assert_eq!(config.monitoring.health_addr(Some("8080")), "0.0.0.0:8080");
        assert_eq!(config.monitoring.health_addr(Some("nope")), "0.0.0.0:10000");
    }

    #[test]
    fn test_secrets_required_for_direct() {
        let secrets = Secrets::from_lookup(
            SourceKind::Direct,
            lookup_from(&[("BOT_TOKEN", "123:abc"), ("CHAT_ID", "42")]),
        )
        .unwrap();
        assert_eq!(secrets.bot_token.expose_secret(), "123:abc");
        assert_eq!(secrets.chat_id, "42");
        assert!(secrets.render_token.is_none());
    }

    #[test]
    fn test_missing_bot_token_is_fatal() {
        let err = Secrets::from_lookup(SourceKind::Direct, lookup_from(&[("CHAT_ID", "42")]))
            .unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn test_blank_variable_counts_as_missing() {
        let err = Secrets::from_lookup(
            SourceKind::Direct,
            lookup_from(&[("BOT_TOKEN", "123:abc"), ("CHAT_ID", "  ")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("CHAT_ID"));
    }

    #[test]
    fn test_rendered_requires_token() {
        let base = [("BOT_TOKEN", "123:abc"), ("CHAT_ID", "42")];
        assert!(Secrets::from_lookup(SourceKind::Rendered, lookup_from(&base)).is_err());

        let with_token = [base[0], base[1], ("RENDER_TOKEN", "rt")];
        let secrets = Secrets::from_lookup(SourceKind::Rendered, lookup_from(&with_token)).unwrap();
        assert_eq!(secrets.render_token.unwrap().expose_secret(), "rt");
    }

    #[test]
    fn test_dataset_requires_token_and_id() {
        let partial = [("BOT_TOKEN", "t"), ("CHAT_ID", "1"), ("DATASET_TOKEN", "dt")];
        let err = Secrets::from_lookup(SourceKind::Dataset, lookup_from(&partial)).unwrap_err();
        assert!(err.to_string().contains("DATASET_ID"));
    }

    #[test]
    fn test_channel_name_chat_id_rejected_when_restricted() {
        let mut config = default_config();
        assert!(config.bot.restrict_to_chat);

        let secrets = Secrets::from_lookup(
            SourceKind::Direct,
            lookup_from(&[("BOT_TOKEN", "123:abc"), ("CHAT_ID", "@forebet_live")]),
        )
        .unwrap();
        let err = config.check_chat_id(&secrets).unwrap_err();
        assert!(err.to_string().contains("CHAT_ID"));

        config.bot.restrict_to_chat = false;
        assert!(config.check_chat_id(&secrets).is_ok());
    }

    #[test]
    fn test_numeric_chat_id_accepted() {
        let secrets = Secrets::from_lookup(
            SourceKind::Direct,
            lookup_from(&[("BOT_TOKEN", "123:abc"), ("CHAT_ID", "-1001234567890")]),
        )
        .unwrap();
        assert!(default_config().check_chat_id(&secrets).is_ok());
    }
}

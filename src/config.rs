use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::YearRange;

pub const EXCHANGE_RATE_API_KEY_ENV: &str = "EXCHANGE_RATE_API_KEY";

/// Written by `setup`; parses to the built-in defaults.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"---
server:
  host: "0.0.0.0"
  port: 3000

providers:
  world_bank:
    base_url: "https://api.worldbank.org"
  oecd:
    base_url: "https://sdmx.oecd.org/public/rest"
  exchange_rate:
    base_url: "https://v6.exchangerate-api.com/v6"
    # Required for usdValue: without a key every conversion is skipped.
    # Set it here or through EXCHANGE_RATE_API_KEY.
    api_key: null

indicators:
  - name: population
    code: SP.POP.TOTL
  - name: gdp
    code: NY.GDP.MKTP.CD
  - name: inflation
    code: NY.GDP.DEFL.KD.ZG
  # - name: gdpGrowth
  #   code: NY.GDP.MKTP.KD.ZG
  # - name: populationGrowth
  #   code: SP.POP.GROW
  # - name: populationDensity
  #   code: EN.POP.DNST
  # - name: surfaceArea
  #   code: AG.SRF.TOTL.K2
  # - name: netMigration
  #   code: SM.POP.NETM
  # - name: lifeExpectancy
  #   code: SP.DYN.LE00.IN
  # - name: fertilityRate
  #   code: SP.DYN.TFRT.IN
  # - name: militaryExpenditure
  #   code: MS.MIL.XPND.GD.ZS
  # - name: timeToStartBusiness
  #   code: IC.REG.DURS

start_year: 2017
target_currency: "USD"
"#;

/// A named statistics series and its provider code.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndicatorSpec {
    pub name: String,
    pub code: String,
}

impl IndicatorSpec {
    pub fn new(name: &str, code: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
        }
    }
}

pub fn default_indicators() -> Vec<IndicatorSpec> {
    vec![
        IndicatorSpec::new("population", "SP.POP.TOTL"),
        IndicatorSpec::new("gdp", "NY.GDP.MKTP.CD"),
        IndicatorSpec::new("inflation", "NY.GDP.DEFL.KD.ZG"),
    ]
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorldBankProviderConfig {
    pub base_url: String,
}

impl Default for WorldBankProviderConfig {
    fn default() -> Self {
        WorldBankProviderConfig {
            base_url: "https://api.worldbank.org".to_string(),
        }
    }
}

/// One SDMX dataflow query: `{flow}/{country}.{key}`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DatasetConfig {
    pub flow: String,
    pub key: String,
    pub start_period: i32,
    pub end_period: Option<i32>,
}

impl DatasetConfig {
    pub fn years(&self) -> YearRange {
        match self.end_period {
            Some(end) => YearRange::new(self.start_period, end),
            None => YearRange::through_last_year(self.start_period),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OecdProviderConfig {
    pub base_url: String,
    #[serde(default = "OecdProviderConfig::default_disposable_income")]
    pub disposable_income: DatasetConfig,
    #[serde(default = "OecdProviderConfig::default_household")]
    pub household: DatasetConfig,
}

impl OecdProviderConfig {
    fn default_disposable_income() -> DatasetConfig {
        DatasetConfig {
            flow: "OECD.WISE.INE,DSD_WISE_IDD@DF_IDD,1.0".to_string(),
            key: "A.INC_DISP.MEDIAN.XDC_HH_EQ._T.METH2012.D_CUR._Z".to_string(),
            start_period: 2011,
            end_period: Some(2023),
        }
    }

    fn default_household() -> DatasetConfig {
        DatasetConfig {
            flow: "OECD.SDD.NAD,DSD_HHDASH@DF_HHDASH,1.0".to_string(),
            key: "A..".to_string(),
            start_period: 2015,
            end_period: None,
        }
    }
}

impl Default for OecdProviderConfig {
    fn default() -> Self {
        OecdProviderConfig {
            base_url: "https://sdmx.oecd.org/public/rest".to_string(),
            disposable_income: Self::default_disposable_income(),
            household: Self::default_household(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ExchangeRateProviderConfig {
    /// True when no key is set for the hosted service, which rejects unkeyed requests.
    pub fn missing_required_key(&self) -> bool {
        self.api_key.is_none() && self.base_url.trim_end_matches('/') == Self::default().base_url
    }
}

impl Default for ExchangeRateProviderConfig {
    fn default() -> Self {
        ExchangeRateProviderConfig {
            base_url: "https://v6.exchangerate-api.com/v6".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub world_bank: WorldBankProviderConfig,
    #[serde(default)]
    pub oecd: OecdProviderConfig,
    #[serde(default)]
    pub exchange_rate: ExchangeRateProviderConfig,
}

fn default_start_year() -> i32 {
    2017
}

fn default_target_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_indicators")]
    pub indicators: Vec<IndicatorSpec>,
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    #[serde(default = "default_target_currency")]
    pub target_currency: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            providers: ProvidersConfig::default(),
            indicators: default_indicators(),
            start_year: default_start_year(),
            target_currency: default_target_currency(),
        }
    }
}

impl AppConfig {
    /// Loads the default config file, falling back to built-in defaults
    /// when it does not exist.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default().with_env_overrides());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "econmap", "econmap")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var(EXCHANGE_RATE_API_KEY_ENV)
            && !key.trim().is_empty()
        {
            debug!("Using exchange rate API key from {}", EXCHANGE_RATE_API_KEY_ENV);
            self.providers.exchange_rate.api_key = Some(key);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
server:
  host: "127.0.0.1"
  port: 8080
indicators:
  - name: population
    code: SP.POP.TOTL
  - name: lifeExpectancy
    code: SP.DYN.LE00.IN
start_year: 2015
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.indicators.len(), 2);
        assert_eq!(
            config.indicators[1],
            IndicatorSpec::new("lifeExpectancy", "SP.DYN.LE00.IN")
        );
        assert_eq!(config.start_year, 2015);
        assert_eq!(config.target_currency, "USD");
        assert_eq!(
            config.providers.world_bank.base_url,
            "https://api.worldbank.org"
        );
        assert_eq!(
            config.providers.oecd.disposable_income.flow,
            "OECD.WISE.INE,DSD_WISE_IDD@DF_IDD,1.0"
        );
        assert!(config.providers.exchange_rate.api_key.is_none());

        let yaml_str_with_providers = r#"
providers:
  world_bank:
    base_url: "http://example.com/wb"
  oecd:
    base_url: "http://example.com/oecd"
    household:
      flow: "HH"
      key: "A.B"
      start_period: 2019
  exchange_rate:
    base_url: "http://example.com/fx"
    api_key: "secret"
target_currency: "EUR"
        "#;
        let config_with_providers: AppConfig =
            serde_yaml::from_str(yaml_str_with_providers).unwrap();
        assert_eq!(
            config_with_providers.providers.world_bank.base_url,
            "http://example.com/wb"
        );
        let oecd = &config_with_providers.providers.oecd;
        assert_eq!(oecd.base_url, "http://example.com/oecd");
        assert_eq!(oecd.household.flow, "HH");
        assert!(oecd.household.end_period.is_none());
        assert_eq!(oecd.disposable_income.start_period, 2011);
        assert_eq!(
            config_with_providers.providers.exchange_rate.api_key.as_deref(),
            Some("secret")
        );
        assert_eq!(config_with_providers.target_currency, "EUR");
        assert_eq!(config_with_providers.indicators, default_indicators());
    }

    #[test]
    fn test_dataset_years() {
        let fixed = DatasetConfig {
            flow: "F".into(),
            key: "K".into(),
            start_period: 2011,
            end_period: Some(2023),
        };
        assert_eq!(fixed.years(), YearRange::new(2011, 2023));

        let open = DatasetConfig {
            end_period: None,
            ..fixed
        };
        assert_eq!(open.years(), YearRange::through_last_year(2011));
    }

    #[test]
    fn test_default_template_matches_defaults() {
        let config: AppConfig = serde_yaml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.server.bind_addr(), defaults.server.bind_addr());
        assert_eq!(config.indicators, defaults.indicators);
        assert_eq!(
            config.providers.oecd.household,
            defaults.providers.oecd.household
        );
        assert!(config.providers.exchange_rate.api_key.is_none());
        assert!(DEFAULT_CONFIG_TEMPLATE.contains("Required for usdValue"));
    }

    #[test]
    fn test_missing_required_key() {
        let mut exchange_rate = ExchangeRateProviderConfig::default();
        assert!(exchange_rate.missing_required_key());

        exchange_rate.api_key = Some("secret".into());
        assert!(!exchange_rate.missing_required_key());

        let local = ExchangeRateProviderConfig {
            base_url: "http://127.0.0.1:9000".into(),
            api_key: None,
        };
        assert!(!local.missing_required_key());
    }

    #[test]
    fn test_load_from_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "start_year: 2018\n").unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.start_year, 2018);
        assert_eq!(config.server.port, 3000);
    }
}

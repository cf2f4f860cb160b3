// Licensed under the Apache-2.0 license

use anyhow::{anyhow, bail, Context, Result};
use fb_config::{
    AccessClass, BootAccessConfig, BootBusWidth, BootPartition, StaticRegion, StaticRegionTable,
};
use fb_mmc::AliasMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Host-side provisioning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionConfig {
    /// Block size of the static region table
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    /// Requested name -> partition table name
    #[serde(default)]
    pub aliases: AliasConfig,
    /// Regions that exist without an on-device partition table
    #[serde(default)]
    pub static_regions: Vec<RegionConfig>,
    #[serde(default)]
    pub boot_access: BootAccessSettings,
}

fn default_block_size() -> u32 {
    fb_config::flash::DEFAULT_BLOCK_SIZE
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasConfig(pub BTreeMap<String, String>);

impl AliasMap for AliasConfig {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionClass {
    #[default]
    Normal,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub start_block: u64,
    pub block_count: u64,
    #[serde(default)]
    pub class: RegionClass,
}

/// Boot partition access tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootAccessSettings {
    /// 1 or 2
    pub boot_partition: u8,
    pub boot_ack: bool,
    /// Data lines: 1, 4 or 8
    pub open_bus_width: u8,
    pub close_bus_width: u8,
    pub settle_delay_us: u32,
    pub status_poll_limit: u32,
    pub status_poll_interval_us: u32,
}

impl Default for BootAccessSettings {
    fn default() -> Self {
        let config = BootAccessConfig::default();
        Self {
            boot_partition: config.boot_partition as u8,
            boot_ack: config.boot_ack,
            open_bus_width: lines(config.open_bus_width),
            close_bus_width: lines(config.close_bus_width),
            settle_delay_us: config.settle_delay_us,
            status_poll_limit: config.status_poll_limit,
            status_poll_interval_us: config.status_poll_interval_us,
        }
    }
}

fn lines(width: BootBusWidth) -> u8 {
    match width {
        BootBusWidth::X1 => 1,
        BootBusWidth::X4 => 4,
        BootBusWidth::X8 => 8,
    }
}

fn bus_width(lines: u8) -> Result<BootBusWidth> {
    match lines {
        1 => Ok(BootBusWidth::X1),
        4 => Ok(BootBusWidth::X4),
        8 => Ok(BootBusWidth::X8),
        other => bail!("unsupported boot bus width: {}", other),
    }
}

impl BootAccessSettings {
    pub fn to_config(&self) -> Result<BootAccessConfig> {
        let boot_partition = match self.boot_partition {
            1 => BootPartition::Boot1,
            2 => BootPartition::Boot2,
            other => bail!("unsupported boot partition: {}", other),
        };
        Ok(BootAccessConfig {
            boot_partition,
            boot_ack: self.boot_ack,
            open_bus_width: bus_width(self.open_bus_width).context("open_bus_width")?,
            close_bus_width: bus_width(self.close_bus_width).context("close_bus_width")?,
            settle_delay_us: self.settle_delay_us,
            status_poll_limit: self.status_poll_limit,
            status_poll_interval_us: self.status_poll_interval_us,
        })
    }
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            aliases: AliasConfig::default(),
            static_regions: Vec::new(),
            boot_access: BootAccessSettings::default(),
        }
    }
}

impl ProvisionConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ProvisionConfig =
            toml::from_str(contents).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        std::fs::write(path.as_ref(), contents)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Static regions borrowed from this configuration, in file order.
    pub fn region_list(&self) -> Vec<StaticRegion<'_>> {
        self.static_regions
            .iter()
            .map(|region| StaticRegion {
                name: &region.name,
                start_block: region.start_block,
                block_count: region.block_count,
                access_class: match region.class {
                    RegionClass::Normal => AccessClass::Normal,
                    RegionClass::Protected => AccessClass::Protected,
                },
            })
            .collect()
    }

    pub fn boot_access_config(&self) -> Result<BootAccessConfig> {
        self.boot_access
            .to_config()
            .with_context(|| "Invalid boot_access configuration")
    }

    pub fn validate(&self) -> Result<()> {
        let regions = self.region_list();
        StaticRegionTable::new(&regions, self.block_size)
            .map_err(|err| anyhow!("Invalid static_regions: {}", err))?;

        for (name, target) in &self.aliases.0 {
            if target.is_empty() || target == name {
                bail!("Invalid alias '{}' -> '{}'", name, target);
            }
        }

        self.boot_access_config()?;
        Ok(())
    }
}

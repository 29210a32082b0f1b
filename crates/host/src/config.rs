// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

/// Virtual device controller host.
#[derive(Debug, Parser)]
#[command(name = "vdchost", version, about)]
pub struct Config {
    /// TCP port of the north-bound vDC API.
    #[arg(long, env = "VDC_PORT", default_value = "8440")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "VDC_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Directory for persistent data.
    #[arg(long, env = "VDC_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Directory with device icon resources.
    #[arg(long, env = "VDC_ICON_DIR", default_value = ".")]
    pub icon_dir: PathBuf,

    /// Script to run once after the population is collected.
    #[arg(long, env = "VDC_INIT_SCRIPT")]
    pub init_script: Option<PathBuf>,

    /// Instance name of this host.
    #[arg(long, env = "VDC_NAME", default_value = "vdchost")]
    pub name: String,

    /// Externally assigned host dSUID (34 hex chars). Derived from the
    /// instance name when not given; a stored identity wins over both.
    #[arg(long, env = "VDC_DSUID")]
    pub dsuid: Option<String>,

    /// Instance number for identity derivation when several hosts run on
    /// one machine.
    #[arg(long, env = "VDC_INSTANCE", default_value = "0")]
    pub instance: u32,

    /// Number of simulated demo lights.
    #[arg(long, env = "VDC_DEMO_LIGHTS", default_value = "2")]
    pub demo_lights: usize,

    /// Number of simulated demo shades.
    #[arg(long, env = "VDC_DEMO_SHADES", default_value = "1")]
    pub demo_shades: usize,

    /// Number of simulated demo buttons.
    #[arg(long, env = "VDC_DEMO_BUTTONS", default_value = "1")]
    pub demo_buttons: usize,

    /// Interval between periodic store flushes, in seconds.
    #[arg(long, env = "VDC_FLUSH_INTERVAL", default_value = "30")]
    pub flush_interval: u64,
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must not be 0".to_owned());
        }
        if let Some(dsuid) = &self.dsuid {
            dsuid
                .parse::<vdcapi::DsUid>()
                .map_err(|e| format!("invalid --dsuid: {e}"))?;
        }
        if self.flush_interval == 0 {
            return Err("flush interval must not be 0".to_owned());
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Config;

    #[test]
    fn defaults_validate() {
        let config = Config::parse_from(["vdchost"]);
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr(), "0.0.0.0:8440");
    }

    #[yare::parameterized(
        zero_port = { &["vdchost", "--port", "0"] },
        bad_dsuid = { &["vdchost", "--dsuid", "xyz"] },
        zero_flush = { &["vdchost", "--flush-interval", "0"] },
    )]
    fn invalid_configs_rejected(args: &[&str]) {
        let config = Config::parse_from(args);
        assert!(config.validate().is_err());
    }
}

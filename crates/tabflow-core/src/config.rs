//! Runtime configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Number of dispatcher worker threads shared by every transport.
    pub concurrency: usize,

    /// Messages one drain task may process before yielding its worker.
    pub throughput: usize,

    /// Prefix for worker thread names (`<prefix>-<n>`).
    pub worker_name_prefix: String,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            throughput: 64,
            worker_name_prefix: "tabflow-worker".to_string(),
        }
    }
}

impl ExecConfig {
    /// Defaults overridden by `TABFLOW_*` environment variables.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("TABFLOW_CONCURRENCY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.concurrency = v;
            }
        }

        if let Ok(s) = std::env::var("TABFLOW_THROUGHPUT") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.throughput = v;
            }
        }

        if let Ok(s) = std::env::var("TABFLOW_WORKER_NAME_PREFIX") {
            if !s.is_empty() {
                cfg.worker_name_prefix = s;
            }
        }

        cfg
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }
        if self.throughput == 0 {
            return Err(Error::Config("throughput must be at least 1".into()));
        }
        Ok(())
    }
}

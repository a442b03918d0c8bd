//! Named-filter libraries.
//!
//! A library is a YAML file mapping names to filter sources, so frequently
//! used filters can be shared and referenced by name:
//!
//! ```yaml
//! filters:
//!   fifty-takers: "num_of_sat_test_takers = 50"
//!   writing-band: "{ sat_writing_avg_score >= 300, sat_writing_avg_score < 350 }"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::filter::Filter;

#[derive(Debug, Deserialize, Serialize)]
pub struct FiltersConfig {
    pub filters: HashMap<String, String>,
}

impl FiltersConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Look up a named filter and compile it.
    pub fn compile(&self, name: &str) -> anyhow::Result<Filter> {
        let source = self.filters.get(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Config: No filter named `{name}` in the library (available: {})",
                self.names().join(", ")
            )
        })?;
        Filter::parse(source)
            .map_err(|err| anyhow::anyhow!("Config: Filter `{name}` does not compile: {err}"))
    }

    /// Library entries in name order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

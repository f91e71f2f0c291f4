//! Report options.
//!
//! Options come from three layers, each overriding the one before: the
//! built-in defaults, an optional TOML file, and command-line flags.

use anyhow::{Context, Result};
use serde::Deserialize;

use std::{fs, path::Path};

use crate::groups::{Groups, ProductGroup};

/// Options controlling the layout and content of the generated report.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Currency symbol used in number formats and the findings text.
    pub currency: String,
    /// How many products appear on the top-products sheet.
    pub top_products: usize,
    /// How many categories are charted on the category-trends sheet.
    pub top_categories: usize,
    /// Manager whose row is highlighted on the manager sheet.
    pub highlight_manager: Option<String>,
    /// Product groups, each `GROUP_NAME | GROUP_REGEX`.
    pub groups: Vec<ProductGroup>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            currency: "₦".to_string(),
            top_products: 10,
            top_categories: 6,
            highlight_manager: None,
            groups: Vec::new(),
        }
    }
}

impl Config {
    /// Reads options from the TOML file at `path`. Missing keys keep their
    /// default values.
    ///
    /// # Errors
    ///
    /// Returns errors if the file cannot be read or is not valid config TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("{}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("{}", path.display()))?;
        Ok(config)
    }

    /// Adds the groups from a group file after any already configured.
    ///
    /// # Errors
    ///
    /// Returns any errors from [`Groups::from_file`].
    pub fn read_groups(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let groups = Groups::from_file(path)?;
        self.groups.extend(groups);
        Ok(())
    }

    /// Adds a single product group.
    pub fn add_group(&mut self, group: ProductGroup) {
        self.groups.push(group);
    }

    #[must_use]
    pub fn product_groups(&self) -> Groups {
        Groups::from(self.groups.clone())
    }
}

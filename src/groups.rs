use anyhow::{bail, Context};
use regex::Regex;
use serde_with::DeserializeFromStr;

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};

/// A named product group, matched against product names by regular expression.
///
/// Written as `GROUP_NAME | GROUP_REGEX`, both in group files and in the
/// `groups` list of a config file.
#[derive(Clone, Debug, DeserializeFromStr)]
pub struct ProductGroup {
    name: String,
    regex: Regex,
}

impl ProductGroup {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for ProductGroup {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let Some((name, regex_str)) = line.split_once(" | ") else {
            bail!("bad group format (missing |): {line}");
        };
        Ok(Self {
            name: name.trim().to_string(),
            regex: Regex::new(regex_str.trim())
                .with_context(|| format!("bad regex for group {:?}", name.trim()))?,
        })
    }
}

/// An ordered list of product groups. The first matching group wins.
#[derive(Clone, Debug, Default)]
pub struct Groups(Vec<ProductGroup>);

impl Groups {
    /// Reads product groups from `path`, one `GROUP_NAME | GROUP_REGEX` per
    /// line. Blank lines and lines starting with `#` are ignored.
    ///
    /// # Errors
    ///
    /// Returns errors if the file cannot be read, if a line has no ` | `
    /// separator, or if a regex is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut groups = Self::default();
        let file = BufReader::new(
            File::open(&path).with_context(|| format!("{}", path.as_ref().display()))?,
        );
        for (n, line) in file.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let group = line
                .parse()
                .with_context(|| format!("reading {:?}, line {}", path.as_ref(), n + 1))?;
            groups.push(group);
        }
        Ok(groups)
    }

    pub fn push(&mut self, group: ProductGroup) {
        self.0.push(group);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the name of the first group whose regex matches `product`.
    #[must_use]
    pub fn product_group(&self, product: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|g| g.regex.is_match(product))
            .map(ProductGroup::name)
    }
}

impl From<Vec<ProductGroup>> for Groups {
    fn from(groups: Vec<ProductGroup>) -> Self {
        Self(groups)
    }
}

impl IntoIterator for Groups {
    type Item = ProductGroup;
    type IntoIter = std::vec::IntoIter<ProductGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_file_fn_correctly_parses_groups_file() {
        let groups = Groups::from_file("testdata/groups").unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(
            groups.product_group("Apple Smart Phone, Full Size"),
            Some("Phones")
        );
        assert_eq!(
            groups.product_group("Samsung Galaxy Mega 6.3"),
            Some("Phones")
        );
        assert_eq!(
            groups.product_group("Hon Deluxe Fabric Upholstered Stacking Chairs, Rounded Back"),
            Some("Chairs")
        );
        assert_eq!(groups.product_group("Staples"), None);
    }

    #[test]
    fn from_file_fn_returns_error_for_bad_line_format() {
        let err = Groups::from_file("testdata/groups.bad").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"), "{err:#}");
    }

    #[test]
    fn from_str_fn_rejects_invalid_regex() {
        assert!("Broken | (unclosed".parse::<ProductGroup>().is_err());
    }

    #[test]
    fn product_group_fn_prefers_first_match() {
        let groups = Groups::from(vec![
            "First | foo".parse().unwrap(),
            "Second | foo bar".parse().unwrap(),
        ]);
        assert_eq!(groups.product_group("foo bar"), Some("First"));
    }
}

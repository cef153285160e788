//! Plugin-specific properties

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use crate::application::errors::ConfigError;

/// Read access to the `plugins.properties` map
#[derive(Debug, Clone, Default)]
pub struct PropertyReader {
    props: HashMap<String, String>,
}

impl PropertyReader {
    pub fn new(props: HashMap<String, String>) -> Self {
        Self { props }
    }

    pub fn read(&self, key: &str) -> Result<String, ConfigError> {
        self.read_optional(key)
            .ok_or_else(|| ConfigError::MissingField(key.to_string()))
    }

    pub fn read_optional(&self, key: &str) -> Option<String> {
        self.props
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn read_as<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.read(key)?;
        raw.parse()
            .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", key, e)))
    }

    /// Comma separated values; missing key gives an empty set
    pub fn read_as_set(&self, key: &str) -> BTreeSet<String> {
        self.read_optional(key)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> PropertyReader {
        PropertyReader::new(HashMap::from([
            ("gd.host".to_string(), " example.org ".to_string()),
            ("gd.timeout".to_string(), "30".to_string()),
            ("gd.blank".to_string(), "  ".to_string()),
            ("gd.ids".to_string(), "1, 2,,3".to_string()),
        ]))
    }

    #[test]
    fn test_read() {
        let props = reader();
        assert_eq!(props.read("gd.host").unwrap(), "example.org");
        assert!(matches!(props.read("gd.blank"), Err(ConfigError::MissingField(_))));
        assert!(props.read_optional("nope").is_none());
    }

    #[test]
    fn test_read_as() {
        let props = reader();
        assert_eq!(props.read_as::<u64>("gd.timeout").unwrap(), 30);
        assert!(matches!(props.read_as::<u64>("gd.host"), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_read_as_set() {
        let ids = reader().read_as_set("gd.ids");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec!["1", "2", "3"]);
        assert!(reader().read_as_set("missing").is_empty());
    }
}

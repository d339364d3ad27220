//! Core types for the notification-stream crate.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Kind of notifications a stream carries.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamCategory {
    /// Configuration-datastore change notifications
    Configuration,
    /// Operational-state notifications
    Operational,
    /// Device notifications
    Device,
}

impl StreamCategory {
    /// Every category, in teardown order.
    pub const ALL: [StreamCategory; 3] = [
        StreamCategory::Configuration,
        StreamCategory::Operational,
        StreamCategory::Device,
    ];

    /// Wire name used in composite keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamCategory::Configuration => "CONFIGURATION",
            StreamCategory::Operational => "OPERATIONAL",
            StreamCategory::Device => "DEVICE",
        }
    }
}

impl fmt::Display for StreamCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown stream category: {0}")]
pub struct ParseCategoryError(pub String);

impl FromStr for StreamCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CONFIGURATION" => Ok(StreamCategory::Configuration),
            "OPERATIONAL" => Ok(StreamCategory::Operational),
            "DEVICE" => Ok(StreamCategory::Device),
            _ => Err(ParseCategoryError(s.to_string())),
        }
    }
}

/// Identity of a remote controller, supplied by the caller.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize)]
pub struct RegisteredController {
    pub name: String,
    pub release: String,
}

impl RegisteredController {
    pub fn new(name: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            release: release.into(),
        }
    }
}

impl fmt::Display for RegisteredController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.release)
    }
}

/// Composite key identifying one logical stream slot.
///
/// Renders as `name-release-CATEGORY`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize)]
pub struct StreamKey {
    pub controller_name: String,
    pub controller_release: String,
    pub category: StreamCategory,
}

impl StreamKey {
    pub fn new(
        controller_name: impl Into<String>,
        controller_release: impl Into<String>,
        category: StreamCategory,
    ) -> Self {
        Self {
            controller_name: controller_name.into(),
            controller_release: controller_release.into(),
            category,
        }
    }

    /// Key for `controller`'s stream of the given category.
    pub fn for_controller(controller: &RegisteredController, category: StreamCategory) -> Self {
        Self::new(controller.name.clone(), controller.release.clone(), category)
    }

    /// True if this key belongs to the controller `name`/`release`.
    pub fn belongs_to(&self, name: &str, release: &str) -> bool {
        self.controller_name == name && self.controller_release == release
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.controller_name, self.controller_release, self.category
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("CONFIGURATION", StreamCategory::Configuration)]
    #[case("operational", StreamCategory::Operational)]
    #[case("Device", StreamCategory::Device)]
    fn test_category_parsing(#[case] input: &str, #[case] expected: StreamCategory) {
        assert_eq!(input.parse::<StreamCategory>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_category() {
        let err = "ALARM".parse::<StreamCategory>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown stream category: ALARM");
    }

    #[test]
    fn test_key_display() {
        let key = StreamKey::new("ctrl1", "v1", StreamCategory::Device);
        assert_eq!(key.to_string(), "ctrl1-v1-DEVICE");
    }

    #[test]
    fn test_key_for_controller() {
        let controller = RegisteredController::new("ctrl1", "v1");
        let key = StreamKey::for_controller(&controller, StreamCategory::Operational);
        assert!(key.belongs_to("ctrl1", "v1"));
        assert!(!key.belongs_to("ctrl1", "v2"));
        assert_eq!(key.to_string(), "ctrl1-v1-OPERATIONAL");
    }

    #[test]
    fn test_category_serializes_uppercase() {
        let json = serde_json::to_string(&StreamCategory::Configuration).unwrap();
        assert_eq!(json, "\"CONFIGURATION\"");
    }
}

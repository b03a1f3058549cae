use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator used to join source label values when none is given.
pub const DEFAULT_SEPARATOR: &str = ";";

/// Regex that matches any value, including the empty one.
pub const DEFAULT_REGEX: &str = "(.*)";

/// Replacement that copies the first capture group.
pub const DEFAULT_REPLACEMENT: &str = "$1";

static MATCH_ALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEFAULT_REGEX).expect("default relabel regex must compile"));

/// A relabel regex.
///
/// Prometheus anchors every relabel regex on both ends, so the pattern is
/// compiled as `^(?:pattern)$`. The original pattern is what gets serialized.
#[derive(Clone)]
pub struct Regex {
    pattern: String,
    compiled: regex::Regex,
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let compiled = regex::Regex::new(&format!("^(?:{pattern})$"))?;

        Ok(Self {
            pattern: pattern.to_string(),
            compiled,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Whether the whole of `value` matches.
    pub fn is_match(&self, value: &str) -> bool {
        self.compiled.is_match(value)
    }
}

impl Default for Regex {
    fn default() -> Self {
        MATCH_ALL.clone()
    }
}

impl PartialEq for Regex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for Regex {}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Regex").field(&self.pattern).finish()
    }
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl Serialize for Regex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pattern)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Replace,
    Keep,
    Drop,
    LabelDrop,
    LabelKeep,
    HashMod,
    LabelMap,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Replace => "replace",
            Action::Keep => "keep",
            Action::Drop => "drop",
            Action::LabelDrop => "labeldrop",
            Action::LabelKeep => "labelkeep",
            Action::HashMod => "hashmod",
            Action::LabelMap => "labelmap",
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replace" => Ok(Action::Replace),
            "keep" => Ok(Action::Keep),
            "drop" => Ok(Action::Drop),
            "labeldrop" => Ok(Action::LabelDrop),
            "labelkeep" => Ok(Action::LabelKeep),
            "hashmod" => Ok(Action::HashMod),
            "labelmap" => Ok(Action::LabelMap),
            _ => Err(format!("unknown relabel action: {s}")),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved relabel rule. Every field carries its final value, there
/// is no notion of "unset" left at this point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelabelConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_labels: Vec<String>,
    pub separator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,
    pub regex: Regex,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modulus: Option<u64>,
    pub replacement: String,
    pub action: Action,
}

impl Default for RelabelConfig {
    fn default() -> Self {
        Self {
            source_labels: Vec::new(),
            separator: DEFAULT_SEPARATOR.to_string(),
            target_label: None,
            regex: Regex::default(),
            modulus: None,
            replacement: DEFAULT_REPLACEMENT.to_string(),
            action: Action::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn regex_is_anchored() {
        let regex = Regex::new("(bar);true").unwrap();

        assert!(regex.is_match("bar;true"));
        assert!(!regex.is_match("foobar;true"));
        assert!(!regex.is_match("bar;true;"));
    }

    #[test]
    fn default_regex_matches_empty() {
        assert!(Regex::default().is_match(""));
        assert_eq!(Regex::default().as_str(), "(.*)");
    }

    #[test]
    fn invalid_regex_is_rejected() {
        assert!(Regex::new("(unclosed").is_err());
    }

    #[test]
    fn action_parses_any_case() {
        assert_eq!("LabelMap".parse::<Action>(), Ok(Action::LabelMap));
        assert_eq!("hashmod".parse::<Action>(), Ok(Action::HashMod));
        assert!("keepequal".parse::<Action>().is_err());
    }

    #[test]
    fn default_rule_serializes_every_resolved_field() {
        let rule = RelabelConfig {
            source_labels: vec!["job".to_string()],
            target_label: Some("__tmp_prometheus_job_name".to_string()),
            ..Default::default()
        };

        let expected: serde_yaml::Value = serde_yaml::from_str(
            r#"
            source_labels: [job]
            separator: ";"
            target_label: __tmp_prometheus_job_name
            regex: (.*)
            replacement: $1
            action: replace
            "#,
        )
        .unwrap();

        assert_eq!(serde_yaml::to_value(&rule).unwrap(), expected);
    }
}

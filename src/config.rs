use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::history::DEFAULT_WINDOW;

/// Mode tag recorded with every run; high scores are scoped per mode
pub const MODE: &str = "timed_custom";

/// Arithmetic operation families. Declaration order is the canonical key order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
    ];

    /// ASCII symbol used in configuration keys and on the command line
    pub fn symbol(self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Subtract => '-',
            Operation::Multiply => '*',
            Operation::Divide => '/',
        }
    }

    /// Symbol shown to the player
    pub fn glyph(self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Subtract => '-',
            Operation::Multiply => '×',
            Operation::Divide => '÷',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operation::Add),
            '-' => Some(Operation::Subtract),
            '*' | 'x' | '×' => Some(Operation::Multiply),
            '/' | '÷' => Some(Operation::Divide),
            _ => None,
        }
    }
}

/// Inclusive integer bounds for one operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperandRange {
    pub min: i64,
    pub max: i64,
}

impl OperandRange {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl fmt::Display for OperandRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Parses `MIN-MAX`; a leading `-` on either bound is a sign, so `-5--1` works.
impl FromStr for OperandRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c == '-')
            .map(|(i, _)| i)
            .ok_or_else(|| ConfigError::Parse(format!("range '{s}' (expected MIN-MAX)")))?;
        let (lo, hi) = (&s[..split], &s[split + 1..]);
        let parse = |v: &str| {
            v.trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::Parse(format!("range bound '{v}'")))
        };
        Ok(Self::new(parse(lo)?, parse(hi)?))
    }
}

/// Operand bounds per family. Subtraction reuses the addition ranges and
/// division reuses the multiplication ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ranges {
    pub add_a: OperandRange,
    pub add_b: OperandRange,
    pub mul_a: OperandRange,
    pub mul_b: OperandRange,
}

impl Default for Ranges {
    fn default() -> Self {
        Self {
            add_a: OperandRange::new(2, 100),
            add_b: OperandRange::new(2, 100),
            mul_a: OperandRange::new(2, 12),
            mul_b: OperandRange::new(2, 100),
        }
    }
}

impl Ranges {
    fn named(&self) -> [(&'static str, OperandRange); 4] {
        [
            ("addition A", self.add_a),
            ("addition B", self.add_b),
            ("multiplication A", self.mul_a),
            ("multiplication B", self.mul_b),
        ]
    }
}

/// Supported countdown lengths
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum RunDuration {
    #[strum(to_string = "30s")]
    Thirty,
    #[default]
    #[strum(to_string = "60s")]
    Sixty,
    #[strum(to_string = "120s")]
    OneTwenty,
}

impl RunDuration {
    pub const ALL: [RunDuration; 3] = [
        RunDuration::Thirty,
        RunDuration::Sixty,
        RunDuration::OneTwenty,
    ];

    pub fn secs(self) -> u32 {
        match self {
            RunDuration::Thirty => 30,
            RunDuration::Sixty => 60,
            RunDuration::OneTwenty => 120,
        }
    }
}

impl TryFrom<u32> for RunDuration {
    type Error = ConfigError;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        RunDuration::ALL
            .into_iter()
            .find(|d| d.secs() == secs)
            .ok_or(ConfigError::UnsupportedDuration(secs))
    }
}

impl From<RunDuration> for u32 {
    fn from(d: RunDuration) -> Self {
        d.secs()
    }
}

/// Snapshot of everything that shapes a run. Frozen by the session for the
/// duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillConfig {
    pub operations: BTreeSet<Operation>,
    pub ranges: Ranges,
    pub duration: RunDuration,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            operations: [Operation::Add, Operation::Subtract, Operation::Multiply]
                .into_iter()
                .collect(),
            ranges: Ranges::default(),
            duration: RunDuration::default(),
        }
    }
}

impl DrillConfig {
    pub fn new(
        operations: impl IntoIterator<Item = Operation>,
        ranges: Ranges,
        duration: RunDuration,
    ) -> Self {
        Self {
            operations: operations.into_iter().collect(),
            ranges,
            duration,
        }
    }

    /// Parse an operation list such as `"+-*"`. Unknown characters are rejected.
    pub fn parse_operations(s: &str) -> Result<BTreeSet<Operation>, ConfigError> {
        s.chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .map(|c| {
                Operation::from_symbol(c)
                    .ok_or_else(|| ConfigError::Parse(format!("operation '{c}'")))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operations.is_empty() {
            return Err(ConfigError::NoOperations);
        }
        for (name, range) in self.ranges.named() {
            if !range.is_valid() {
                return Err(ConfigError::EmptyRange {
                    name,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(())
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration.secs()
    }

    /// Enabled operation symbols in canonical order, e.g. `+-*`
    pub fn operation_symbols(&self) -> String {
        self.operations.iter().map(|op| op.symbol()).collect()
    }

    /// Canonical scope key used for high scores and history. Independent of
    /// the order in which operations were selected.
    pub fn key(&self) -> String {
        let r = &self.ranges;
        format!(
            "{}|a:{},{}|m:{},{}|t:{}",
            self.operation_symbols(),
            r.add_a,
            r.add_b,
            r.mul_a,
            r.mul_b,
            self.duration.secs()
        )
    }
}

/// Persisted user preferences: the last configuration played and the
/// history smoothing window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub config: DrillConfig,
    pub window_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config: DrillConfig::default(),
            window_size: DEFAULT_WINDOW,
        }
    }
}

pub trait SettingsStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "mathdash") {
            pd.config_dir().join("settings.json")
        } else {
            PathBuf::from("mathdash_settings.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Settings {
        let Ok(bytes) = fs::read(&self.path) else {
            return Settings::default();
        };
        match serde_json::from_slice::<Settings>(&bytes) {
            Ok(settings) if settings.config.validate().is_ok() && settings.window_size > 0 => {
                settings
            }
            Ok(_) => {
                log::warn!("ignoring invalid settings in {}", self.path.display());
                Settings::default()
            }
            Err(e) => {
                log::warn!("could not parse {}: {e}", self.path.display());
                Settings::default()
            }
        }
    }

    fn save(&self, settings: &Settings) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(DrillConfig::default().validate(), Ok(()));
    }

    #[test]
    fn empty_operations_rejected() {
        let cfg = DrillConfig::new([], Ranges::default(), RunDuration::Sixty);
        assert_eq!(cfg.validate(), Err(ConfigError::NoOperations));
    }

    #[test]
    fn inverted_range_rejected() {
        let ranges = Ranges {
            mul_b: OperandRange::new(50, 10),
            ..Ranges::default()
        };
        let cfg = DrillConfig::new([Operation::Add], ranges, RunDuration::Thirty);
        assert_matches!(
            cfg.validate(),
            Err(ConfigError::EmptyRange {
                name: "multiplication B",
                min: 50,
                max: 10
            })
        );
    }

    #[test]
    fn single_value_range_is_valid() {
        let ranges = Ranges {
            add_a: OperandRange::new(7, 7),
            ..Ranges::default()
        };
        let cfg = DrillConfig::new([Operation::Add], ranges, RunDuration::Thirty);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unsupported_duration_rejected() {
        assert_eq!(
            RunDuration::try_from(45),
            Err(ConfigError::UnsupportedDuration(45))
        );
        assert_eq!(RunDuration::try_from(120), Ok(RunDuration::OneTwenty));
    }

    #[test]
    fn key_matches_expected_format() {
        let cfg = DrillConfig::default();
        assert_eq!(cfg.key(), "+-*|a:2-100,2-100|m:2-12,2-100|t:60");
    }

    #[test]
    fn key_is_order_independent() {
        let a = DrillConfig::new(
            [Operation::Divide, Operation::Add, Operation::Multiply],
            Ranges::default(),
            RunDuration::Thirty,
        );
        let b = DrillConfig::new(
            [Operation::Multiply, Operation::Divide, Operation::Add, Operation::Add],
            Ranges::default(),
            RunDuration::Thirty,
        );
        assert_eq!(a.key(), b.key());
        assert_eq!(a.operation_symbols(), "+*/");
    }

    #[test]
    fn key_differs_when_ranges_differ() {
        let a = DrillConfig::default();
        let mut b = DrillConfig::default();
        b.ranges.mul_a = OperandRange::new(2, 13);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn parse_operations_accepts_symbols() {
        let ops = DrillConfig::parse_operations("*+ /").unwrap();
        assert_eq!(
            ops.into_iter().collect::<Vec<_>>(),
            vec![Operation::Add, Operation::Multiply, Operation::Divide]
        );
        assert_matches!(
            DrillConfig::parse_operations("+%"),
            Err(ConfigError::Parse(_))
        );
    }

    #[test]
    fn parse_range() {
        assert_eq!("2-100".parse(), Ok(OperandRange::new(2, 100)));
        assert_eq!("-5--1".parse(), Ok(OperandRange::new(-5, -1)));
        assert_eq!(" 3 - 9 ".parse(), Ok(OperandRange::new(3, 9)));
        assert_matches!("12".parse::<OperandRange>(), Err(ConfigError::Parse(_)));
        assert_matches!("a-b".parse::<OperandRange>(), Err(ConfigError::Parse(_)));
    }

    #[test]
    fn roundtrip_default_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = FileSettingsStore::with_path(&path);
        let settings = Settings::default();
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn save_and_load_custom_settings() {
        let dir = tempdir().unwrap();
        let store = FileSettingsStore::with_path(dir.path().join("nested").join("settings.json"));
        let settings = Settings {
            config: DrillConfig::new(
                [Operation::Divide],
                Ranges {
                    mul_a: OperandRange::new(3, 9),
                    ..Ranges::default()
                },
                RunDuration::OneTwenty,
            ),
            window_size: 3,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn corrupt_settings_fall_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(FileSettingsStore::with_path(&path).load(), Settings::default());
    }

    #[test]
    fn unsupported_duration_in_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut value = serde_json::to_value(Settings::default()).unwrap();
        value["config"]["duration"] = serde_json::json!(45);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
        assert_eq!(FileSettingsStore::with_path(&path).load(), Settings::default());
    }
}

use std::{
    fmt::Display,
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::PathBuf,
    str::FromStr,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{CapError, CapResult};

/// Value returned by [`Configuration::value_int`] when the key is missing.
pub const INT_SENTINEL: i32 = -99999;
/// Value returned by [`Configuration::value_long`] when the key is missing.
pub const LONG_SENTINEL: i64 = -99999;
/// Value returned by [`Configuration::value_double`] when the key is missing.
pub const DOUBLE_SENTINEL: f64 = -9.99E100;
/// Value returned by [`Configuration::value_string`] when the key is missing.
pub const STRING_SENTINEL: &str = "notFound";

/// The five kinds of value a [`Configuration`] can hold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// A `bool` value.
    Bool,
    /// An `i32` value.
    Int,
    /// An `i64` value.
    Long,
    /// An `f64` value.
    Double,
    /// A `String` value.
    String,
}
impl Display for ParameterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterKind::Bool => write!(f, "bool"),
            ParameterKind::Int => write!(f, "int"),
            ParameterKind::Long => write!(f, "long"),
            ParameterKind::Double => write!(f, "double"),
            ParameterKind::String => write!(f, "string"),
        }
    }
}
impl FromStr for ParameterKind {
    type Err = CapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bool" => Ok(Self::Bool),
            "int" => Ok(Self::Int),
            "long" => Ok(Self::Long),
            "double" => Ok(Self::Double),
            "string" => Ok(Self::String),
            _ => Err(CapError::ParseError {
                name: s.to_string(),
                object: "ParameterKind".to_string(),
            }),
        }
    }
}

/// A type which can be stored in a [`Configuration`].
///
/// Implemented for `bool`, `i32`, `i64`, `f64`, `&str` and `String`, which map onto the
/// bool, int, long, double and string tables respectively.
pub trait ParameterValue {
    /// The table this type is stored in.
    const KIND: ParameterKind;
    /// Store the value under `key`. If `must_exist` is set, only an existing entry is
    /// overwritten. Returns whether the value was stored.
    fn store(self, configuration: &mut Configuration, key: String, must_exist: bool) -> bool;
}

fn store_in<T>(map: &mut IndexMap<String, T>, key: String, value: T, must_exist: bool) -> bool {
    if must_exist {
        match map.get_mut(&key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    } else {
        map.insert(key, value);
        true
    }
}

impl ParameterValue for bool {
    const KIND: ParameterKind = ParameterKind::Bool;
    fn store(self, configuration: &mut Configuration, key: String, must_exist: bool) -> bool {
        store_in(&mut configuration.bool_values, key, self, must_exist)
    }
}
impl ParameterValue for i32 {
    const KIND: ParameterKind = ParameterKind::Int;
    fn store(self, configuration: &mut Configuration, key: String, must_exist: bool) -> bool {
        store_in(&mut configuration.int_values, key, self, must_exist)
    }
}
impl ParameterValue for i64 {
    const KIND: ParameterKind = ParameterKind::Long;
    fn store(self, configuration: &mut Configuration, key: String, must_exist: bool) -> bool {
        store_in(&mut configuration.long_values, key, self, must_exist)
    }
}
impl ParameterValue for f64 {
    const KIND: ParameterKind = ParameterKind::Double;
    fn store(self, configuration: &mut Configuration, key: String, must_exist: bool) -> bool {
        store_in(&mut configuration.double_values, key, self, must_exist)
    }
}
impl ParameterValue for String {
    const KIND: ParameterKind = ParameterKind::String;
    fn store(self, configuration: &mut Configuration, key: String, must_exist: bool) -> bool {
        store_in(&mut configuration.string_values, key, self, must_exist)
    }
}
impl ParameterValue for &str {
    const KIND: ParameterKind = ParameterKind::String;
    fn store(self, configuration: &mut Configuration, key: String, must_exist: bool) -> bool {
        store_in(
            &mut configuration.string_values,
            key,
            self.to_string(),
            must_exist,
        )
    }
}

/// Returns `true` if the last `':'` of `path` is its final character and is not the first
/// character.
pub fn has_end_colon(path: &str) -> bool {
    match path.rfind(':') {
        Some(index) => index > 0 && index == path.len() - 1,
        None => false,
    }
}

/// Compose the effective key of a path-qualified parameter.
pub fn path_key(path: &str, name: &str) -> String {
    if has_end_colon(path) {
        format!("{path}{name}")
    } else {
        format!("{path}:{name}")
    }
}

/// A named store of typed parameters.
///
/// Each key lives in one of five tables (bool, int, long, double, string). Nothing prevents
/// the same name from appearing in two tables, but by convention a name is only ever used
/// with one type.
///
/// There are two ways to write a value:
/// * [`Configuration::add_parameter`] declares a parameter, inserting or overwriting it. This
///   is what default configurations use.
/// * [`Configuration::set_parameter`] mutates a declared parameter. Setting an undeclared key
///   is reported and ignored.
///
/// Reads through the `value_*` methods never fail: a missing key yields a sentinel value
/// and a warning. The `try_value_*` methods return a [`CapError::ParameterNotFound`] instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    name: String,
    bool_values: IndexMap<String, bool>,
    int_values: IndexMap<String, i32>,
    long_values: IndexMap<String, i64>,
    double_values: IndexMap<String, f64>,
    string_values: IndexMap<String, String>,
}

impl Configuration {
    /// Create an empty configuration with the given name.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The name of the configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the configuration.
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    /// Declare a parameter, inserting it or overwriting any existing value of the same kind.
    pub fn add_parameter<K: Into<String>, V: ParameterValue>(&mut self, name: K, value: V) {
        value.store(self, name.into(), false);
    }

    /// Overwrite a declared parameter.
    ///
    /// # Notes
    ///
    /// If `name` has not been declared with [`Configuration::add_parameter`] for this value
    /// kind, nothing is stored and a warning is logged. The return value reports whether the
    /// value was stored.
    pub fn set_parameter<K: Into<String>, V: ParameterValue>(&mut self, name: K, value: V) -> bool {
        let key = name.into();
        let stored = value.store(self, key.clone(), true);
        if !stored {
            log::warn!(
                "Configuration \"{}\": cannot set undeclared {} parameter \"{}\"",
                self.name,
                V::KIND,
                key
            );
        }
        stored
    }

    /// Path-qualified form of [`Configuration::add_parameter`].
    pub fn add_parameter_at<V: ParameterValue>(&mut self, path: &str, name: &str, value: V) {
        self.add_parameter(path_key(path, name), value);
    }

    /// Path-qualified form of [`Configuration::set_parameter`].
    pub fn set_parameter_at<V: ParameterValue>(&mut self, path: &str, name: &str, value: V) -> bool {
        self.set_parameter(path_key(path, name), value)
    }

    /// Overlay the values of `other` onto this configuration.
    ///
    /// Only keys already declared here (in the matching table) are updated; keys unknown to
    /// `self` are skipped. This is a selective overlay, not a merge.
    pub fn set_parameters(&mut self, other: &Configuration) {
        let mut skipped = 0usize;
        for (key, value) in &other.bool_values {
            skipped += usize::from(!(*value).store(self, key.clone(), true));
        }
        for (key, value) in &other.int_values {
            skipped += usize::from(!(*value).store(self, key.clone(), true));
        }
        for (key, value) in &other.long_values {
            skipped += usize::from(!(*value).store(self, key.clone(), true));
        }
        for (key, value) in &other.double_values {
            skipped += usize::from(!(*value).store(self, key.clone(), true));
        }
        for (key, value) in &other.string_values {
            skipped += usize::from(!value.clone().store(self, key.clone(), true));
        }
        if skipped > 0 {
            log::debug!(
                "Configuration \"{}\": {} parameter(s) of \"{}\" not declared here and skipped",
                self.name,
                skipped,
                other.name
            );
        }
    }

    /// Total number of parameters across all tables.
    pub fn n_parameters(&self) -> usize {
        self.bool_values.len()
            + self.int_values.len()
            + self.long_values.len()
            + self.double_values.len()
            + self.string_values.len()
    }

    /// Remove every parameter.
    pub fn clear(&mut self) {
        self.bool_values.clear();
        self.int_values.clear();
        self.long_values.clear();
        self.double_values.clear();
        self.string_values.clear();
    }

    /// Check whether `name` exists in any table.
    pub fn is_found(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }
    /// Check whether `name` is a bool parameter.
    pub fn is_bool(&self, name: &str) -> bool {
        self.bool_values.contains_key(name)
    }
    /// Check whether `name` is an int parameter.
    pub fn is_int(&self, name: &str) -> bool {
        self.int_values.contains_key(name)
    }
    /// Check whether `name` is a long parameter.
    pub fn is_long(&self, name: &str) -> bool {
        self.long_values.contains_key(name)
    }
    /// Check whether `name` is a double parameter.
    pub fn is_double(&self, name: &str) -> bool {
        self.double_values.contains_key(name)
    }
    /// Check whether `name` is a string parameter.
    pub fn is_string(&self, name: &str) -> bool {
        self.string_values.contains_key(name)
    }

    /// The first table (in bool, int, long, double, string order) which holds `name`.
    pub fn kind_of(&self, name: &str) -> Option<ParameterKind> {
        if self.is_bool(name) {
            Some(ParameterKind::Bool)
        } else if self.is_int(name) {
            Some(ParameterKind::Int)
        } else if self.is_long(name) {
            Some(ParameterKind::Long)
        } else if self.is_double(name) {
            Some(ParameterKind::Double)
        } else if self.is_string(name) {
            Some(ParameterKind::String)
        } else {
            None
        }
    }

    fn not_found(&self, name: &str, kind: ParameterKind) -> CapError {
        CapError::ParameterNotFound {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }

    fn report_miss(&self, name: &str, kind: ParameterKind) {
        match self.kind_of(name) {
            Some(found) => log::warn!(
                "Configuration \"{}\": Key:{} not an '{}' but a '{}'",
                self.name,
                name,
                kind,
                found
            ),
            None => log::warn!(
                "Configuration \"{}\": Key:{} not found ({} requested)",
                self.name,
                name,
                kind
            ),
        }
    }

    /// Get a bool parameter or [`CapError::ParameterNotFound`].
    pub fn try_value_bool(&self, name: &str) -> CapResult<bool> {
        self.bool_values
            .get(name)
            .copied()
            .ok_or_else(|| self.not_found(name, ParameterKind::Bool))
    }
    /// Get an int parameter or [`CapError::ParameterNotFound`].
    pub fn try_value_int(&self, name: &str) -> CapResult<i32> {
        self.int_values
            .get(name)
            .copied()
            .ok_or_else(|| self.not_found(name, ParameterKind::Int))
    }
    /// Get a long parameter or [`CapError::ParameterNotFound`].
    pub fn try_value_long(&self, name: &str) -> CapResult<i64> {
        self.long_values
            .get(name)
            .copied()
            .ok_or_else(|| self.not_found(name, ParameterKind::Long))
    }
    /// Get a double parameter or [`CapError::ParameterNotFound`].
    pub fn try_value_double(&self, name: &str) -> CapResult<f64> {
        self.double_values
            .get(name)
            .copied()
            .ok_or_else(|| self.not_found(name, ParameterKind::Double))
    }
    /// Get a string parameter or [`CapError::ParameterNotFound`].
    pub fn try_value_string(&self, name: &str) -> CapResult<String> {
        self.string_values
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found(name, ParameterKind::String))
    }

    /// Get a bool parameter, or `false` (with a warning) if it is missing.
    pub fn value_bool(&self, name: &str) -> bool {
        self.try_value_bool(name).unwrap_or_else(|_| {
            self.report_miss(name, ParameterKind::Bool);
            false
        })
    }
    /// Get an int parameter, or [`INT_SENTINEL`] (with a warning) if it is missing.
    pub fn value_int(&self, name: &str) -> i32 {
        self.try_value_int(name).unwrap_or_else(|_| {
            self.report_miss(name, ParameterKind::Int);
            INT_SENTINEL
        })
    }
    /// Get a long parameter, or [`LONG_SENTINEL`] (with a warning) if it is missing.
    pub fn value_long(&self, name: &str) -> i64 {
        self.try_value_long(name).unwrap_or_else(|_| {
            self.report_miss(name, ParameterKind::Long);
            LONG_SENTINEL
        })
    }
    /// Get a double parameter, or [`DOUBLE_SENTINEL`] (with a warning) if it is missing.
    pub fn value_double(&self, name: &str) -> f64 {
        self.try_value_double(name).unwrap_or_else(|_| {
            self.report_miss(name, ParameterKind::Double);
            DOUBLE_SENTINEL
        })
    }
    /// Get a string parameter, or [`STRING_SENTINEL`] (with a warning) if it is missing.
    pub fn value_string(&self, name: &str) -> String {
        self.try_value_string(name).unwrap_or_else(|_| {
            self.report_miss(name, ParameterKind::String);
            STRING_SENTINEL.to_string()
        })
    }

    /// Path-qualified form of [`Configuration::value_bool`].
    pub fn value_bool_at(&self, path: &str, name: &str) -> bool {
        self.value_bool(&path_key(path, name))
    }
    /// Path-qualified form of [`Configuration::value_int`].
    pub fn value_int_at(&self, path: &str, name: &str) -> i32 {
        self.value_int(&path_key(path, name))
    }
    /// Path-qualified form of [`Configuration::value_long`].
    pub fn value_long_at(&self, path: &str, name: &str) -> i64 {
        self.value_long(&path_key(path, name))
    }
    /// Path-qualified form of [`Configuration::value_double`].
    pub fn value_double_at(&self, path: &str, name: &str) -> f64 {
        self.value_double(&path_key(path, name))
    }
    /// Path-qualified form of [`Configuration::value_string`].
    pub fn value_string_at(&self, path: &str, name: &str) -> String {
        self.value_string(&path_key(path, name))
    }

    /// Read a bin count, treating negative values (including the int sentinel) as zero.
    pub fn value_bins(&self, name: &str) -> usize {
        usize::try_from(self.value_int(name)).unwrap_or(0)
    }

    /// Declare `n` string parameters `base0 .. base{n-1}` holding `default`.
    pub fn generate_key_value_pairs(&mut self, base: &str, default: &str, n: usize) {
        for k in 0..n {
            self.add_parameter(format!("{base}{k}"), default);
        }
    }

    /// Values of string parameters whose key contains `base` and whose value does not
    /// contain `default`, in declaration order.
    pub fn selected_values(&self, base: &str, default: &str) -> Vec<String> {
        self.string_values
            .iter()
            .filter(|(key, value)| key.contains(base) && !value.contains(default))
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Number of entries [`Configuration::selected_values`] would return.
    pub fn n_selected_values(&self, base: &str, default: &str) -> usize {
        self.string_values
            .iter()
            .filter(|(key, value)| key.contains(base) && !value.contains(default))
            .count()
    }

    /// Number of string parameters whose key contains `base`.
    pub fn n_possible_values(&self, base: &str) -> usize {
        self.string_values
            .keys()
            .filter(|key| key.contains(base))
            .count()
    }

    /// Write `values` into the `base{k}` slots in order.
    pub fn add_selected_values<S: AsRef<str>>(&mut self, base: &str, values: &[S]) {
        for (k, value) in values.iter().enumerate() {
            self.add_parameter(format!("{base}{k}"), value.as_ref());
        }
    }

    /// Write every parameter to `file_path`, one `key type value` triple per line.
    pub fn write_to_file(&self, file_path: &str) -> CapResult<()> {
        let path = PathBuf::from(&*shellexpand::full(file_path)?);
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "# {}", self.name)?;
        for (key, value) in &self.bool_values {
            writeln!(writer, "{key} {} {value}", ParameterKind::Bool)?;
        }
        for (key, value) in &self.int_values {
            writeln!(writer, "{key} {} {value}", ParameterKind::Int)?;
        }
        for (key, value) in &self.long_values {
            writeln!(writer, "{key} {} {value}", ParameterKind::Long)?;
        }
        for (key, value) in &self.double_values {
            // `{:?}` keeps enough digits to read the value back exactly
            writeln!(writer, "{key} {} {value:?}", ParameterKind::Double)?;
        }
        for (key, value) in &self.string_values {
            writeln!(writer, "{key} {} {value}", ParameterKind::String)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Read parameters from `file_path` and declare each of them with
    /// [`Configuration::add_parameter`].
    ///
    /// Blank lines and lines starting with `#` are ignored. Everything after the type token
    /// is the value, so string values may contain spaces.
    pub fn read_from_file(&mut self, file_path: &str) -> CapResult<()> {
        let path = PathBuf::from(&*shellexpand::full(file_path)?);
        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            self.parse_line(trimmed)?;
        }
        Ok(())
    }

    fn parse_line(&mut self, line: &str) -> CapResult<()> {
        let malformed = || CapError::ParseError {
            name: line.to_string(),
            object: "Configuration line".to_string(),
        };
        let (key, rest) = line.split_once(char::is_whitespace).ok_or_else(malformed)?;
        let rest = rest.trim_start();
        let (kind, value) = match rest.split_once(char::is_whitespace) {
            Some((kind, value)) => (kind, value.trim()),
            None => (rest, ""),
        };
        let bad_value = || CapError::ParseError {
            name: value.to_string(),
            object: kind.to_string(),
        };
        match kind.parse::<ParameterKind>()? {
            ParameterKind::Bool => match value {
                "true" | "1" => self.add_parameter(key, true),
                "false" | "0" => self.add_parameter(key, false),
                _ => return Err(bad_value()),
            },
            ParameterKind::Int => {
                self.add_parameter(key, value.parse::<i32>().map_err(|_| bad_value())?)
            }
            ParameterKind::Long => {
                self.add_parameter(key, value.parse::<i64>().map_err(|_| bad_value())?)
            }
            ParameterKind::Double => {
                self.add_parameter(key, value.parse::<f64>().map_err(|_| bad_value())?)
            }
            ParameterKind::String => self.add_parameter(key, value),
        }
        Ok(())
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Configuration: {}", self.name)?;
        for (key, value) in &self.bool_values {
            writeln!(f, "  {key:<40} bool   {value}")?;
        }
        for (key, value) in &self.int_values {
            writeln!(f, "  {key:<40} int    {value}")?;
        }
        for (key, value) in &self.long_values {
            writeln!(f, "  {key:<40} long   {value}")?;
        }
        for (key, value) in &self.double_values {
            writeln!(f, "  {key:<40} double {value}")?;
        }
        for (key, value) in &self.string_values {
            writeln!(f, "  {key:<40} string {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::{env, fs};

    #[test]
    fn test_add_then_set() {
        let mut config = Configuration::new("test");
        config.add_parameter("k", 1);
        assert!(config.set_parameter("k", 2));
        assert_eq!(config.value_int("k"), 2);
    }

    #[test]
    fn test_set_undeclared_is_ignored() {
        let mut config = Configuration::new("test");
        assert!(!config.set_parameter("unknown", 5));
        assert_eq!(config.value_int("unknown"), INT_SENTINEL);
        assert_eq!(config.n_parameters(), 0);
    }

    #[test]
    fn test_set_does_not_cross_kinds() {
        let mut config = Configuration::new("test");
        config.add_parameter("x", 1.5);
        assert!(!config.set_parameter("x", 3));
        assert_relative_eq!(config.value_double("x"), 1.5);
        assert_eq!(config.value_int("x"), INT_SENTINEL);
    }

    #[test]
    fn test_sentinels() {
        let config = Configuration::new("empty");
        assert!(!config.value_bool("a"));
        assert_eq!(config.value_int("a"), -99999);
        assert_eq!(config.value_long("a"), -99999);
        assert_relative_eq!(config.value_double("a"), -9.99E100);
        assert_eq!(config.value_string("a"), "notFound");
        assert!(matches!(
            config.try_value_double("a"),
            Err(CapError::ParameterNotFound { .. })
        ));
    }

    #[test]
    fn test_all_kinds() {
        let mut config = Configuration::new("kinds");
        config.add_parameter("b", true);
        config.add_parameter("i", 7);
        config.add_parameter("l", 1_i64 << 40);
        config.add_parameter("d", 0.25);
        config.add_parameter("s", "hello");
        config.add_parameter("s2", String::from("world"));
        assert!(config.value_bool("b"));
        assert_eq!(config.value_int("i"), 7);
        assert_eq!(config.value_long("l"), 1_i64 << 40);
        assert_relative_eq!(config.value_double("d"), 0.25);
        assert_eq!(config.value_string("s"), "hello");
        assert_eq!(config.try_value_string("s2").unwrap(), "world");
        assert_eq!(config.n_parameters(), 6);
        assert_eq!(config.kind_of("l"), Some(ParameterKind::Long));
        config.clear();
        assert_eq!(config.n_parameters(), 0);
    }

    #[test]
    fn test_path_keys() {
        assert!(has_end_colon("Task:"));
        assert!(!has_end_colon("Task"));
        assert!(!has_end_colon(":"));
        assert!(!has_end_colon("Task:Sub"));
        assert_eq!(path_key("Task", "nBins"), "Task:nBins");
        assert_eq!(path_key("Task:", "nBins"), "Task:nBins");

        let mut config = Configuration::new("paths");
        config.add_parameter_at("Run", "nBins_pt", 18);
        assert_eq!(config.value_int("Run:nBins_pt"), 18);
        assert!(config.set_parameter_at("Run:", "nBins_pt", 20));
        assert_eq!(config.value_int_at("Run", "nBins_pt"), 20);
    }

    #[test]
    fn test_selective_overlay() {
        let mut base = Configuration::new("base");
        base.add_parameter("nBins_pt", 18);
        base.add_parameter("fillEta", false);
        let mut other = Configuration::new("other");
        other.add_parameter("nBins_pt", 40);
        other.add_parameter("fillEta", true);
        other.add_parameter("extra", 1.0);
        base.set_parameters(&other);
        assert_eq!(base.value_int("nBins_pt"), 40);
        assert!(base.value_bool("fillEta"));
        assert!(!base.is_found("extra"));
        assert_eq!(base.n_parameters(), 2);
    }

    #[test]
    fn test_selected_values() {
        let mut config = Configuration::new("selection");
        config.generate_key_value_pairs("Include", "none", 4);
        assert_eq!(config.n_possible_values("Include"), 4);
        assert_eq!(config.n_selected_values("Include", "none"), 0);
        config.add_selected_values("Include", &["PiP", "KP"]);
        assert_eq!(config.selected_values("Include", "none"), vec!["PiP", "KP"]);
        assert_eq!(config.n_selected_values("Include", "none"), 2);
    }

    #[test]
    fn test_file_round_trip() {
        let mut config = Configuration::new("file");
        config.add_parameter("fillEta", true);
        config.add_parameter("nBins_pt", 18);
        config.add_parameter("seed", 123456789012_i64);
        config.add_parameter("max_phi", 2.0 * std::f64::consts::PI);
        config.add_parameter("label", "two words");
        let path = env::temp_dir().join(format!("cap_config_{}.txt", fastrand::u64(..)));
        let path_str = path.to_str().unwrap();
        config.write_to_file(path_str).unwrap();
        let mut read = Configuration::new("file");
        read.read_from_file(path_str).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(read, config);
    }

    #[test]
    fn test_bad_type_token() {
        let mut config = Configuration::new("bad");
        assert!(matches!(
            config.parse_line("key float 1.0"),
            Err(CapError::ParseError { .. })
        ));
        assert!(config.parse_line("key int x").is_err());
        assert!(config.parse_line("lonely").is_err());
    }
}

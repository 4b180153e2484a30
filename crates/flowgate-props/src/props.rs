use crate::error::{PropsError, PropsResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use toml::Value;

/// A layer of configuration properties with an optional parent.
///
/// Values set on this layer shadow the parent's. A `Props` is built and
/// adjusted with [`Props::put`] while it is still owned, then shared as
/// `Arc<Props>` and treated as immutable.
#[derive(Debug, Clone, Default)]
pub struct Props {
    parent: Option<Arc<Props>>,
    values: BTreeMap<String, Value>,
    source: Option<PathBuf>,
}

impl Props {
    /// Create an empty layer on top of `parent`.
    pub fn new(parent: Option<Arc<Props>>) -> Self {
        Self {
            parent,
            values: BTreeMap::new(),
            source: None,
        }
    }

    /// Parse a layer from TOML text.
    pub fn from_str(parent: Option<Arc<Props>>, content: &str) -> PropsResult<Self> {
        let table: toml::Table = toml::from_str(content)?;
        let mut props = Self::new(parent);
        flatten_into(&mut props.values, None, table);
        Ok(props)
    }

    /// Load a layer from a TOML file.
    pub fn from_file(parent: Option<Arc<Props>>, path: &Path) -> PropsResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| PropsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: toml::Table = toml::from_str(&content).map_err(|source| PropsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut props = Self::new(parent);
        flatten_into(&mut props.values, None, table);
        props.source = Some(path.to_path_buf());
        tracing::debug!("Loaded {} properties from {}", props.values.len(), path.display());
        Ok(props)
    }

    /// Load several files as a chain: each file becomes the child of the one
    /// before it, so the last file wins.
    pub fn load_layered(parent: Option<Arc<Props>>, files: &[PathBuf]) -> PropsResult<Self> {
        let mut current = Props::new(parent);
        let mut first = true;

        for file in files {
            let below = if first {
                current.parent.take()
            } else {
                Some(Arc::new(current))
            };
            current = Props::from_file(below, file)?;
            first = false;
        }

        Ok(current)
    }

    /// Set a value on this layer.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// The file this layer was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn parent(&self) -> Option<&Arc<Props>> {
        self.parent.as_ref()
    }

    /// Look up a raw value, falling back to the parent chain.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.values.get(key) {
            Some(value) => Some(value),
            None => self.parent.as_ref().and_then(|p| p.get(key)),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All keys visible through this layer, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.flatten().into_keys().collect();
        keys.sort();
        keys
    }

    /// Merge the whole chain into one map; nearer layers win.
    pub fn flatten(&self) -> BTreeMap<String, Value> {
        let mut merged = match &self.parent {
            Some(parent) => parent.flatten(),
            None => BTreeMap::new(),
        };
        for (key, value) in &self.values {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Read a required string. Scalar values are rendered as strings.
    pub fn get_string(&self, key: &str) -> PropsResult<String> {
        let value = self
            .get(key)
            .ok_or_else(|| PropsError::Missing(key.to_string()))?;
        scalar_to_string(key, value)
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> PropsResult<String> {
        match self.get(key) {
            Some(value) => scalar_to_string(key, value),
            None => Ok(default.to_string()),
        }
    }

    /// Read a required integer. Numeric strings are accepted.
    pub fn get_int(&self, key: &str) -> PropsResult<i64> {
        let value = self
            .get(key)
            .ok_or_else(|| PropsError::Missing(key.to_string()))?;
        value_to_int(key, value)
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> PropsResult<i64> {
        match self.get(key) {
            Some(value) => value_to_int(key, value),
            None => Ok(default),
        }
    }

    /// Read a boolean, accepting `"true"`/`"false"` strings.
    pub fn get_bool_or(&self, key: &str, default: bool) -> PropsResult<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Boolean(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(wrong_type(key, "boolean", &Value::String(s.clone()))),
            },
            Some(other) => Err(wrong_type(key, "boolean", other)),
        }
    }

    /// Read an ordered list of strings.
    ///
    /// A TOML array or a comma-separated string is accepted. A missing key
    /// yields an empty list.
    pub fn get_string_list(&self, key: &str) -> PropsResult<Vec<String>> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| scalar_to_string(key, item))
                .collect(),
            Some(Value::String(s)) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()),
            Some(other) => Err(wrong_type(key, "list of strings", other)),
        }
    }

    pub fn get_path_or(&self, key: &str, default: &str) -> PropsResult<PathBuf> {
        self.get_string_or(key, default).map(PathBuf::from)
    }
}

fn flatten_into(out: &mut BTreeMap<String, Value>, prefix: Option<&str>, table: toml::Table) {
    for (key, value) in table {
        let full_key = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key,
        };
        match value {
            Value::Table(inner) => flatten_into(out, Some(&full_key), inner),
            other => {
                out.insert(full_key, other);
            }
        }
    }
}

fn scalar_to_string(key: &str, value: &Value) -> PropsResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Datetime(d) => Ok(d.to_string()),
        other => Err(wrong_type(key, "string", other)),
    }
}

fn value_to_int(key: &str, value: &Value) -> PropsResult<i64> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| wrong_type(key, "integer", value)),
        other => Err(wrong_type(key, "integer", other)),
    }
}

fn wrong_type(key: &str, expected: &'static str, value: &Value) -> PropsError {
    PropsError::WrongType {
        key: key.to_string(),
        expected,
        value: value.to_string(),
    }
}

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::SqlConduitError;
use crate::type_map::InternalType;

static IDENTIFIER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").ok());

/// Declarative description of one table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub table_name: String,
    #[serde(default)]
    pub primary_key_columns: Vec<String>,
    /// Columns keyed by property name, in declaration order.
    #[serde(deserialize_with = "ordered_properties")]
    pub properties: Vec<(String, ColumnSpec)>,
    /// Object-type tag checked with the permission collaborator before writes.
    #[serde(default)]
    pub permission_object_type: Option<String>,
}

/// One column of a [`TableSchema`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Column name in the database; the property key when absent.
    #[serde(default)]
    pub source_column_name: Option<String>,
    #[serde(default)]
    pub internal_type: Option<InternalType>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub decimal_places: Option<u8>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSpec {
    #[must_use]
    pub fn new(internal_type: InternalType) -> Self {
        Self {
            source_column_name: None,
            internal_type: Some(internal_type),
            nullable: true,
            max_length: None,
            decimal_places: None,
        }
    }

    #[must_use]
    pub fn column_name(mut self, name: &str) -> Self {
        self.source_column_name = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn max_length(mut self, len: u32) -> Self {
        self.max_length = Some(len);
        self
    }

    #[must_use]
    pub fn decimal_places(mut self, places: u8) -> Self {
        self.decimal_places = Some(places);
        self
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

impl TableSchema {
    #[must_use]
    pub fn new(table_name: &str, primary_key_columns: &[&str]) -> Self {
        Self {
            table_name: table_name.to_string(),
            primary_key_columns: primary_key_columns.iter().map(|c| (*c).to_string()).collect(),
            properties: Vec::new(),
            permission_object_type: None,
        }
    }

    /// Append a property (builder style).
    #[must_use]
    pub fn property(mut self, key: &str, spec: ColumnSpec) -> Self {
        self.properties.push((key.to_string(), spec));
        self
    }

    #[must_use]
    pub fn permission_object_type(mut self, tag: &str) -> Self {
        self.permission_object_type = Some(tag.to_string());
        self
    }

    /// Parse a JSON schema document.
    ///
    /// # Errors
    /// Returns `SqlConduitError::SchemaError` if the JSON does not describe a table.
    pub fn from_json_str(json: &str) -> Result<Self, SqlConduitError> {
        serde_json::from_str(json)
            .map_err(|e| SqlConduitError::SchemaError(format!("invalid table schema: {e}")))
    }

    /// Read a JSON schema file.
    ///
    /// # Errors
    /// Returns `SqlConduitError::SchemaError` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SqlConduitError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SqlConduitError::SchemaError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    #[must_use]
    pub fn column(&self, key: &str) -> Option<&ColumnSpec> {
        self.properties
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, spec)| spec)
    }

    /// Database column name for a property key.
    #[must_use]
    pub fn column_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.column(key)
            .and_then(|spec| spec.source_column_name.as_deref())
            .unwrap_or(key)
    }

    /// Check the invariants every generator relies on.
    ///
    /// # Errors
    /// `SchemaMissingPrimaryKey` when there is no key, `SchemaError` for a key column that is
    /// not a property or an identifier that cannot be emitted unquoted.
    pub fn validate(&self) -> Result<(), SqlConduitError> {
        if self.primary_key_columns.is_empty() {
            return Err(SqlConduitError::SchemaMissingPrimaryKey(
                self.table_name.clone(),
            ));
        }
        check_identifier(&self.table_name)?;
        for key in &self.primary_key_columns {
            if self.column(key).is_none() {
                return Err(SqlConduitError::SchemaError(format!(
                    "primary key column {key} is not a property of {}",
                    self.table_name
                )));
            }
        }
        for (key, spec) in &self.properties {
            check_identifier(key)?;
            if let Some(name) = &spec.source_column_name {
                check_identifier(name)?;
            }
        }
        Ok(())
    }
}

fn check_identifier(name: &str) -> Result<(), SqlConduitError> {
    let valid = IDENTIFIER.as_ref().is_some_and(|re| re.is_match(name));
    if valid {
        Ok(())
    } else {
        Err(SqlConduitError::SchemaError(format!(
            "invalid identifier: {name:?}"
        )))
    }
}

fn ordered_properties<'de, D>(deserializer: D) -> Result<Vec<(String, ColumnSpec)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PropertiesVisitor;

    impl<'de> Visitor<'de> for PropertiesVisitor {
        type Value = Vec<(String, ColumnSpec)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object of column specifications")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, spec)) = map.next_entry::<String, ColumnSpec>()? {
                out.push((key, spec));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(PropertiesVisitor)
}

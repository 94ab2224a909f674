use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SqlConduitError;
use crate::types::BackendKind;

/// Backend-independent column type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InternalType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Varchar,
    Text,
    /// Any tag this crate does not know; sanitizes to `NULL` and has no native type.
    #[serde(other)]
    Unknown,
}

const KNOWN: [InternalType; 10] = [
    InternalType::Boolean,
    InternalType::Int8,
    InternalType::Int16,
    InternalType::Int32,
    InternalType::Int64,
    InternalType::Float32,
    InternalType::Float64,
    InternalType::Decimal,
    InternalType::Varchar,
    InternalType::Text,
];

impl InternalType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InternalType::Boolean => "boolean",
            InternalType::Int8 => "int8",
            InternalType::Int16 => "int16",
            InternalType::Int32 => "int32",
            InternalType::Int64 => "int64",
            InternalType::Float32 => "float32",
            InternalType::Float64 => "float64",
            InternalType::Decimal => "decimal",
            InternalType::Varchar => "varchar",
            InternalType::Text => "text",
            InternalType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InternalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InternalType {
    type Err = SqlConduitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KNOWN
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SqlConduitError::SchemaError(format!("unknown internal type: {s}")))
    }
}

/// Native column types of one backend, forward and reverse.
#[derive(Debug)]
pub struct TypeMap {
    kind: BackendKind,
    // indexed in KNOWN order
    native: [&'static str; 10],
    unbounded_varchar: &'static str,
    reverse: &'static [(&'static str, InternalType)],
}

static POSTGRES_TYPES: TypeMap = TypeMap {
    kind: BackendKind::Postgres,
    native: [
        "boolean", "smallint", "smallint", "int", "bigint", "real", "float", "decimal",
        "varchar", "text",
    ],
    unbounded_varchar: "varchar",
    reverse: &[
        ("boolean", InternalType::Boolean),
        ("bool", InternalType::Boolean),
        ("bit", InternalType::Boolean),
        ("tinyint", InternalType::Int8),
        ("smallint", InternalType::Int16),
        ("int2", InternalType::Int16),
        ("int", InternalType::Int32),
        ("integer", InternalType::Int32),
        ("int4", InternalType::Int32),
        ("bigint", InternalType::Int64),
        ("int8", InternalType::Int64),
        ("real", InternalType::Float32),
        ("float4", InternalType::Float32),
        ("float", InternalType::Float64),
        ("float8", InternalType::Float64),
        ("double", InternalType::Float64),
        ("double precision", InternalType::Float64),
        ("decimal", InternalType::Decimal),
        ("numeric", InternalType::Decimal),
        ("varchar", InternalType::Varchar),
        ("character varying", InternalType::Varchar),
        ("text", InternalType::Text),
        ("bpchar", InternalType::Text),
        ("character", InternalType::Text),
    ],
};

static MSSQL_TYPES: TypeMap = TypeMap {
    kind: BackendKind::Mssql,
    native: [
        "bit", "tinyint", "smallint", "int", "bigint", "real", "float", "decimal", "nvarchar",
        "ntext",
    ],
    unbounded_varchar: "nvarchar(max)",
    reverse: &[
        ("boolean", InternalType::Boolean),
        ("bit", InternalType::Boolean),
        ("tinyint", InternalType::Int8),
        ("smallint", InternalType::Int16),
        ("int", InternalType::Int32),
        ("bigint", InternalType::Int64),
        ("real", InternalType::Float32),
        ("float", InternalType::Float64),
        ("double", InternalType::Float64),
        ("decimal", InternalType::Decimal),
        ("numeric", InternalType::Decimal),
        ("money", InternalType::Decimal),
        ("varchar", InternalType::Varchar),
        ("nvarchar", InternalType::Varchar),
        ("char", InternalType::Varchar),
        ("nchar", InternalType::Varchar),
        ("text", InternalType::Text),
        ("ntext", InternalType::Text),
    ],
};

static MYSQL_TYPES: TypeMap = TypeMap {
    kind: BackendKind::Mysql,
    native: [
        "bit", "tinyint", "smallint", "int", "bigint", "float", "double", "decimal",
        "varchar", "mediumtext",
    ],
    unbounded_varchar: "longtext",
    reverse: &[
        ("boolean", InternalType::Boolean),
        ("bool", InternalType::Boolean),
        ("bit", InternalType::Boolean),
        ("tinyint", InternalType::Int8),
        ("smallint", InternalType::Int16),
        ("mediumint", InternalType::Int32),
        ("int", InternalType::Int32),
        ("integer", InternalType::Int32),
        ("bigint", InternalType::Int64),
        ("real", InternalType::Float32),
        ("float", InternalType::Float32),
        ("double", InternalType::Float64),
        ("decimal", InternalType::Decimal),
        ("numeric", InternalType::Decimal),
        ("varchar", InternalType::Varchar),
        ("char", InternalType::Varchar),
        ("text", InternalType::Text),
        ("tinytext", InternalType::Text),
        ("mediumtext", InternalType::Text),
        ("longtext", InternalType::Text),
    ],
};

static SQLITE_TYPES: TypeMap = TypeMap {
    kind: BackendKind::Sqlite,
    native: [
        "boolean", "integer", "integer", "integer", "integer", "float", "double", "decimal",
        "varchar", "text",
    ],
    unbounded_varchar: "varchar",
    reverse: &[
        ("boolean", InternalType::Boolean),
        ("bit", InternalType::Boolean),
        ("tinyint", InternalType::Int8),
        ("smallint", InternalType::Int16),
        ("int", InternalType::Int32),
        ("integer", InternalType::Int64),
        ("bigint", InternalType::Int64),
        ("real", InternalType::Float32),
        ("float", InternalType::Float32),
        ("double", InternalType::Float64),
        ("decimal", InternalType::Decimal),
        ("numeric", InternalType::Decimal),
        ("varchar", InternalType::Varchar),
        ("text", InternalType::Text),
    ],
};

impl TypeMap {
    /// The static table for `kind`.
    #[must_use]
    pub fn for_backend(kind: BackendKind) -> &'static TypeMap {
        match kind {
            BackendKind::Postgres => &POSTGRES_TYPES,
            BackendKind::Mssql => &MSSQL_TYPES,
            BackendKind::Mysql => &MYSQL_TYPES,
            BackendKind::Sqlite => &SQLITE_TYPES,
        }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Native type name for an internal tag; `None` for [`InternalType::Unknown`].
    #[must_use]
    pub fn native_type(&self, internal: InternalType) -> Option<&'static str> {
        KNOWN
            .iter()
            .position(|t| *t == internal)
            .map(|idx| self.native[idx])
    }

    /// Internal tag for a native type name as reported by the backend.
    ///
    /// Case-insensitive; a trailing `(len)` or `(p,s)` is ignored. Several native names
    /// collapse onto one tag, so the mapping only round-trips approximately.
    #[must_use]
    pub fn internal_type(&self, native: &str) -> Option<InternalType> {
        let base = native.split('(').next().unwrap_or(native).trim();
        self.reverse
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(base))
            .map(|(_, internal)| *internal)
    }

    /// Native type with length or precision, as used in `CREATE TABLE`.
    ///
    /// Varchar without a length becomes the backend's unbounded text type; decimals take
    /// `(18,d)` for 1 to 8 places and `(18,5)` otherwise.
    #[must_use]
    pub fn column_type(
        &self,
        internal: InternalType,
        max_length: Option<u32>,
        decimal_places: Option<u8>,
    ) -> Option<String> {
        let native = self.native_type(internal)?;
        Some(match internal {
            InternalType::Varchar => match max_length {
                Some(len) if len > 0 => format!("{native}({len})"),
                _ => self.unbounded_varchar.to_string(),
            },
            InternalType::Decimal => match decimal_places {
                Some(d) if (1..=8).contains(&d) => format!("{native}(18,{d})"),
                _ => format!("{native}(18,5)"),
            },
            _ => native.to_string(),
        })
    }
}

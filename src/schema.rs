//! Destination-table schema introspection.
//!
//! Column order from [`get_columns`] is the single positional mapping shared
//! by the normalizer, the format-file builder, and the length auditor.
//! Metadata is fetched fresh per operation and never cached across runs.

use log::info;

use crate::db::DbHandle;
use crate::error::ImportError;

/// Sentinel for "maximum length not applicable" (non-character columns and
/// MAX-typed columns, which INFORMATION_SCHEMA also reports as -1).
pub const NO_MAX_LENGTH: i64 = -1;

/// Declared SQL Server column type, grouped by family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    Int,
    BigInt,
    SmallInt,
    TinyInt,
    Bit,
    Decimal,
    Numeric,
    Money,
    SmallMoney,
    Float,
    Real,
    DateTime,
    DateTime2,
    SmallDateTime,
    Date,
    Time,
    DateTimeOffset,
    Char,
    NChar,
    VarChar,
    NVarChar,
    Other(String),
}

impl SqlType {
    /// Classifies a DATA_TYPE value as reported by INFORMATION_SCHEMA.
    pub fn from_declared(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" => SqlType::Int,
            "bigint" => SqlType::BigInt,
            "smallint" => SqlType::SmallInt,
            "tinyint" => SqlType::TinyInt,
            "bit" => SqlType::Bit,
            "decimal" => SqlType::Decimal,
            "numeric" => SqlType::Numeric,
            "money" => SqlType::Money,
            "smallmoney" => SqlType::SmallMoney,
            "float" => SqlType::Float,
            "real" => SqlType::Real,
            "datetime" => SqlType::DateTime,
            "datetime2" => SqlType::DateTime2,
            "smalldatetime" => SqlType::SmallDateTime,
            "date" => SqlType::Date,
            "time" => SqlType::Time,
            "datetimeoffset" => SqlType::DateTimeOffset,
            "char" => SqlType::Char,
            "nchar" => SqlType::NChar,
            "varchar" => SqlType::VarChar,
            "nvarchar" => SqlType::NVarChar,
            other => SqlType::Other(other.to_string()),
        }
    }

    /// True for text types carrying a declared maximum character length.
    pub fn is_character(&self) -> bool {
        matches!(
            self,
            SqlType::Char | SqlType::NChar | SqlType::VarChar | SqlType::NVarChar
        )
    }
}

/// One destination column, in declared ordinal order.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    pub name: String,
    pub declared_type: SqlType,
    /// Declared maximum character length, or [`NO_MAX_LENGTH`].
    pub max_length: i64,
}

const COLUMNS_SQL: &str = "SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_NAME = @P1 \
     ORDER BY ORDINAL_POSITION";

/// Fetches column metadata for `table` in declared column order.
///
/// Read-only. Fails with [`ImportError::Schema`] when the table does not
/// exist (empty result set) or the metadata query cannot run. Callers must
/// not re-sort the result.
pub fn get_columns(db: &mut dyn DbHandle, table: &str) -> Result<Vec<ColumnMetadata>, ImportError> {
    let rows = db
        .query(COLUMNS_SQL, &[table])
        .map_err(|err| ImportError::schema(table, err.to_string()))?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name = row
            .first()
            .cloned()
            .flatten()
            .ok_or_else(|| ImportError::schema(table, "NULL column name in metadata"))?;
        let declared = row.get(1).cloned().flatten().unwrap_or_default();
        let max_length = row
            .get(2)
            .cloned()
            .flatten()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(NO_MAX_LENGTH);
        columns.push(ColumnMetadata {
            name,
            declared_type: SqlType::from_declared(&declared),
            max_length,
        });
    }

    if columns.is_empty() {
        return Err(ImportError::schema(
            table,
            "table not found or has no columns",
        ));
    }
    info!("Found {} column(s) in table {}", columns.len(), table);
    Ok(columns)
}

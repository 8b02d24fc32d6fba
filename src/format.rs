//! BCP XML format-file construction.
//!
//! The format file is the one bit-exact external contract in this tool: SQL
//! Server's bulk-load facility rejects anything that strays from the
//! BCPFORMAT schema. Every source field is read as a character-terminated
//! field; the destination wire type is derived from the column's declared
//! type through a total mapping with a VARCHAR default arm.

use std::io::Write;

use log::info;
use tempfile::NamedTempFile;

use crate::error::ImportError;
use crate::schema::{ColumnMetadata, SqlType};

/// Row terminator written by the normalizer and declared on the last field.
pub const ROW_TERMINATOR: &str = "\\n";

/// Parsed-field width cap declared in the format file.
const MAX_FIELD_LENGTH: &str = "8000";

/// Per-field terminator: the configured delimiter, or the row terminator on
/// the last field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    Delimiter(char),
    RowEnd,
}

impl Terminator {
    fn as_literal(&self) -> String {
        match self {
            Terminator::Delimiter(ch) => ch.to_string(),
            Terminator::RowEnd => ROW_TERMINATOR.to_string(),
        }
    }
}

/// One source field and its destination column binding.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// 1-based source ordinal.
    pub ordinal: usize,
    pub column: String,
    pub bcp_type: &'static str,
    pub terminator: Terminator,
}

/// Ordered field mapping for a single load. Built fresh before each load and
/// discarded, together with its serialized form, once the load finishes.
#[derive(Debug, Clone)]
pub struct LoadDescriptor {
    pub fields: Vec<FieldSpec>,
}

impl LoadDescriptor {
    /// Builds one [`FieldSpec`] per destination column, in column order.
    pub fn build(columns: &[ColumnMetadata], delimiter: char) -> Self {
        let last = columns.len().saturating_sub(1);
        let fields = columns
            .iter()
            .enumerate()
            .map(|(index, column)| FieldSpec {
                ordinal: index + 1,
                column: column.name.clone(),
                bcp_type: bcp_type_tag(&column.declared_type),
                terminator: if index == last {
                    Terminator::RowEnd
                } else {
                    Terminator::Delimiter(delimiter)
                },
            })
            .collect();
        LoadDescriptor { fields }
    }

    /// Renders the BCPFORMAT XML document.
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\"?>\n");
        xml.push_str("<BCPFORMAT xmlns=\"http://schemas.microsoft.com/sqlserver/2004/bulkload/format\" xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n");
        xml.push_str("  <RECORD>\n");
        for field in &self.fields {
            xml.push_str(&format!(
                "    <FIELD ID=\"{}\" xsi:type=\"CharTerm\" TERMINATOR=\"{}\" MAX_LENGTH=\"{}\"/>\n",
                field.ordinal,
                xml_escape(&field.terminator.as_literal()),
                MAX_FIELD_LENGTH,
            ));
        }
        xml.push_str("  </RECORD>\n");
        xml.push_str("  <ROW>\n");
        for field in &self.fields {
            xml.push_str(&format!(
                "    <COLUMN SOURCE=\"{}\" NAME=\"{}\" xsi:type=\"{}\"/>\n",
                field.ordinal,
                xml_escape(&field.column),
                field.bcp_type,
            ));
        }
        xml.push_str("  </ROW>\n");
        xml.push_str("</BCPFORMAT>\n");
        xml
    }
}

/// Writes the serialized descriptor to a scratch `.fmt` file. The file is
/// deleted when the returned handle drops.
pub fn write_format_file(descriptor: &LoadDescriptor) -> Result<NamedTempFile, ImportError> {
    let mut scratch = tempfile::Builder::new()
        .prefix("sql-import-")
        .suffix(".fmt")
        .tempfile()?;
    scratch.write_all(descriptor.to_xml().as_bytes())?;
    scratch.flush()?;
    info!("Created format file: {:?}", scratch.path());
    Ok(scratch)
}

/// Declared type to BCP wire-type tag. Total: unrecognized and all character
/// types fall through to variable-length character.
fn bcp_type_tag(declared: &SqlType) -> &'static str {
    match declared {
        SqlType::Int => "SQLINT",
        SqlType::BigInt => "SQLBIGINT",
        SqlType::SmallInt => "SQLSMALLINT",
        SqlType::TinyInt => "SQLTINYINT",
        SqlType::Bit => "SQLBIT",
        SqlType::Decimal => "SQLDECIMAL",
        SqlType::Numeric => "SQLNUMERIC",
        SqlType::Money => "SQLMONEY",
        SqlType::SmallMoney => "SQLSMALLMONEY",
        SqlType::Float => "SQLFLT8",
        SqlType::Real => "SQLFLT4",
        SqlType::DateTime | SqlType::DateTime2 => "SQLDATETIME",
        SqlType::SmallDateTime => "SQLSMALLDATETIME",
        SqlType::Date => "SQLDATE",
        SqlType::Time => "SQLTIME",
        SqlType::DateTimeOffset => "SQLDATETIMEOFFSET",
        _ => "SQLVARYCHAR",
    }
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

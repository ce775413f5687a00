use thiserror::Error;

use crate::schema::RelationId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("table '{0}' not found")]
    TableNotFound(String),
    #[error("table '{0}' is defined more than once")]
    DuplicateTable(String),
    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },
    #[error("column '{table}.{column}' references unknown relation {id}")]
    DanglingRelation {
        table: String,
        column: String,
        id: RelationId,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Relation traversal failed; surfaced as-is.
    #[error(transparent)]
    Collect(#[from] SchemaError),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("failed to filter table '{table}'")]
    Exclude {
        table: String,
        #[source]
        source: SchemaError,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("syntax error in ER diagram: unexpected `{line}`")]
    Syntax { line: String },
    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("no tables left to render")]
    Empty,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

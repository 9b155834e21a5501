use serde::{Deserialize, Serialize};

/// Entry in the table sidebar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub row_count: Option<u64>,
}

/// Information about a table column, as reported by `DESCRIBE`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

/// Column layout of one table, derived fresh from the live connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// Compact text block used as translator context.
    ///
    /// ```text
    /// TABLE: orders
    /// COLUMNS:
    ///   - id (INTEGER, NOT NULL)
    ///   - note (VARCHAR, NULL)
    /// ```
    pub fn summary(&self) -> String {
        let mut out = format!("TABLE: {}\nCOLUMNS:", self.table_name);
        for col in &self.columns {
            let nullable = if col.nullable { "NULL" } else { "NOT NULL" };
            out.push_str(&format!("\n  - {} ({}, {})", col.name, col.declared_type, nullable));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_every_column_with_nullability() {
        let schema = TableSchema {
            table_name: "orders".to_string(),
            columns: vec![
                ColumnInfo {
                    name: "id".to_string(),
                    declared_type: "INTEGER".to_string(),
                    nullable: false,
                    primary_key: true,
                    default_value: None,
                },
                ColumnInfo {
                    name: "note".to_string(),
                    declared_type: "VARCHAR".to_string(),
                    nullable: true,
                    primary_key: false,
                    default_value: None,
                },
            ],
        };

        assert_eq!(
            schema.summary(),
            "TABLE: orders\nCOLUMNS:\n  - id (INTEGER, NOT NULL)\n  - note (VARCHAR, NULL)"
        );
    }
}

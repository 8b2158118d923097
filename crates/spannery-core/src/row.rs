//! Result sets returned by the database client.

use crate::record::Record;
use crate::value::Value;

/// One row as returned by the client.
pub type Row = Vec<Value>;

/// Rows returned by a read, with column names when the client reports them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names as reported by the client. Joined queries report them
    /// alias-qualified (`t0.Name`).
    pub columns: Option<Vec<String>>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Result with column metadata.
    #[must_use]
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, rows: Vec<Row>) -> Self {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
            rows,
        }
    }

    /// Result without column metadata.
    #[must_use]
    pub fn positional(rows: Vec<Row>) -> Self {
        Self {
            columns: None,
            rows,
        }
    }

    /// A result with no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row; the shape of `COUNT(*)` and `SELECT 1`.
    #[must_use]
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Rows as records keyed by the reported column names.
    /// `None` when the client reported no columns.
    #[must_use]
    pub fn records(&self) -> Option<Vec<Record>> {
        let columns = self.columns.as_ref()?;
        Some(
            self.rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .zip(row.iter())
                        .map(|(c, v)| (c.clone(), v.clone()))
                        .collect()
                })
                .collect(),
        )
    }
}

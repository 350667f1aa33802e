//! Row-number based paging.
//!
//! The inner statement is expected to project a `RowNumber` column, usually
//! rendered with [`row_number_column`].

use crate::statement::{CompiledStatement, StatementBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    page_size: u32,
    page_index: u32,
}

impl PageWindow {
    /// `page_index` is zero based.
    pub fn new(page_size: u32, page_index: u32) -> Self {
        Self {
            page_size,
            page_index,
        }
    }
    pub fn page_size(&self) -> u32 {
        self.page_size
    }
    pub fn page_index(&self) -> u32 {
        self.page_index
    }
    /// Exclusive lower bound on `RowNumber`.
    pub fn row_start(&self) -> u64 {
        u64::from(self.page_size) * u64::from(self.page_index)
    }
    /// Exclusive upper bound on `RowNumber`.
    pub fn row_end(&self) -> u64 {
        self.row_start() + u64::from(self.page_size) + 1
    }
    pub fn wrap(&self, inner: StatementBuilder) -> CompiledStatement {
        let (text, params) = inner.into_parts();
        let sql = format!(
            "SELECT * FROM ( {} ) AS PagedResult WHERE RowNumber > {} AND RowNumber < {}",
            text.trim(),
            self.row_start(),
            self.row_end()
        );
        CompiledStatement::new(sql, params.into_vec())
    }
}

pub fn row_number_column(order_by: &str) -> String {
    format!("ROW_NUMBER() OVER (ORDER BY {}) AS RowNumber", order_by)
}

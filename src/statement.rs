//! Fluent construction of parameterized SQL text.
//!
//! Every value handed to a [`StatementBuilder`] is bound as a parameter and
//! referenced by name from the text, so user input never lands in the SQL.
//! A finished builder turns into an immutable [`CompiledStatement`].

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::fmt;

use crate::paging::PageWindow;
use crate::params::{BoundParameter, ParamRef, ParameterSet};
use crate::prefix::TablePrefixes;
use crate::value::Value;

lazy_static! {
    static ref PARAMETER_TOKEN: Regex = Regex::new(r"@[A-Za-z0-9_]+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Where the wildcard goes around a LIKE pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeMode {
    StartsWith,
    EndsWith,
    #[default]
    Contains,
}

impl LikeMode {
    pub fn decorate(&self, pattern: &str) -> String {
        match self {
            LikeMode::StartsWith => format!("{}%", pattern),
            LikeMode::EndsWith => format!("%{}", pattern),
            LikeMode::Contains => format!("%{}%", pattern),
        }
    }
}

// Clauses that continue with a comma when emitted back to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Clause {
    #[default]
    Other,
    Set,
    OrderBy,
}

#[derive(Debug, Clone, Default)]
pub struct StatementBuilder {
    text: String,
    params: ParameterSet,
    prefixes: Option<TablePrefixes>,
    clause: Clause,
}

impl StatementBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_prefixes(prefixes: TablePrefixes) -> Self {
        Self {
            prefixes: Some(prefixes),
            ..Self::default()
        }
    }
    pub fn sql(&self) -> &str {
        &self.text
    }
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }
    pub fn prefixes(&self) -> Option<&TablePrefixes> {
        self.prefixes.as_ref()
    }
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    // ------------- Text -------------

    fn push_spaced(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let needs_space = match (self.text.chars().last(), text.chars().next()) {
            (None, _) => false,
            (Some(last), Some(first)) => {
                !(last.is_whitespace() || first.is_whitespace() || first == ',')
            }
            (Some(_), None) => false,
        };
        if needs_space {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }
    /// Appends raw text, applying table prefix tokens when prefixes are set.
    pub fn append(&mut self, text: &str) -> &mut Self {
        self.clause = Clause::Other;
        match &self.prefixes {
            Some(prefixes) => {
                let substituted = prefixes.substitute(text).into_owned();
                self.push_spaced(&substituted);
            }
            None => self.push_spaced(text),
        }
        self
    }
    /// Emits `column op @param`, or the NULL form without any parameter.
    pub fn append_comparison(
        &mut self,
        column: &str,
        op: &str,
        value: impl Into<Value>,
        is_assignment: bool,
    ) -> &mut Self {
        let value = value.into();
        if value.is_null() {
            let null_form = if is_assignment { "= NULL" } else { "IS NULL" };
            return self.append(&format!("{} {}", column, null_form));
        }
        let param = self.params.add_temp(value, column);
        self.append(&format!("{} {} {}", column, op, param))
    }
    pub fn add_named_parameter(&mut self, name: &str, value: impl Into<Value>) -> ParamRef {
        self.params.add_named(name, value)
    }
    pub fn add_temp_parameter(&mut self, value: impl Into<Value>, hint: &str) -> ParamRef {
        self.params.add_temp(value, hint)
    }
    /// Imports the text and parameters of another builder. Prefix tokens left
    /// in the imported text are substituted with this builder's prefixes.
    pub fn merge(&mut self, other: StatementBuilder) -> &mut Self {
        self.clause = Clause::Other;
        let text = match &self.prefixes {
            Some(prefixes) => prefixes.substitute(other.text.trim()).into_owned(),
            None => other.text.trim().to_string(),
        };
        self.push_spaced(&text);
        self.params.extend(other.params);
        self
    }

    // ------------- Structure -------------

    pub fn select(&mut self, columns: &[&str]) -> &mut Self {
        self.append(&format!("SELECT {}", column_list(columns)))
    }
    pub fn select_distinct(&mut self, columns: &[&str]) -> &mut Self {
        self.append(&format!("SELECT DISTINCT {}", column_list(columns)))
    }
    pub fn from(&mut self, table: &str) -> &mut Self {
        self.append(&format!("FROM {}", table))
    }
    pub fn insert_into(&mut self, table: &str, assignments: &[(&str, Value)]) -> &mut Self {
        let columns: Vec<&str> = assignments.iter().map(|(c, _)| *c).collect();
        let refs: Vec<String> = assignments
            .iter()
            .map(|(c, v)| self.params.add_temp(v.clone(), c).to_string())
            .collect();
        self.append(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            refs.join(", ")
        ))
    }
    pub fn update(&mut self, table: &str) -> &mut Self {
        self.append(&format!("UPDATE {}", table))
    }
    /// Emits `SET column = @param`, continuing with a comma after another `set`.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        let lead = if self.clause == Clause::Set { "," } else { "SET" };
        self.append(lead);
        self.append_comparison(column, "=", value, true);
        self.clause = Clause::Set;
        self
    }
    pub fn delete_from(&mut self, table: &str) -> &mut Self {
        self.append(&format!("DELETE FROM {}", table))
    }
    pub fn where_(&mut self, column: &str, op: &str, value: impl Into<Value>) -> &mut Self {
        self.append("WHERE").append_comparison(column, op, value, false)
    }
    pub fn and(&mut self, column: &str, op: &str, value: impl Into<Value>) -> &mut Self {
        self.append("AND").append_comparison(column, op, value, false)
    }
    pub fn or(&mut self, column: &str, op: &str, value: impl Into<Value>) -> &mut Self {
        self.append("OR").append_comparison(column, op, value, false)
    }
    pub fn where_raw(&mut self, text: &str) -> &mut Self {
        self.append("WHERE").append(text)
    }
    pub fn and_raw(&mut self, text: &str) -> &mut Self {
        self.append("AND").append(text)
    }
    pub fn or_raw(&mut self, text: &str) -> &mut Self {
        self.append("OR").append(text)
    }
    pub fn inner_join(&mut self, table: &str) -> &mut Self {
        self.append(&format!("INNER JOIN {}", table))
    }
    pub fn left_join(&mut self, table: &str) -> &mut Self {
        self.append(&format!("LEFT JOIN {}", table))
    }
    /// Column-to-column join condition.
    pub fn on(&mut self, left: &str, op: &str, right: &str) -> &mut Self {
        self.append(&format!("ON {} {} {}", left, op, right))
    }
    pub fn on_value(&mut self, column: &str, op: &str, value: impl Into<Value>) -> &mut Self {
        self.append("ON").append_comparison(column, op, value, false)
    }
    pub fn order_by(&mut self, column: &str, order: SortOrder) -> &mut Self {
        let lead = if self.clause == Clause::OrderBy { "," } else { "ORDER BY" };
        self.append(lead);
        self.append(&format!("{} {}", column, order.keyword()));
        self.clause = Clause::OrderBy;
        self
    }
    pub fn group_by(&mut self, columns: &[&str]) -> &mut Self {
        self.append(&format!("GROUP BY {}", columns.join(", ")))
    }
    pub fn open_group(&mut self) -> &mut Self {
        self.append("(")
    }
    pub fn close_group(&mut self) -> &mut Self {
        self.append(")")
    }

    // ------------- Predicates -------------

    pub fn equal_to(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.append_comparison(column, "=", value, false)
    }
    pub fn not_equal_to(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        if value.is_null() {
            return self.is_not_null(column);
        }
        self.append_comparison(column, "<>", value, false)
    }
    pub fn greater_than(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.append_comparison(column, ">", value, false)
    }
    pub fn greater_or_equal(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.append_comparison(column, ">=", value, false)
    }
    pub fn less_than(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.append_comparison(column, "<", value, false)
    }
    pub fn less_or_equal(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.append_comparison(column, "<=", value, false)
    }
    /// LIKE predicate. In full-text mode every whitespace separated word must
    /// occur somewhere in the column.
    pub fn like(&mut self, column: &str, pattern: &str, mode: LikeMode, full_text: bool) -> &mut Self {
        if !full_text {
            return self.append_comparison(column, "LIKE", mode.decorate(pattern), false);
        }
        let words: Vec<&str> = pattern.split_whitespace().collect();
        if words.is_empty() {
            return self.append_comparison(column, "LIKE", "%%", false);
        }
        self.open_group();
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                self.append("AND");
            }
            self.append_comparison(column, "LIKE", LikeMode::Contains.decorate(word), false);
        }
        self.close_group()
    }
    /// Membership test; an empty list matches nothing.
    pub fn in_list<V: Into<Value>>(&mut self, column: &str, values: impl IntoIterator<Item = V>) -> &mut Self {
        let refs: Vec<String> = values
            .into_iter()
            .map(|v| self.params.add_temp(v, column).to_string())
            .collect();
        if refs.is_empty() {
            return self.append("1 = 0");
        }
        self.append(&format!("{} IN ({})", column, refs.join(", ")))
    }
    pub fn in_subquery(&mut self, column: &str, subquery: StatementBuilder) -> &mut Self {
        self.append(&format!("{} IN (", column));
        self.merge(subquery);
        self.append(")")
    }
    pub fn between(&mut self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> &mut Self {
        let low = self.params.add_temp(low, column);
        let high = self.params.add_temp(high, column);
        self.append(&format!("{} BETWEEN {} AND {}", column, low, high))
    }
    pub fn is_null(&mut self, column: &str) -> &mut Self {
        self.append(&format!("{} IS NULL", column))
    }
    pub fn is_not_null(&mut self, column: &str) -> &mut Self {
        self.append(&format!("{} IS NOT NULL", column))
    }

    // ------------- Finishing -------------

    pub fn debug_sql(&self) -> String {
        inline_parameters(&self.text, self.params.as_slice())
    }
    pub fn build(self) -> CompiledStatement {
        CompiledStatement {
            sql: self.text.trim().to_string(),
            params: self.params.into_vec(),
        }
    }
    /// Wraps the statement so that only one page of rows comes back.
    pub fn paged(self, page_size: u32, page_index: u32) -> CompiledStatement {
        PageWindow::new(page_size, page_index).wrap(self)
    }
    pub(crate) fn into_parts(self) -> (String, ParameterSet) {
        (self.text, self.params)
    }
}

impl fmt::Display for StatementBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

fn column_list(columns: &[&str]) -> String {
    if columns.is_empty() {
        String::from("*")
    } else {
        columns.join(", ")
    }
}

// Tokens are matched whole, so @p_1 can never clobber part of @p_10.
fn inline_parameters(sql: &str, params: &[BoundParameter]) -> String {
    PARAMETER_TOKEN
        .replace_all(sql, |caps: &Captures| {
            let token = &caps[0];
            params
                .iter()
                .find(|p| p.name() == token)
                .map(|p| p.value().to_sql_literal())
                .unwrap_or_else(|| token.to_string())
        })
        .into_owned()
}

/// Finished SQL text with its ordered parameters, ready for one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    sql: String,
    params: Vec<BoundParameter>,
}

impl CompiledStatement {
    pub(crate) fn new(sql: String, params: Vec<BoundParameter>) -> Self {
        Self { sql, params }
    }
    pub fn sql(&self) -> &str {
        &self.sql
    }
    pub fn params(&self) -> &[BoundParameter] {
        &self.params
    }
    /// The SQL with every parameter inlined as a literal. Never execute it.
    pub fn debug_sql(&self) -> String {
        inline_parameters(&self.sql, &self.params)
    }
    pub fn into_parts(self) -> (String, Vec<BoundParameter>) {
        (self.sql, self.params)
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

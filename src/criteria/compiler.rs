use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::fmt;

use super::field::FieldCriteria;
use crate::error::{Error, Result};
use crate::statement::StatementBuilder;
use crate::value::Value;

lazy_static! {
    static ref POSITIONAL_ARGUMENT: Regex = Regex::new(r"\{(\d+)\}").unwrap();
}

#[derive(Debug, Clone)]
pub enum CriteriaToken {
    OpenGroup,
    CloseGroup,
    And,
    Or,
    Field(FieldCriteria),
    /// Raw SQL, emitted verbatim and never escaped.
    Literal(String),
}

/// An ordered stack of criteria tokens, compiled left to right.
///
/// Ordering and the record limit are carried along for the caller; `compile`
/// does not apply them.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    tokens: Vec<CriteriaToken>,
    order_by: Vec<String>,
    max_records: Option<u32>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn tokens(&self) -> &[CriteriaToken] {
        &self.tokens
    }
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
    pub fn begin_group(&mut self) -> &mut Self {
        self.tokens.push(CriteriaToken::OpenGroup);
        self
    }
    pub fn end_group(&mut self) -> &mut Self {
        self.tokens.push(CriteriaToken::CloseGroup);
        self
    }
    pub fn and(&mut self) -> &mut Self {
        self.tokens.push(CriteriaToken::And);
        self
    }
    pub fn or(&mut self) -> &mut Self {
        self.tokens.push(CriteriaToken::Or);
        self
    }
    pub fn literal(&mut self, text: &str) -> &mut Self {
        self.tokens.push(CriteriaToken::Literal(text.to_string()));
        self
    }
    /// Pushes a literal with `{0}`, `{1}`, ... replaced by the arguments.
    pub fn literal_with(&mut self, template: &str, args: &[&dyn fmt::Display]) -> &mut Self {
        let text = POSITIONAL_ARGUMENT.replace_all(template, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| args.get(i))
                .map(|arg| arg.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        });
        self.literal(&text)
    }
    pub fn push(&mut self, field: FieldCriteria) -> &mut Self {
        self.tokens.push(CriteriaToken::Field(field));
        self
    }

    pub fn equal_to(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.push(FieldCriteria::new(field).equal_to(value))
    }
    pub fn not_equal_to(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.push(FieldCriteria::new(field).not_equal_to(value))
    }
    pub fn greater_than(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.push(FieldCriteria::new(field).greater_than(value))
    }
    pub fn greater_or_equal(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.push(FieldCriteria::new(field).greater_or_equal(value))
    }
    pub fn less_than(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.push(FieldCriteria::new(field).less_than(value))
    }
    pub fn less_or_equal(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.push(FieldCriteria::new(field).less_or_equal(value))
    }
    pub fn starts_with(&mut self, field: &str, pattern: &str) -> &mut Self {
        self.push(FieldCriteria::new(field).starts_with(pattern))
    }
    pub fn ends_with(&mut self, field: &str, pattern: &str) -> &mut Self {
        self.push(FieldCriteria::new(field).ends_with(pattern))
    }
    pub fn like(&mut self, field: &str, pattern: &str, full_text: bool) -> &mut Self {
        self.push(FieldCriteria::new(field).like(pattern, full_text))
    }
    pub fn in_list<V: Into<Value>>(&mut self, field: &str, values: impl IntoIterator<Item = V>) -> &mut Self {
        self.push(FieldCriteria::new(field).in_list(values))
    }
    pub fn in_subquery(&mut self, field: &str, subquery: StatementBuilder) -> &mut Self {
        self.push(FieldCriteria::new(field).in_subquery(subquery))
    }
    pub fn between(&mut self, field: &str, low: impl Into<Value>, high: impl Into<Value>) -> &mut Self {
        self.push(FieldCriteria::new(field).between(low, high))
    }
    pub fn is_null(&mut self, field: &str) -> &mut Self {
        self.push(FieldCriteria::new(field).is_null())
    }
    pub fn is_not_null(&mut self, field: &str) -> &mut Self {
        self.push(FieldCriteria::new(field).is_not_null())
    }

    fn add_fields(&mut self, fields: impl IntoIterator<Item = FieldCriteria>, conjunction: CriteriaToken) -> &mut Self {
        let mut first = true;
        for field in fields.into_iter().filter(|f| !f.is_empty()) {
            if !first {
                self.tokens.push(conjunction.clone());
            }
            self.tokens.push(CriteriaToken::Field(field));
            first = false;
        }
        self
    }
    /// ANDs the non-empty fields together.
    pub fn add_fields_match_all(&mut self, fields: impl IntoIterator<Item = FieldCriteria>) -> &mut Self {
        self.add_fields(fields, CriteriaToken::And)
    }
    /// ORs the non-empty fields together.
    pub fn add_fields_match_one(&mut self, fields: impl IntoIterator<Item = FieldCriteria>) -> &mut Self {
        self.add_fields(fields, CriteriaToken::Or)
    }

    pub fn add_order_by(&mut self, expression: &str) -> &mut Self {
        self.order_by.push(expression.to_string());
        self
    }
    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }
    pub fn order_by_clause(&self) -> Option<String> {
        if self.order_by.is_empty() {
            None
        } else {
            Some(format!("ORDER BY {}", self.order_by.join(", ")))
        }
    }
    pub fn set_max_records(&mut self, max_records: u32) -> &mut Self {
        self.max_records = Some(max_records);
        self
    }
    pub fn max_records(&self) -> Option<u32> {
        self.max_records
    }

    /// Appends the predicate text for every token to `target`. Group balance
    /// is not checked here, see [`Criteria::validate`].
    pub fn compile(&self, target: &mut StatementBuilder) {
        for token in &self.tokens {
            match token {
                CriteriaToken::OpenGroup => {
                    target.open_group();
                }
                CriteriaToken::CloseGroup => {
                    target.close_group();
                }
                CriteriaToken::And => {
                    target.append("AND");
                }
                CriteriaToken::Or => {
                    target.append("OR");
                }
                CriteriaToken::Field(field) => field.generate_sql(target),
                CriteriaToken::Literal(text) => {
                    target.append(text);
                }
            }
        }
    }

    /// Checks group balance and conjunction placement. Empty fields are
    /// ignored as they compile to nothing.
    pub fn validate(&self) -> Result<()> {
        #[derive(PartialEq)]
        enum Previous {
            Start,
            Open,
            Operand,
            Conjunction,
        }
        let mut depth = 0usize;
        let mut previous = Previous::Start;
        for (position, token) in self.tokens.iter().enumerate() {
            match token {
                CriteriaToken::OpenGroup => {
                    depth += 1;
                    previous = Previous::Open;
                }
                CriteriaToken::CloseGroup => {
                    if depth == 0 {
                        return Err(Error::Criteria(format!(
                            "group closed at token {} was never opened",
                            position
                        )));
                    }
                    match previous {
                        Previous::Conjunction => {
                            return Err(Error::Criteria(format!(
                                "dangling conjunction before token {}",
                                position
                            )));
                        }
                        Previous::Open => {
                            return Err(Error::Criteria(format!(
                                "empty group closed at token {}",
                                position
                            )));
                        }
                        _ => {}
                    }
                    depth -= 1;
                    previous = Previous::Operand;
                }
                CriteriaToken::And | CriteriaToken::Or => {
                    if previous != Previous::Operand {
                        return Err(Error::Criteria(format!(
                            "conjunction at token {} has no left operand",
                            position
                        )));
                    }
                    previous = Previous::Conjunction;
                }
                CriteriaToken::Field(field) if field.is_empty() => {}
                CriteriaToken::Field(_) | CriteriaToken::Literal(_) => previous = Previous::Operand,
            }
        }
        if depth > 0 {
            return Err(Error::Criteria(format!("{} group(s) left open", depth)));
        }
        if previous == Previous::Conjunction {
            return Err(Error::Criteria(String::from("criteria ends with a conjunction")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_with_substitutes_positions() {
        let mut c = Criteria::new();
        c.literal_with("Score > {0} AND Level = {1} {2}", &[&10, &"'x'"]);
        match &c.tokens()[0] {
            CriteriaToken::Literal(text) => assert_eq!(text, "Score > 10 AND Level = 'x' {2}"),
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn all_empty_fields_push_nothing() {
        let mut c = Criteria::new();
        c.add_fields_match_one(vec![FieldCriteria::new("A"), FieldCriteria::new("B")]);
        assert!(c.is_empty());
    }

    #[test]
    fn validate_reports_imbalance() {
        let mut c = Criteria::new();
        c.begin_group().equal_to("A", 1);
        assert!(matches!(c.validate(), Err(Error::Criteria(_))));

        let mut c = Criteria::new();
        c.equal_to("A", 1).and();
        assert!(c.validate().is_err());

        let mut c = Criteria::new();
        c.end_group();
        assert!(c.validate().is_err());

        let mut c = Criteria::new();
        c.begin_group().equal_to("A", 1).or().literal("B = 2").end_group();
        assert!(c.validate().is_ok());
    }

    #[test]
    fn order_by_is_carried_not_applied() {
        let mut c = Criteria::new();
        c.equal_to("A", 1).add_order_by("A DESC").add_order_by("B").set_max_records(5);
        let mut b = StatementBuilder::new();
        c.compile(&mut b);
        assert!(!b.sql().contains("ORDER BY"));
        assert_eq!(c.order_by_clause().as_deref(), Some("ORDER BY A DESC, B"));
        assert_eq!(c.max_records(), Some(5));
    }
}

use crate::statement::{LikeMode, StatementBuilder};
use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Comparison {
    Equal(Value),
    NotEqual(Value),
    GreaterThan(Value),
    GreaterOrEqual(Value),
    LessThan(Value),
    LessOrEqual(Value),
    Like {
        pattern: String,
        mode: LikeMode,
        full_text: bool,
    },
    InList(Vec<Value>),
    InSubquery(StatementBuilder),
    Between(Value, Value),
    IsNull,
    IsNotNull,
}

/// A predicate on one column. At most one comparison is active; setting
/// another replaces it. A criteria without a comparison emits nothing.
#[derive(Debug, Clone)]
pub struct FieldCriteria {
    field: String,
    comparison: Option<Comparison>,
}

impl FieldCriteria {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            comparison: None,
        }
    }
    pub fn field(&self) -> &str {
        &self.field
    }
    pub fn comparison(&self) -> Option<&Comparison> {
        self.comparison.as_ref()
    }
    pub fn is_empty(&self) -> bool {
        self.comparison.is_none()
    }
    pub fn clear(&mut self) {
        self.comparison = None;
    }
    fn with(mut self, comparison: Comparison) -> Self {
        self.comparison = Some(comparison);
        self
    }
    pub fn equal_to(self, value: impl Into<Value>) -> Self {
        self.with(Comparison::Equal(value.into()))
    }
    pub fn not_equal_to(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            self.with(Comparison::IsNotNull)
        } else {
            self.with(Comparison::NotEqual(value))
        }
    }
    pub fn greater_than(self, value: impl Into<Value>) -> Self {
        self.with(Comparison::GreaterThan(value.into()))
    }
    pub fn greater_or_equal(self, value: impl Into<Value>) -> Self {
        self.with(Comparison::GreaterOrEqual(value.into()))
    }
    pub fn less_than(self, value: impl Into<Value>) -> Self {
        self.with(Comparison::LessThan(value.into()))
    }
    pub fn less_or_equal(self, value: impl Into<Value>) -> Self {
        self.with(Comparison::LessOrEqual(value.into()))
    }
    pub fn starts_with(self, pattern: &str) -> Self {
        self.like_mode(pattern, LikeMode::StartsWith, false)
    }
    pub fn ends_with(self, pattern: &str) -> Self {
        self.like_mode(pattern, LikeMode::EndsWith, false)
    }
    pub fn like(self, pattern: &str, full_text: bool) -> Self {
        self.like_mode(pattern, LikeMode::Contains, full_text)
    }
    pub fn like_mode(self, pattern: &str, mode: LikeMode, full_text: bool) -> Self {
        self.with(Comparison::Like {
            pattern: pattern.to_string(),
            mode,
            full_text,
        })
    }
    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Self {
        self.with(Comparison::InList(values.into_iter().map(Into::into).collect()))
    }
    pub fn in_subquery(self, subquery: StatementBuilder) -> Self {
        self.with(Comparison::InSubquery(subquery))
    }
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.with(Comparison::Between(low.into(), high.into()))
    }
    pub fn is_null(self) -> Self {
        self.with(Comparison::IsNull)
    }
    pub fn is_not_null(self) -> Self {
        self.with(Comparison::IsNotNull)
    }

    pub fn generate_sql(&self, target: &mut StatementBuilder) {
        let field = self.field.as_str();
        let comparison = match &self.comparison {
            Some(comparison) => comparison,
            None => return,
        };
        match comparison {
            Comparison::Equal(v) => target.equal_to(field, v.clone()),
            Comparison::NotEqual(v) => target.not_equal_to(field, v.clone()),
            Comparison::GreaterThan(v) => target.greater_than(field, v.clone()),
            Comparison::GreaterOrEqual(v) => target.greater_or_equal(field, v.clone()),
            Comparison::LessThan(v) => target.less_than(field, v.clone()),
            Comparison::LessOrEqual(v) => target.less_or_equal(field, v.clone()),
            Comparison::Like {
                pattern,
                mode,
                full_text,
            } => target.like(field, pattern, *mode, *full_text),
            Comparison::InList(values) => target.in_list(field, values.iter().cloned()),
            Comparison::InSubquery(subquery) => target.in_subquery(field, subquery.clone()),
            Comparison::Between(low, high) => target.between(field, low.clone(), high.clone()),
            Comparison::IsNull => target.is_null(field),
            Comparison::IsNotNull => target.is_not_null(field),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_comparison_wins() {
        let f = FieldCriteria::new("Age").equal_to(3).greater_than(5);
        assert!(matches!(f.comparison(), Some(Comparison::GreaterThan(Value::Int(5)))));
    }

    #[test]
    fn not_equal_to_null_means_not_null() {
        let f = FieldCriteria::new("Email").not_equal_to(Value::Null);
        let mut b = StatementBuilder::new();
        f.generate_sql(&mut b);
        assert_eq!(b.sql(), "Email IS NOT NULL");
    }

    #[test]
    fn empty_criteria_emits_nothing() {
        let f = FieldCriteria::new("Age");
        assert!(f.is_empty());
        let mut b = StatementBuilder::new();
        f.generate_sql(&mut b);
        assert!(b.is_empty());
        assert!(b.params().is_empty());
    }

    #[test]
    fn starts_with_decorates_pattern() {
        let mut b = StatementBuilder::new();
        FieldCriteria::new("Name").starts_with("Jo").generate_sql(&mut b);
        let param = b.params().iter().next().unwrap();
        assert_eq!(param.value(), &Value::from("Jo%"));
    }
}

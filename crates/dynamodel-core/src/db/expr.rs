//! Conditions, key conditions and update actions, generic over the value
//! representation so the same shapes carry native values above the store
//! boundary and wire values below it.

use crate::value::{AttributeValue, Value};
use derive_more::Display;
use std::collections::BTreeMap;

pub type WireCondition = Condition<AttributeValue>;
pub type WireKeyCondition = KeyCondition<AttributeValue>;
pub type WireUpdateAction = UpdateAction<AttributeValue>;

///
/// Comparison
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Comparison {
    #[display("=")]
    Eq,
    #[display("<>")]
    Ne,
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
}

impl Comparison {
    #[must_use]
    pub const fn accepts(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};

        match self {
            Self::Eq => matches!(ord, Equal),
            Self::Ne => !matches!(ord, Equal),
            Self::Lt => matches!(ord, Less),
            Self::Le => matches!(ord, Less | Equal),
            Self::Gt => matches!(ord, Greater),
            Self::Ge => matches!(ord, Greater | Equal),
        }
    }
}

///
/// Condition
/// Boolean condition over item attributes (filters, conditional writes).
///

#[derive(Clone, Debug, PartialEq)]
pub enum Condition<V = Value> {
    Compare {
        field: String,
        op: Comparison,
        value: V,
    },
    Between {
        field: String,
        low: V,
        high: V,
    },
    BeginsWith {
        field: String,
        prefix: V,
    },
    Contains {
        field: String,
        value: V,
    },
    Exists(String),
    NotExists(String),
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
}

impl<V> Condition<V> {
    fn compare(field: impl Into<String>, op: Comparison, value: impl Into<V>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<V>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<V>) -> Self {
        Self::compare(field, Comparison::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<V>) -> Self {
        Self::compare(field, Comparison::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<V>) -> Self {
        Self::compare(field, Comparison::Le, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<V>) -> Self {
        Self::compare(field, Comparison::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<V>) -> Self {
        Self::compare(field, Comparison::Ge, value)
    }

    pub fn between(field: impl Into<String>, low: impl Into<V>, high: impl Into<V>) -> Self {
        Self::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn begins_with(field: impl Into<String>, prefix: impl Into<V>) -> Self {
        Self::BeginsWith {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    pub fn contains(field: impl Into<String>, value: impl Into<V>) -> Self {
        Self::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists(field.into())
    }

    pub fn not_exists(field: impl Into<String>) -> Self {
        Self::NotExists(field.into())
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    #[must_use]
    #[expect(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Fold a list of conditions into one conjunction.
    pub fn all(conditions: impl IntoIterator<Item = Self>) -> Option<Self> {
        conditions.into_iter().reduce(Self::and)
    }

    /// Convert every carried value, with the field it applies to.
    pub fn try_map<W, E, F>(&self, f: &mut F) -> Result<Condition<W>, E>
    where
        F: FnMut(&str, &V) -> Result<W, E>,
    {
        let mapped = match self {
            Self::Compare { field, op, value } => Condition::Compare {
                field: field.clone(),
                op: *op,
                value: f(field, value)?,
            },
            Self::Between { field, low, high } => Condition::Between {
                field: field.clone(),
                low: f(field, low)?,
                high: f(field, high)?,
            },
            Self::BeginsWith { field, prefix } => Condition::BeginsWith {
                field: field.clone(),
                prefix: f(field, prefix)?,
            },
            Self::Contains { field, value } => Condition::Contains {
                field: field.clone(),
                value: f(field, value)?,
            },
            Self::Exists(field) => Condition::Exists(field.clone()),
            Self::NotExists(field) => Condition::NotExists(field.clone()),
            Self::And(all) => Condition::And(
                all.iter()
                    .map(|c| c.try_map(f))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Self::Or(any) => Condition::Or(
                any.iter()
                    .map(|c| c.try_map(f))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Self::Not(inner) => Condition::Not(Box::new(inner.try_map(f)?)),
        };

        Ok(mapped)
    }
}

///
/// RangeCondition
/// Condition on a range key; the subset of comparisons a key condition allows.
///

#[derive(Clone, Debug, PartialEq)]
pub enum RangeCondition<V = Value> {
    Eq(V),
    Lt(V),
    Le(V),
    Gt(V),
    Ge(V),
    Between(V, V),
    BeginsWith(V),
}

impl<V> RangeCondition<V> {
    pub fn try_map<W, E>(
        &self,
        mut f: impl FnMut(&V) -> Result<W, E>,
    ) -> Result<RangeCondition<W>, E> {
        let mapped = match self {
            Self::Eq(v) => RangeCondition::Eq(f(v)?),
            Self::Lt(v) => RangeCondition::Lt(f(v)?),
            Self::Le(v) => RangeCondition::Le(f(v)?),
            Self::Gt(v) => RangeCondition::Gt(f(v)?),
            Self::Ge(v) => RangeCondition::Ge(f(v)?),
            Self::Between(low, high) => RangeCondition::Between(f(low)?, f(high)?),
            Self::BeginsWith(v) => RangeCondition::BeginsWith(f(v)?),
        };

        Ok(mapped)
    }

    /// Equivalent filter condition on `field`.
    pub fn into_condition(self, field: impl Into<String>) -> Condition<V> {
        let field = field.into();
        match self {
            Self::Eq(v) => Condition::eq(field, v),
            Self::Lt(v) => Condition::lt(field, v),
            Self::Le(v) => Condition::le(field, v),
            Self::Gt(v) => Condition::gt(field, v),
            Self::Ge(v) => Condition::ge(field, v),
            Self::Between(low, high) => Condition::between(field, low, high),
            Self::BeginsWith(v) => Condition::begins_with(field, v),
        }
    }
}

///
/// KeyCondition
/// Equality on the hash key plus an optional range-key condition.
///

#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition<V = Value> {
    pub hash: (String, V),
    pub range: Option<(String, RangeCondition<V>)>,
}

impl<V> KeyCondition<V> {
    pub fn try_map<W, E>(
        &self,
        mut f: impl FnMut(&str, &V) -> Result<W, E>,
    ) -> Result<KeyCondition<W>, E> {
        let (hash_name, hash_value) = &self.hash;
        let hash = (hash_name.clone(), f(hash_name, hash_value)?);

        let range = match &self.range {
            Some((name, cond)) => Some((name.clone(), cond.try_map(|v| f(name, v))?)),
            None => None,
        };

        Ok(KeyCondition { hash, range })
    }
}

///
/// UpdateAction
///

#[derive(Clone, Debug, PartialEq)]
pub enum UpdateAction<V = Value> {
    /// Assign a value.
    Set(String, V),
    /// Delete the attribute.
    Remove(String),
    /// Numeric increment, or set union for set values.
    Add(String, V),
}

impl<V> UpdateAction<V> {
    pub fn set(field: impl Into<String>, value: impl Into<V>) -> Self {
        Self::Set(field.into(), value.into())
    }

    pub fn remove(field: impl Into<String>) -> Self {
        Self::Remove(field.into())
    }

    pub fn add(field: impl Into<String>, value: impl Into<V>) -> Self {
        Self::Add(field.into(), value.into())
    }

    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Set(field, _) | Self::Remove(field) | Self::Add(field, _) => field,
        }
    }

    pub fn try_map<W, E>(
        &self,
        mut f: impl FnMut(&str, &V) -> Result<W, E>,
    ) -> Result<UpdateAction<W>, E> {
        let mapped = match self {
            Self::Set(field, v) => UpdateAction::Set(field.clone(), f(field, v)?),
            Self::Remove(field) => UpdateAction::Remove(field.clone()),
            Self::Add(field, v) => UpdateAction::Add(field.clone(), f(field, v)?),
        };

        Ok(mapped)
    }
}

///
/// Expression
///
/// Rendered expression text with its placeholder tables, in the shape a
/// remote store expects (`#n0` for names, `:v0` for values).
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Expression {
    pub text: String,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, AttributeValue>,
}

///
/// ExpressionBuilder
///
/// Placeholder allocator shared by every expression of one request, so a
/// key condition and a filter never reuse a placeholder.
///

#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    names: BTreeMap<String, String>,
    by_field: BTreeMap<String, String>,
    values: BTreeMap<String, AttributeValue>,
}

impl ExpressionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn name(&mut self, field: &str) -> String {
        if let Some(placeholder) = self.by_field.get(field) {
            return placeholder.clone();
        }

        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), field.to_string());
        self.by_field.insert(field.to_string(), placeholder.clone());

        placeholder
    }

    fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());

        placeholder
    }

    pub fn condition(&mut self, condition: &WireCondition) -> String {
        match condition {
            Condition::Compare { field, op, value } => {
                let (n, v) = (self.name(field), self.value(value));
                format!("{n} {op} {v}")
            }
            Condition::Between { field, low, high } => {
                let n = self.name(field);
                let (lo, hi) = (self.value(low), self.value(high));
                format!("{n} BETWEEN {lo} AND {hi}")
            }
            Condition::BeginsWith { field, prefix } => {
                let (n, v) = (self.name(field), self.value(prefix));
                format!("begins_with({n}, {v})")
            }
            Condition::Contains { field, value } => {
                let (n, v) = (self.name(field), self.value(value));
                format!("contains({n}, {v})")
            }
            Condition::Exists(field) => format!("attribute_exists({})", self.name(field)),
            Condition::NotExists(field) => format!("attribute_not_exists({})", self.name(field)),
            Condition::And(all) => self.join(all, " AND "),
            Condition::Or(any) => self.join(any, " OR "),
            Condition::Not(inner) => format!("NOT ({})", self.condition(inner)),
        }
    }

    fn join(&mut self, parts: &[WireCondition], sep: &str) -> String {
        let rendered: Vec<String> = parts.iter().map(|c| self.condition(c)).collect();

        format!("({})", rendered.join(sep))
    }

    pub fn key_condition(&mut self, key: &WireKeyCondition) -> String {
        let (hash_name, hash_value) = &key.hash;
        let mut text = {
            let (n, v) = (self.name(hash_name), self.value(hash_value));
            format!("{n} = {v}")
        };

        if let Some((name, cond)) = &key.range {
            let rendered = self.condition(&cond.clone().into_condition(name.clone()));
            text.push_str(" AND ");
            text.push_str(&rendered);
        }

        text
    }

    pub fn update(&mut self, actions: &[WireUpdateAction]) -> String {
        let mut set = Vec::new();
        let mut remove = Vec::new();
        let mut add = Vec::new();

        for action in actions {
            match action {
                UpdateAction::Set(field, value) => {
                    let (n, v) = (self.name(field), self.value(value));
                    set.push(format!("{n} = {v}"));
                }
                UpdateAction::Remove(field) => remove.push(self.name(field)),
                UpdateAction::Add(field, value) => {
                    let (n, v) = (self.name(field), self.value(value));
                    add.push(format!("{n} {v}"));
                }
            }
        }

        let mut clauses = Vec::new();
        if !set.is_empty() {
            clauses.push(format!("SET {}", set.join(", ")));
        }
        if !remove.is_empty() {
            clauses.push(format!("REMOVE {}", remove.join(", ")));
        }
        if !add.is_empty() {
            clauses.push(format!("ADD {}", add.join(", ")));
        }

        clauses.join(" ")
    }

    /// Finish with the given text, handing over the placeholder tables.
    #[must_use]
    pub fn finish(self, text: String) -> Expression {
        Expression {
            text,
            names: self.names,
            values: self.values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_string())
    }

    #[test]
    fn key_condition_renders_hash_then_range() {
        let key = WireKeyCondition {
            hash: ("foo".into(), s("first")),
            range: Some(("bar".into(), RangeCondition::BeginsWith(s("a")))),
        };

        let mut b = ExpressionBuilder::new();
        let text = b.key_condition(&key);
        let expr = b.finish(text);

        assert_eq!(expr.text, "#n0 = :v0 AND begins_with(#n1, :v1)");
        assert_eq!(expr.names["#n1"], "bar");
        assert_eq!(expr.values[":v0"], s("first"));
    }

    #[test]
    fn repeated_fields_share_a_name_placeholder() {
        let cond: WireCondition =
            Condition::gt("age", s("1")).and(Condition::lt("age", s("9")));

        let mut b = ExpressionBuilder::new();
        let text = b.condition(&cond);

        assert_eq!(text, "(#n0 > :v0 AND #n0 < :v1)");
    }

    #[test]
    fn update_groups_clauses() {
        let actions = vec![
            WireUpdateAction::set("a", s("x")),
            WireUpdateAction::remove("b"),
            WireUpdateAction::add("c", AttributeValue::N("1".into())),
            WireUpdateAction::set("d", s("y")),
        ];

        let mut b = ExpressionBuilder::new();
        let text = b.update(&actions);

        assert_eq!(text, "SET #n0 = :v0, #n3 = :v2 REMOVE #n1 ADD #n2 :v1");
    }

    #[test]
    fn unique_guard_renders_not_exists() {
        let cond: WireCondition = Condition::not_exists("id");
        let mut b = ExpressionBuilder::new();

        assert_eq!(b.condition(&cond), "attribute_not_exists(#n0)");
    }

    #[test]
    fn try_map_keeps_structure() {
        let cond: Condition = Condition::eq("a", 1).or(Condition::exists("b")).not();
        let mapped = cond
            .try_map(&mut |_, v: &Value| v.to_wire())
            .unwrap();

        assert_eq!(
            mapped,
            WireCondition::Not(Box::new(WireCondition::Or(vec![
                WireCondition::eq("a", AttributeValue::N("1".into())),
                WireCondition::exists("b"),
            ])))
        );
    }
}

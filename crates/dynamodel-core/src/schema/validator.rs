use crate::value::Value;
use std::fmt;

///
/// Validator
/// Check run against a coerced, present field value.
///

pub trait Validator: Send + Sync {
    fn validate(&self, value: &Value) -> Result<(), String>;
}

fn numeric(value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("{} is not numeric", value.label()))
}

// ============================================================================
// Comparison validators
// ============================================================================

macro_rules! cmp_validator {
    ($name:ident, $op:tt, $msg:expr) => {
        #[derive(Clone, Copy, Debug)]
        pub struct $name {
            target: f64,
        }

        impl $name {
            #[must_use]
            pub fn new(target: impl Into<f64>) -> Self {
                Self {
                    target: target.into(),
                }
            }
        }

        impl Validator for $name {
            fn validate(&self, value: &Value) -> Result<(), String> {
                let v = numeric(value)?;
                if v $op self.target {
                    Ok(())
                } else {
                    Err(format!($msg, v, self.target))
                }
            }
        }
    };
}

cmp_validator!(Lt, <,  "{} must be < {}");
cmp_validator!(Gt, >,  "{} must be > {}");
cmp_validator!(Lte, <=, "{} must be <= {}");
cmp_validator!(Gte, >=, "{} must be >= {}");

// ============================================================================
// Range
// ============================================================================

#[derive(Clone, Copy, Debug)]
pub struct Range {
    min: f64,
    max: f64,
}

impl Range {
    #[must_use]
    pub fn new(min: impl Into<f64>, max: impl Into<f64>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }
}

impl Validator for Range {
    fn validate(&self, value: &Value) -> Result<(), String> {
        if self.min > self.max {
            return Err("range requires min <= max".to_string());
        }

        let v = numeric(value)?;
        if v < self.min || v > self.max {
            Err(format!("{v} must be between {} and {}", self.min, self.max))
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Length
// ============================================================================

///
/// Length
/// Bounds the length of text (in chars), binary, list, map or set values.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct Length {
    min: Option<usize>,
    max: Option<usize>,
}

impl Length {
    #[must_use]
    pub const fn min(min: usize) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    #[must_use]
    pub const fn max(max: usize) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    #[must_use]
    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }
}

impl Validator for Length {
    fn validate(&self, value: &Value) -> Result<(), String> {
        let len = match value {
            Value::Text(s) => s.chars().count(),
            Value::Blob(b) => b.len(),
            Value::List(items) => items.len(),
            Value::Map(map) => map.len(),
            Value::TextSet(set) => set.len(),
            other => return Err(format!("{} has no length", other.label())),
        };

        if let Some(min) = self.min
            && len < min
        {
            return Err(format!("length {len} is shorter than {min}"));
        }
        if let Some(max) = self.max
            && len > max
        {
            return Err(format!("length {len} is longer than {max}"));
        }

        Ok(())
    }
}

// ============================================================================
// OneOf
// ============================================================================

#[derive(Clone, Debug)]
pub struct OneOf {
    choices: Vec<Value>,
}

impl OneOf {
    #[must_use]
    pub fn new<V: Into<Value>>(choices: impl IntoIterator<Item = V>) -> Self {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for OneOf {
    fn validate(&self, value: &Value) -> Result<(), String> {
        if self.choices.contains(value) {
            Ok(())
        } else {
            Err(format!("{value:?} is not one of {:?}", self.choices))
        }
    }
}

// ============================================================================
// Closure validators
// ============================================================================

///
/// FnValidator
///

pub struct FnValidator<F> {
    name: &'static str,
    check: F,
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FnValidator").field(&self.name).finish()
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Value) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<(), String> {
        (self.check)(value).map_err(|e| format!("{}: {e}", self.name))
    }
}

/// Wrap a closure as a named validator.
pub const fn validator_fn<F>(name: &'static str, check: F) -> FnValidator<F>
where
    F: Fn(&Value) -> Result<(), String> + Send + Sync,
{
    FnValidator { name, check }
}

// ============================================================================
// Tests
// ============================================================================

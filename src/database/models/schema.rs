use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::database::store::{Document, FieldError, StoreError};

/// Value shape of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// RFC 3339 string.
    Timestamp,
    /// UUID of a document in the named collection.
    Reference(&'static str),
    StringArray,
    TimestampArray,
    ReferenceArray(&'static str),
    Object,
    ObjectArray,
}

impl FieldType {
    fn label(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "Number",
            FieldType::Boolean => "Boolean",
            FieldType::Timestamp => "date",
            FieldType::Reference(_) => "ObjectId",
            FieldType::StringArray => "[string]",
            FieldType::TimestampArray => "[date]",
            FieldType::ReferenceArray(_) => "[ObjectId]",
            FieldType::Object => "Embedded",
            FieldType::ObjectArray => "[Embedded]",
        }
    }

    /// Coerces a filter value (usually a query-string string) to this field's scalar type.
    pub fn cast_scalar(&self, value: &Value) -> Option<Value> {
        match self {
            FieldType::Number => cast_number(value),
            FieldType::Boolean => cast_bool(value),
            FieldType::Reference(_) | FieldType::ReferenceArray(_) => cast_reference(value),
            FieldType::Timestamp | FieldType::TimestampArray => cast_timestamp(value),
            FieldType::String | FieldType::StringArray => cast_string(value),
            FieldType::Object | FieldType::ObjectArray => Some(value.clone()),
        }
    }
}

type Setter = fn(Value) -> Value;
type DefaultFn = fn() -> Value;
/// Rule that needs more than one field of the document.
pub type DocumentRule = fn(&Document) -> Option<FieldError>;

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldType,
    required: Option<String>,
    trim: bool,
    lowercase: bool,
    min_length: Option<(usize, Option<&'static str>)>,
    max_length: Option<(usize, Option<&'static str>)>,
    min: Option<(f64, Option<&'static str>)>,
    max: Option<(f64, Option<&'static str>)>,
    one_of: Option<(&'static [&'static str], Option<&'static str>)>,
    email: Option<&'static str>,
    default: Option<DefaultFn>,
    setter: Option<Setter>,
}

impl FieldRule {
    pub fn new(name: &'static str, kind: FieldType) -> Self {
        Self {
            name,
            kind,
            required: None,
            trim: false,
            lowercase: false,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            one_of: None,
            email: None,
            default: None,
            setter: None,
        }
    }

    pub fn string(name: &'static str) -> Self { Self::new(name, FieldType::String) }
    pub fn number(name: &'static str) -> Self { Self::new(name, FieldType::Number) }
    pub fn boolean(name: &'static str) -> Self { Self::new(name, FieldType::Boolean) }
    pub fn timestamp(name: &'static str) -> Self { Self::new(name, FieldType::Timestamp) }

    pub fn required(mut self, message: &'static str) -> Self {
        self.required = Some(message.to_string());
        self
    }

    pub fn required_default(mut self) -> Self {
        self.required = Some(format!("Path `{}` is required.", self.name));
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    pub fn min_length(mut self, len: usize, message: Option<&'static str>) -> Self {
        self.min_length = Some((len, message));
        self
    }

    pub fn max_length(mut self, len: usize, message: Option<&'static str>) -> Self {
        self.max_length = Some((len, message));
        self
    }

    pub fn min(mut self, min: f64, message: Option<&'static str>) -> Self {
        self.min = Some((min, message));
        self
    }

    pub fn max(mut self, max: f64, message: Option<&'static str>) -> Self {
        self.max = Some((max, message));
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str], message: Option<&'static str>) -> Self {
        self.one_of = Some((values, message));
        self
    }

    pub fn email(mut self, message: &'static str) -> Self {
        self.email = Some(message);
        self
    }

    pub fn default_value(mut self, default: DefaultFn) -> Self {
        self.default = Some(default);
        self
    }

    pub fn setter(mut self, setter: Setter) -> Self {
        self.setter = Some(setter);
        self
    }

    fn cast_message(&self, value: &Value) -> String {
        format!(
            "Cast to {} failed for value \"{}\" (type {}) at path \"{}\"",
            self.kind.label(),
            display(value),
            json_type(value),
            self.name
        )
    }

    /// Coerces `value` to the declared type and applies transforms.
    fn normalize(&self, value: Value) -> Result<Value, String> {
        let cast = match self.kind {
            FieldType::StringArray | FieldType::TimestampArray | FieldType::ReferenceArray(_) | FieldType::ObjectArray => {
                let items = match value {
                    Value::Array(items) => items,
                    single => vec![single],
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.kind.cast_scalar(&item).ok_or_else(|| self.cast_message(&item))?);
                }
                Value::Array(out)
            }
            FieldType::Object => match value {
                Value::Object(_) => value,
                other => return Err(self.cast_message(&other)),
            },
            _ => self.kind.cast_scalar(&value).ok_or_else(|| self.cast_message(&value))?,
        };

        let cast = match cast {
            Value::String(s) => {
                let s = if self.trim { s.trim().to_string() } else { s };
                let s = if self.lowercase { s.to_lowercase() } else { s };
                Value::String(s)
            }
            other => other,
        };

        Ok(match self.setter {
            Some(setter) => setter(cast),
            None => cast,
        })
    }

    fn check(&self, value: &Value, errors: &mut Vec<FieldError>) {
        let mut fail = |message: String| errors.push(FieldError::new(self.name, message));

        if let Value::String(s) = value {
            let len = s.chars().count();
            if let Some((min, message)) = self.min_length {
                if len < min {
                    fail(message.map(str::to_string).unwrap_or_else(|| format!(
                        "Path `{}` (`{}`, length {}) is shorter than the minimum allowed length ({}).",
                        self.name, s, len, min
                    )));
                }
            }
            if let Some((max, message)) = self.max_length {
                if len > max {
                    fail(message.map(str::to_string).unwrap_or_else(|| format!(
                        "Path `{}` (`{}`, length {}) is longer than the maximum allowed length ({}).",
                        self.name, s, len, max
                    )));
                }
            }
            if let Some((values, message)) = self.one_of {
                if !values.contains(&s.as_str()) {
                    fail(message.map(str::to_string).unwrap_or_else(|| format!(
                        "`{}` is not a valid enum value for path `{}`.",
                        s, self.name
                    )));
                }
            }
            if let Some(message) = self.email {
                if !looks_like_email(s) {
                    fail(message.to_string());
                }
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some((min, message)) = self.min {
                if n < min {
                    fail(message.map(str::to_string).unwrap_or_else(|| format!(
                        "Path `{}` ({}) is less than minimum allowed value ({}).",
                        self.name, n, min
                    )));
                }
            }
            if let Some((max, message)) = self.max {
                if n > max {
                    fail(message.map(str::to_string).unwrap_or_else(|| format!(
                        "Path `{}` ({}) is more than maximum allowed value ({}).",
                        self.name, n, max
                    )));
                }
            }
        }
    }
}

/// Declared fields of a collection plus cross-field rules.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldRule>,
    rules: Vec<DocumentRule>,
}

/// Keys the store manages itself; never stripped, never validated.
const SYSTEM_FIELDS: [&str; 2] = ["id", "__v"];

impl Schema {
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self { fields, rules: vec![] }
    }

    pub fn with_rule(mut self, rule: DocumentRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        if name == "id" {
            return Some(FieldType::Reference("self"));
        }
        self.field(name).map(|f| f.kind)
    }

    /// Normalizes `doc` in place and validates it.
    ///
    /// Undeclared keys are dropped, values are cast and transformed, defaults
    /// fill missing fields when `is_new`, then every rule runs. All failures
    /// are collected into one [`StoreError::Validation`].
    pub fn validate(&self, doc: &mut Document, is_new: bool) -> Result<(), StoreError> {
        doc.retain(|key, _| SYSTEM_FIELDS.contains(&key.as_str()) || self.field(key).is_some());

        let mut errors = Vec::new();

        for rule in &self.fields {
            let present = match doc.remove(rule.name) {
                Some(Value::Null) | None => None,
                Some(value) => match rule.normalize(value) {
                    Ok(v) => Some(v),
                    Err(message) => {
                        errors.push(FieldError::new(rule.name, message));
                        continue;
                    }
                },
            };

            let value = match (present, rule.default) {
                (Some(v), _) => Some(v),
                (None, Some(default)) if is_new => Some(default()),
                (None, _) => None,
            };

            match value {
                Some(v) if !is_blank(&v) || rule.required.is_none() => {
                    rule.check(&v, &mut errors);
                    doc.insert(rule.name.to_string(), v);
                }
                _ => {
                    if let Some(message) = &rule.required {
                        errors.push(FieldError::new(rule.name, message.clone()));
                    }
                }
            }
        }

        if errors.is_empty() {
            for rule in &self.rules {
                if let Some(error) = rule(doc) {
                    errors.push(error);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(errors))
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else { return false };
    !local.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
}

fn cast_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let n: f64 = s.trim().parse().ok()?;
            if !n.is_finite() {
                return None;
            }
            number_value(n)
        }
        Value::Bool(b) => Some(Value::from(u8::from(*b))),
        _ => None,
    }
}

/// Integral floats stay integers so `5` and `"5"` store identically.
pub fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Some(Value::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number)
    }
}

fn cast_bool(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) => match s.as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn cast_reference(value: &Value) -> Option<Value> {
    let s = value.as_str()?;
    Uuid::parse_str(s).ok().map(|id| Value::String(id.to_string()))
}

fn cast_timestamp(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Value::String(timestamp_string(dt.with_timezone(&Utc)))),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| Value::String(timestamp_string(dt))),
        _ => None,
    }
}

fn cast_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

/// Fixed-width UTC timestamps so lexical order equals chronological order.
pub fn timestamp_string(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn now_value() -> Value {
    Value::String(timestamp_string(Utc::now()))
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

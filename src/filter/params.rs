use std::collections::BTreeMap;

/// A query-string value: `price=5` or the bracket form `price[gte]=5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Nested(BTreeMap<String, String>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Single(s) => Some(s),
            ParamValue::Nested(_) => None,
        }
    }
}

/// Decoded query-string parameters keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: BTreeMap<String, ParamValue>,
}

impl QueryParams {
    pub fn parse(query: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            params.insert(key.into(), value.into());
        }
        params
    }

    /// Later keys win; bracket keys for the same field merge into one mapping.
    pub fn insert(&mut self, key: String, value: String) {
        match split_bracket_key(&key) {
            Some((field, op)) => {
                let entry = self
                    .values
                    .entry(field.to_string())
                    .or_insert_with(|| ParamValue::Nested(BTreeMap::new()));
                match entry {
                    ParamValue::Nested(map) => {
                        map.insert(op.to_string(), value);
                    }
                    ParamValue::Single(_) => {
                        *entry = ParamValue::Nested(BTreeMap::from([(op.to_string(), value)]));
                    }
                }
            }
            None => {
                self.values.insert(key, ParamValue::Single(value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(ParamValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }
}

fn split_bracket_key(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let inner = key[open + 1..].strip_suffix(']')?;
    let field = &key[..open];
    if field.is_empty() || inner.is_empty() || inner.contains('[') {
        return None;
    }
    Some((field, inner))
}

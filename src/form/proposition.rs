use serde_json::Value;

const LABEL_SEPARATOR: &str = ":::";

/// One selectable option of a choice-like widget.
#[derive(Clone, Debug, PartialEq)]
pub struct Proposition {
    pub value: Value,
    pub label: String,
}

impl Proposition {
    /// Build a proposition; an empty label falls back to the value's text.
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        let value = value.into();
        let label = label.into();
        let label = if label.is_empty() {
            display_value(&value)
        } else {
            label
        };
        Self { value, label }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Parse the JSON shapes accepted in scripts: `[value, label]`,
    /// `"value:::label"`, a number, a boolean or `{value, label}`.
    /// `null` entries yield `None` and are dropped by the caller.
    pub fn from_json(v: &Value) -> Option<Self> {
        match v {
            Value::Null => None,
            Value::Array(pair) => {
                let value = pair.first().cloned().unwrap_or(Value::Null);
                let label = pair
                    .get(1)
                    .filter(|l| !l.is_null())
                    .map(display_value)
                    .unwrap_or_default();
                Some(Self::new(value, label))
            }
            Value::String(s) => Some(Self::from(s.as_str())),
            Value::Object(map) => {
                let value = map.get("value").cloned().unwrap_or(Value::Null);
                let label = map.get("label").map(display_value).unwrap_or_default();
                Some(Self::new(value, label))
            }
            other => Some(Self::new(other.clone(), String::new())),
        }
    }
}

impl From<&str> for Proposition {
    fn from(s: &str) -> Self {
        match s.find(LABEL_SEPARATOR) {
            Some(pos) => {
                let value = &s[..pos];
                let label = &s[pos + LABEL_SEPARATOR.len()..];
                Self::new(value, label)
            }
            None => Self::new(s, s),
        }
    }
}

impl From<String> for Proposition {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

macro_rules! number_proposition {
    ($($t:ty),*) => {
        $(impl From<$t> for Proposition {
            fn from(n: $t) -> Self {
                Self::new(n, n.to_string())
            }
        })*
    };
}

number_proposition!(i32, i64, u32, u64, f64);

impl<V: Into<Value>, L: Into<String>> From<(V, L)> for Proposition {
    fn from((value, label): (V, L)) -> Self {
        Self::new(value, label)
    }
}

/// Normalize any mix of accepted shapes into propositions.
pub fn normalize<I, P>(props: I) -> Vec<Proposition>
where
    I: IntoIterator<Item = P>,
    P: Into<Proposition>,
{
    props.into_iter().map(Into::into).collect()
}

pub fn normalize_json(props: &[Value]) -> Vec<Proposition> {
    props.iter().filter_map(Proposition::from_json).collect()
}

/// Text shown for a value: strings verbatim, `null` empty, the rest as JSON.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

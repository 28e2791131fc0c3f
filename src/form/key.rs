use super::error::{FormError, FormResult};
use regex::Regex;
use std::sync::OnceLock;

fn key_pattern() -> &'static Regex {
    static KEY_RE: OnceLock<Regex> = OnceLock::new();
    KEY_RE.get_or_init(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("static key pattern"))
}

/// A variable key after decoding, with the mandatory marker split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKey {
    pub name: String,
    pub mandatory: bool,
}

/// Strip the leading `*` (mandatory sugar) and check the remaining key.
///
/// Duplicate detection needs the pass state and lives in the builder.
pub fn decode_key(raw: &str) -> FormResult<DecodedKey> {
    let (name, mandatory) = match raw.strip_prefix('*') {
        Some(rest) => (rest, true),
        None => (raw, false),
    };
    check_key(name)?;
    Ok(DecodedKey {
        name: name.to_string(),
        mandatory,
    })
}

/// Key syntax shared by variables and pages.
pub(crate) fn check_key(name: &str) -> FormResult<()> {
    if name.is_empty() {
        return Err(FormError::EmptyKey);
    }
    if !key_pattern().is_match(name) {
        return Err(FormError::InvalidKey(name.to_string()));
    }
    Ok(())
}

/// Host-owned identifier that keeps anchors of concurrent forms apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InstanceId(pub u64);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic allocator for [`InstanceId`]s. The hosting application owns one.
#[derive(Debug, Default)]
pub struct InstanceIds {
    next: u64,
}

impl InstanceIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> InstanceId {
        self.next += 1;
        InstanceId(self.next)
    }
}

pub fn make_anchor(instance: InstanceId, key: &str) -> String {
    format!("af_var_{instance}_{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_mandatory_keys() {
        let k = decode_key("age_2").unwrap();
        assert_eq!(k.name, "age_2");
        assert!(!k.mandatory);
        let k = decode_key("*_name").unwrap();
        assert_eq!(k.name, "_name");
        assert!(k.mandatory);
    }

    #[test]
    fn rejects_empty_and_malformed_keys() {
        assert_eq!(decode_key(""), Err(FormError::EmptyKey));
        assert_eq!(decode_key("*"), Err(FormError::EmptyKey));
        assert!(matches!(decode_key("2abc"), Err(FormError::InvalidKey(_))));
        assert!(matches!(decode_key("a-b"), Err(FormError::InvalidKey(_))));
        assert!(matches!(decode_key("**a"), Err(FormError::InvalidKey(_))));
        assert!(matches!(decode_key("é"), Err(FormError::InvalidKey(_))));
    }

    #[test]
    fn allocator_never_repeats() {
        let mut ids = InstanceIds::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert_ne!(a, b);
        assert_eq!(make_anchor(a, "x"), "af_var_1_x");
        assert_eq!(make_anchor(b, "x"), "af_var_2_x");
    }
}

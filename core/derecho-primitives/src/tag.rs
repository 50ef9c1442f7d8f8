use std::fmt;
use std::sync::Arc;

/// A stable, opaque identifier for a replicated-object type.
///
/// The original system keyed per-type state off `std::type_index`, a
/// compile-time handle into RTTI. There is no equivalent in Rust, and we
/// don't want one: callers register a capability (version/persist/sign/...)
/// under a name once, at process start, and every other component refers to
/// the type only by this tag from then on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeTag(Arc<str>);

impl TypeTag {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        TypeTag(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(name: &str) -> Self {
        TypeTag::new(name)
    }
}

impl From<String> for TypeTag {
    fn from(name: String) -> Self {
        TypeTag::new(name)
    }
}

use std::fmt;

/// A DNS-style hostname, always stored canonicalized: lowercased, with at
/// most one trailing dot stripped. `foo.internal` and `foo.internal.`
/// normalize to the same key.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Fqdn(String);

impl Fqdn {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let lower = raw.as_ref().to_ascii_lowercase();
        let canonical = lower.strip_suffix('.').unwrap_or(&lower);
        Self(canonical.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fqdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fqdn {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Fqdn {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::Fqdn;

    #[test]
    fn strips_single_trailing_dot() {
        assert_eq!(Fqdn::new("app.internal."), Fqdn::new("app.internal"));
    }

    #[test]
    fn lowercases() {
        assert_eq!(Fqdn::new("App.Internal"), Fqdn::new("app.internal"));
    }

    #[test]
    fn leaves_interior_dots_alone() {
        assert_eq!(Fqdn::new("a.b.c.").as_str(), "a.b.c");
    }
}

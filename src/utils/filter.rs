use std::str::FromStr;

/// How caller-supplied values are embedded into search filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterEscaping {
    /// RFC 4515 escaping of `\ * ( )` and NUL.
    #[default]
    Escaped,
    /// Values are interpolated verbatim. Lets callers inject filter syntax.
    Raw,
}

impl FromStr for FilterEscaping {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "escaped" | "escape" | "on" => Ok(FilterEscaping::Escaped),
            "raw" | "off" => Ok(FilterEscaping::Raw),
            other => Err(format!("expected 'escaped' or 'raw', got '{}'", other)),
        }
    }
}

/// Builds an `(attribute=value)` equality filter.
pub fn equality_filter(attribute: &str, value: &str, escaping: FilterEscaping) -> String {
    match escaping {
        FilterEscaping::Escaped => format!("({}={})", attribute, ldap3::ldap_escape(value)),
        FilterEscaping::Raw => format!("({}={})", attribute, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaped_filter_neutralises_filter_syntax() {
        let cases = [
            ("jdoe", "(cn=jdoe)"),
            ("*", "(cn=\\2a)"),
            ("a(b)c", "(cn=a\\28b\\29c)"),
            ("back\\slash", "(cn=back\\5cslash)"),
            ("nul\0", "(cn=nul\\00)"),
            ("ä*", "(cn=ä\\2a)"),
        ];
        for (value, expected) in cases {
            assert_eq!(equality_filter("cn", value, FilterEscaping::Escaped), expected, "value {:?}", value);
        }
    }

    #[test]
    fn test_equality_filter_modes() {
        assert_eq!(
            equality_filter("sAMAccountName", "j*", FilterEscaping::Escaped),
            "(sAMAccountName=j\\2a)"
        );
        assert_eq!(
            equality_filter("sAMAccountName", "j*", FilterEscaping::Raw),
            "(sAMAccountName=j*)"
        );
    }

    #[test]
    fn test_filter_escaping_from_str() {
        assert_eq!("raw".parse::<FilterEscaping>(), Ok(FilterEscaping::Raw));
        assert_eq!("Escaped".parse::<FilterEscaping>(), Ok(FilterEscaping::Escaped));
        assert!("sometimes".parse::<FilterEscaping>().is_err());
    }
}

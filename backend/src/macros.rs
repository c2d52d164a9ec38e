//! Shared macros for the backend crate.

/// Generate a `fmt::Debug` implementation that hides secrets.
///
/// Each field is prefixed with how it should be printed:
///
/// - `show field_name` - the value as-is
/// - `redact field_name` - `"[REDACTED]"`
/// - `redact_option field_name` - `Some("[REDACTED]")` or `None`
///
/// ```ignore
/// redacted_debug!(ProviderSettings {
///     show base_url,
///     redact api_key,
///     redact_option proxy_password,
/// });
/// ```
macro_rules! redacted_debug {
    ($name:ident { $( $kind:ident $field:ident ),* $(,)? }) => {
        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                let mut s = f.debug_struct(stringify!($name));
                $( redacted_debug!(@add_field s, self, $kind, $field); )*
                s.finish_non_exhaustive()
            }
        }
    };
    (@add_field $s:ident, $self:ident, show, $field:ident) => {
        $s.field(stringify!($field), &$self.$field);
    };
    (@add_field $s:ident, $self:ident, redact, $field:ident) => {
        $s.field(stringify!($field), &"[REDACTED]");
    };
    (@add_field $s:ident, $self:ident, redact_option, $field:ident) => {
        $s.field(stringify!($field), &$self.$field.as_ref().map(|_| "[REDACTED]"));
    };
}

#[cfg(test)]
mod tests {
    #[allow(dead_code)]
    struct ProviderSettings {
        pub base_url: String,
        pub api_key: String,
        pub proxy_password: Option<String>,
    }

    redacted_debug!(ProviderSettings {
        show base_url,
        redact api_key,
        redact_option proxy_password,
    });

    #[test]
    fn test_redacted_debug_hides_api_key() {
        let s = ProviderSettings {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: "AIzaSy-very-secret".to_string(),
            proxy_password: Some("proxy-pass".to_string()),
        };
        let output = format!("{:?}", s);
        assert!(output.contains("generativelanguage"));
        assert!(!output.contains("AIzaSy-very-secret"));
        assert!(!output.contains("proxy-pass"));
        assert!(output.contains("[REDACTED]"));
    }

    #[test]
    fn test_redacted_debug_option_none() {
        let s = ProviderSettings {
            base_url: "http://localhost".to_string(),
            api_key: "k".to_string(),
            proxy_password: None,
        };
        let output = format!("{:?}", s);
        assert!(output.contains("None"));
    }
}

//! HTTP method as a typed enum.
//!
//! Only the four methods a route can be registered for exist here. Any other
//! method string fails to parse and the dispatcher answers `405 Method Not
//! Allowed` before a single middleware runs.

use std::fmt;
use std::str::FromStr;

/// A method that routes can be registered for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Delete,
    Get,
    Patch,
    Post,
}

impl Method {
    /// Every routable method, in the order they are advertised in `allow`.
    pub const ALL: [Method; 4] = [Self::Get, Self::Post, Self::Patch, Self::Delete];

    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Get    => "GET",
            Self::Patch  => "PATCH",
            Self::Post   => "POST",
        }
    }

    /// Whether requests with this method carry a body worth parsing.
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Patch)
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DELETE" => Ok(Self::Delete),
            "GET"    => Ok(Self::Get),
            "PATCH"  => Ok(Self::Patch),
            "POST"   => Ok(Self::Post),
            other    => Err(UnsupportedMethod(other.to_owned())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A method string outside the routable set.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("Method {0} not allowed")]
pub struct UnsupportedMethod(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_routable_methods() {
        for method in Method::ALL {
            assert_eq!(method.as_str().parse::<Method>(), Ok(method));
        }
    }

    #[test]
    fn test_rejects_everything_else() {
        for raw in ["PUT", "HEAD", "OPTIONS", "get", "Post", ""] {
            let err = raw.parse::<Method>().unwrap_err();
            assert_eq!(err, UnsupportedMethod(raw.to_owned()));
        }
        assert_eq!(
            "PUT".parse::<Method>().unwrap_err().to_string(),
            "Method PUT not allowed"
        );
    }

    #[test]
    fn test_has_body() {
        assert!(Method::Post.has_body());
        assert!(Method::Patch.has_body());
        assert!(!Method::Get.has_body());
        assert!(!Method::Delete.has_body());
    }
}

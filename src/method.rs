//! The methods a route can be registered for.
//!
//! Only the RFC 9110 methods can carry routes. Registration strings are parsed
//! with [`Method::parse_list`], which also understands the `ANY` wildcard.
//! Requests using any other method never match a route and fall through to
//! the not-found handler.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Connect,
    Options,
    Trace,
}

/// Wildcard accepted at registration time, expands to [`Method::ALL`].
pub const ANY: &str = "ANY";

impl Method {
    /// Every routable method, in registration order for `ANY`.
    pub const ALL: [Method; 9] = [
        Self::Get,
        Self::Head,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Connect,
        Self::Options,
        Self::Trace,
    ];

    /// Name as it appears on the request line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::Trace   => "TRACE",
        }
    }

    /// Splits a registration string such as `"GET,POST"` on `sep`.
    ///
    /// Surrounding whitespace is ignored and `ANY` expands to every method.
    /// The first unrecognized entry is returned as the error.
    pub fn parse_list<'a>(methods: &'a str, sep: &str) -> Result<Vec<Method>, &'a str> {
        let mut out = Vec::new();
        for raw in methods.split(sep) {
            let name = raw.trim();
            let parsed = if name == ANY {
                Self::ALL.to_vec()
            } else {
                vec![name.parse().map_err(|()| name)?]
            };
            for method in parsed {
                if !out.contains(&method) {
                    out.push(method);
                }
            }
        }
        Ok(out)
    }
}

/// Exact, case-sensitive match on the method token. `get` is not `GET`.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "TRACE"   => Ok(Self::Trace),
            _         => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_joined_list() {
        let methods = Method::parse_list("GET,POST", ",").unwrap();
        assert_eq!(methods, vec![Method::Get, Method::Post]);
    }

    #[test]
    fn tolerates_spaces_and_custom_separator() {
        let methods = Method::parse_list("PUT | DELETE", "|").unwrap();
        assert_eq!(methods, vec![Method::Put, Method::Delete]);
    }

    #[test]
    fn any_expands_to_every_method() {
        let methods = Method::parse_list("ANY", ",").unwrap();
        assert_eq!(methods, Method::ALL.to_vec());
    }

    #[test]
    fn rejects_unknown_and_lowercase_methods() {
        assert_eq!(Method::parse_list("GET,FETCH", ","), Err("FETCH"));
        assert_eq!(Method::parse_list("get", ","), Err("get"));
        assert_eq!(Method::parse_list("", ","), Err(""));
    }
}

use crate::error::{Error, Result};

pub const PROTOCOL: &str = "box";
pub const SCHEME_PREFIX: &str = "box://";

/// Root folder and sub-path decoded from a `box://<root>/<sub-path>` url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub root_identifier: String,
    pub sub_path: String,
}

impl Location {
    pub fn parse(url: &str) -> Result<Location> {
        let rest = match url.split_once("://") {
            Some((scheme, rest)) if scheme == PROTOCOL => rest,
            Some((scheme, _)) => {
                return Err(Error::configuration(format!(
                    "unsupported scheme '{}' in '{}', expected '{}'", scheme, url, PROTOCOL
                )));
            }
            None => {
                return Err(Error::configuration(format!("'{}' is not a {} url", url, SCHEME_PREFIX)));
            }
        };
        let (root, path) = rest.split_once('/').unwrap_or((rest, ""));
        let location = Location {
            root_identifier: root.to_owned(),
            sub_path: path.trim_matches('/').to_owned(),
        };
        if location.root_identifier.is_empty() && location.sub_path.is_empty() {
            return Err(Error::configuration(format!("Empty Box location '{}'", url)));
        }
        Ok(location)
    }

    pub fn has_root_identifier(&self) -> bool {
        !self.root_identifier.is_empty()
    }

    /// Bare path that the client root corresponds to.
    pub fn anchor(&self) -> &str {
        if self.has_root_identifier() {
            &self.root_identifier
        } else {
            &self.sub_path
        }
    }
}

pub fn strip_prefix(path: &str) -> String {
    path.strip_prefix(SCHEME_PREFIX)
        .unwrap_or(path)
        .trim_matches('/')
        .to_owned()
}

pub fn unstrip_prefix(path: &str) -> String {
    format!("{}{}", SCHEME_PREFIX, path.trim_start_matches('/'))
}

pub fn join(base: &str, name: &str) -> String {
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_owned(),
        (_, true) => base.to_owned(),
        _ => format!("{}/{}", base, name),
    }
}

/// Splits `a/b/c` into (`a/b`, `c`). The parent of a top-level name is `""`.
pub fn split_parent(path: &str) -> (&str, &str) {
    let path = path.trim_matches('/');
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

//! Hierarchical variable names.
//!
//! A full name is a `/`-separated path of scope segments followed by the
//! variable's own segment. Reparameterized variables carry a transform marker
//! on their last segment: `model/__log_sigma` is the `log`-transformed
//! counterpart of `model/sigma`.

use lazy_static::lazy_static;
use regex::Regex;

pub const SEPARATOR: &str = "/";

lazy_static! {
    static ref NAME_RE: Regex =
        Regex::new(r"^(?:__(?P<transform>[^_/]+)_)?(?P<name>[^/]+)$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameParts {
    pub path: Vec<String>,
    pub transform_name: Option<String>,
    pub untransformed_name: String,
}

impl NameParts {
    pub fn new(
        path: Vec<String>,
        transform_name: Option<String>,
        untransformed_name: impl Into<String>,
    ) -> Self {
        Self {
            path,
            transform_name,
            untransformed_name: untransformed_name.into(),
        }
    }

    /// Splits `name` into scope path, transform marker and variable name.
    /// Names without a recognizable marker are treated as untransformed.
    pub fn parse(name: &str) -> Self {
        let mut segments: Vec<String> = name.split(SEPARATOR).map(str::to_string).collect();
        let last = segments.pop().unwrap_or_default();
        match NAME_RE.captures(&last) {
            Some(captures) => Self {
                path: segments,
                transform_name: captures.name("transform").map(|m| m.as_str().to_string()),
                untransformed_name: captures
                    .name("name")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            },
            None => Self {
                path: segments,
                transform_name: None,
                untransformed_name: last,
            },
        }
    }

    pub fn is_transformed(&self) -> bool {
        self.transform_name.is_some()
    }

    pub fn original_name(&self) -> String {
        match &self.transform_name {
            Some(transform) => format!("__{}_{}", transform, self.untransformed_name),
            None => self.untransformed_name.clone(),
        }
    }

    pub fn full_original_name(&self) -> String {
        self.join(self.original_name())
    }

    pub fn full_untransformed_name(&self) -> String {
        self.join(self.untransformed_name.clone())
    }

    pub fn replace_transform(&self, transform_name: impl Into<String>) -> Self {
        Self {
            transform_name: Some(transform_name.into()),
            ..self.clone()
        }
    }

    pub fn without_transform(&self) -> Self {
        Self {
            transform_name: None,
            ..self.clone()
        }
    }

    fn join(&self, last: String) -> String {
        let mut segments = self.path.clone();
        segments.push(last);
        segments.join(SEPARATOR)
    }
}

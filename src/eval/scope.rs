use crate::names::SEPARATOR;

/// Stack of name prefixes opened by the model nodes currently being driven.
/// Anonymous nodes push a frame that contributes nothing to names.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    frames: Vec<Option<String>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self, name: Option<&str>) {
        self.frames.push(name.map(str::to_string));
    }

    pub fn pop_scope(&mut self) -> Option<Option<String>> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Current prefix, e.g. `outer/inner`. Empty at the top level.
    pub fn prefix(&self) -> String {
        self.frames
            .iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }

    /// Fully qualified name of `local` within the active scopes.
    pub fn variable_name(&self, local: &str) -> String {
        let prefix = self.prefix();
        if prefix.is_empty() {
            local.to_string()
        } else {
            format!("{}{}{}", prefix, SEPARATOR, local)
        }
    }

    /// Like [`variable_name`](Self::variable_name) for optional names.
    pub fn scoped_name(&self, local: Option<&str>) -> Option<String> {
        local.map(|name| self.variable_name(name))
    }
}

use std::collections::BTreeMap;
use std::fmt;
use tracing::{Level, Span};

/// Identity attached to everything a component logs.
///
/// Components build one of these at start-up and run their task inside
/// [`LogContext::span`], so every event carries the component name and the
/// owning user without repeating them at each call site.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Component that is generating the log
    pub component: String,
    /// User the component acts for, if any
    pub user: Option<String>,
    /// Additional contextual fields, rendered into the span
    pub fields: BTreeMap<String, String>,
}

impl LogContext {
    /// Create a new log context with just the component name
    pub fn new<S: Into<String>>(component: S) -> Self {
        LogContext {
            component: component.into(),
            user: None,
            fields: BTreeMap::new(),
        }
    }

    /// Attach the user this component acts for
    pub fn for_user<S: Into<String>>(mut self, user: S) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Add a field to the context
    pub fn with_field<S: Into<String>, T: Into<String>>(mut self, key: S, value: T) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    fn rendered_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Create a span carrying this context.
    ///
    /// Span macros need a constant level, hence the match.
    pub fn span(&self, level: Level) -> Span {
        let user = self.user.as_deref().unwrap_or("-");
        let extra = self.rendered_fields();
        match level {
            Level::TRACE => tracing::trace_span!("voxlink", component = %self.component, user = %user, extra = %extra),
            Level::DEBUG => tracing::debug_span!("voxlink", component = %self.component, user = %user, extra = %extra),
            Level::INFO => tracing::info_span!("voxlink", component = %self.component, user = %user, extra = %extra),
            Level::WARN => tracing::warn_span!("voxlink", component = %self.component, user = %user, extra = %extra),
            _ => tracing::error_span!("voxlink", component = %self.component, user = %user, extra = %extra),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.component)?;
        if let Some(user) = &self.user {
            write!(f, "[{}]", user)?;
        }
        for (key, value) in &self.fields {
            write!(f, "[{}={}]", key, value)?;
        }
        Ok(())
    }
}

//! Project scoping for incoming requests
//!
//! Every request carries an active project. Executions and fork jobs owned
//! by another project are reported as not found so callers cannot probe
//! for ids they have no access to. A bootstrap admin may override scoping.

use crate::config::EngineConfig;
use crate::error::EngineError;
use std::collections::{BTreeMap, HashSet};

pub const PROJECT_HEADER: &str = "x-project-id";
pub const ADMIN_OVERRIDE_HEADER: &str = "x-project-admin-override";
pub const USER_HEADER: &str = "x-user-id";

/// Request metadata; header names are case-insensitive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    headers: BTreeMap<String, String>,
}

impl RequestContext {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Context scoped to `project_id`
    #[must_use]
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self::new().with_header(PROJECT_HEADER, project_id)
    }

    /// Trimmed, non-empty header value
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// Resolved access scope of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectScope {
    pub project_id: Option<String>,
    pub admin_override: bool,
}

impl ProjectScope {
    #[must_use]
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            admin_override: false,
        }
    }

    #[must_use]
    pub fn admin() -> Self {
        Self {
            project_id: None,
            admin_override: true,
        }
    }

    /// Whether a resource owned by `owner` is visible in this scope
    #[must_use]
    pub fn permits(&self, owner: Option<&str>) -> bool {
        self.admin_override || (owner.is_some() && owner == self.project_id.as_deref())
    }
}

/// Turns a request into an authorized scope or a rejection
pub trait ScopeResolver: Send + Sync {
    /// # Errors
    /// Returns the rejection to hand back to the caller unchanged
    fn resolve(&self, ctx: &RequestContext) -> Result<ProjectScope, EngineError>;
}

/// Header-based resolver over a fixed set of known projects
#[derive(Debug, Clone, Default)]
pub struct HeaderScopeResolver {
    projects: HashSet<String>,
    bootstrap_admin: Option<String>,
}

impl HeaderScopeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.projects.insert(project_id.into());
        self
    }

    #[must_use]
    pub fn with_bootstrap_admin(mut self, user_id: impl Into<String>) -> Self {
        self.bootstrap_admin = Some(user_id.into());
        self
    }

    /// Resolver knowing the configured default project and bootstrap admin
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        let resolver = Self::new().with_project(config.default_project_id.as_str());
        match config.bootstrap_admin_user_id.as_deref() {
            Some(user) => resolver.with_bootstrap_admin(user),
            None => resolver,
        }
    }

    fn is_admin_override(&self, ctx: &RequestContext) -> bool {
        let requested = ctx
            .header(ADMIN_OVERRIDE_HEADER)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        requested
            && matches!(
                (self.bootstrap_admin.as_deref(), ctx.header(USER_HEADER)),
                (Some(admin), Some(user)) if admin == user
            )
    }
}

impl ScopeResolver for HeaderScopeResolver {
    fn resolve(&self, ctx: &RequestContext) -> Result<ProjectScope, EngineError> {
        if self.is_admin_override(ctx) {
            tracing::debug!("project scope bypassed by bootstrap admin");
            return Ok(ProjectScope::admin());
        }
        let project_id = ctx
            .header(PROJECT_HEADER)
            .ok_or_else(|| EngineError::invalid("Missing active project context"))?;
        if !self.projects.contains(project_id) {
            return Err(EngineError::NotFound("Invalid project context".into()));
        }
        Ok(ProjectScope::project(project_id))
    }
}

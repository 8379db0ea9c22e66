//! Routes the host router must mount.

use serde::Serialize;

use crate::diagnostics::DiagnosticsAggregator;
use crate::probes::{HealthEndpointScheme, ProbeKind};

/// What a route serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteTarget {
    /// A health probe.
    Health {
        /// Probe served.
        probe: ProbeKind,
    },
    /// A permanent redirect.
    Redirect {
        /// Redirect location.
        location: String,
    },
    /// A route registered by a domain callback.
    Domain {
        /// Handler name chosen by the domain.
        handler: String,
    },
}

/// One mounted route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    path: String,
    target: RouteTarget,
    result_filter: bool,
}

impl Route {
    /// Domain route. Runs through the result filter.
    #[must_use]
    pub fn domain(path: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target: RouteTarget::Domain {
                handler: handler.into(),
            },
            result_filter: true,
        }
    }

    /// Health probe route. Health responses bypass the result filter.
    #[must_use]
    pub fn health(path: impl Into<String>, probe: ProbeKind) -> Self {
        Self {
            path: path.into(),
            target: RouteTarget::Health { probe },
            result_filter: false,
        }
    }

    /// Redirect from `path` to `location`.
    #[must_use]
    pub fn redirect(path: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            target: RouteTarget::Redirect {
                location: location.into(),
            },
            result_filter: true,
        }
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Route target.
    #[must_use]
    pub const fn target(&self) -> &RouteTarget {
        &self.target
    }

    /// Returns true when responses pass through the result filter.
    #[must_use]
    pub const fn result_filter(&self) -> bool {
        self.result_filter
    }
}

/// Ordered list of routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Builds an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route.
    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Appends one route per health endpoint.
    pub fn mount_health(&mut self, scheme: &HealthEndpointScheme) {
        self.routes.extend(
            scheme
                .endpoints()
                .iter()
                .map(|endpoint| Route::health(endpoint.path(), endpoint.kind())),
        );
    }

    /// First route registered for `path`.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.path == path)
    }

    /// Routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true when no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a Route;
    type IntoIter = std::slice::Iter<'a, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}

/// Builds the `/` redirect for a configured landing page.
///
/// An unset, empty or `/` landing page yields no route. Anything that is not
/// a relative path is reported as an error and ignored.
pub fn landing_redirect(
    landing_page: Option<&str>,
    diagnostics: &DiagnosticsAggregator,
) -> Option<Route> {
    let page = landing_page.map(str::trim).filter(|page| !page.is_empty())?;
    if page == "/" {
        return None;
    }
    if page.starts_with("//") || page.contains("://") {
        diagnostics.error(format!("landingPage '{page}' must be a relative path"));
        return None;
    }

    let location = if page.starts_with('/') {
        page.to_owned()
    } else {
        format!("/{page}")
    };
    Some(Route::redirect("/", location))
}

#![forbid(unsafe_code)]

//! Routes, locations, and the normalized page target used as the dedup key.

use url::Url;

/// A router destination, identified by its full path (path, query and hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    full_path: String,
}

impl Route {
    pub fn new(full_path: impl Into<String>) -> Self {
        Self {
            full_path: full_path.into(),
        }
    }

    #[must_use]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }
}

/// Snapshot of `window.location`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub href: String,
    pub origin: String,
    pub pathname: String,
    pub search: String,
}

impl Location {
    /// Build a location from an absolute URL.
    pub fn from_url(raw: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(raw)?;
        let search = url
            .query()
            .filter(|q| !q.is_empty())
            .map(|q| format!("?{q}"))
            .unwrap_or_default();
        Ok(Self {
            href: url.as_str().to_owned(),
            origin: url.origin().ascii_serialization(),
            pathname: url.path().to_owned(),
            search,
        })
    }

    /// `pathname + search`.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        format!("{}{}", self.pathname, self.search)
    }
}

/// What a page view reports: the normalized path and the absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTarget {
    pub path: String,
    pub location: String,
}

impl PageTarget {
    /// Derive the page target for `route`, or for the current location when
    /// no route is known.
    ///
    /// A route path is resolved against the location origin. If the origin
    /// cannot act as a base (`null` origins, malformed hosts) the current
    /// `href` is reported instead.
    #[must_use]
    pub fn resolve(route: Option<&Route>, location: &Location) -> Self {
        let Some(route) = route else {
            return Self {
                path: location.path_and_query(),
                location: location.href.clone(),
            };
        };

        let resolved = Url::parse(&location.origin)
            .and_then(|base| base.join(route.full_path()))
            .map(String::from);
        let absolute = match resolved {
            Ok(href) => href,
            Err(err) => {
                tracing::debug!(
                    target: "pagefit.nav",
                    origin = %location.origin,
                    path = %route.full_path(),
                    error = %err,
                    "route not resolvable against origin, using href"
                );
                location.href.clone()
            }
        };

        Self {
            path: route.full_path().to_owned(),
            location: absolute,
        }
    }
}

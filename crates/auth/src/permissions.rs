use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "loans.manage").
/// The wildcard permission `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission::from_static("*");

    pub const USERS_MANAGE: Permission = Permission::from_static("users.manage");
    pub const CATALOG_READ: Permission = Permission::from_static("catalog.read");
    pub const CATALOG_MANAGE: Permission = Permission::from_static("catalog.manage");
    pub const STOCK_MANAGE: Permission = Permission::from_static("stock.manage");
    pub const REQUESTS_READ: Permission = Permission::from_static("requests.read");
    pub const REQUESTS_CREATE: Permission = Permission::from_static("requests.create");
    pub const REQUESTS_REVIEW: Permission = Permission::from_static("requests.review");
    pub const BORROW_REQUEST: Permission = Permission::from_static("borrow.request");
    pub const LOANS_READ: Permission = Permission::from_static("loans.read");
    pub const LOANS_MANAGE: Permission = Permission::from_static("loans.manage");
    pub const SCAN_PROCESS: Permission = Permission::from_static("scan.process");
    pub const REPORTS_EXPORT: Permission = Permission::from_static("reports.export");
    pub const ANALYTICS_READ: Permission = Permission::from_static("analytics.read");
    pub const ADMIN_JOBS: Permission = Permission::from_static("admin.jobs");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

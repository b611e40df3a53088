use serde::{Deserialize, Serialize};

pub const DEFAULT_TENANT_DOMAIN: &str = "DEFAULT";

/// Maps logical table names onto the physical names used on the cluster.
///
/// The table part is kept verbatim, so two distinct tables never share a
/// physical name within one tenant domain, while the same table gets a
/// different name in every other domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamingPolicy {
    tenant_domain: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        NamingPolicy::new(DEFAULT_TENANT_DOMAIN)
    }
}

impl NamingPolicy {
    pub fn new(tenant_domain: impl AsRef<str>) -> Self {
        let tenant_domain = tenant_domain.as_ref().trim();
        let tenant_domain = if tenant_domain.is_empty() {
            DEFAULT_TENANT_DOMAIN
        } else {
            tenant_domain
        };
        NamingPolicy {
            tenant_domain: tenant_domain.to_uppercase(),
        }
    }

    pub fn tenant_domain(&self) -> &str {
        &self.tenant_domain
    }

    /// Returns `None` for a blank table name.
    pub fn qualify(&self, table: impl AsRef<str>) -> Option<String> {
        let table = table.as_ref();
        if table.trim().is_empty() {
            return None;
        }
        Some(format!("{}_{}", self.tenant_domain, table))
    }
}

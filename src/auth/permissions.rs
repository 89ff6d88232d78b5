/*!
 * # Permissions Module
 *
 * Permission strings checked by the route gates, and the fixed mapping from
 * a login role to the permissions it carries.
 */

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Permission string constants for compile-time safety
pub mod consts {
    /// Shop owners, shops, employees and payment methods
    pub const ADMIN_MANAGE: &str = "admin:manage";
    /// Read access to every resource
    pub const CATALOG_READ: &str = "catalog:read";
    /// Suppliers, products and promotions
    pub const CATALOG_WRITE: &str = "catalog:write";
    pub const CUSTOMERS_WRITE: &str = "customers:write";
    /// Invoices
    pub const SALES_WRITE: &str = "sales:write";
    /// Purchase orders
    pub const PROCUREMENT_WRITE: &str = "procurement:write";
}

use consts::*;

const OWNER_PERMISSIONS: &[&str] = &[
    ADMIN_MANAGE,
    CATALOG_READ,
    CATALOG_WRITE,
    CUSTOMERS_WRITE,
    SALES_WRITE,
    PROCUREMENT_WRITE,
];

const EMPLOYEE_PERMISSIONS: &[&str] = &[CATALOG_READ, CUSTOMERS_WRITE, SALES_WRITE];

/// Who the bearer of a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Employee,
}

impl Role {
    pub fn permissions(&self) -> &'static [&'static str] {
        match self {
            Role::Owner => OWNER_PERMISSIONS,
            Role::Employee => EMPLOYEE_PERMISSIONS,
        }
    }

    pub fn allows(&self, permission: &str) -> bool {
        self.permissions().contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Role::Owner, ADMIN_MANAGE, true)]
    #[case(Role::Owner, PROCUREMENT_WRITE, true)]
    #[case(Role::Employee, CATALOG_READ, true)]
    #[case(Role::Employee, SALES_WRITE, true)]
    #[case(Role::Employee, CUSTOMERS_WRITE, true)]
    #[case(Role::Employee, CATALOG_WRITE, false)]
    #[case(Role::Employee, ADMIN_MANAGE, false)]
    #[case(Role::Employee, PROCUREMENT_WRITE, false)]
    fn role_permission_matrix(#[case] role: Role, #[case] permission: &str, #[case] allowed: bool) {
        assert_eq!(role.allows(permission), allowed);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"owner\"");
        let parsed: Role = serde_json::from_str("\"employee\"").unwrap();
        assert_eq!(parsed, Role::Employee);
    }
}

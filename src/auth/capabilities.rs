/*!
 * # Capabilities Module
 *
 * A single role-to-capability table for the whole API. Every handler group
 * declares the capability it requires; `role_allows` is the one place where
 * a caller's role is turned into a yes/no decision.
 */

use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::warn;

/// Role definition with associated capabilities
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
}

/// Capability string constants for compile-time safety
pub mod consts {
    // Invoices
    pub const INVOICES_READ: &str = "invoices:read";
    pub const INVOICES_CREATE: &str = "invoices:create";
    pub const INVOICES_UPDATE: &str = "invoices:update";
    pub const INVOICES_DELETE: &str = "invoices:delete";

    // Parts catalog
    pub const PARTS_READ: &str = "parts:read";
    pub const PARTS_MANAGE: &str = "parts:manage";

    // Customers and vehicles
    pub const CUSTOMERS_READ: &str = "customers:read";
    pub const CUSTOMERS_MANAGE: &str = "customers:manage";
    pub const VEHICLES_READ: &str = "vehicles:read";
    pub const VEHICLES_MANAGE: &str = "vehicles:manage";

    // User administration
    pub const USERS_MANAGE: &str = "users:manage";
}

// Define standard roles and their capabilities
lazy_static! {
    pub static ref ROLES: HashMap<String, Role> = {
        let mut roles = HashMap::new();

        // Admin role - has all capabilities
        roles.insert(
            "admin".to_string(),
            Role {
                name: "admin".to_string(),
                description: "Administrator with full access".to_string(),
                capabilities: vec![
                    "invoices:*".to_string(),
                    "parts:*".to_string(),
                    "customers:*".to_string(),
                    "vehicles:*".to_string(),
                    "users:*".to_string(),
                ],
            },
        );

        // Manager role - runs the shop floor, no user administration
        roles.insert(
            "manager".to_string(),
            Role {
                name: "manager".to_string(),
                description: "Shop manager with full operational access".to_string(),
                capabilities: vec![
                    "invoices:*".to_string(),
                    "parts:*".to_string(),
                    "customers:*".to_string(),
                    "vehicles:*".to_string(),
                ],
            },
        );

        // Mechanic role - writes invoices for jobs, reads reference data
        roles.insert(
            "mechanic".to_string(),
            Role {
                name: "mechanic".to_string(),
                description: "Mechanic recording completed jobs".to_string(),
                capabilities: vec![
                    consts::INVOICES_READ.to_string(),
                    consts::INVOICES_CREATE.to_string(),
                    consts::INVOICES_UPDATE.to_string(),
                    consts::PARTS_READ.to_string(),
                    consts::CUSTOMERS_READ.to_string(),
                    consts::VEHICLES_READ.to_string(),
                ],
            },
        );

        // Front desk role - customer intake, read-only invoicing
        roles.insert(
            "frontdesk".to_string(),
            Role {
                name: "frontdesk".to_string(),
                description: "Front desk staff handling customer intake".to_string(),
                capabilities: vec![
                    consts::INVOICES_READ.to_string(),
                    consts::PARTS_READ.to_string(),
                    consts::CUSTOMERS_READ.to_string(),
                    consts::CUSTOMERS_MANAGE.to_string(),
                    consts::VEHICLES_READ.to_string(),
                    consts::VEHICLES_MANAGE.to_string(),
                ],
            },
        );

        roles
    };
}

/// Check if a held capability satisfies a required capability
pub(crate) fn capability_matches(held: &str, required: &str) -> bool {
    // Direct match
    if held == required {
        return true;
    }

    // Wildcard match
    if let Some(prefix) = held.strip_suffix(":*") {
        if required
            .split_once(':')
            .map(|(resource, _)| resource == prefix)
            .unwrap_or(false)
        {
            return true;
        }
    }

    // Super wildcard (admin)
    held == "*"
}

/// The capability check: does `role` allow `capability`?
pub fn role_allows(role: &str, capability: &str) -> bool {
    match ROLES.get(role) {
        Some(definition) => definition
            .capabilities
            .iter()
            .any(|held| capability_matches(held, capability)),
        None => {
            warn!("Unknown role in capability check: {}", role);
            false
        }
    }
}

/// All capabilities granted by a role, for embedding into token claims
pub fn role_capabilities(role: &str) -> Vec<String> {
    match ROLES.get(role) {
        Some(definition) => definition.capabilities.clone(),
        None => {
            warn!("Unknown role when expanding capabilities: {}", role);
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_grants_every_action_on_resource() {
        assert!(capability_matches("invoices:*", consts::INVOICES_DELETE));
        assert!(capability_matches("invoices:*", consts::INVOICES_READ));
        assert!(!capability_matches("invoices:*", consts::PARTS_MANAGE));
    }

    #[test]
    fn wildcard_does_not_leak_across_prefixes() {
        // "parts:*" must not satisfy a capability on a resource whose name
        // merely starts with "parts"
        assert!(!capability_matches("parts:*", "partstock:read"));
    }

    #[test]
    fn admin_allows_everything_in_the_table() {
        for capability in [
            consts::INVOICES_READ,
            consts::INVOICES_CREATE,
            consts::INVOICES_UPDATE,
            consts::INVOICES_DELETE,
            consts::PARTS_MANAGE,
            consts::CUSTOMERS_MANAGE,
            consts::VEHICLES_MANAGE,
            consts::USERS_MANAGE,
        ] {
            assert!(role_allows("admin", capability), "admin lacks {capability}");
        }
    }

    #[test]
    fn mechanic_cannot_delete_invoices_or_manage_users() {
        assert!(role_allows("mechanic", consts::INVOICES_CREATE));
        assert!(role_allows("mechanic", consts::INVOICES_UPDATE));
        assert!(!role_allows("mechanic", consts::INVOICES_DELETE));
        assert!(!role_allows("mechanic", consts::USERS_MANAGE));
        assert!(!role_allows("mechanic", consts::PARTS_MANAGE));
    }

    #[test]
    fn unknown_role_allows_nothing() {
        assert!(!role_allows("intern", consts::INVOICES_READ));
        assert!(role_capabilities("intern").is_empty());
    }
}

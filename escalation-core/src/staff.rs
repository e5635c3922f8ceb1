//! Staff Directory Resolver — who can be paged for an escalation.
//!
//! Fetched fresh on every escalation; availability changes between calls.

use crate::collaborators::StaffDirectory;
use crate::types::StaffMember;
use std::sync::Arc;
use tracing::{debug, warn};

/// Roles that receive escalation notifications.
pub const ELIGIBLE_ROLES: [&str; 3] = ["admin", "manager", "dispatcher"];

pub struct StaffResolver {
    directory: Arc<dyn StaffDirectory>,
}

impl StaffResolver {
    pub fn new(directory: Arc<dyn StaffDirectory>) -> Self {
        Self { directory }
    }

    /// Staff holding an eligible role. Lookup failures yield an empty list.
    pub async fn resolve_eligible_staff(&self) -> Vec<StaffMember> {
        match self.directory.list_staff_by_roles(&ELIGIBLE_ROLES).await {
            Ok(staff) if staff.is_empty() => {
                warn!(roles = ?ELIGIBLE_ROLES, "no eligible staff to notify");
                staff
            }
            Ok(staff) => {
                debug!(count = staff.len(), "resolved eligible staff");
                staff
            }
            Err(e) => {
                warn!(error = %e, "staff directory lookup failed, notifying nobody");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::StaticStaffDirectory;

    fn with_role(id: &str, role: &str) -> StaffMember {
        StaffMember {
            role: Some(role.into()),
            ..StaffMember::new(id)
        }
    }

    #[tokio::test]
    async fn test_resolves_only_eligible_roles() {
        let dir = StaticStaffDirectory::new(vec![
            with_role("a", "admin"),
            with_role("m", "manager"),
            with_role("d", "dispatcher"),
            with_role("t", "technician"),
        ]);
        let staff = StaffResolver::new(Arc::new(dir)).resolve_eligible_staff().await;
        let ids: Vec<_> = staff.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "d"]);
    }

    #[tokio::test]
    async fn test_empty_directory_is_not_an_error() {
        let staff = StaffResolver::new(Arc::new(StaticStaffDirectory::default()))
            .resolve_eligible_staff()
            .await;
        assert!(staff.is_empty());
    }

    #[tokio::test]
    async fn test_directory_failure_yields_empty() {
        let staff = StaffResolver::new(Arc::new(StaticStaffDirectory::unavailable()))
            .resolve_eligible_staff()
            .await;
        assert!(staff.is_empty());
    }
}

//! Authorization error types.

use repairdesk_core::error::RepairError;
use repairdesk_core::models::capability::Capability;
use repairdesk_core::models::identity::Role;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("ACCESS_DENIED: resource belongs to another customer")]
    AccessDenied,

    #[error("ACCESS_DENIED: role {role} may not perform this operation")]
    RoleNotAllowed { role: Role },

    #[error("MISSING_PERMISSION: requires one of {}", join(.required))]
    MissingPermission { required: Vec<Capability> },
}

fn join(required: &[Capability]) -> String {
    required
        .iter()
        .map(Capability::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<AuthzError> for RepairError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => RepairError::Unauthenticated,
            AuthzError::AccessDenied | AuthzError::RoleNotAllowed { .. } => {
                RepairError::Forbidden {
                    reason: err.to_string(),
                    required: Vec::new(),
                }
            }
            AuthzError::MissingPermission { ref required } => RepairError::Forbidden {
                reason: err.to_string(),
                required: required.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_permission_names_every_capability() {
        let err: RepairError = AuthzError::MissingPermission {
            required: vec![Capability::CaseReadAll, Capability::CaseReadAssigned],
        }
        .into();

        match err {
            RepairError::Forbidden { reason, required } => {
                assert_eq!(
                    reason,
                    "MISSING_PERMISSION: requires one of CASE_READ_ALL, CASE_READ_ASSIGNED"
                );
                assert_eq!(required.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ownership_denial_is_forbidden_without_capabilities() {
        let err: RepairError = AuthzError::AccessDenied.into();
        assert!(matches!(
            err,
            RepairError::Forbidden { ref required, .. } if required.is_empty()
        ));
        assert!(matches!(
            RepairError::from(AuthzError::Unauthenticated),
            RepairError::Unauthenticated
        ));
    }
}

//! Which offices a principal may see or act on.
//!
//! Every list and mutation endpoint goes through this module; no handler
//! branches on role by itself.

use std::collections::BTreeSet;

use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::role::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfficeScope {
    /// No office restriction.
    All,
    /// Restricted to these offices; an empty set matches nothing.
    Offices(BTreeSet<u64>),
}

impl OfficeScope {
    pub fn only(ids: impl IntoIterator<Item = u64>) -> Self {
        OfficeScope::Offices(ids.into_iter().collect())
    }

    pub fn permits(&self, office_id: u64) -> bool {
        match self {
            OfficeScope::All => true,
            OfficeScope::Offices(ids) => ids.contains(&office_id),
        }
    }

    /// True when the scope cannot match any office.
    pub fn is_empty(&self) -> bool {
        matches!(self, OfficeScope::Offices(ids) if ids.is_empty())
    }
}

/// Resolves the effective office filter for a list/report request.
///
/// ADMIN and MANAGER may narrow to one office or a set, otherwise see all.
/// HR is confined to assigned offices: asking for another office is
/// forbidden, having none yields an empty scope rather than an error.
pub fn resolve_office_scope(
    principal: &AuthUser,
    requested_office_id: Option<u64>,
    requested_office_ids: Option<&[u64]>,
) -> AppResult<OfficeScope> {
    match principal.role {
        Role::Admin | Role::Manager => Ok(match (requested_office_id, requested_office_ids) {
            (Some(id), _) => OfficeScope::only([id]),
            (None, Some(ids)) => OfficeScope::only(ids.iter().copied()),
            (None, None) => OfficeScope::All,
        }),
        Role::Hr => {
            let assigned: BTreeSet<u64> = principal.office_ids.iter().copied().collect();
            if assigned.is_empty() {
                return Ok(OfficeScope::Offices(assigned));
            }
            match requested_office_id {
                Some(id) if !assigned.contains(&id) => {
                    tracing::warn!(
                        user_id = principal.user_id,
                        office_id = id,
                        "HR requested an unassigned office"
                    );
                    Err(AppError::forbidden("Unauthorized access to office"))
                }
                Some(id) => Ok(OfficeScope::only([id])),
                None => Ok(OfficeScope::Offices(assigned)),
            }
        }
        Role::Agent => Err(AppError::forbidden("Staff access required")),
    }
}

/// Ensures the principal may act on something belonging to `office_id`.
pub fn ensure_office_access(principal: &AuthUser, office_id: u64) -> AppResult<()> {
    let scope = resolve_office_scope(principal, None, None)?;
    if scope.permits(office_id) {
        Ok(())
    } else {
        tracing::warn!(user_id = principal.user_id, office_id, "Office outside caller scope");
        Err(AppError::forbidden(
            "You can only manage attendance for agents in your assigned offices",
        ))
    }
}

/// Parses the `officeIds=1,2,3` query form.
pub fn parse_office_ids(raw: &str) -> AppResult<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| AppError::validation(format!("Invalid office id: {s}")))
        })
        .collect()
}

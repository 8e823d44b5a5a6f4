/// Membership-aware workflows
///
/// Each function here is one request's worth of work: it loads a fresh
/// [`MembershipSnapshot`](crate::auth::authorization::MembershipSnapshot),
/// consults the gate and touches the models. Mutations run in a single
/// transaction and are never retried; listings go through [`retry_read`].
///
/// - `membership`: invite, respond, rosters and invitations
/// - `teams`: create, list and delete teams
/// - `projects`: create projects and list them per viewer
/// - `tasks`: create, list, update, toggle and delete tasks; comments

use std::future::Future;

use tracing::warn;

use crate::error::DomainResult;

pub mod membership;
pub mod projects;
pub mod tasks;
pub mod teams;

/// Runs an idempotent read, retrying once on a transient storage error
pub async fn retry_read<T, F, Fut>(label: &'static str, mut op: F) -> DomainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    match op().await {
        Err(e) if e.is_transient() => {
            warn!(operation = label, error = %e, "Transient read failure, retrying once");
            op().await
        }
        result => result,
    }
}

/// Rejects blank required text, returning it trimmed
pub(crate) fn required(field: &'static str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::error::DomainError::validation(
            field,
            format!("{field} is required"),
        ));
    }
    Ok(trimmed.to_string())
}

/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Accounts and sessions (register, login, refresh, logout, me)
/// - `users`: Profiles
/// - `teams`: Team registry and rosters
/// - `team_members`: Invitations and the assignee picker
/// - `projects`: Project registry
/// - `tasks`: Task registry
/// - `comments`: Task comments with attachments

pub mod auth;
pub mod comments;
pub mod health;
pub mod projects;
pub mod tasks;
pub mod team_members;
pub mod teams;
pub mod users;

use serde::Deserialize;
use teamboard_shared::pagination::{PageQuery, PageRequest};

/// `?page=&limit=` as sent by the client
///
/// Values that fail to parse are treated as missing.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl From<PaginationParams> for PageRequest {
    fn from(params: PaginationParams) -> Self {
        PageQuery {
            page: params.page.and_then(|p| p.trim().parse().ok()),
            limit: params.limit.and_then(|l| l.trim().parse().ok()),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_params_tolerate_garbage() {
        let req: PageRequest = PaginationParams {
            page: Some("two".to_string()),
            limit: Some(" 6 ".to_string()),
        }
        .into();

        assert_eq!(req, PageRequest::new(None, Some(6)));
    }
}

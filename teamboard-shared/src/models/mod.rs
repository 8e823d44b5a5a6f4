/// Database models for Teamboard
///
/// Each model owns its table(s) and exposes plain async query functions that
/// accept any `PgExecutor`, so they run equally against the pool or inside a
/// transaction. Pure helpers (state machines, partitioning, ordering) live
/// next to the queries they complement.
///
/// # Models
///
/// - `user`: accounts and profiles
/// - `team`: teams and their owners
/// - `team_member`: the invitation ledger
/// - `project`: projects and their team associations
/// - `task`: tasks, status and scheduling rules
/// - `task_comment`: comments and attachment metadata

pub mod project;
pub mod task;
pub mod task_comment;
pub mod team;
pub mod team_member;
pub mod user;

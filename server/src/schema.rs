//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the deployed schema exactly; Diesel uses them
//! for compile-time query validation and type-safe SQL generation.

diesel::table! {
    /// Registered user accounts, keyed by serial id and unique name.
    users (id) {
        id -> Int4,
        /// Unique account name used as the authenticated identity.
        name -> Varchar,
    }
}

diesel::table! {
    /// Authorization groups users may belong to.
    groups (id) {
        id -> Int4,
        /// Unique group name, rendered as the `group:<name>` principal.
        name -> Varchar,
    }
}

diesel::table! {
    /// Membership join table between users and groups.
    user_groups (user_id, group_id) {
        user_id -> Int4,
        group_id -> Int4,
    }
}

diesel::table! {
    /// Release catalogue the gating service manages updates for.
    releases (id) {
        id -> Int4,
        /// Short release name, e.g. `F33`.
        name -> Varchar,
        /// Human-readable release name, e.g. `Fedora 33`.
        long_name -> Varchar,
        /// Lifecycle state: disabled, pending, current, or archived.
        state -> Varchar,
    }
}

diesel::joinable!(user_groups -> users (user_id));
diesel::joinable!(user_groups -> groups (group_id));

diesel::allow_tables_to_appear_in_same_query!(users, groups, user_groups);

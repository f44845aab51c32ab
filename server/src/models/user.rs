//! User accounts, group memberships, and the serialized profile shape.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::schema::{groups, user_groups, users};

use super::StoreError;

/// Registered user account row.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub name: String,
}

/// Authorization group row.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable)]
#[diesel(table_name = groups)]
pub struct Group {
    pub id: i32,
    pub name: String,
}

/// Group reference as serialized inside a [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GroupRef {
    /// Group name without the `group:` principal prefix.
    #[schema(example = "packager")]
    pub name: String,
}

/// Attribute-map view of a user returned to API clients.
///
/// Shape: `{"name": "guest", "groups": [{"name": "packager"}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    /// Account name.
    #[schema(example = "guest")]
    pub name: String,
    /// Group memberships, one entry per group.
    pub groups: Vec<GroupRef>,
}

impl UserProfile {
    /// Assemble a profile from a user row and its group rows.
    pub fn from_parts(user: &User, groups: &[Group]) -> Self {
        Self {
            name: user.name.clone(),
            groups: groups
                .iter()
                .map(|group| GroupRef {
                    name: group.name.clone(),
                })
                .collect(),
        }
    }
}

/// Look up a user account by its unique name.
pub async fn find_user_by_name(
    conn: &mut AsyncPgConnection,
    name: &str,
) -> Result<Option<User>, StoreError> {
    let user = users::table
        .filter(users::name.eq(name))
        .first::<User>(conn)
        .await
        .optional()?;
    Ok(user)
}

/// List the groups a user belongs to, ordered by name.
pub async fn groups_of(
    conn: &mut AsyncPgConnection,
    user: &User,
) -> Result<Vec<Group>, StoreError> {
    let rows = user_groups::table
        .inner_join(groups::table)
        .filter(user_groups::user_id.eq(user.id))
        .select((groups::id, groups::name))
        .order(groups::name.asc())
        .load::<Group>(conn)
        .await?;
    Ok(rows)
}

/// Resolve a user name to its serialized profile, or `None` when the account
/// does not exist.
pub async fn user_profile(
    conn: &mut AsyncPgConnection,
    name: &str,
) -> Result<Option<UserProfile>, StoreError> {
    let Some(user) = find_user_by_name(conn, name).await? else {
        return Ok(None);
    };
    let groups = groups_of(conn, &user).await?;
    Ok(Some(UserProfile::from_parts(&user, &groups)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn user(id: i32, name: &str) -> User {
        User {
            id,
            name: name.to_owned(),
        }
    }

    fn group(id: i32, name: &str) -> Group {
        Group {
            id,
            name: name.to_owned(),
        }
    }

    #[rstest]
    fn profile_serializes_groups_as_name_maps() {
        let profile = UserProfile::from_parts(&user(1, "guest"), &[group(7, "packager")]);

        let value = serde_json::to_value(&profile).expect("profile serializes");
        assert_eq!(
            value,
            json!({"name": "guest", "groups": [{"name": "packager"}]})
        );
    }

    #[rstest]
    fn profile_for_user_without_groups_is_empty_list() {
        let profile = UserProfile::from_parts(&user(2, "loner"), &[]);

        assert_eq!(profile.name, "loner");
        assert!(profile.groups.is_empty());
    }

    #[rstest]
    fn profile_round_trips_through_json() {
        let profile = UserProfile::from_parts(&user(3, "guest"), &[group(1, "provenpackager")]);

        let encoded = serde_json::to_string(&profile).expect("encode");
        let decoded: UserProfile = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, profile);
    }
}

//! Group finder: expands an authenticated identity into principals.

use diesel_async::AsyncPgConnection;

use crate::models::{self, Group, StoreError, User};

use super::Principal;

/// Principals a resolved user acts as, in addition to `Everyone`.
pub fn principals_for(user: &User, groups: &[Group]) -> Vec<Principal> {
    let mut principals = Vec::with_capacity(2 + groups.len());
    principals.push(Principal::Authenticated);
    principals.push(Principal::User(user.name.clone()));
    principals.extend(
        groups
            .iter()
            .map(|group| Principal::Group(group.name.clone())),
    );
    principals
}

/// Resolve an authenticated identity to its principals, or `None` when the
/// identity does not correspond to a registered user.
pub async fn groupfinder(
    identity: &str,
    conn: &mut AsyncPgConnection,
) -> Result<Option<Vec<Principal>>, StoreError> {
    let Some(user) = models::find_user_by_name(conn, identity).await? else {
        return Ok(None);
    };
    let groups = models::groups_of(conn, &user).await?;
    Ok(Some(principals_for(&user, &groups)))
}

/// The full principal set for a request: `Everyone`, plus whatever the group
/// finder yields for the identity claim when it resolves.
pub async fn effective_principals(
    identity: Option<&str>,
    conn: &mut AsyncPgConnection,
) -> Result<Vec<Principal>, StoreError> {
    let mut principals = vec![Principal::Everyone];
    if let Some(identity) = identity {
        if let Some(resolved) = groupfinder(identity, conn).await? {
            principals.extend(resolved);
        }
    }
    Ok(principals)
}

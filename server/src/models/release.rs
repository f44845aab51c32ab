//! Release catalogue entities.

use std::fmt;
use std::str::FromStr;

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::schema::releases;

use super::StoreError;

/// Lifecycle state of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseState {
    /// Not accepting updates.
    Disabled,
    /// Awaiting activation.
    Pending,
    /// Actively gated.
    Current,
    /// Retired; kept for history.
    Archived,
}

impl ReleaseState {
    /// Stable textual form stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Pending => "pending",
            Self::Current => "current",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseState {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(Self::Disabled),
            "pending" => Ok(Self::Pending),
            "current" => Ok(Self::Current),
            "archived" => Ok(Self::Archived),
            other => Err(StoreError::corrupt(format!(
                "unknown release state: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Queryable)]
struct ReleaseRow {
    #[expect(dead_code, reason = "read to keep the row shape aligned with the table")]
    id: i32,
    name: String,
    long_name: String,
    state: String,
}

/// Release as exposed to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Release {
    /// Short release name, e.g. `F33`.
    #[schema(example = "F33")]
    pub name: String,
    /// Human-readable name, e.g. `Fedora 33`.
    #[schema(example = "Fedora 33")]
    pub long_name: String,
    /// Lifecycle state.
    pub state: ReleaseState,
}

impl TryFrom<ReleaseRow> for Release {
    type Error = StoreError;

    fn try_from(row: ReleaseRow) -> Result<Self, Self::Error> {
        let state = row.state.parse()?;
        Ok(Self {
            name: row.name,
            long_name: row.long_name,
            state,
        })
    }
}

/// Fields required to create a release.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewRelease {
    pub name: String,
    pub long_name: String,
    pub state: ReleaseState,
}

#[derive(Insertable)]
#[diesel(table_name = releases)]
struct NewReleaseRow<'a> {
    name: &'a str,
    long_name: &'a str,
    state: &'a str,
}

/// List every release, ordered by name.
pub async fn all_releases(conn: &mut AsyncPgConnection) -> Result<Vec<Release>, StoreError> {
    let rows = releases::table
        .order(releases::name.asc())
        .load::<ReleaseRow>(conn)
        .await?;
    rows.into_iter().map(Release::try_from).collect()
}

/// Insert a new release and return it as stored.
pub async fn create_release(
    conn: &mut AsyncPgConnection,
    release: &NewRelease,
) -> Result<Release, StoreError> {
    let row = NewReleaseRow {
        name: &release.name,
        long_name: &release.long_name,
        state: release.state.as_str(),
    };
    let stored = diesel::insert_into(releases::table)
        .values(&row)
        .get_result::<ReleaseRow>(conn)
        .await?;
    Release::try_from(stored)
}

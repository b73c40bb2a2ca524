use serde::{Deserialize, Serialize};

use crate::types::{InstallId, Record};

/// Protected resource kinds served by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Users,
    Races,
}

impl ResourceKind {
    pub const ALL: [Self; 2] = [Self::Users, Self::Races];

    /// Backend path, relative to the backend base URL.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Races => "races",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Race identifier. The backend has used both numeric and string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RaceId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for RaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One entry of a race's distance list: `42.195`, `"10K"`, or an object
/// such as `{"label": "Half", "km": 21.1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Distance {
    Kilometers(f64),
    Label(String),
    Detailed(Record),
}

/// A race as listed by `GET /races`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Race {
    pub id: RaceId,
    pub name: String,
    #[serde(alias = "start_date")]
    pub start_date: String,
    pub city: String,
    pub country: String,
    pub description: String,
    #[serde(alias = "imageUrl", alias = "image_url")]
    pub image: String,
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub distances: Vec<Distance>,
    /// Fields this client does not model yet.
    #[serde(flatten)]
    pub extra: Record,
}

/// Where a resource list is in its fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    /// No session, nothing requested.
    #[default]
    Idle,
    /// Request in flight for the current session.
    Loading,
    Loaded,
    /// Request failed or could not be issued. Items are empty.
    Failed,
}

impl FetchStatus {
    /// `Loaded` or `Failed`.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Loaded | Self::Failed)
    }
}

/// Items of one resource kind plus their fetch status.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSlot<T> {
    items: Vec<T>,
    status: FetchStatus,
}

impl<T> Default for ResourceSlot<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            status: FetchStatus::Idle,
        }
    }
}

impl<T> ResourceSlot<T> {
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn status(&self) -> FetchStatus {
        self.status
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    fn loading() -> Self {
        Self {
            items: Vec::new(),
            status: FetchStatus::Loading,
        }
    }

    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) fn settle<E>(&mut self, result: Result<Vec<T>, E>) {
        match result {
            Ok(items) => {
                self.items = items;
                self.status = FetchStatus::Loaded;
            }
            Err(_) => self.fail(),
        }
    }

    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) fn fail(&mut self) {
        self.items.clear();
        self.status = FetchStatus::Failed;
    }
}

/// In-memory resource lists for the current session. Never persisted.
///
/// `owner` is the installation the lists belong to; results for any other
/// installation are rejected by [`apply`](Self::apply).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceLists {
    owner: Option<InstallId>,
    users: ResourceSlot<Record>,
    races: ResourceSlot<Race>,
}

impl ResourceLists {
    /// Empty lists awaiting results for `owner`.
    #[must_use]
    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) fn loading_for(owner: InstallId) -> Self {
        Self {
            owner: Some(owner),
            users: ResourceSlot::loading(),
            races: ResourceSlot::loading(),
        }
    }

    #[must_use]
    pub fn owner(&self) -> Option<InstallId> {
        self.owner
    }

    #[must_use]
    pub fn users(&self) -> &ResourceSlot<Record> {
        &self.users
    }

    #[must_use]
    pub fn races(&self) -> &ResourceSlot<Race> {
        &self.races
    }

    /// Both lists have a final result.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.users.status.is_settled() && self.races.status.is_settled()
    }

    /// Apply `update` if the lists still belong to `owner`.
    ///
    /// Returns `false` (and leaves the lists untouched) for stale results.
    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) fn apply(&mut self, owner: InstallId, update: impl FnOnce(&mut Self)) -> bool {
        if self.owner != Some(owner) {
            return false;
        }
        update(self);
        true
    }

    /// Empty both lists and mark them failed.
    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) fn fail_all(&mut self) {
        self.users.fail();
        self.races.fail();
    }

    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) fn users_mut(&mut self) -> &mut ResourceSlot<Record> {
        &mut self.users
    }

    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) fn races_mut(&mut self) -> &mut ResourceSlot<Race> {
        &mut self.races
    }
}

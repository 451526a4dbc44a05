use std::fmt;

use serde::{Deserialize, Serialize};

/// Every entity kind that participates in the reference graph.
///
/// A kind maps to exactly one table; the variants cover the whole schema the
/// admin panel manages, so the cascade engine can be generic over them
/// instead of carrying one hand-written function per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    UserAuthSettings,
    UserToken,
    UserRole,
    Role,
    ProjectRoute,
    RouteRole,
    Blog,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::User,
        EntityKind::UserAuthSettings,
        EntityKind::UserToken,
        EntityKind::UserRole,
        EntityKind::Role,
        EntityKind::ProjectRoute,
        EntityKind::RouteRole,
        EntityKind::Blog,
    ];

    /// Table name in the application database. Tables are named after their
    /// models, camelCase, matching the schema the panel generator emits.
    pub fn table_name(self) -> &'static str {
        self.model_name()
    }

    /// camelCase model name, used as the key in dry-run count maps and in
    /// CLI output.
    pub fn model_name(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::UserAuthSettings => "userAuthSettings",
            EntityKind::UserToken => "userToken",
            EntityKind::UserRole => "userRole",
            EntityKind::Role => "role",
            EntityKind::ProjectRoute => "projectRoute",
            EntityKind::RouteRole => "routeRole",
            EntityKind::Blog => "blog",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.model_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_name())
    }
}

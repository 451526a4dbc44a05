use crate::entities::EntityKind;

/// One inbound reference: `child.column` holds ids of `parent` records.
///
/// Covers both relational foreign keys (`userId`, `roleId`, `routeId`) and
/// the audit columns (`addedBy`, `updatedBy`), which point at users and carry
/// cascades just like real foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceEdge {
    pub child: EntityKind,
    pub column: &'static str,
    pub parent: EntityKind,
}

const fn edge(child: EntityKind, column: &'static str, parent: EntityKind) -> ReferenceEdge {
    ReferenceEdge { child, column, parent }
}

/// The whole dependency graph, one row per reference. This table is the
/// single source of truth: the executor is generic over it, so adding an
/// entity or an edge is a one-line change here instead of a new hand-written
/// recursive function per operation.
///
/// Edges into the same parent keep a stable declared order; sibling cascades
/// run in this order.
pub const REFERENCE_EDGES: &[ReferenceEdge] = &[
    // → User
    edge(EntityKind::Blog, "updatedBy", EntityKind::User),
    edge(EntityKind::Blog, "addedBy", EntityKind::User),
    edge(EntityKind::User, "addedBy", EntityKind::User),
    edge(EntityKind::User, "updatedBy", EntityKind::User),
    edge(EntityKind::UserAuthSettings, "userId", EntityKind::User),
    edge(EntityKind::UserAuthSettings, "addedBy", EntityKind::User),
    edge(EntityKind::UserAuthSettings, "updatedBy", EntityKind::User),
    edge(EntityKind::UserToken, "userId", EntityKind::User),
    edge(EntityKind::UserToken, "addedBy", EntityKind::User),
    edge(EntityKind::UserToken, "updatedBy", EntityKind::User),
    edge(EntityKind::UserRole, "userId", EntityKind::User),
    // → Role
    edge(EntityKind::RouteRole, "roleId", EntityKind::Role),
    edge(EntityKind::UserRole, "roleId", EntityKind::Role),
    // → ProjectRoute
    edge(EntityKind::RouteRole, "routeId", EntityKind::ProjectRoute),
];

/// Edges pointing at `kind`, in declaration order.
pub fn inbound_edges(kind: EntityKind) -> impl Iterator<Item = &'static ReferenceEdge> {
    REFERENCE_EDGES.iter().filter(move |edge| edge.parent == kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_has_the_full_audit_fanout() {
        let edges: Vec<_> = inbound_edges(EntityKind::User).collect();
        assert_eq!(edges.len(), 11);
        assert!(edges
            .iter()
            .any(|e| e.child == EntityKind::User && e.column == "addedBy"));
        assert!(edges
            .iter()
            .any(|e| e.child == EntityKind::Blog && e.column == "updatedBy"));
    }

    #[test]
    fn join_tables_are_leaves() {
        assert_eq!(inbound_edges(EntityKind::UserRole).count(), 0);
        assert_eq!(inbound_edges(EntityKind::RouteRole).count(), 0);
        assert_eq!(inbound_edges(EntityKind::UserToken).count(), 0);
        assert_eq!(inbound_edges(EntityKind::Blog).count(), 0);
    }

    #[test]
    fn role_and_route_cascades_cover_their_bindings() {
        let role_children: Vec<_> = inbound_edges(EntityKind::Role).map(|e| e.child).collect();
        assert_eq!(role_children, vec![EntityKind::RouteRole, EntityKind::UserRole]);

        let route_children: Vec<_> = inbound_edges(EntityKind::ProjectRoute)
            .map(|e| e.child)
            .collect();
        assert_eq!(route_children, vec![EntityKind::RouteRole]);
    }
}

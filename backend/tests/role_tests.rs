//! Role capability and staff assignment tests
//!
//! Property-based and unit tests for:
//! - Capabilities derived from role names and departments
//! - Warehouse access from assignment lists
//! - Assignment editing scope

use proptest::prelude::*;
use shared::{
    default_roles, format_assignment, is_assignable_role, join_id_list, parse_id_list,
    AssignmentScope, PermissionLevel, RoleProfile, Sector,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn seeded_role_strategy() -> impl Strategy<Value = RoleProfile> {
    proptest::sample::select(default_roles()).prop_map(|(name, dept)| RoleProfile::new(name, dept))
}

fn id_list_strategy() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(1i32..=120, 0..8)
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Admin implies supervisor implies nothing less
    #[test]
    fn test_admin_is_supervisor(role in seeded_role_strategy()) {
        if role.is_admin() {
            prop_assert!(role.is_supervisor());
            prop_assert!(role.level() >= PermissionLevel::Coordinator);
        }
    }

    /// Admins see every warehouse whatever their assignments
    #[test]
    fn test_admin_warehouse_access(
        role in seeded_role_strategy(),
        assigned in id_list_strategy(),
        wh in 1i32..=120,
    ) {
        let stored = join_id_list(&assigned);
        let access = role.has_warehouse_access(stored.as_deref(), wh);
        if role.is_admin() {
            prop_assert!(access);
        } else {
            prop_assert_eq!(access, assigned.contains(&wh));
        }
    }

    /// Stored id lists read back unchanged
    #[test]
    fn test_id_list_storage(ids in id_list_strategy()) {
        let stored = join_id_list(&ids);
        prop_assert_eq!(stored.is_none(), ids.is_empty());
        prop_assert_eq!(parse_id_list(stored.as_deref()), ids);
    }

    /// Only admins get an assignment scope
    #[test]
    fn test_scope_requires_admin(role in seeded_role_strategy()) {
        prop_assert_eq!(role.assignment_scope().allows_any(), role.is_admin());
    }

    /// Out-of-scope lists are dropped, in-scope lists pass through
    #[test]
    fn test_scope_filter(
        warehouses in any::<bool>(),
        containers in any::<bool>(),
        wh_list in id_list_strategy(),
        container_list in id_list_strategy(),
    ) {
        let scope = AssignmentScope { warehouses, containers };
        let (wh, hydro) = scope.filter(Some(wh_list.clone()), Some(container_list.clone()));
        prop_assert_eq!(wh, warehouses.then_some(wh_list));
        prop_assert_eq!(hydro, containers.then_some(container_list));
    }

    /// Coordinators and managers are never offered for assignment
    #[test]
    fn test_assignable_roles(role in seeded_role_strategy()) {
        prop_assert_eq!(
            is_assignable_role(&role.role_name),
            !role.is_coordinator() && !role.is_site_manager()
        );
    }
}

// ============================================================================
// Unit Tests: Capabilities
// ============================================================================

#[cfg(test)]
mod capability_tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(
            RoleProfile::new("Site Manager", "Global").level(),
            PermissionLevel::SiteManager
        );
        assert_eq!(
            RoleProfile::new("Coordinador WH", "WH").level(),
            PermissionLevel::Coordinator
        );
        assert_eq!(
            RoleProfile::new("Supervisor Lab", "Lab").level(),
            PermissionLevel::Supervisor
        );
        assert_eq!(
            RoleProfile::new("Tecnico Operaciones WH", "WH").level(),
            PermissionLevel::Technician
        );
    }

    #[test]
    fn test_lab_access() {
        assert!(RoleProfile::new("Tecnico Lab", "Lab").is_lab_technician());
        assert!(RoleProfile::new("Coordinador WH", "WH").is_lab_technician());
        assert!(!RoleProfile::new("Supervisor WH", "WH").is_lab_technician());
        assert!(!RoleProfile::new("Tecnico Operaciones Hydro", "Hydro").can_access_lab());
    }

    #[test]
    fn test_depot_access() {
        assert!(RoleProfile::new("Supervisor Deposito", "Deposito").has_depot_access());
        assert!(RoleProfile::new("Coordinador Lab", "Lab").has_depot_access());
        assert!(RoleProfile::new("Site Manager", "Global").has_depot_access());
        assert!(!RoleProfile::new("Tecnico Lab", "Lab").has_depot_access());
    }

    #[test]
    fn test_personnel_filter() {
        assert_eq!(
            RoleProfile::new("Coordinador Hydro", "Hydro").personnel_filter(),
            Some(Sector::Hydro)
        );
        assert_eq!(
            RoleProfile::new("Coordinador WH", "WH").personnel_filter(),
            Some(Sector::Wh)
        );
        assert_eq!(RoleProfile::new("Coordinador Lab", "Lab").personnel_filter(), None);
        assert_eq!(RoleProfile::new("Site Manager", "Global").personnel_filter(), None);
    }

    #[test]
    fn test_coordinator_scopes() {
        let wh = RoleProfile::new("Coordinador WH", "WH").assignment_scope();
        assert!(wh.warehouses && !wh.containers);

        let hydro = RoleProfile::new("Coordinador Hydro", "Hydro").assignment_scope();
        assert!(!hydro.warehouses && hydro.containers);

        let manager = RoleProfile::new("Site Manager", "Global").assignment_scope();
        assert!(manager.warehouses && manager.containers);
    }
}

// ============================================================================
// Unit Tests: Assignment Lists
// ============================================================================

#[cfg(test)]
mod assignment_tests {
    use super::*;

    #[test]
    fn test_bad_entry_voids_list() {
        assert_eq!(parse_id_list(Some("1,2,x")), Vec::<i32>::new());
        assert_eq!(parse_id_list(Some(" 4 , 5 ")), vec![4, 5]);
        assert!(parse_id_list(Some("  ")).is_empty());
        assert!(parse_id_list(None).is_empty());
    }

    #[test]
    fn test_assignment_display() {
        let wh = vec!["1".to_string(), "3".to_string()];
        assert_eq!(format_assignment(&wh, &[]), "WH: 1, 3");
        assert_eq!(format_assignment(&[], &[]), "Sin asignación");

        let many: Vec<String> = (1..=6).map(|c| c.to_string()).collect();
        assert_eq!(format_assignment(&wh, &many), "WH: 1, 3 | Hydro: 6 contenedores");
    }

    #[test]
    fn test_seeded_roles_cover_departments() {
        let roles = default_roles();
        for dept in ["WH", "Hydro", "Lab", "Deposito", "Global"] {
            assert!(roles.iter().any(|(_, d)| *d == dept), "missing {}", dept);
        }
    }
}

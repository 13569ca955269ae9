//! User, role and capability models
//!
//! Roles carry no permission table. Capabilities are derived from the role
//! name and department by substring matching, so "Coordinador Hydro" is both a
//! coordinator and the Hydro approver.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Sector;

/// A user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub role_id: Option<Uuid>,
    /// Comma separated warehouse ids, e.g. "1,2"
    pub wh_asignados: Option<String>,
    /// Comma separated Hydro container numbers
    pub containers_asignados: Option<String>,
    pub is_active: bool,
}

/// A job role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub nombre_puesto: String,
    pub departamento: String,
}

/// Coarse permission level derived from the role name
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Technician,
    Supervisor,
    Coordinator,
    SiteManager,
}

/// Role name and department of the acting user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleProfile {
    pub role_name: String,
    pub department: String,
}

impl RoleProfile {
    pub fn new(role_name: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            department: department.into(),
        }
    }

    fn role_contains(&self, keyword: &str) -> bool {
        self.role_name.contains(keyword)
    }

    pub fn is_site_manager(&self) -> bool {
        self.role_contains("Site Manager")
    }

    pub fn is_coordinator(&self) -> bool {
        self.role_contains("Coordinador")
    }

    pub fn is_hydro_coordinator(&self) -> bool {
        self.role_contains("Coordinador Hydro")
    }

    pub fn is_admin(&self) -> bool {
        ["Site Manager", "Coordinador", "Manager"]
            .iter()
            .any(|k| self.role_contains(k))
    }

    pub fn is_supervisor(&self) -> bool {
        self.is_admin() || self.role_contains("Supervisor")
    }

    pub fn can_access_lab(&self) -> bool {
        self.in_lab_department() || self.is_admin()
    }

    /// Gate for lab workbench and lab approval routes
    pub fn is_lab_technician(&self) -> bool {
        self.in_lab_department() || self.is_site_manager() || self.is_coordinator()
    }

    pub fn has_depot_access(&self) -> bool {
        let role = self.role_name.to_lowercase();
        let dept = self.department.to_lowercase();
        ["site", "coordinador", "admin"]
            .iter()
            .any(|k| role.contains(k))
            || ["deposito", "site", "global", "coordinacion"]
                .iter()
                .any(|k| dept.contains(k))
    }

    pub fn level(&self) -> PermissionLevel {
        if self.is_site_manager() {
            PermissionLevel::SiteManager
        } else if self.is_admin() {
            PermissionLevel::Coordinator
        } else if self.role_contains("Supervisor") {
            PermissionLevel::Supervisor
        } else {
            PermissionLevel::Technician
        }
    }

    /// Admins see every warehouse; everyone else only their assignments
    pub fn has_warehouse_access(&self, assigned: Option<&str>, wh: i32) -> bool {
        self.is_admin() || parse_id_list(assigned).contains(&wh)
    }

    /// Which assignment lists this user may edit on other staff
    pub fn assignment_scope(&self) -> AssignmentScope {
        if !self.is_admin() {
            return AssignmentScope::default();
        }
        if self.is_site_manager() {
            return AssignmentScope {
                warehouses: true,
                containers: true,
            };
        }
        AssignmentScope {
            warehouses: self.department != "Hydro",
            containers: self.department != "WH",
        }
    }

    /// Department a coordinator is restricted to when browsing personnel
    pub fn personnel_filter(&self) -> Option<Sector> {
        if !self.is_coordinator() {
            return None;
        }
        match self.department.as_str() {
            "WH" => Some(Sector::Wh),
            "Hydro" => Some(Sector::Hydro),
            _ => None,
        }
    }

    fn in_lab_department(&self) -> bool {
        matches!(self.department.as_str(), "Lab" | "Global")
    }
}

/// Assignment lists a user is allowed to change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentScope {
    pub warehouses: bool,
    pub containers: bool,
}

impl AssignmentScope {
    pub fn allows_any(&self) -> bool {
        self.warehouses || self.containers
    }

    /// Drop requested changes outside the scope instead of rejecting them
    pub fn filter<T>(&self, wh_list: Option<T>, container_list: Option<T>) -> (Option<T>, Option<T>) {
        (
            wh_list.filter(|_| self.warehouses),
            container_list.filter(|_| self.containers),
        )
    }
}

/// Parse a comma separated id list. Any bad entry voids the whole list.
pub fn parse_id_list(raw: Option<&str>) -> Vec<i32> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    raw.split(',')
        .map(|part| part.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_default()
}

/// Serialize an id list back to storage form; empty lists clear the column
pub fn join_id_list(ids: &[i32]) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    Some(
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Display string for a staff member's assignments
pub fn format_assignment(wh: &[String], hydro: &[String]) -> String {
    let mut parts = Vec::new();
    if !wh.is_empty() {
        parts.push(format!("WH: {}", wh.join(", ")));
    }
    if !hydro.is_empty() {
        if hydro.len() > 5 {
            parts.push(format!("Hydro: {} contenedores", hydro.len()));
        } else {
            parts.push(format!("Hydro: {}", hydro.join(", ")));
        }
    }
    if parts.is_empty() {
        "Sin asignación".to_string()
    } else {
        parts.join(" | ")
    }
}

/// Roles that are never offered for assignment
pub fn is_assignable_role(role_name: &str) -> bool {
    !["Coordinador", "Site Manager", "Manager"]
        .iter()
        .any(|k| role_name.contains(k))
}

/// Seeded roles as (nombre_puesto, departamento)
pub fn default_roles() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Tecnico Operaciones WH", "WH"),
        ("Tecnico Operaciones Hydro", "Hydro"),
        ("Tecnico Lab", "Lab"),
        ("Supervisor WH", "WH"),
        ("Supervisor Hydro", "Hydro"),
        ("Supervisor Lab", "Lab"),
        ("Supervisor Deposito", "Deposito"),
        ("Coordinador WH", "WH"),
        ("Coordinador Hydro", "Hydro"),
        ("Coordinador Lab", "Lab"),
        ("Site Manager", "Global"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str, dept: &str) -> RoleProfile {
        RoleProfile::new(name, dept)
    }

    #[test]
    fn test_levels() {
        assert_eq!(role("Site Manager", "Global").level(), PermissionLevel::SiteManager);
        assert_eq!(role("Coordinador WH", "WH").level(), PermissionLevel::Coordinator);
        assert_eq!(role("Supervisor Lab", "Lab").level(), PermissionLevel::Supervisor);
        assert_eq!(role("Tecnico Lab", "Lab").level(), PermissionLevel::Technician);
    }

    #[test]
    fn test_lab_and_depot_access() {
        assert!(role("Tecnico Lab", "Lab").is_lab_technician());
        assert!(!role("Supervisor WH", "WH").is_lab_technician());
        assert!(role("Supervisor Deposito", "Deposito").has_depot_access());
        assert!(!role("Tecnico Operaciones WH", "WH").has_depot_access());
        assert!(role("Coordinador WH", "WH").has_depot_access());
    }

    #[test]
    fn test_warehouse_access() {
        let tech = role("Tecnico Operaciones WH", "WH");
        assert!(tech.has_warehouse_access(Some("1, 2"), 2));
        assert!(!tech.has_warehouse_access(Some("1,x"), 1));
        assert!(!tech.has_warehouse_access(None, 1));
        assert!(role("Coordinador Lab", "Lab").has_warehouse_access(None, 7));
    }

    #[test]
    fn test_assignment_scope() {
        let wh = role("Coordinador WH", "WH").assignment_scope();
        assert!(wh.warehouses && !wh.containers);
        let hydro = role("Coordinador Hydro", "Hydro").assignment_scope();
        assert!(!hydro.warehouses && hydro.containers);
        assert!(!role("Supervisor WH", "WH").assignment_scope().allows_any());
        let (w, c) = wh.filter(Some(vec![1]), Some(vec![2]));
        assert_eq!(w, Some(vec![1]));
        assert_eq!(c, None);
    }

    #[test]
    fn test_format_assignment() {
        let wh = vec!["1".to_string(), "2".to_string()];
        let many: Vec<String> = (1..=6).map(|i| i.to_string()).collect();
        assert_eq!(format_assignment(&wh, &[]), "WH: 1, 2");
        assert_eq!(format_assignment(&wh, &many), "WH: 1, 2 | Hydro: 6 contenedores");
        assert_eq!(format_assignment(&[], &[]), "Sin asignación");
    }

    #[test]
    fn test_id_list_round_trip() {
        assert_eq!(parse_id_list(Some("3,4")), vec![3, 4]);
        assert_eq!(join_id_list(&[3, 4]).as_deref(), Some("3,4"));
        assert_eq!(join_id_list(&[]), None);
    }
}

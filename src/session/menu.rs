use crate::types::Role;

/// Sidebar entry restricted to a set of roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub path: &'static str,
    pub label: &'static str,
    pub roles: &'static [Role],
}

impl NavItem {
    /// An absent role matches nothing.
    #[must_use]
    pub fn allows(&self, role: Option<Role>) -> bool {
        role.is_some_and(|r| self.roles.contains(&r))
    }
}

const STAFF: &[Role] = &[Role::Admin, Role::Tributario, Role::Auditor];
const EDITORS: &[Role] = &[Role::Admin, Role::Tributario];

const DEFAULT_NAV: &[NavItem] = &[
    NavItem { path: "/dashboard", label: "Dashboard", roles: STAFF },
    NavItem { path: "/calificaciones", label: "Calificaciones", roles: STAFF },
    NavItem { path: "/empresas", label: "Empresas", roles: EDITORS },
    NavItem { path: "/propietarios", label: "Propietarios", roles: EDITORS },
    NavItem { path: "/historial", label: "Historial", roles: STAFF },
    NavItem { path: "/certificados", label: "Certificados", roles: EDITORS },
    NavItem { path: "/carga-masiva", label: "Carga Masiva", roles: EDITORS },
    NavItem { path: "/users", label: "Gestión Usuarios", roles: &[Role::Admin] },
    NavItem { path: "/mfa-setup", label: "Configurar MFA", roles: STAFF },
];

/// The NUAM sidebar.
#[must_use]
pub fn default_nav() -> &'static [NavItem] {
    DEFAULT_NAV
}

/// Entries of `items` the given role may see, in order.
#[must_use]
pub fn visible_items(items: &[NavItem], role: Option<Role>) -> Vec<&NavItem> {
    items.iter().filter(|item| item.allows(role)).collect()
}

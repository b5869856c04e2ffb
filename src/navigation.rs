//! Which page is shown, and who may see it.

use serde::Serialize;

use crate::models::{AuthUser, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Page {
    Home,
    Login,
    Signup,
    DriverDashboard,
    MasterDashboard,
    Profile,
}

/// In-memory page state.
///
/// Opening a dashboard while signed out switches on demo mode, which lets
/// the driver dashboard render without a session. Going back to home,
/// login or signup switches it off again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    current: Page,
    demo_mode: bool,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            current: Page::Home,
            demo_mode: false,
        }
    }

    pub fn current(&self) -> Page {
        self.current
    }

    pub fn demo_mode(&self) -> bool {
        self.demo_mode
    }

    pub fn go_home(&mut self) {
        self.current = Page::Home;
        self.demo_mode = false;
    }

    pub fn go_login(&mut self) {
        self.current = Page::Login;
        self.demo_mode = false;
    }

    pub fn go_signup(&mut self) {
        self.current = Page::Signup;
        self.demo_mode = false;
    }

    pub fn go_driver_dashboard(&mut self, authenticated: bool) {
        self.current = Page::DriverDashboard;
        if !authenticated {
            self.demo_mode = true;
        }
    }

    pub fn go_master_dashboard(&mut self, authenticated: bool) {
        self.current = Page::MasterDashboard;
        if !authenticated {
            self.demo_mode = true;
        }
    }

    pub fn go_profile(&mut self) {
        self.current = Page::Profile;
    }

    /// Drivers land on their dashboard, every other role on the master one
    pub fn after_login(&mut self, role: &Role) -> Page {
        match role {
            Role::Driver => self.go_driver_dashboard(true),
            _ => self.go_master_dashboard(true),
        }
        self.current
    }

    /// Admins land on the master dashboard, everyone else on the driver one
    pub fn after_signup(&mut self, role: &Role) -> Page {
        match role {
            Role::Admin => self.go_master_dashboard(true),
            _ => self.go_driver_dashboard(true),
        }
        self.current
    }

    /// Logging out always returns home
    pub fn after_logout(&mut self) -> Page {
        self.go_home();
        self.current
    }

    /// The page actually rendered once access rules are applied
    pub fn resolve(&self, user: Option<&AuthUser>) -> Page {
        match self.current {
            Page::DriverDashboard if user.is_none() && !self.demo_mode => Page::Login,
            Page::MasterDashboard => match user {
                Some(AuthUser {
                    role: Role::Admin, ..
                }) => Page::MasterDashboard,
                _ => Page::Login,
            },
            page => page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: 1,
            email: "someone@example.com".to_string(),
            name: "Someone".to_string(),
            role,
            phone: None,
            device_id: None,
            user_type: None,
        }
    }

    #[test]
    fn starts_home() {
        let nav = Navigator::new();
        assert_eq!(nav.current(), Page::Home);
        assert!(!nav.demo_mode());
    }

    #[test]
    fn role_decides_landing_page() {
        let mut nav = Navigator::new();
        assert_eq!(nav.after_login(&Role::Driver), Page::DriverDashboard);
        assert_eq!(nav.after_login(&Role::Admin), Page::MasterDashboard);
        assert_eq!(
            nav.after_login(&Role::Other("auditor".to_string())),
            Page::MasterDashboard
        );

        assert_eq!(nav.after_signup(&Role::Admin), Page::MasterDashboard);
        assert_eq!(
            nav.after_signup(&Role::Other("auditor".to_string())),
            Page::DriverDashboard
        );
    }

    #[test]
    fn demo_mode_opens_driver_dashboard_only() {
        let mut nav = Navigator::new();
        nav.go_driver_dashboard(false);
        assert!(nav.demo_mode());
        assert_eq!(nav.resolve(None), Page::DriverDashboard);

        nav.go_master_dashboard(false);
        assert_eq!(nav.resolve(None), Page::Login);

        nav.go_home();
        assert!(!nav.demo_mode());
    }

    #[test]
    fn master_dashboard_requires_admin() {
        let mut nav = Navigator::new();
        nav.go_master_dashboard(true);

        assert_eq!(nav.resolve(Some(&user(Role::Driver))), Page::Login);
        assert_eq!(
            nav.resolve(Some(&user(Role::Admin))),
            Page::MasterDashboard
        );
    }

    #[test]
    fn driver_dashboard_requires_session_outside_demo() {
        let mut nav = Navigator::new();
        nav.go_driver_dashboard(true);

        assert_eq!(nav.resolve(None), Page::Login);
        assert_eq!(
            nav.resolve(Some(&user(Role::Driver))),
            Page::DriverDashboard
        );
    }
}

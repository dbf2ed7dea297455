//! Route guard decisions.
//!
//! Guards are a pure function of the resolved [`AuthState`], the policy of
//! the route, and a little request context. The HTTP layer turns the
//! resulting [`GuardDecision`] into a response.

use url::Url;

use crate::api::User;

/// Where the login page lives.
pub const LOGIN_PATH: &str = "/auth/login";

/// Outcome of the session check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// The session check has not finished.
    Loading,
    /// No valid session.
    Anonymous,
    /// A user was fetched with the stored token.
    Authenticated(User),
}

impl AuthState {
    /// The authenticated user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Loading | Self::Anonymous => None,
        }
    }
}

/// Which guard protects a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPolicy {
    /// Any signed-in user.
    Authenticated,
    /// Signed-in user with the `admin` role who also confirmed the admin
    /// panel password in this session.
    Admin,
}

/// Request facts the admin guard needs.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    /// `Host` header of the request, possibly with a port.
    pub host: &'a str,
    /// Label identifying the admin subdomain, e.g. `admin`.
    pub admin_subdomain: &'a str,
    /// Canonical customer-facing site.
    pub customer_base_url: &'a Url,
    /// Whether the admin password was confirmed in this session.
    pub admin_verified: bool,
}

/// Where to send a visitor who may not see the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// In-app redirect to a path on this host.
    Soft(String),
    /// Full navigation to another origin.
    Hard(Url),
}

/// What the route should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Nothing conclusive can be rendered yet.
    Pending,
    /// Render the page.
    Allow,
    /// Render only the admin password prompt.
    PromptPassword,
    /// Render nothing and navigate away.
    Navigate(Navigation),
}

/// Decide what a guarded route may render.
#[must_use]
pub fn decide(policy: GuardPolicy, state: &AuthState, ctx: &GuardContext<'_>) -> GuardDecision {
    let user = match state {
        AuthState::Loading => return GuardDecision::Pending,
        AuthState::Anonymous => {
            return GuardDecision::Navigate(Navigation::Soft(LOGIN_PATH.to_owned()));
        }
        AuthState::Authenticated(user) => user,
    };

    if policy == GuardPolicy::Authenticated {
        return GuardDecision::Allow;
    }

    if !user.is_admin() {
        return GuardDecision::Navigate(non_admin_destination(ctx));
    }

    if ctx.admin_verified {
        GuardDecision::Allow
    } else {
        GuardDecision::PromptPassword
    }
}

/// Non-admins on the admin subdomain leave it entirely; elsewhere they go home.
fn non_admin_destination(ctx: &GuardContext<'_>) -> Navigation {
    if is_admin_host(ctx.host, ctx.admin_subdomain) && !is_local_development(ctx.host) {
        Navigation::Hard(ctx.customer_base_url.clone())
    } else {
        Navigation::Soft("/".to_owned())
    }
}

/// Host name without port, lowercased.
fn hostname(host: &str) -> String {
    let host = host.trim();
    let name = if host.starts_with('[') {
        // IPv6 literal, keep the brackets.
        host.find(']').map_or(host, |end| host.get(..=end).unwrap_or(host))
    } else {
        host.split(':').next().unwrap_or(host)
    };
    name.to_ascii_lowercase()
}

/// Whether `host` is the admin subdomain, e.g. `admin.milkrun.example`.
#[must_use]
pub fn is_admin_host(host: &str, admin_subdomain: &str) -> bool {
    if admin_subdomain.is_empty() {
        return false;
    }
    let name = hostname(host);
    name.strip_prefix(&admin_subdomain.to_ascii_lowercase())
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Whether `host` points at a developer machine.
#[must_use]
pub fn is_local_development(host: &str) -> bool {
    let name = hostname(host);
    matches!(name.as_str(), "localhost" | "127.0.0.1" | "[::1]") || name.ends_with(".localhost")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use milkrun_core::{UserId, UserRole};

    use super::*;

    fn user(role: &str) -> User {
        User {
            id: UserId::new("u1"),
            email: "sam@milkrun.example".to_string(),
            name: None,
            role: UserRole::parse(role),
        }
    }

    fn customer_url() -> Url {
        Url::parse("https://milkrun.example/").unwrap()
    }

    fn ctx<'a>(host: &'a str, url: &'a Url, admin_verified: bool) -> GuardContext<'a> {
        GuardContext {
            host,
            admin_subdomain: "admin",
            customer_base_url: url,
            admin_verified,
        }
    }

    #[test]
    fn test_loading_is_pending_for_both_policies() {
        let url = customer_url();
        let ctx = ctx("milkrun.example", &url, true);
        for policy in [GuardPolicy::Authenticated, GuardPolicy::Admin] {
            assert_eq!(
                decide(policy, &AuthState::Loading, &ctx),
                GuardDecision::Pending
            );
        }
    }

    #[test]
    fn test_anonymous_goes_to_login() {
        let url = customer_url();
        let ctx = ctx("admin.milkrun.example", &url, false);
        for policy in [GuardPolicy::Authenticated, GuardPolicy::Admin] {
            assert_eq!(
                decide(policy, &AuthState::Anonymous, &ctx),
                GuardDecision::Navigate(Navigation::Soft("/auth/login".to_string()))
            );
        }
    }

    #[test]
    fn test_authenticated_policy_allows_any_role() {
        let url = customer_url();
        let ctx = ctx("milkrun.example", &url, false);
        let state = AuthState::Authenticated(user("customer"));
        assert_eq!(
            decide(GuardPolicy::Authenticated, &state, &ctx),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_customer_on_admin_subdomain_hard_redirects() {
        let url = customer_url();
        let ctx = ctx("admin.milkrun.example:443", &url, true);
        let state = AuthState::Authenticated(user("customer"));
        assert_eq!(
            decide(GuardPolicy::Admin, &state, &ctx),
            GuardDecision::Navigate(Navigation::Hard(url.clone()))
        );
    }

    #[test]
    fn test_customer_elsewhere_soft_redirects_home() {
        let url = customer_url();
        let state = AuthState::Authenticated(user("customer"));
        for host in [
            "milkrun.example",
            "admin.localhost:3000",
            "localhost:3000",
            "127.0.0.1",
            "[::1]:3000",
            "administrator.milkrun.example",
        ] {
            let ctx = ctx(host, &url, true);
            assert_eq!(
                decide(GuardPolicy::Admin, &state, &ctx),
                GuardDecision::Navigate(Navigation::Soft("/".to_string())),
                "host {host}"
            );
        }
    }

    #[test]
    fn test_admin_role_case_insensitive() {
        let url = customer_url();
        let ctx = ctx("milkrun.example", &url, true);
        for role in ["admin", "Admin", "ADMIN", "aDmIn"] {
            let state = AuthState::Authenticated(user(role));
            assert_eq!(
                decide(GuardPolicy::Admin, &state, &ctx),
                GuardDecision::Allow,
                "role {role:?}"
            );
        }

        for role in [" admin ", "admin\t", "administrator"] {
            let state = AuthState::Authenticated(user(role));
            assert!(
                matches!(
                    decide(GuardPolicy::Admin, &state, &ctx),
                    GuardDecision::Navigate(_)
                ),
                "role {role:?}"
            );
        }
    }

    #[test]
    fn test_unverified_admin_gets_prompt() {
        let url = customer_url();
        let ctx = ctx("admin.milkrun.example", &url, false);
        let state = AuthState::Authenticated(user("admin"));
        assert_eq!(
            decide(GuardPolicy::Admin, &state, &ctx),
            GuardDecision::PromptPassword
        );
    }

    #[test]
    fn test_customer_never_allowed_even_if_flag_set() {
        let url = customer_url();
        let state = AuthState::Authenticated(user("customer"));
        for _ in 0..3 {
            let decision = decide(GuardPolicy::Admin, &state, &ctx("milkrun.example", &url, true));
            assert!(!matches!(
                decision,
                GuardDecision::Allow | GuardDecision::PromptPassword
            ));
        }
    }

    #[test]
    fn test_host_helpers() {
        assert!(is_admin_host("Admin.Milkrun.Example", "admin"));
        assert!(!is_admin_host("milkrun.example", "admin"));
        assert!(!is_admin_host("admin", "admin"));
        assert!(!is_admin_host("admin.milkrun.example", ""));

        assert!(is_local_development("localhost"));
        assert!(is_local_development("shop.localhost:8080"));
        assert!(!is_local_development("milkrun.example"));
        assert!(!is_local_development("localhost.milkrun.example"));
    }
}

//! Navigation guards
//!
//! Decides whether a navigation may proceed and, when it may not, where it
//! should go instead. Guards read the same evaluator as every other check, so
//! a principal whose permissions are still loading is treated as holding none.

use crate::access::AccessControl;
use crate::rbac::{Decision, DenyReason, MatchMode};
use std::time::Duration;

/// Where a guarded navigation ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardOutcome {
    Allow,
    RedirectToLogin,
    RedirectToUnauthorized,
    RedirectHome,
}

impl GuardOutcome {
    pub fn is_allowed(self) -> bool {
        self == GuardOutcome::Allow
    }

    /// Conventional path for the redirect, `None` for `Allow`
    pub fn redirect_path(self) -> Option<&'static str> {
        match self {
            GuardOutcome::Allow => None,
            GuardOutcome::RedirectToLogin => Some("/login"),
            GuardOutcome::RedirectToUnauthorized => Some("/unauthorized"),
            GuardOutcome::RedirectHome => Some("/"),
        }
    }

    fn from_decision(decision: &Decision) -> Self {
        match decision.reason {
            None if decision.allowed => GuardOutcome::Allow,
            Some(DenyReason::NotAuthenticated) => GuardOutcome::RedirectToLogin,
            _ => GuardOutcome::RedirectToUnauthorized,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationGuard {
    access: AccessControl,
}

impl NavigationGuard {
    pub fn new(access: AccessControl) -> Self {
        Self { access }
    }

    pub fn require_auth(&self) -> GuardOutcome {
        if self.access.session().is_authenticated() {
            GuardOutcome::Allow
        } else {
            GuardOutcome::RedirectToLogin
        }
    }

    /// Pages such as login that signed-in principals should skip
    pub fn require_guest(&self) -> GuardOutcome {
        if self.access.session().is_authenticated() {
            GuardOutcome::RedirectHome
        } else {
            GuardOutcome::Allow
        }
    }

    pub fn require_permissions<S: AsRef<str>>(&self, names: &[S], mode: MatchMode) -> GuardOutcome {
        let outcome = GuardOutcome::from_decision(&self.access.evaluator().authorize_permissions(names, mode));
        self.trace("permissions", outcome);
        outcome
    }

    /// Principals lacking every listed role are sent home
    pub fn require_any_role<S: AsRef<str>>(&self, roles: &[S]) -> GuardOutcome {
        let decision = self.access.evaluator().authorize_roles(roles, MatchMode::Any);
        let outcome = match GuardOutcome::from_decision(&decision) {
            GuardOutcome::RedirectToUnauthorized => GuardOutcome::RedirectHome,
            other => other,
        };
        self.trace("roles", outcome);
        outcome
    }

    pub fn guard_route(&self, route_key: &str) -> GuardOutcome {
        let outcome = GuardOutcome::from_decision(&self.access.evaluator().can_access_route(route_key));
        self.trace(route_key, outcome);
        outcome
    }

    pub fn guard_feature(&self, feature_key: &str) -> GuardOutcome {
        let outcome = GuardOutcome::from_decision(&self.access.evaluator().can_access_feature(feature_key));
        self.trace(feature_key, outcome);
        outcome
    }

    /// Wait for any in-flight permission load to settle
    ///
    /// Returns `false` when `timeout` elapses first. The caller then proceeds
    /// with whatever the evaluator currently says.
    pub async fn wait_until_ready(&self, timeout: Duration) -> bool {
        let (_subscription, mut loading) = self.access.watch_channel(|ev| ev.is_loading());
        let ready = match tokio::time::timeout(timeout, loading.wait_for(|l| !*l)).await {
            Ok(Ok(_)) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                log::warn!("Permissions still loading after {:?}, guarding with current snapshot", timeout);
                false
            }
        };
        ready
    }

    /// [`guard_route`](Self::guard_route) after a bounded [`wait_until_ready`](Self::wait_until_ready)
    pub async fn guard_route_when_ready(&self, route_key: &str, timeout: Duration) -> GuardOutcome {
        self.wait_until_ready(timeout).await;
        self.guard_route(route_key)
    }

    fn trace(&self, target: &str, outcome: GuardOutcome) {
        if !outcome.is_allowed() {
            log::debug!("Navigation to {} redirected: {:?}", target, outcome);
        }
    }
}

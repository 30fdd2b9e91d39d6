use crate::features::world::{split, RollcallWorld};
use cucumber::{given, then, when};
use rollcall_core::guard::NavigationGuard;
use rollcall_core::rbac::{MatchMode, Requirement};

// ==================== SIGN-IN ====================

#[given(expr = "{string} is signed in as a {string}")]
async fn given_signed_in_as(world: &mut RollcallWorld, id: String, role: String) {
    world.sign_in(&id, RollcallWorld::role_grant(&role)).await;
}

#[when(expr = "{string} is signed in as a {string}")]
async fn when_signed_in_as(world: &mut RollcallWorld, id: String, role: String) {
    world.sign_in(&id, RollcallWorld::role_grant(&role)).await;
}

#[given(expr = "{string} is signed in with permissions {string}")]
async fn given_signed_in_with(world: &mut RollcallWorld, id: String, names: String) {
    world.sign_in(&id, RollcallWorld::permission_grant(&names)).await;
}

// ==================== ROUTES AND FEATURES ====================

#[then(expr = "route {string} is allowed")]
async fn then_route_allowed(world: &mut RollcallWorld, route: String) {
    assert!(world.access.authorize(&Requirement::route(&route)).allowed, "{} should be allowed", route);
}

#[then(expr = "route {string} is denied")]
async fn then_route_denied(world: &mut RollcallWorld, route: String) {
    assert!(!world.access.authorize(&Requirement::route(&route)).allowed, "{} should be denied", route);
}

#[then(expr = "feature {string} is denied")]
async fn then_feature_denied(world: &mut RollcallWorld, feature: String) {
    assert!(!world.access.authorize(&Requirement::feature(&feature)).allowed);
}

#[then(expr = "navigating to {string} redirects to {string}")]
async fn then_redirects(world: &mut RollcallWorld, route: String, target: String) {
    let outcome = NavigationGuard::new(world.access.clone()).guard_route(&route);
    assert_eq!(outcome.redirect_path(), Some(target.as_str()));
}

#[then("an empty any-of permission check passes")]
async fn then_empty_any_passes(world: &mut RollcallWorld) {
    assert!(world.access.evaluator().has_any_permission(Vec::<String>::new()));
}

// ==================== REQUIREMENTS ====================

#[when(expr = "all of {string} are required")]
async fn when_all_required(world: &mut RollcallWorld, names: String) {
    world.decision = Some(world.access.evaluator().authorize_permissions(&split(&names)[..], MatchMode::All));
}

#[when(expr = "any of {string} is required")]
async fn when_any_required(world: &mut RollcallWorld, names: String) {
    world.decision = Some(world.access.evaluator().authorize_permissions(&split(&names)[..], MatchMode::Any));
}

#[when(expr = "{string} is required on a resource owned by {string}")]
async fn when_owned_required(world: &mut RollcallWorld, permission: String, owner: String) {
    world.decision = Some(world.access.authorize(&Requirement::owned(&permission, owner)));
}

#[then("the decision is allowed")]
async fn then_allowed(world: &mut RollcallWorld) {
    let decision = world.decision.as_ref().expect("no decision taken");
    assert!(decision.allowed, "denied: {:?}", decision);
}

#[then("the decision is denied")]
async fn then_denied(world: &mut RollcallWorld) {
    let decision = world.decision.as_ref().expect("no decision taken");
    assert!(!decision.allowed);
}

#[then(expr = "the decision is denied with reason {string}")]
async fn then_denied_with(world: &mut RollcallWorld, reason: String) {
    let decision = world.decision.as_ref().expect("no decision taken");
    assert!(!decision.allowed);
    assert_eq!(decision.reason.map(|r| r.to_string()), Some(reason));
}

#[then(expr = "the missing permissions are {string}")]
async fn then_missing(world: &mut RollcallWorld, names: String) {
    let decision = world.decision.as_ref().expect("no decision taken");
    assert_eq!(decision.missing, split(&names));
}

#[then(expr = "permission {string} is granted")]
async fn then_granted(world: &mut RollcallWorld, name: String) {
    assert!(world.access.has_permission(&name), "{} should be granted", name);
}

#[then(expr = "permission {string} is not granted")]
async fn then_not_granted(world: &mut RollcallWorld, name: String) {
    assert!(!world.access.has_permission(&name), "{} should not be granted", name);
}

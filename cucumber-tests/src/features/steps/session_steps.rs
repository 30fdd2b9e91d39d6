use crate::features::world::RollcallWorld;
use cucumber::{given, then, when};
use rollcall_core::rbac::DirectoryError;
use rollcall_core::session::Credentials;

// ==================== ACCOUNTS ====================

#[given(expr = "an account {string} with password {string} for {string} as a {string}")]
async fn given_account(world: &mut RollcallWorld, email: String, password: String, id: String, role: String) {
    world.directory.set_grant(&id, RollcallWorld::role_grant(&role));
    let _ = world.identity.clone().with_account(email, password, RollcallWorld::principal(&id));
}

#[given(expr = "the account {string} requires the MFA code {string}")]
async fn given_mfa(world: &mut RollcallWorld, email: String, code: String) {
    let _ = world.identity.clone().requiring_mfa(&email, code);
}

// ==================== FLOWS ====================

#[when(expr = "{string} logs in with password {string}")]
async fn when_login(world: &mut RollcallWorld, email: String, password: String) {
    world.last_error = world.access.session().login(&email, &password).await.err().map(|e| e.to_string());
}

#[when(expr = "the MFA code {string} is submitted")]
async fn when_mfa(world: &mut RollcallWorld, code: String) {
    world.last_error = world.access.session().verify_mfa(&code).await.err().map(|e| e.to_string());
}

#[when("the session logs out")]
async fn when_logout(world: &mut RollcallWorld) {
    world.access.session().logout();
}

#[when(expr = "{string} starts signing in as a {string}")]
async fn when_starts_signing_in(world: &mut RollcallWorld, id: String, role: String) {
    world.directory.set_grant(&id, RollcallWorld::role_grant(&role));
    let pending = world
        .access
        .session()
        .complete_authentication(RollcallWorld::principal(&id), Credentials::new(format!("token-{}", id)));
    world.pending = Some(pending);
}

#[when("the permission load settles")]
async fn when_load_settles(world: &mut RollcallWorld) {
    let pending = world.pending.take().expect("no load in flight");
    pending.run().await.expect("permission load failed");
}

#[when("the directory fails the next load")]
async fn when_directory_fails(world: &mut RollcallWorld) {
    world.directory.fail_next(DirectoryError::Network("connection reset".to_string()));
}

#[when(expr = "the directory grants {string} permissions {string}")]
async fn when_directory_grants(world: &mut RollcallWorld, id: String, names: String) {
    world.directory.set_grant(&id, RollcallWorld::permission_grant(&names));
}

#[when("permissions are reloaded")]
async fn when_reloaded(world: &mut RollcallWorld) {
    world.last_error = world.access.reload_permissions().await.err().map(|e| e.to_string());
}

#[when("the refresh token is rejected")]
async fn when_refresh_rejected(world: &mut RollcallWorld) {
    world.identity.expire_refresh_tokens();
    world.last_error = world.access.session().refresh().await.err().map(|e| e.to_string());
}

// ==================== OUTCOMES ====================

#[then(expr = "the session is {string}")]
async fn then_session_is(world: &mut RollcallWorld, status: String) {
    assert_eq!(world.access.session().status().to_string(), status);
}

#[then("the last operation failed")]
async fn then_failed(world: &mut RollcallWorld) {
    assert!(world.last_error.is_some(), "expected an error");
}

#[then("the permission cache reports an error")]
async fn then_cache_error(world: &mut RollcallWorld) {
    assert!(world.access.cache().get().error().is_some());
}

use crate::features::world::{split, RollcallWorld};
use cucumber::{given, then, when};
use rollcall_core::gate::{GateOptions, ViewGate};
use rollcall_core::rbac::Requirement;
use std::sync::Arc;

// ==================== TREE ====================

#[given(expr = "elements {string} under the root")]
async fn given_elements(world: &mut RollcallWorld, names: String) {
    for name in split(&names) {
        let id = world.tree.create_element("div");
        world.tree.append_child(world.tree.root(), id);
        world.elements.insert(name, id);
    }
}

#[given(expr = "element {string} has display {string}")]
async fn given_display(world: &mut RollcallWorld, name: String, display: String) {
    let id = world.element(&name);
    world.tree.set_display(id, &display);
}

// ==================== GATES ====================

fn attach(world: &mut RollcallWorld, name: String, options: GateOptions) {
    let element = world.tree.element(world.element(&name));
    let gate = ViewGate::attach(&world.access, element, options);
    world.gates.insert(name, gate);
}

#[given(expr = "element {string} is removed unless permission {string}")]
async fn given_removed(world: &mut RollcallWorld, name: String, permission: String) {
    attach(world, name, GateOptions::new(Requirement::permission(permission)).remove());
}

#[given(expr = "element {string} is hidden unless role {string}")]
async fn given_hidden(world: &mut RollcallWorld, name: String, role: String) {
    attach(world, name, GateOptions::new(Requirement::role(role)).hide());
}

#[given(expr = "element {string} is disabled unless permission {string}")]
async fn given_disabled(world: &mut RollcallWorld, name: String, permission: String) {
    attach(world, name, GateOptions::new(Requirement::permission(permission)).disable());
}

#[when(expr = "the gate on {string} is released")]
async fn when_released(world: &mut RollcallWorld, name: String) {
    world.gates.remove(&name).expect("no gate on element").release();
}

// ==================== WATCHERS ====================

#[given(expr = "a watcher on permission {string}")]
async fn given_watcher(world: &mut RollcallWorld, permission: String) {
    let sink = Arc::clone(&world.emitted);
    let subscription = world.access.watch_permission(permission, move |allowed| {
        sink.lock().unwrap_or_else(|e| e.into_inner()).push(*allowed)
    });
    world.subscriptions.push(subscription);
}

#[then(expr = "the watcher saw {string}")]
async fn then_watcher_saw(world: &mut RollcallWorld, values: String) {
    let expected: Vec<bool> = split(&values).iter().map(|v| v == "true").collect();
    let seen = world.emitted.lock().unwrap_or_else(|e| e.into_inner()).clone();
    assert_eq!(seen, expected);
}

// ==================== OUTCOMES ====================

#[then(expr = "the root holds {int} children with {int} marker(s)")]
async fn then_root_holds(world: &mut RollcallWorld, children: usize, markers: usize) {
    assert_eq!(world.tree.children(world.tree.root()).len(), children);
    assert_eq!(world.tree.marker_count(), markers);
}

#[then(expr = "the root children are {string}")]
async fn then_root_children(world: &mut RollcallWorld, names: String) {
    let expected: Vec<_> = split(&names).iter().map(|n| world.element(n)).collect();
    assert_eq!(world.tree.children(world.tree.root()), expected);
}

#[then("there are no markers")]
async fn then_no_markers(world: &mut RollcallWorld) {
    assert_eq!(world.tree.marker_count(), 0);
}

#[then(expr = "element {string} has display {string}")]
async fn then_display(world: &mut RollcallWorld, name: String, display: String) {
    assert_eq!(world.tree.display(world.element(&name)), display);
}

#[then(expr = "element {string} is disabled")]
async fn then_is_disabled(world: &mut RollcallWorld, name: String) {
    assert!(world.tree.is_disabled(world.element(&name)));
}

#[then(expr = "element {string} is enabled")]
async fn then_is_enabled(world: &mut RollcallWorld, name: String) {
    assert!(!world.tree.is_disabled(world.element(&name)));
}

use cucumber::World as CucumberWorld;
use rollcall_core::access::AccessControl;
use rollcall_core::cache::PendingLoad;
use rollcall_core::gate::memory::{MemoryElement, MemoryTree, NodeId};
use rollcall_core::gate::ViewGate;
use rollcall_core::rbac::{Decision, DirectoryGrant, Permission, Role, SystemRole};
use rollcall_core::reactive::Subscription;
use rollcall_core::session::{Credentials, Principal};
use rollcall_core::testing::{ScriptedDirectory, ScriptedIdentity};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Shared state of one scenario
#[derive(CucumberWorld)]
#[world(init = Self::new)]
pub struct RollcallWorld {
    pub directory: ScriptedDirectory,
    pub identity: ScriptedIdentity,
    pub access: AccessControl,
    pub tree: MemoryTree,
    pub elements: HashMap<String, NodeId>,
    pub gates: HashMap<String, ViewGate<MemoryElement>>,
    pub decision: Option<Decision>,
    pub pending: Option<PendingLoad>,
    pub last_error: Option<String>,
    pub emitted: Arc<Mutex<Vec<bool>>>,
    pub subscriptions: Vec<Subscription>,
}

impl std::fmt::Debug for RollcallWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollcallWorld")
            .field("session", &self.access.session().status())
            .field("elements", &self.elements)
            .field("gates", &self.gates.len())
            .field("decision", &self.decision)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl RollcallWorld {
    pub fn new() -> Self {
        let directory = ScriptedDirectory::new();
        let identity = ScriptedIdentity::new();
        let access = AccessControl::new(directory.clone(), identity.clone());
        Self {
            directory,
            identity,
            access,
            tree: MemoryTree::new(),
            elements: HashMap::new(),
            gates: HashMap::new(),
            decision: None,
            pending: None,
            last_error: None,
            emitted: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Vec::new(),
        }
    }

    pub fn principal(id: &str) -> Principal {
        Principal::new(id, format!("{}@school.test", id))
    }

    /// Grant built from a system role name
    pub fn role_grant(role: &str) -> DirectoryGrant {
        let role: SystemRole = role.parse().unwrap_or_else(|e| panic!("{}", e));
        role.into()
    }

    /// Grant built from a comma separated permission list
    pub fn permission_grant(names: &str) -> DirectoryGrant {
        Role::new("custom", "custom")
            .with_permissions(split(names).into_iter().map(|n| Permission::new(n.clone(), n)))
            .into()
    }

    /// Authenticate `id` and wait for its permissions to load
    pub async fn sign_in(&mut self, id: &str, grant: DirectoryGrant) {
        self.directory.set_grant(id, grant);
        self.access
            .session()
            .complete_authentication(Self::principal(id), Credentials::new(format!("token-{}", id)))
            .run()
            .await
            .expect("permission load failed");
    }

    pub fn element(&self, name: &str) -> NodeId {
        *self.elements.get(name).unwrap_or_else(|| panic!("no element named {}", name))
    }
}

/// Split a comma separated list, dropping blanks
pub fn split(list: &str) -> Vec<String> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

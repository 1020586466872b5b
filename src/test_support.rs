//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::inventory::{
    Inventory, InventoryFuture, ManagedObjectRef, ObjectKind, TaskAction, TaskInfo, TaskMethod,
    TaskState,
};

/// Errors produced by [`ScriptedInventory`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedInventoryError {
    /// A failure injected by the test.
    #[error("scripted failure: {0}")]
    Scripted(String),
    /// The referenced object does not exist in the scripted inventory.
    #[error("managed object {0} not found")]
    NotFound(String),
}

/// Records a single call made through [`ScriptedInventory`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InventoryCall {
    /// Path lookup.
    FindByInventoryPath(String),
    /// Snapshot property read.
    CurrentSnapshot(ManagedObjectRef),
    /// Name property read.
    DisplayName(ManagedObjectRef),
    /// Task submission.
    Submit {
        /// Object the task targets.
        target: ManagedObjectRef,
        /// Submitted method.
        method: TaskMethod,
    },
    /// Task progress poll.
    TaskInfo(ManagedObjectRef),
}

#[derive(Debug)]
struct SubmittedTask {
    target: ManagedObjectRef,
    method: TaskMethod,
}

#[derive(Debug, Default)]
struct InventoryState {
    paths: HashMap<String, ManagedObjectRef>,
    failing_paths: HashSet<String>,
    snapshots: HashMap<String, ManagedObjectRef>,
    names: HashMap<String, String>,
    rejected: HashSet<TaskAction>,
    scripts: HashMap<TaskAction, VecDeque<TaskInfo>>,
    tasks: HashMap<String, SubmittedTask>,
    next_id: u32,
    calls: Vec<InventoryCall>,
}

impl InventoryState {
    fn next_value(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn resolve_task(&mut self, task: &ManagedObjectRef) -> Result<TaskInfo, ScriptedInventoryError> {
        let (action, target) = match self.tasks.get(&task.value) {
            Some(submitted) => (submitted.method.action(), submitted.target.clone()),
            None => return Err(ScriptedInventoryError::NotFound(task.value.clone())),
        };
        let scripted = self
            .scripts
            .get_mut(&action)
            .and_then(VecDeque::pop_front);
        let info = match scripted {
            Some(info) => info,
            None if action == TaskAction::CloneVm => {
                let vm = ManagedObjectRef::virtual_machine(self.next_value("vm"));
                TaskInfo::success(Some(vm))
            }
            None => TaskInfo::success(None),
        };
        if info.state == TaskState::Success {
            self.apply_success(task, action, &target, info.result.as_ref());
        }
        Ok(info)
    }

    fn apply_success(
        &mut self,
        task: &ManagedObjectRef,
        action: TaskAction,
        target: &ManagedObjectRef,
        result: Option<&ManagedObjectRef>,
    ) {
        match action {
            TaskAction::CloneVm => {
                let name = self.tasks.get(&task.value).and_then(|submitted| {
                    match &submitted.method {
                        TaskMethod::CloneVm { name, .. } => Some(name.clone()),
                        TaskMethod::PowerOff | TaskMethod::Destroy => None,
                    }
                });
                if let (Some(vm), Some(display)) = (result, name) {
                    self.names.insert(vm.value.clone(), display);
                }
            }
            TaskAction::Destroy => {
                self.names.remove(&target.value);
            }
            TaskAction::PowerOff => {}
        }
    }
}

/// In-memory [`Inventory`] with scripted task outcomes.
///
/// Unscripted tasks succeed on their first poll; clone tasks then produce a
/// fresh `vm-N` identifier carrying the requested name. Clones share state,
/// so a test can keep a handle after moving one into a reconciler.
#[derive(Clone, Debug, Default)]
pub struct ScriptedInventory {
    state: Arc<Mutex<InventoryState>>,
}

impl ScriptedInventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InventoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an object at an inventory path. Virtual machines are also
    /// given the last path segment as their display name.
    #[must_use]
    pub fn with_object(self, path: &str, kind: ObjectKind, value: &str) -> Self {
        {
            let mut state = self.lock();
            if kind == ObjectKind::VirtualMachine {
                let name = path.rsplit('/').next().unwrap_or(path);
                state.names.insert(value.to_owned(), name.to_owned());
            }
            state
                .paths
                .insert(path.to_owned(), ManagedObjectRef::new(kind, value));
        }
        self
    }

    /// Gives a virtual machine a current snapshot.
    #[must_use]
    pub fn with_snapshot(self, vm: &str, snapshot: &str) -> Self {
        self.lock().snapshots.insert(
            vm.to_owned(),
            ManagedObjectRef::new(ObjectKind::Snapshot, snapshot),
        );
        self
    }

    /// Sets the display name of a virtual machine.
    #[must_use]
    pub fn with_name(self, vm: &str, name: &str) -> Self {
        self.rename(vm, name);
        self
    }

    /// Makes lookups of `path` fail with a scripted error.
    #[must_use]
    pub fn fail_lookup(self, path: &str) -> Self {
        self.lock().failing_paths.insert(path.to_owned());
        self
    }

    /// Makes every submission of `action` fail.
    #[must_use]
    pub fn reject_task(self, action: TaskAction) -> Self {
        self.lock().rejected.insert(action);
        self
    }

    /// Queues the next progress report returned for tasks of `action`.
    pub fn push_task_info(&self, action: TaskAction, info: TaskInfo) {
        self.lock()
            .scripts
            .entry(action)
            .or_default()
            .push_back(info);
    }

    /// Renames a virtual machine, as an out-of-band edit would.
    pub fn rename(&self, vm: &str, name: &str) {
        self.lock().names.insert(vm.to_owned(), name.to_owned());
    }

    /// Removes a virtual machine, as an out-of-band delete would.
    pub fn remove_vm(&self, vm: &str) {
        self.lock().names.remove(vm);
    }

    /// Returns whether a virtual machine with identifier `vm` exists.
    #[must_use]
    pub fn has_vm(&self, vm: &str) -> bool {
        self.lock().names.contains_key(vm)
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<InventoryCall> {
        self.lock().calls.clone()
    }

    /// Returns the actions of every accepted or rejected submission, in order.
    #[must_use]
    pub fn submitted(&self) -> Vec<TaskAction> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                InventoryCall::Submit { method, .. } => Some(method.action()),
                _ => None,
            })
            .collect()
    }

    /// Returns the clone methods submitted so far.
    #[must_use]
    pub fn clone_submissions(&self) -> Vec<TaskMethod> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                InventoryCall::Submit { method, .. } if method.action() == TaskAction::CloneVm => {
                    Some(method.clone())
                }
                _ => None,
            })
            .collect()
    }
}

impl Inventory for ScriptedInventory {
    type Error = ScriptedInventoryError;

    fn find_by_inventory_path<'a>(
        &'a self,
        path: &'a str,
    ) -> InventoryFuture<'a, Option<ManagedObjectRef>, Self::Error> {
        let mut state = self.lock();
        state
            .calls
            .push(InventoryCall::FindByInventoryPath(path.to_owned()));
        let outcome = if state.failing_paths.contains(path) {
            Err(ScriptedInventoryError::Scripted(format!("lookup of {path}")))
        } else {
            Ok(state.paths.get(path).cloned())
        };
        Box::pin(future::ready(outcome))
    }

    fn current_snapshot<'a>(
        &'a self,
        vm: &'a ManagedObjectRef,
    ) -> InventoryFuture<'a, Option<ManagedObjectRef>, Self::Error> {
        let mut state = self.lock();
        state.calls.push(InventoryCall::CurrentSnapshot(vm.clone()));
        let outcome = Ok(state.snapshots.get(&vm.value).cloned());
        Box::pin(future::ready(outcome))
    }

    fn display_name<'a>(
        &'a self,
        object: &'a ManagedObjectRef,
    ) -> InventoryFuture<'a, String, Self::Error> {
        let mut state = self.lock();
        state.calls.push(InventoryCall::DisplayName(object.clone()));
        let outcome = state
            .names
            .get(&object.value)
            .cloned()
            .ok_or_else(|| ScriptedInventoryError::NotFound(object.value.clone()));
        Box::pin(future::ready(outcome))
    }

    fn submit<'a>(
        &'a self,
        target: &'a ManagedObjectRef,
        method: &'a TaskMethod,
    ) -> InventoryFuture<'a, ManagedObjectRef, Self::Error> {
        let mut state = self.lock();
        state.calls.push(InventoryCall::Submit {
            target: target.clone(),
            method: method.clone(),
        });
        let action = method.action();
        let outcome = if state.rejected.contains(&action) {
            Err(ScriptedInventoryError::Scripted(format!("{action} rejected")))
        } else {
            let task = ManagedObjectRef::new(ObjectKind::Task, state.next_value("task"));
            state.tasks.insert(
                task.value.clone(),
                SubmittedTask {
                    target: target.clone(),
                    method: method.clone(),
                },
            );
            Ok(task)
        };
        Box::pin(future::ready(outcome))
    }

    fn task_info<'a>(
        &'a self,
        task: &'a ManagedObjectRef,
    ) -> InventoryFuture<'a, TaskInfo, Self::Error> {
        let mut state = self.lock();
        state.calls.push(InventoryCall::TaskInfo(task.clone()));
        let outcome = state.resolve_task(task);
        Box::pin(future::ready(outcome))
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and removes environment variables while holding a global mutex.
    pub async fn apply(set: &[(&str, &str)], remove: &[&str]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                set.iter()
                    .map(|(key, _)| *key)
                    .chain(remove.iter().copied())
                    .all(|key| seen.insert(key))
            },
            "duplicate environment variable keys passed to EnvGuard::apply"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(set.len() + remove.len());
        for (key, value) in set {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
        }
        for key in remove {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::remove_var(key) };
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

//! JSON shapes exchanged with the vSphere Web Services JSON binding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inventory::{
    CloneSpec, ManagedObjectRef, ObjectKind, RelocateSpec, TaskInfo, TaskState,
};

const MOREF_TYPE: &str = "ManagedObjectReference";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub(super) struct MoRef {
    #[serde(rename = "_typeName", default = "moref_type_name")]
    pub(super) type_name: String,
    #[serde(rename = "type")]
    pub(super) kind: String,
    pub(super) value: String,
}

fn moref_type_name() -> String {
    MOREF_TYPE.to_owned()
}

impl From<&ManagedObjectRef> for MoRef {
    fn from(value: &ManagedObjectRef) -> Self {
        Self {
            type_name: moref_type_name(),
            kind: value.kind.as_str().to_owned(),
            value: value.value.clone(),
        }
    }
}

impl From<MoRef> for ManagedObjectRef {
    fn from(value: MoRef) -> Self {
        Self::new(ObjectKind::from(value.kind.as_str()), value.value)
    }
}

#[derive(Debug, Serialize)]
pub(super) struct LoginBody<'a> {
    #[serde(rename = "userName")]
    pub(super) user_name: &'a str,
    pub(super) password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServiceContent {
    #[serde(rename = "searchIndex")]
    pub(super) search_index: MoRef,
}

#[derive(Debug, Serialize)]
pub(super) struct FindByInventoryPathBody<'a> {
    #[serde(rename = "inventoryPath")]
    pub(super) inventory_path: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct SnapshotInfo {
    #[serde(rename = "currentSnapshot")]
    pub(super) current_snapshot: Option<MoRef>,
}

#[derive(Debug, Serialize)]
pub(super) struct CloneVmBody<'a> {
    pub(super) folder: MoRef,
    pub(super) name: &'a str,
    pub(super) spec: CloneSpecBody,
}

#[derive(Debug, Serialize)]
pub(super) struct CloneSpecBody {
    #[serde(rename = "_typeName")]
    type_name: &'static str,
    location: RelocateSpecBody,
    template: bool,
    #[serde(rename = "powerOn")]
    power_on: bool,
    snapshot: MoRef,
}

#[derive(Debug, Serialize)]
struct RelocateSpecBody {
    #[serde(rename = "_typeName")]
    type_name: &'static str,
    pool: MoRef,
    #[serde(rename = "diskMoveType", skip_serializing_if = "Option::is_none")]
    disk_move_type: Option<&'static str>,
}

impl From<&RelocateSpec> for RelocateSpecBody {
    fn from(value: &RelocateSpec) -> Self {
        Self {
            type_name: "VirtualMachineRelocateSpec",
            pool: MoRef::from(&value.pool),
            disk_move_type: value.disk_move_type.map(|mode| mode.as_str()),
        }
    }
}

impl From<&CloneSpec> for CloneSpecBody {
    fn from(value: &CloneSpec) -> Self {
        Self {
            type_name: "VirtualMachineCloneSpec",
            location: RelocateSpecBody::from(&value.location),
            template: value.template,
            power_on: value.power_on,
            snapshot: MoRef::from(&value.snapshot),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TaskInfoBody {
    state: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl TaskInfoBody {
    pub(super) fn into_task_info(self) -> Result<TaskInfo, String> {
        let state = match self.state.as_str() {
            "queued" => TaskState::Queued,
            "running" => TaskState::Running,
            "success" => TaskState::Success,
            "error" => TaskState::Error,
            other => return Err(format!("unknown task state {other}")),
        };
        let result = self
            .result
            .and_then(|value| serde_json::from_value::<MoRef>(value).ok())
            .map(ManagedObjectRef::from);
        let error = self.error.map(|fault| fault_message(&fault));
        Ok(TaskInfo {
            state,
            result,
            error,
        })
    }
}

/// Pulls the most specific human readable message out of a fault object.
pub(super) fn fault_message(fault: &Value) -> String {
    ["localizedMessage", "message"]
        .iter()
        .find_map(|key| fault.get(*key).and_then(Value::as_str))
        .map(str::to_owned)
        .or_else(|| {
            fault
                .get("faultMessage")
                .and_then(Value::as_array)
                .and_then(|messages| messages.first())
                .and_then(|message| message.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .or_else(|| fault_type(fault))
        .unwrap_or_else(|| String::from("unknown fault"))
}

/// Returns the `_typeName` of a fault object, or of the nested `fault`.
pub(super) fn fault_type(fault: &Value) -> Option<String> {
    fault
        .get("fault")
        .and_then(|inner| inner.get("_typeName"))
        .or_else(|| fault.get("_typeName"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::DiskMoveType;
    use serde_json::json;

    fn clone_spec(disk_move_type: Option<DiskMoveType>) -> CloneSpec {
        CloneSpec {
            snapshot: ManagedObjectRef::new(ObjectKind::Snapshot, "snapshot-7"),
            location: RelocateSpec {
                pool: ManagedObjectRef::new(ObjectKind::ResourcePool, "resgroup-3"),
                disk_move_type,
            },
            power_on: true,
            template: false,
        }
    }

    #[test]
    fn clone_spec_body_sets_child_disk_backing_for_linked_clones() {
        let body = serde_json::to_value(CloneSpecBody::from(&clone_spec(Some(
            DiskMoveType::CreateNewChildDiskBacking,
        ))))
        .unwrap_or_else(|err| panic!("serialise: {err}"));

        assert_eq!(body["location"]["diskMoveType"], "createNewChildDiskBacking");
        assert_eq!(body["location"]["pool"]["value"], "resgroup-3");
        assert_eq!(body["snapshot"]["type"], "VirtualMachineSnapshot");
        assert_eq!(body["powerOn"], true);
    }

    #[test]
    fn clone_spec_body_omits_disk_move_type_for_full_clones() {
        let body = serde_json::to_value(CloneSpecBody::from(&clone_spec(None)))
            .unwrap_or_else(|err| panic!("serialise: {err}"));

        assert!(body["location"].get("diskMoveType").is_none());
    }

    #[test]
    fn task_info_maps_error_message() {
        let body: TaskInfoBody = serde_json::from_value(json!({
            "state": "error",
            "error": {
                "_typeName": "LocalizedMethodFault",
                "localizedMessage": "The operation is not allowed in the current state.",
                "fault": {"_typeName": "InvalidPowerState"}
            }
        }))
        .unwrap_or_else(|err| panic!("decode: {err}"));

        let info = body
            .into_task_info()
            .unwrap_or_else(|err| panic!("convert: {err}"));
        assert_eq!(info.state, TaskState::Error);
        assert_eq!(
            info.error.as_deref(),
            Some("The operation is not allowed in the current state.")
        );
    }

    #[test]
    fn task_info_maps_result_reference() {
        let body: TaskInfoBody = serde_json::from_value(json!({
            "state": "success",
            "result": {"_typeName": "ManagedObjectReference", "type": "VirtualMachine", "value": "vm-101"}
        }))
        .unwrap_or_else(|err| panic!("decode: {err}"));

        let info = body
            .into_task_info()
            .unwrap_or_else(|err| panic!("convert: {err}"));
        assert_eq!(info.result, Some(ManagedObjectRef::virtual_machine("vm-101")));
    }

    #[test]
    fn fault_type_prefers_nested_fault() {
        let fault = json!({"_typeName": "LocalizedMethodFault", "fault": {"_typeName": "NotFound"}});
        assert_eq!(fault_type(&fault).as_deref(), Some("NotFound"));
    }
}

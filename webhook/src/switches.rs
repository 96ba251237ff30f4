use crate::resolve::ANNOTATIONS_PATH;
use json_patch::PatchOperation;
use k8s_openapi::api::core::v1;
use std::collections::BTreeMap;

pub const DEFAULT_RESOURCE_NAME_KEY: &str = "k8s.v1.cni.cncf.io/resourceName";

/// Feature switches, fixed for the lifetime of the server.
#[derive(Debug, Clone)]
pub struct ControlSwitches {
    pub enable_mutation: bool,
    pub enable_validation: bool,
    /// Annotation key that, when staged by a user-defined injection, replaces
    /// the pod's network selections. Empty disables the override.
    pub user_defined_network_key: String,
    /// NetworkAttachmentDefinition annotations naming the device plugin resource.
    pub resource_name_keys: Vec<String>,
    pub honor_resources: bool,
    /// Patches applied to pods labelled `<key>: "true"`.
    pub user_defined_injections: BTreeMap<String, PatchOperation>,
}

impl Default for ControlSwitches {
    fn default() -> Self {
        ControlSwitches {
            enable_mutation: true,
            enable_validation: true,
            user_defined_network_key: String::new(),
            resource_name_keys: vec![DEFAULT_RESOURCE_NAME_KEY.to_string()],
            honor_resources: false,
            user_defined_injections: BTreeMap::new(),
        }
    }
}

impl ControlSwitches {
    /// Checks that every injection adds a map to the pod annotations.
    pub fn with_injections(
        mut self,
        injections: BTreeMap<String, PatchOperation>,
    ) -> anyhow::Result<Self> {
        for (label, patch) in &injections {
            match patch {
                PatchOperation::Add(add)
                    if add.path == ANNOTATIONS_PATH && add.value.is_object() => {}
                _ => anyhow::bail!(
                    "user-defined injection '{}' must add an object at {}",
                    label,
                    ANNOTATIONS_PATH
                ),
            }
        }
        self.user_defined_injections = injections;
        Ok(self)
    }

    pub fn injections_for(&self, pod: &v1::Pod) -> Vec<PatchOperation> {
        let labels = match pod.metadata.labels.as_ref() {
            Some(l) => l,
            None => return Vec::new(),
        };
        self.user_defined_injections
            .iter()
            .filter(|(label, _)| labels.get(*label).map(String::as_str) == Some("true"))
            .map(|(_, patch)| patch.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;

    fn injections(raw: serde_json::Value) -> BTreeMap<String, PatchOperation> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn injections_are_selected_by_label() {
        let switches = ControlSwitches::default()
            .with_injections(injections(json!({
                "feature.pod.kubernetes.io/sriov-network": {
                    "op": "add",
                    "path": "/metadata/annotations",
                    "value": {"k8s.v1.cni.cncf.io/networks": "sriov-net-attach-def"}
                },
                "other": {
                    "op": "add",
                    "path": "/metadata/annotations",
                    "value": {"k8s.v1.cni.cncf.io/networks": "other"}
                }
            })))
            .unwrap();
        let mut pod = v1::Pod {
            metadata: ObjectMeta {
                labels: Some(
                    vec![
                        ("feature.pod.kubernetes.io/sriov-network".to_string(), "true".to_string()),
                        ("other".to_string(), "false".to_string()),
                    ]
                    .into_iter()
                    .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(switches.injections_for(&pod).len(), 1);
        pod.metadata.labels = None;
        assert!(switches.injections_for(&pod).is_empty());
    }

    #[test]
    fn injections_must_add_annotations() {
        let bad = [
            json!({"l": {"op": "add", "path": "/metadata/labels", "value": {}}}),
            json!({"l": {"op": "add", "path": "/metadata/annotations", "value": "x"}}),
            json!({"l": {"op": "remove", "path": "/metadata/annotations"}}),
        ];
        for raw in bad.iter() {
            assert!(ControlSwitches::default()
                .with_injections(injections(raw.clone()))
                .is_err());
        }
    }
}

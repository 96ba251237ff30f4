use crate::{
    nad::NetworkAttachmentDefinition, resolve::ANNOTATIONS_PATH, selection::NetworkSelectionElement,
    switches::ControlSwitches,
};
use anyhow::Context as _;
use futures::future::BoxFuture;
use json_patch::{AddOperation, PatchOperation};
use k8s_openapi::api::core::v1;
use serde_json::{json, Value};
use std::{collections::BTreeMap, sync::Arc};

pub trait NetworkAttachmentSource: Send + Sync {
    fn get(
        &self,
        namespace: String,
        name: String,
    ) -> BoxFuture<'static, anyhow::Result<Option<NetworkAttachmentDefinition>>>;
}

pub struct KubeNetworkAttachments {
    client: kube::Client,
}

impl KubeNetworkAttachments {
    pub fn new(client: kube::Client) -> Self {
        KubeNetworkAttachments { client }
    }
}

impl NetworkAttachmentSource for KubeNetworkAttachments {
    fn get(
        &self,
        namespace: String,
        name: String,
    ) -> BoxFuture<'static, anyhow::Result<Option<NetworkAttachmentDefinition>>> {
        let api =
            kube::Api::<NetworkAttachmentDefinition>::namespaced(self.client.clone(), &namespace);
        Box::pin(async move {
            api.get_opt(&name).await.with_context(|| {
                format!(
                    "failed to fetch network attachment definition {}/{}",
                    namespace, name
                )
            })
        })
    }
}

/// Fixed set of definitions, keyed by namespace and name.
#[derive(Default, Clone)]
pub struct StaticNetworkAttachments {
    nads: BTreeMap<(String, String), NetworkAttachmentDefinition>,
}

impl StaticNetworkAttachments {
    pub fn insert(&mut self, nad: NetworkAttachmentDefinition) {
        let key = (
            nad.metadata.namespace.clone().unwrap_or_default(),
            nad.metadata.name.clone().unwrap_or_default(),
        );
        self.nads.insert(key, nad);
    }
}

impl NetworkAttachmentSource for StaticNetworkAttachments {
    fn get(
        &self,
        namespace: String,
        name: String,
    ) -> BoxFuture<'static, anyhow::Result<Option<NetworkAttachmentDefinition>>> {
        let found = self.nads.get(&(namespace, name)).cloned();
        Box::pin(async move { Ok(found) })
    }
}

/// Turns network selections into device plugin resource requests.
pub struct PodReviewer {
    source: Arc<dyn NetworkAttachmentSource>,
}

impl PodReviewer {
    pub fn new(source: Arc<dyn NetworkAttachmentSource>) -> Self {
        PodReviewer { source }
    }

    async fn count_resources(
        &self,
        switches: &ControlSwitches,
        selections: &[NetworkSelectionElement],
    ) -> anyhow::Result<BTreeMap<String, i64>> {
        let mut counts = BTreeMap::new();
        for sel in selections {
            let nad = self
                .source
                .get(sel.namespace.clone(), sel.name.clone())
                .await?
                .with_context(|| {
                    format!(
                        "could not find network attachment definition {}/{}",
                        sel.namespace, sel.name
                    )
                })?;
            let resource = nad.metadata.annotations.as_ref().and_then(|anns| {
                switches
                    .resource_name_keys
                    .iter()
                    .find_map(|key| anns.get(key))
            });
            match resource {
                Some(resource) => *counts.entry(resource.clone()).or_insert(0) += 1,
                None => tracing::debug!(
                    namespace = sel.namespace.as_str(),
                    name = sel.name.as_str(),
                    "network attachment definition has no resource name"
                ),
            }
        }
        Ok(counts)
    }

    pub async fn review(
        &self,
        switches: &ControlSwitches,
        pod: &v1::Pod,
        selections: &[NetworkSelectionElement],
    ) -> anyhow::Result<Vec<PatchOperation>> {
        let counts = self.count_resources(switches, selections).await?;
        if counts.is_empty() {
            return Ok(Vec::new());
        }
        let container = pod
            .spec
            .as_ref()
            .and_then(|spec| spec.containers.first())
            .context("pod has no containers")?;
        let resources = container.resources.as_ref();
        let requests = resources.and_then(|r| r.requests.as_ref());
        let limits = resources.and_then(|r| r.limits.as_ref());

        let mut patches = Vec::new();
        const BASE: &str = "/spec/containers/0/resources";
        if resources.is_none() {
            patches.push(add(BASE.to_string(), json!({})));
        }
        for &(field, existing) in [("requests", requests), ("limits", limits)].iter() {
            if existing.is_none() {
                patches.push(add(format!("{}/{}", BASE, field), json!({})));
            }
            for (resource, count) in &counts {
                let held = existing
                    .filter(|_| switches.honor_resources)
                    .and_then(|m| m.get(resource))
                    .and_then(|q| q.0.parse::<i64>().ok())
                    .unwrap_or(0);
                patches.push(add(
                    format!("{}/{}/{}", BASE, field, escape_json_pointer(resource)),
                    Value::String((count + held).to_string()),
                ));
            }
        }
        tracing::info!(resources = ?counts, "injecting resource requests");
        Ok(patches)
    }
}

fn add(path: String, value: Value) -> PatchOperation {
    PatchOperation::Add(AddOperation { path, value })
}

pub fn escape_json_pointer(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

/// Folds user-defined annotation injections into a single patch. Since the
/// patch replaces the whole annotation map, the pod's own annotations are
/// carried over and win over injected ones.
pub fn merge_injected_annotations(
    pod: &v1::Pod,
    injections: &[PatchOperation],
) -> Option<PatchOperation> {
    let mut merged = serde_json::Map::new();
    for patch in injections {
        if let PatchOperation::Add(op) = patch {
            if op.path != ANNOTATIONS_PATH {
                continue;
            }
            if let Some(map) = op.value.as_object() {
                for (k, v) in map {
                    merged.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }
    }
    if merged.is_empty() {
        return None;
    }
    if let Some(anns) = pod.metadata.annotations.as_ref() {
        for (k, v) in anns {
            merged.insert(k.clone(), Value::String(v.clone()));
        }
    }
    Some(add(ANNOTATIONS_PATH.to_string(), Value::Object(merged)))
}

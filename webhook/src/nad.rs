use kube::CustomResource;

#[derive(
    CustomResource,
    Debug,
    Clone,
    Default,
    serde::Serialize,
    serde::Deserialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "k8s.cni.cncf.io",
    version = "v1",
    kind = "NetworkAttachmentDefinition",
    namespaced
)]
pub struct NetworkAttachmentDefinitionSpec {
    /// CNI configuration, serialized JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

/// Returns why `nad` should be rejected, if it should.
pub fn validate(nad: &NetworkAttachmentDefinition) -> Option<String> {
    let name = nad.metadata.name.as_deref().unwrap_or_default();
    if !crate::selection::is_dns1123_label(name) {
        return Some(format!(
            "invalid network attachment definition name '{}': must be a DNS-1123 label",
            name
        ));
    }
    let config = match nad.spec.config.as_deref() {
        Some(c) if !c.trim().is_empty() => c,
        _ => return None,
    };
    match serde_json::from_str::<serde_json::Value>(config) {
        Ok(v) if v.is_object() => None,
        Ok(_) => Some(format!(
            "invalid config in network attachment definition '{}': not a JSON object",
            name
        )),
        Err(e) => Some(format!(
            "invalid config in network attachment definition '{}': {}",
            name, e
        )),
    }
}

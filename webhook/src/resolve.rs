use json_patch::PatchOperation;
use k8s_openapi::api::core::v1;

pub const NETWORKS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/networks";
pub const ANNOTATIONS_PATH: &str = "/metadata/annotations";

/// Looks `key` up in `add /metadata/annotations` operations, first match wins.
pub fn find_in_patches<'a>(key: &str, patches: &'a [PatchOperation]) -> Option<&'a str> {
    patches.iter().find_map(|p| match p {
        PatchOperation::Add(add) if add.path == ANNOTATIONS_PATH => {
            add.value.as_object()?.get(key)?.as_str()
        }
        _ => None,
    })
}

/// Network selections from the pod itself, falling back to staged patches.
pub fn get_network_selections(
    annotation_key: &str,
    pod: &v1::Pod,
    patches: &[PatchOperation],
) -> Option<String> {
    resolve_network_selections(annotation_key, "", pod, patches)
}

/// Like [`get_network_selections`], but a non-empty `override_key` entry in
/// `patches` takes precedence over everything else.
pub fn resolve_network_selections(
    annotation_key: &str,
    override_key: &str,
    pod: &v1::Pod,
    patches: &[PatchOperation],
) -> Option<String> {
    if !override_key.is_empty() {
        if let Some(nets) = find_in_patches(override_key, patches).filter(|n| !n.is_empty()) {
            tracing::debug!(
                key = override_key,
                "network selections overridden by user-defined injection"
            );
            return Some(nets.to_string());
        }
    }
    if let Some(nets) = pod
        .metadata
        .annotations
        .as_ref()
        .and_then(|anns| anns.get(annotation_key))
    {
        tracing::debug!(key = annotation_key, "network selections found in pod annotations");
        return Some(nets.clone());
    }
    if let Some(nets) = find_in_patches(annotation_key, patches) {
        tracing::debug!(
            key = annotation_key,
            "network selections found in user-defined injections"
        );
        return Some(nets.to_string());
    }
    None
}

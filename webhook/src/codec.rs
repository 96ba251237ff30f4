use crate::{
    error::{Result, WebhookError},
    nad::NetworkAttachmentDefinition,
    typings::AdmissionReview,
};
use k8s_openapi::api::core::v1;
use serde::de::DeserializeOwned;

pub fn deserialize_admission_review(body: &[u8]) -> Result<AdmissionReview> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|err| WebhookError::decode("AdmissionReview", err))?;
    if !value.is_object() {
        return Err(WebhookError::decode(
            "AdmissionReview",
            "top-level value is not an object",
        ));
    }
    serde_json::from_value(value).map_err(|err| WebhookError::decode("AdmissionReview", err))
}

pub fn deserialize_pod(ar: &AdmissionReview) -> Result<v1::Pod> {
    deserialize_object(ar, "Pod")
}

pub fn deserialize_network_attachment_definition(
    ar: &AdmissionReview,
) -> Result<NetworkAttachmentDefinition> {
    deserialize_object(ar, "NetworkAttachmentDefinition")
}

fn deserialize_object<K: DeserializeOwned>(ar: &AdmissionReview, kind: &'static str) -> Result<K> {
    let request = ar
        .request
        .as_ref()
        .ok_or(WebhookError::MissingRequestContext)?;
    let object = request
        .object
        .as_ref()
        .ok_or_else(|| WebhookError::decode(kind, "admission request carries no object"))?;
    K::deserialize(object).map_err(|err| WebhookError::decode(kind, err))
}

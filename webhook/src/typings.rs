//! Hand-written admission.k8s.io/v1 types.
//!
//! Field order and omission rules follow the API server's wire format, so
//! these structs are serialized as-is.

use crate::error::{Result, WebhookError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use serde::{Deserialize, Serialize};

const JSON_PATCH: &str = "JSONPatch";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AdmissionReview {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(rename = "apiVersion", default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AdmissionRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub kind: GroupVersionKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<serde_json::Value>,
    #[serde(rename = "dryRun", default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(rename = "status", default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Status>,
    /// Base64 of the serialized JSON Patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(rename = "patchType", default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<String>,
}

/// Subset of meta/v1 Status. `metadata` is always emitted, even when empty.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

impl AdmissionResponse {
    pub fn set_patch(&mut self, patch: &json_patch::Patch) -> Result<()> {
        let patch = serde_json::to_vec(patch)?;
        self.patch = Some(base64::encode(&patch));
        self.patch_type = Some(JSON_PATCH.to_string());
        Ok(())
    }
}

/// Fills `ar.response` for the request it carries.
pub fn prepare_admission_review_response(
    allowed: bool,
    message: &str,
    ar: &mut AdmissionReview,
) -> Result<()> {
    let request = ar
        .request
        .as_ref()
        .ok_or(WebhookError::MissingRequestContext)?;
    ar.response = Some(AdmissionResponse {
        uid: request.uid.clone(),
        allowed,
        result: if message.is_empty() {
            None
        } else {
            Some(Status {
                message: message.to_string(),
                ..Default::default()
            })
        },
        patch: None,
        patch_type: None,
    });
    Ok(())
}

pub fn write_response<W: std::io::Write>(writer: W, ar: &AdmissionReview) -> Result<()> {
    serde_json::to_writer(writer, ar)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_with_uid(uid: &str) -> AdmissionReview {
        AdmissionReview {
            request: Some(AdmissionRequest {
                uid: uid.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn prepare_fails_without_request() {
        let mut ar = AdmissionReview::default();
        let err = prepare_admission_review_response(false, "", &mut ar).unwrap_err();
        assert!(matches!(err, WebhookError::MissingRequestContext));
        assert!(ar.response.is_none());
    }

    #[test]
    fn prepare_sets_message_and_uid() {
        let mut ar = review_with_uid("fake-uid");
        prepare_admission_review_response(false, "some message", &mut ar).unwrap();
        let response = ar.response.unwrap();
        assert_eq!(response.uid, "fake-uid");
        assert!(!response.allowed);
        assert_eq!(response.result.unwrap().message, "some message");
    }

    #[test]
    fn prepare_without_message_has_no_status() {
        let mut ar = review_with_uid("abc");
        prepare_admission_review_response(true, "", &mut ar).unwrap();
        let response = ar.response.unwrap();
        assert!(response.allowed);
        assert!(response.result.is_none());
    }

    #[test]
    fn write_response_matches_wire_format() {
        let ar = AdmissionReview {
            response: Some(AdmissionResponse {
                uid: "fake-uid".to_string(),
                allowed: true,
                result: Some(Status {
                    message: "fake-msg".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut body = Vec::new();
        write_response(&mut body, &ar).unwrap();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"response":{"uid":"fake-uid","allowed":true,"status":{"metadata":{},"message":"fake-msg"}}}"#
        );
    }

    #[test]
    fn patch_is_base64_json_patch() {
        let mut ar = review_with_uid("uid-1");
        prepare_admission_review_response(true, "", &mut ar).unwrap();
        let patch: json_patch::Patch = serde_json::from_value(serde_json::json!([
            {"op": "add", "path": "/metadata/labels", "value": {}}
        ]))
        .unwrap();
        let response = ar.response.as_mut().unwrap();
        response.set_patch(&patch).unwrap();
        assert_eq!(response.patch_type.as_deref(), Some("JSONPatch"));
        let decoded = base64::decode(response.patch.as_ref().unwrap()).unwrap();
        assert_eq!(
            std::str::from_utf8(&decoded).unwrap(),
            r#"[{"op":"add","path":"/metadata/labels","value":{}}]"#
        );
    }
}

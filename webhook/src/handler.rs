use crate::{
    admit::{merge_injected_annotations, PodReviewer},
    codec::{
        deserialize_admission_review, deserialize_network_attachment_definition, deserialize_pod,
    },
    error::{Malformed, Result, WebhookError},
    nad,
    resolve::{resolve_network_selections, NETWORKS_ANNOTATION},
    selection::parse_pod_network_selections,
    switches::ControlSwitches,
    typings::{prepare_admission_review_response, write_response, AdmissionReview},
};
use json_patch::PatchOperation;
use k8s_openapi::api::core::v1;
use rocket::{
    data::{Data, ToByteUnit},
    http::{ContentType, Status},
    State,
};

const DEFAULT_NAMESPACE: &str = "default";

pub struct Webhook {
    pub switches: ControlSwitches,
    pub reviewer: PodReviewer,
}

type Reply = (Status, (ContentType, Vec<u8>));

impl Webhook {
    pub fn new(switches: ControlSwitches, reviewer: PodReviewer) -> Self {
        Webhook { switches, reviewer }
    }

    pub async fn mutate(&self, ar: AdmissionReview) -> Result<AdmissionReview> {
        if !self.switches.enable_mutation {
            return respond(ar, true, "", Vec::new());
        }
        let outcome = match deserialize_pod(&ar) {
            Ok(pod) => self.mutate_pod(&ar, &pod).await,
            Err(WebhookError::MissingRequestContext) => {
                return Err(WebhookError::MissingRequestContext)
            }
            Err(err) => Err(err.into()),
        };
        match outcome {
            Ok(patches) => respond(ar, true, "", patches),
            Err(err) => {
                let message = format!("{:#}", err);
                tracing::warn!(uid = uid(&ar), "denying pod: {}", message);
                respond(ar, false, &message, Vec::new())
            }
        }
    }

    async fn mutate_pod(
        &self,
        ar: &AdmissionReview,
        pod: &v1::Pod,
    ) -> anyhow::Result<Vec<PatchOperation>> {
        let request_ns = ar.request.as_ref().map(|r| r.namespace.as_str());
        let namespace = pod
            .metadata
            .namespace
            .as_deref()
            .into_iter()
            .chain(request_ns)
            .find(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE);
        tracing::info!(
            uid = uid(ar),
            namespace,
            pod = pod.metadata.name.as_deref().unwrap_or_default(),
            "mutating pod"
        );

        let injections = self.switches.injections_for(pod);
        let mut patches: Vec<PatchOperation> =
            merge_injected_annotations(pod, &injections).into_iter().collect();
        let nets = match resolve_network_selections(
            NETWORKS_ANNOTATION,
            &self.switches.user_defined_network_key,
            pod,
            &injections,
        ) {
            Some(nets) => nets,
            None => {
                tracing::info!(uid = uid(ar), "pod has no network selections, skipping");
                return Ok(patches);
            }
        };
        let selections = parse_pod_network_selections(&nets, namespace)?;
        patches.extend(
            self.reviewer
                .review(&self.switches, pod, &selections)
                .await?,
        );
        Ok(patches)
    }

    pub fn validate(&self, ar: AdmissionReview) -> Result<AdmissionReview> {
        if !self.switches.enable_validation {
            return respond(ar, true, "", Vec::new());
        }
        let verdict = match deserialize_network_attachment_definition(&ar) {
            Ok(def) => nad::validate(&def),
            Err(WebhookError::MissingRequestContext) => {
                return Err(WebhookError::MissingRequestContext)
            }
            Err(err) => Some(err.to_string()),
        };
        match verdict {
            None => respond(ar, true, "", Vec::new()),
            Some(message) => {
                tracing::warn!(
                    uid = uid(&ar),
                    "denying network attachment definition: {}",
                    message
                );
                respond(ar, false, &message, Vec::new())
            }
        }
    }
}

fn uid(ar: &AdmissionReview) -> &str {
    ar.request.as_ref().map(|r| r.uid.as_str()).unwrap_or_default()
}

/// Builds the answer; the request is not echoed back.
fn respond(
    mut ar: AdmissionReview,
    allowed: bool,
    message: &str,
    patches: Vec<PatchOperation>,
) -> Result<AdmissionReview> {
    prepare_admission_review_response(allowed, message, &mut ar)?;
    if !patches.is_empty() {
        if let Some(response) = ar.response.as_mut() {
            response.set_patch(&json_patch::Patch(patches))?;
        }
    }
    ar.request = None;
    Ok(ar)
}

async fn read_admission_review(
    content_type: Option<&ContentType>,
    data: Data<'_>,
) -> Result<AdmissionReview> {
    let body = data
        .open(4.mebibytes())
        .into_bytes()
        .await
        .map_err(|err| Malformed::UnreadableBody(err.to_string()))?;
    if !body.is_complete() {
        return Err(Malformed::UnreadableBody("body too large".to_string()).into());
    }
    let body = body.into_inner();
    if body.is_empty() {
        return Err(Malformed::EmptyBody.into());
    }
    match content_type {
        Some(ct) if ct.is_json() => {}
        other => {
            let found = other.map(ToString::to_string).unwrap_or_default();
            return Err(Malformed::ContentType(found).into());
        }
    }
    deserialize_admission_review(&body)
}

fn error_reply(err: WebhookError) -> Reply {
    tracing::error!("{}", err);
    (err.http_status(), (ContentType::Plain, err.to_string().into_bytes()))
}

fn reply(ar: Result<AdmissionReview>) -> Reply {
    let ar = match ar {
        Ok(ar) => ar,
        Err(err) => return error_reply(err),
    };
    let mut body = Vec::new();
    match write_response(&mut body, &ar) {
        Ok(()) => (Status::Ok, (ContentType::JSON, body)),
        Err(err) => error_reply(err),
    }
}

#[rocket::get("/healthz")]
pub fn health() -> &'static str {
    "OK"
}

#[rocket::post("/mutate", data = "<data>")]
pub async fn mutate(
    webhook: &State<Webhook>,
    content_type: Option<&ContentType>,
    data: Data<'_>,
) -> Reply {
    match read_admission_review(content_type, data).await {
        Ok(ar) => reply(webhook.mutate(ar).await),
        Err(err) => error_reply(err),
    }
}

#[rocket::post("/validate", data = "<data>")]
pub async fn validate(
    webhook: &State<Webhook>,
    content_type: Option<&ContentType>,
    data: Data<'_>,
) -> Reply {
    match read_admission_review(content_type, data).await {
        Ok(ar) => reply(webhook.validate(ar)),
        Err(err) => error_reply(err),
    }
}

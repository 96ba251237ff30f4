//! Network selection annotation grammars.
//!
//! An annotation value is either a JSON array of selection objects or a
//! comma-separated list of `[namespace/]name[@interface]` tokens.

use crate::error::{Result, WebhookError};
use serde::Deserialize;

const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSelectionElement {
    pub namespace: String,
    pub name: String,
    pub interface_request: String,
}

#[derive(Deserialize)]
struct JsonSelection {
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "interface")]
    interface_request: String,
}

pub fn parse_pod_network_selections(
    input: &str,
    default_namespace: &str,
) -> Result<Vec<NetworkSelectionElement>> {
    let input = input.trim();
    match input.chars().next() {
        None => Ok(Vec::new()),
        Some('[') => parse_json(input, default_namespace),
        Some('{') => Err(WebhookError::grammar(
            input,
            "JSON selections must be an array of objects",
        )),
        Some(_) => input
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| parse_element(token, default_namespace))
            .collect(),
    }
}

fn parse_json(input: &str, default_namespace: &str) -> Result<Vec<NetworkSelectionElement>> {
    let selections: Vec<JsonSelection> = serde_json::from_str(input)
        .map_err(|err| WebhookError::grammar(input, err.to_string()))?;
    selections
        .into_iter()
        .map(|sel| {
            if sel.name.is_empty() {
                return Err(WebhookError::grammar(input, "selection is missing a name"));
            }
            Ok(NetworkSelectionElement {
                namespace: if sel.namespace.is_empty() {
                    default_namespace.to_string()
                } else {
                    sel.namespace
                },
                name: sel.name,
                interface_request: sel.interface_request,
            })
        })
        .collect()
}

fn parse_element(token: &str, default_namespace: &str) -> Result<NetworkSelectionElement> {
    let (namespace, rest) = match token.split('/').collect::<Vec<_>>()[..] {
        [rest] => (default_namespace, rest),
        [ns, rest] => (ns, rest),
        _ => return Err(WebhookError::grammar(token, "more than one '/' rune")),
    };
    let (name, interface) = match rest.split('@').collect::<Vec<_>>()[..] {
        [name] => (name, ""),
        [name, interface] => (name, interface),
        _ => return Err(WebhookError::grammar(token, "more than one '@' rune")),
    };
    if name.is_empty() {
        return Err(WebhookError::grammar(token, "network name is empty"));
    }
    for unit in [namespace, name, interface].iter() {
        if !unit.is_empty() && !is_dns1123_label(unit) {
            return Err(WebhookError::grammar(
                token,
                format!("'{}' is not a valid DNS-1123 label", unit),
            ));
        }
    }
    Ok(NetworkSelectionElement {
        namespace: namespace.to_string(),
        name: name.to_string(),
        interface_request: interface.to_string(),
    })
}

/// `[a-z0-9]([-a-z0-9]*[a-z0-9])?`, at most 63 characters.
pub fn is_dns1123_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= MAX_LABEL_LEN
                && alnum(first)
                && alnum(last)
                && bytes.iter().all(|b| alnum(b) || *b == b'-')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(namespace: &str, name: &str, interface: &str) -> NetworkSelectionElement {
        NetworkSelectionElement {
            namespace: namespace.to_string(),
            name: name.to_string(),
            interface_request: interface.to_string(),
        }
    }

    #[test]
    fn accepted_selections() {
        let cases = vec![
            ("", vec![]),
            ("   ", vec![]),
            ("ns1/net1@eth0", vec![el("ns1", "net1", "eth0")]),
            ("net1@eth0", vec![el("default", "net1", "eth0")]),
            ("net1", vec![el("default", "net1", "")]),
            ("ns1/net1", vec![el("ns1", "net1", "")]),
            (
                "ns1/net1,net2",
                vec![el("ns1", "net1", ""), el("default", "net2", "")],
            ),
            (
                " ns1/net1 , net2 ,",
                vec![el("ns1", "net1", ""), el("default", "net2", "")],
            ),
            (
                r#"[{"name": "net1"},{"name": "net2", "namespace": "ns1"}]"#,
                vec![el("default", "net1", ""), el("ns1", "net2", "")],
            ),
            (
                r#"[{"name": "net1", "interface": "eth1", "mac": "c2:b0:57:49:47:f1"}]"#,
                vec![el("default", "net1", "eth1")],
            ),
            ("[]", vec![]),
        ];
        for (input, expected) in cases {
            let parsed = parse_pod_network_selections(input, "default")
                .unwrap_or_else(|e| panic!("{:?}: {}", input, e));
            assert_eq!(parsed, expected, "{:?}", input);
        }
    }

    #[test]
    fn rejected_selections() {
        let cases = [
            "ns1/net1/if1",
            "net1@if1@if2",
            "ns/net1,net2,net3@if1@if2",
            r#"{"name": "net1"}"#,
            r#"[{"namespace": "ns1"}]"#,
            r#"[{"name": "net1"}"#,
            "Net1",
            "ns1/",
            "@eth0",
            "net_1",
            "-net1",
        ];
        for input in cases.iter() {
            let err = parse_pod_network_selections(input, "default").unwrap_err();
            assert!(
                matches!(err, WebhookError::Grammar { .. }),
                "{:?}: {}",
                input,
                err
            );
        }
    }

    #[test]
    fn dns1123_labels() {
        assert!(is_dns1123_label("a"));
        assert!(is_dns1123_label("sriov-net-1"));
        assert!(is_dns1123_label(&"a".repeat(63)));
        assert!(!is_dns1123_label(&"a".repeat(64)));
        assert!(!is_dns1123_label(""));
        assert!(!is_dns1123_label("net-"));
        assert!(!is_dns1123_label("ünet"));
    }
}

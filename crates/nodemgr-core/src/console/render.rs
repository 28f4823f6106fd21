//! Output renderers for console replies.
//!
//! The JSON renderer prints the message with its PascalCase field names.
//! The text renderer prints the proto text form: snake_case names in schema
//! order, default scalars omitted, nested messages between `<` and `>`.

use serde::Serialize;
use serde_json::{Map, Value};

const INDENT: &str = "  ";

pub fn json<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

pub fn text<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    match serde_json::to_value(message)? {
        Value::Object(fields) => write_fields(&mut out, &fields, 0),
        other => write_value(&mut out, "value", &other, 0, false),
    }
    Ok(out.trim_end().to_string())
}

fn write_fields(out: &mut String, fields: &Map<String, Value>, depth: usize) {
    for (key, value) in fields {
        write_value(out, &snake_case(key), value, depth, true);
    }
}

fn write_value(out: &mut String, name: &str, value: &Value, depth: usize, skip_default: bool) {
    if skip_default && is_default(value) {
        return;
    }
    let indent = INDENT.repeat(depth);
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                write_value(out, name, item, depth, false);
            }
        }
        Value::Object(fields) => {
            out.push_str(&format!("{indent}{name}: <\n"));
            write_fields(out, fields, depth + 1);
            out.push_str(&format!("{indent}>\n"));
        }
        // Display on a string value quotes and escapes it.
        scalar => out.push_str(&format!("{indent}{name}: {scalar}\n")),
    }
}

fn is_default(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(_) => false,
    }
}

/// `LatestBlockHeight` -> `latest_block_height`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (idx, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodemgr_proto::nodemgr::v1::{
        Ack, NetInfoResponse, NodeInfo, Peer, ProtocolVersion, StatusResponse, SyncInfo, TmStatus,
    };

    #[test]
    fn snake_case_converts_schema_names() {
        assert_eq!(snake_case("LatestBlockHeight"), "latest_block_height");
        assert_eq!(snake_case("NPeers"), "n_peers");
        assert_eq!(snake_case("P2p"), "p2p");
        assert_eq!(snake_case("Type"), "type");
    }

    #[test]
    fn json_uses_pascal_case_fields() {
        let response = StatusResponse {
            latest_block_height: 42,
            ..StatusResponse::default()
        };
        let rendered = json(&response).expect("json");
        let value: Value = serde_json::from_str(&rendered).expect("parse");
        assert_eq!(value["LatestBlockHeight"], Value::from(42));
    }

    #[test]
    fn text_omits_defaults_and_nests_messages() {
        let response = StatusResponse {
            latest_block_height: 7,
            latest_block_hash: "AB\"CD".to_string(),
            tm_status: Some(TmStatus {
                sync_info: Some(SyncInfo {
                    latest_block_height: 7,
                    catching_up: true,
                    ..SyncInfo::default()
                }),
                ..TmStatus::default()
            }),
            ..StatusResponse::default()
        };
        let rendered = text(&response).expect("text");
        assert_eq!(
            rendered,
            [
                "latest_block_hash: \"AB\\\"CD\"",
                "latest_block_height: 7",
                "tm_status: <",
                "  sync_info: <",
                "    latest_block_height: 7",
                "    catching_up: true",
                "  >",
                ">",
            ]
            .join("\n")
        );
    }

    #[test]
    fn text_repeats_name_for_list_elements() {
        let response = NetInfoResponse {
            listening: true,
            listeners: vec!["a".to_string(), "b".to_string()],
            n_peers: 1,
            peers: vec![Peer {
                node_info: Some(NodeInfo {
                    id: "abc".to_string(),
                    ..NodeInfo::default()
                }),
                is_outbound: false,
                remote_ip: "10.0.0.1".to_string(),
            }],
        };
        let rendered = text(&response).expect("text");
        assert_eq!(
            rendered,
            [
                "listening: true",
                "listeners: \"a\"",
                "listeners: \"b\"",
                "n_peers: 1",
                "peers: <",
                "  node_info: <",
                "    id: \"abc\"",
                "  >",
                "  remote_ip: \"10.0.0.1\"",
                ">",
            ]
            .join("\n")
        );
    }

    #[test]
    fn present_empty_message_opens_and_closes_on_separate_lines() {
        let response = NetInfoResponse {
            peers: vec![Peer {
                node_info: Some(NodeInfo {
                    protocol_version: Some(ProtocolVersion::default()),
                    ..NodeInfo::default()
                }),
                ..Peer::default()
            }],
            ..NetInfoResponse::default()
        };
        let rendered = text(&response).expect("text");
        assert_eq!(
            rendered,
            [
                "peers: <",
                "  node_info: <",
                "    protocol_version: <",
                "    >",
                "  >",
                ">",
            ]
            .join("\n")
        );
        assert_eq!(
            text(&serde_json::json!({ "Ack": {} })).expect("text"),
            "ack: <\n>"
        );
    }

    #[test]
    fn empty_message_renders_empty_text() {
        assert_eq!(text(&Ack {}).expect("text"), "");
        assert_eq!(json(&Ack {}).expect("json"), "{}");
    }
}

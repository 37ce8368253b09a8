//! XML-RPC request encoding, response decoding and fault classification.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node};

use super::value::Value;
use crate::cancel::CancelToken;
use crate::error::{JiraError, Result};

/// Generic fault code used by older plugin versions for every error.
pub const FAULT_GENERAL_ERROR: i32 = 1;
pub const FAULT_PERMISSION_DENIED: i32 = 403;

const PRIVILEGES_REQUIRED: &str = "XML_RPC privileges are required to perform this operation";

// Message formats differ across plugin versions:
//   XML-RPC method "ticket.ge1t" not found
//   RPC method "ticket.ge1t" not found' while executing 'ticket.ge1t()
static METHOD_NOT_FOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"RPC method ".*" not found"#).expect("invalid method regex"));

static MID_AIR_COLLISION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Sorry, can not save your changes.*This ticket has been modified by someone else since you started",
    )
    .expect("invalid collision regex")
});

const DATE_FORMATS: [&str; 3] = ["%Y%m%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%dT%H%M%S"];

/// Maps a remote fault onto the error taxonomy.
pub fn classify_fault(code: i32, message: &str, method: Option<&str>) -> JiraError {
    if message == PRIVILEGES_REQUIRED || code == FAULT_PERMISSION_DENIED {
        let message = match method {
            Some(method) => format!("{method}: {message}"),
            None => message.to_string(),
        };
        JiraError::PermissionDenied(message)
    } else if code == FAULT_GENERAL_ERROR && METHOD_NOT_FOUND.is_match(message) {
        JiraError::MethodNotFound {
            method: method.map(str::to_string),
            message: message.to_string(),
        }
    } else if code == FAULT_GENERAL_ERROR && MID_AIR_COLLISION.is_match(message) {
        JiraError::EditConflict(message.to_string())
    } else {
        JiraError::RemoteFault {
            code,
            message: message.to_string(),
            method: method.map(str::to_string),
        }
    }
}

pub fn encode_request(method: &str, params: &[Value]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><methodCall><methodName>");
    xml.push_str(&escape(method));
    xml.push_str("</methodName><params>");
    for param in params {
        xml.push_str("<param>");
        write_value(&mut xml, param);
        xml.push_str("</param>");
    }
    xml.push_str("</params></methodCall>");
    xml
}

fn write_value(xml: &mut String, value: &Value) {
    xml.push_str("<value>");
    match value {
        Value::Int(number) => match i32::try_from(*number) {
            Ok(small) => xml.push_str(&format!("<int>{small}</int>")),
            Err(_) => xml.push_str(&format!("<i8>{number}</i8>")),
        },
        Value::Bool(flag) => xml.push_str(if *flag { "<boolean>1</boolean>" } else { "<boolean>0</boolean>" }),
        Value::String(text) => {
            xml.push_str("<string>");
            xml.push_str(&escape(text));
            xml.push_str("</string>");
        }
        Value::Double(number) => xml.push_str(&format!("<double>{number}</double>")),
        Value::DateTime(date) => xml.push_str(&format!(
            "<dateTime.iso8601>{}</dateTime.iso8601>",
            date.format("%Y%m%dT%H:%M:%S")
        )),
        Value::Base64(bytes) => {
            xml.push_str("<base64>");
            xml.push_str(&STANDARD.encode(bytes));
            xml.push_str("</base64>");
        }
        Value::Struct(members) => {
            xml.push_str("<struct>");
            for (name, member) in members {
                xml.push_str("<member><name>");
                xml.push_str(&escape(name));
                xml.push_str("</name>");
                write_value(xml, member);
                xml.push_str("</member>");
            }
            xml.push_str("</struct>");
        }
        Value::Array(values) => {
            xml.push_str("<array><data>");
            for item in values {
                write_value(xml, item);
            }
            xml.push_str("</data></array>");
        }
        Value::Nil => xml.push_str("<nil/>"),
    }
    xml.push_str("</value>");
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\r' => escaped.push_str("&#13;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Decodes a `methodResponse`; faults are classified against `method`.
pub fn decode_response(xml: &str, method: &str) -> Result<Value> {
    let document = Document::parse(xml)?;
    let root = document.root_element();
    if root.tag_name().name() != "methodResponse" {
        return Err(JiraError::unexpected_response(format!(
            "expected methodResponse, found {}",
            root.tag_name().name()
        )));
    }

    if let Some(fault) = child_element(root, "fault") {
        let value = child_element(fault, "value")
            .ok_or_else(|| JiraError::unexpected_response("fault without value"))
            .and_then(parse_value)?;
        return Err(fault_from_struct(&value, method)
            .unwrap_or_else(|| JiraError::unexpected_response("malformed fault")));
    }

    let value = child_element(root, "params")
        .and_then(|params| child_element(params, "param"))
        .and_then(|param| child_element(param, "value"))
        .ok_or_else(|| JiraError::unexpected_response("response without value"))?;
    parse_value(value)
}

/// Splits `system.multicall` results into per-call outcomes.
///
/// Every entry is inspected even when an earlier one failed; only
/// cancellation aborts the loop.
pub fn multicall_results(
    items: Vec<Value>,
    methods: &[&str],
    token: &CancelToken,
) -> Result<Vec<Result<Value>>> {
    if items.len() != methods.len() {
        return Err(JiraError::unexpected_response(format!(
            "multicall returned {} results for {} calls",
            items.len(),
            methods.len()
        )));
    }
    let mut results = Vec::with_capacity(items.len());
    for (item, method) in items.into_iter().zip(methods) {
        token.check()?;
        results.push(multicall_result(item, method));
    }
    Ok(results)
}

fn multicall_result(item: Value, method: &str) -> Result<Value> {
    if let Some(fault) = fault_from_struct(&item, method) {
        return Err(fault);
    }
    match item {
        Value::Array(values) => values
            .into_iter()
            .next()
            .ok_or_else(|| JiraError::unexpected_response(format!("empty result for {method}"))),
        other => Err(JiraError::unexpected_response(format!(
            "unexpected multicall entry for {method}: {other:?}"
        ))),
    }
}

/// Recognises both fault encodings: `faultCode`/`faultString` and the
/// `title`/`_message` form produced by some server versions.
fn fault_from_struct(value: &Value, method: &str) -> Option<JiraError> {
    value.as_struct()?;
    if let (Some(code), Some(message)) = (value.get("faultCode"), value.get("faultString")) {
        let code = match code {
            Value::Int(code) => i32::try_from(*code).unwrap_or_default(),
            other => other.to_display_string().trim().parse().unwrap_or_default(),
        };
        return Some(classify_fault(code, &message.to_display_string(), Some(method)));
    }
    if let Some(title) = value.get("title") {
        let mut message = title.to_display_string();
        if let Some(detail) = value.get("_message") {
            message.push_str(": ");
            message.push_str(&detail.to_display_string());
        }
        return Some(classify_fault(FAULT_GENERAL_ERROR, &message, Some(method)));
    }
    None
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == name)
}

fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn text_of(node: Node<'_, '_>) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|child| child.text())
        .collect()
}

fn parse_value(node: Node<'_, '_>) -> Result<Value> {
    let Some(typed) = element_children(node).next() else {
        // An untyped value is a string.
        return Ok(Value::String(text_of(node)));
    };
    let text = text_of(typed);
    let value = match typed.tag_name().name() {
        "i4" | "int" | "i8" => Value::Int(
            text.trim()
                .parse()
                .map_err(|_| JiraError::unexpected_response(format!("invalid integer {text}")))?,
        ),
        "boolean" => Value::Bool(matches!(text.trim(), "1" | "true")),
        "string" => Value::String(text),
        "double" => Value::Double(
            text.trim()
                .parse()
                .map_err(|_| JiraError::unexpected_response(format!("invalid double {text}")))?,
        ),
        "dateTime.iso8601" => Value::DateTime(parse_iso8601(text.trim())?),
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            Value::Base64(STANDARD.decode(compact)?)
        }
        "struct" => {
            let mut members = Vec::new();
            for member in element_children(typed).filter(|n| n.tag_name().name() == "member") {
                let name = child_element(member, "name")
                    .map(text_of)
                    .ok_or_else(|| JiraError::unexpected_response("struct member without name"))?;
                let value = child_element(member, "value")
                    .ok_or_else(|| JiraError::unexpected_response("struct member without value"))
                    .and_then(parse_value)?;
                members.push((name, value));
            }
            Value::Struct(members)
        }
        "array" => {
            let mut values = Vec::new();
            if let Some(data) = child_element(typed, "data") {
                for item in element_children(data).filter(|n| n.tag_name().name() == "value") {
                    values.push(parse_value(item)?);
                }
            }
            Value::Array(values)
        }
        "nil" => Value::Nil,
        other => {
            return Err(JiraError::unexpected_response(format!(
                "unsupported value type {other}"
            )))
        }
    };
    Ok(value)
}

fn parse_iso8601(text: &str) -> Result<chrono::DateTime<Utc>> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| JiraError::unexpected_response(format!("invalid date {text}")))
}

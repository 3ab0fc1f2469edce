// XML-RPC Codec
// methodCall encoding, methodResponse / fault decoding

use crate::xml::XmlNode;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDateTime;
use nimbus_core::domain::Value;
use nimbus_core::port::RpcError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::BTreeMap;

const DATETIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";
const DATETIME_FORMATS: [&str; 3] = [DATETIME_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y%m%dT%H%M%S"];

/// Encode a `methodCall` document
pub fn encode_request(method: &str, params: &[Value]) -> Result<String, RpcError> {
    let mut out = XmlOut::new()?;
    out.open("methodCall")?;
    out.leaf("methodName", method)?;
    out.open("params")?;
    for param in params {
        out.open("param")?;
        out.value(param)?;
        out.close("param")?;
    }
    out.close("params")?;
    out.close("methodCall")?;
    out.finish()
}

/// Encode a successful `methodResponse` carrying `value`
pub fn encode_response(value: &Value) -> Result<String, RpcError> {
    let mut out = XmlOut::new()?;
    out.open("methodResponse")?;
    out.open("params")?;
    out.open("param")?;
    out.value(value)?;
    out.close("param")?;
    out.close("params")?;
    out.close("methodResponse")?;
    out.finish()
}

/// Encode a fault `methodResponse`
pub fn encode_fault(code: i64, message: &str) -> Result<String, RpcError> {
    let fault = Value::Struct(BTreeMap::from([
        ("faultCode".to_string(), Value::from(code)),
        ("faultString".to_string(), Value::from(message)),
    ]));

    let mut out = XmlOut::new()?;
    out.open("methodResponse")?;
    out.open("fault")?;
    out.value(&fault)?;
    out.close("fault")?;
    out.close("methodResponse")?;
    out.finish()
}

/// Decode a `methodResponse` document
///
/// # Errors
/// - RpcError::Fault if the document is a fault response
/// - RpcError::Codec if the document is not a valid response
pub fn decode_response(body: &str) -> Result<Value, RpcError> {
    let root = XmlNode::parse(body)?;
    if root.local_name() != "methodResponse" {
        return Err(RpcError::Codec(format!(
            "expected <methodResponse>, got <{}>",
            root.name
        )));
    }

    if let Some(fault) = root.child("fault") {
        let value = fault
            .child("value")
            .ok_or_else(|| RpcError::Codec("fault without value".to_string()))?;
        let value = decode_value(value)?;
        let code = value.get("faultCode").and_then(Value::to_i64).unwrap_or(0);
        let message = value
            .get("faultString")
            .and_then(Value::to_text)
            .unwrap_or_default();
        return Err(RpcError::Fault { code, message });
    }

    let params = root
        .child("params")
        .ok_or_else(|| RpcError::Codec("response has neither params nor fault".to_string()))?;

    // `<params/>` is how some servers say "returned None"
    match params.child("param") {
        None => Ok(Value::Nil),
        Some(param) => param
            .child("value")
            .ok_or_else(|| RpcError::Codec("param without value".to_string()))
            .and_then(decode_value),
    }
}

/// Decode a `<value>` element
pub fn decode_value(node: &XmlNode) -> Result<Value, RpcError> {
    let Some(typed) = node.elements().first() else {
        // untyped values are strings, whitespace included
        return Ok(Value::String(node.text.clone()));
    };

    let text = typed.text();
    let invalid = |kind: &str| RpcError::Codec(format!("invalid {} value {:?}", kind, text));

    match typed.local_name() {
        "i4" | "int" | "i8" => text.parse().map(Value::Int).map_err(|_| invalid("int")),
        "boolean" => match text {
            "1" | "true" => Ok(Value::Bool(true)),
            "0" | "false" => Ok(Value::Bool(false)),
            _ => Err(invalid("boolean")),
        },
        "double" => text.parse().map(Value::Double).map_err(|_| invalid("double")),
        "string" => Ok(Value::String(typed.text.clone())),
        "dateTime.iso8601" => DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(Value::DateTime)
            .ok_or_else(|| invalid("dateTime.iso8601")),
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD
                .decode(compact)
                .map(Value::Base64)
                .map_err(|_| invalid("base64"))
        }
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children_named("member") {
                let name = member
                    .child("name")
                    .map(|n| n.text().to_string())
                    .ok_or_else(|| RpcError::Codec("struct member without name".to_string()))?;
                let value = member
                    .child("value")
                    .ok_or_else(|| RpcError::Codec(format!("struct member {} has no value", name)))?;
                members.insert(name, decode_value(value)?);
            }
            Ok(Value::Struct(members))
        }
        "array" => {
            let items = match typed.child("data") {
                Some(data) => data
                    .children_named("value")
                    .map(decode_value)
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            Ok(Value::Array(items))
        }
        "nil" => Ok(Value::Nil),
        other => Err(RpcError::Codec(format!("unknown value type <{}>", other))),
    }
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Result<Self, RpcError> {
        let mut out = Self {
            writer: Writer::new(Vec::new()),
        };
        out.event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
        Ok(out)
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), RpcError> {
        self.writer
            .write_event(event)
            .map_err(|e| RpcError::Codec(e.to_string()))
    }

    fn open(&mut self, name: &str) -> Result<(), RpcError> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn close(&mut self, name: &str) -> Result<(), RpcError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn leaf(&mut self, name: &str, text: &str) -> Result<(), RpcError> {
        self.open(name)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn value(&mut self, value: &Value) -> Result<(), RpcError> {
        self.open("value")?;
        match value {
            Value::Nil => self.event(Event::Empty(BytesStart::new("nil")))?,
            Value::Bool(b) => self.leaf("boolean", if *b { "1" } else { "0" })?,
            Value::Int(i) => match i32::try_from(*i) {
                Ok(small) => self.leaf("i4", &small.to_string())?,
                Err(_) => self.leaf("i8", &i.to_string())?,
            },
            Value::Double(d) => self.leaf("double", &d.to_string())?,
            Value::String(s) => self.leaf("string", s)?,
            Value::DateTime(dt) => {
                self.leaf("dateTime.iso8601", &dt.format(DATETIME_FORMAT).to_string())?
            }
            Value::Base64(bytes) => self.leaf("base64", &STANDARD.encode(bytes))?,
            Value::Array(items) => {
                self.open("array")?;
                self.open("data")?;
                for item in items {
                    self.value(item)?;
                }
                self.close("data")?;
                self.close("array")?;
            }
            Value::Struct(members) => {
                self.open("struct")?;
                for (name, member) in members {
                    self.open("member")?;
                    self.leaf("name", name)?;
                    self.value(member)?;
                    self.close("member")?;
                }
                self.close("struct")?;
            }
        }
        self.close("value")
    }

    fn finish(self) -> Result<String, RpcError> {
        String::from_utf8(self.writer.into_inner()).map_err(|e| RpcError::Codec(e.to_string()))
    }
}

// OvmObject - typed call helpers shared by every wrapper

use crate::connection::Connection;
use async_trait::async_trait;
use nimbus_core::domain::Value;
use nimbus_core::error::Result;
use nimbus_core::port::RpcError;
use nimbus_infra_xmlrpc::XmlNode;
use std::collections::BTreeMap;

fn unexpected(method: &str, expected: &'static str, actual: &Value) -> RpcError {
    RpcError::UnexpectedType {
        method: method.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

pub(crate) fn expect_bool(method: &str, value: Value) -> std::result::Result<bool, RpcError> {
    match value {
        Value::Bool(b) => Ok(b),
        Value::Int(i) => Ok(i != 0),
        other => Err(unexpected(method, "boolean", &other)),
    }
}

pub(crate) fn expect_i64(method: &str, value: Value) -> std::result::Result<i64, RpcError> {
    value.to_i64().ok_or_else(|| unexpected(method, "int", &value))
}

pub(crate) fn expect_string(method: &str, value: Value) -> std::result::Result<String, RpcError> {
    match value {
        Value::String(s) => Ok(s),
        other => other
            .to_text()
            .ok_or_else(|| unexpected(method, "string", &other)),
    }
}

pub(crate) fn expect_map(
    method: &str,
    value: Value,
) -> std::result::Result<BTreeMap<String, Value>, RpcError> {
    match value {
        Value::Struct(members) => Ok(members),
        other => Err(unexpected(method, "struct", &other)),
    }
}

pub(crate) fn expect_array(method: &str, value: Value) -> std::result::Result<Vec<Value>, RpcError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(unexpected(method, "array", &other)),
    }
}

/// A wrapper around one group of agent methods.
///
/// Implementors only provide the connection; the helpers perform one call
/// and interpret the result as a single shape.
#[async_trait]
pub trait OvmObject: Send + Sync {
    fn connection(&self) -> &Connection;

    /// Raw result
    async fn call_value(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.connection().call(method, params).await
    }

    /// Nil means success, anything else is reported as `false`
    async fn call_null_is_true(&self, method: &str, params: Vec<Value>) -> Result<bool> {
        Ok(self.call_value(method, params).await?.is_nil())
    }

    /// Nil means "nothing there"
    async fn call_null_is_false(&self, method: &str, params: Vec<Value>) -> Result<bool> {
        Ok(!self.call_value(method, params).await?.is_nil())
    }

    async fn call_bool(&self, method: &str, params: Vec<Value>) -> Result<bool> {
        let value = self.call_value(method, params).await?;
        Ok(expect_bool(method, value)?)
    }

    async fn call_i64(&self, method: &str, params: Vec<Value>) -> Result<i64> {
        let value = self.call_value(method, params).await?;
        Ok(expect_i64(method, value)?)
    }

    async fn call_string(&self, method: &str, params: Vec<Value>) -> Result<String> {
        let value = self.call_value(method, params).await?;
        Ok(expect_string(method, value)?)
    }

    async fn call_map(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<BTreeMap<String, Value>> {
        let value = self.call_value(method, params).await?;
        Ok(expect_map(method, value)?)
    }

    async fn call_array(&self, method: &str, params: Vec<Value>) -> Result<Vec<Value>> {
        let value = self.call_value(method, params).await?;
        Ok(expect_array(method, value)?)
    }

    /// String result holding an XML document
    async fn call_xml(&self, method: &str, params: Vec<Value>) -> Result<XmlNode> {
        let text = self.call_string(method, params).await?;
        Ok(XmlNode::parse(&text)?)
    }
}

// Field readers for documents and structs returned by the agent

pub(crate) fn missing(what: &str) -> RpcError {
    RpcError::Codec(format!("agent reply has no {}", what))
}

/// Required text at `path`
pub(crate) fn required_text(node: &XmlNode, path: &str) -> std::result::Result<String, RpcError> {
    node.text_at(path)
        .map(str::to_string)
        .ok_or_else(|| missing(path))
}

pub(crate) fn optional_text(node: &XmlNode, path: &str) -> Option<String> {
    node.text_at(path).map(str::to_string)
}

/// Numeric text at `path`; absent or unparsable values are errors
pub(crate) fn required_number<T: std::str::FromStr>(
    node: &XmlNode,
    path: &str,
) -> std::result::Result<T, RpcError> {
    let text = node.text_at(path).ok_or_else(|| missing(path))?;
    text.parse()
        .map_err(|_| RpcError::Codec(format!("{} is not a number: {}", path, text)))
}

pub(crate) fn member_text(members: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    members.get(key).and_then(Value::to_text)
}

pub(crate) fn member_i64(members: &BTreeMap<String, Value>, key: &str) -> Option<i64> {
    members.get(key).and_then(Value::to_i64)
}

pub(crate) fn member_f64(members: &BTreeMap<String, Value>, key: &str) -> Option<f64> {
    members.get(key).and_then(|v| match v {
        Value::String(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    })
}

/// Array of strings (lenient per element)
pub(crate) fn text_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::to_text).collect())
        .unwrap_or_default()
}

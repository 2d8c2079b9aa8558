//! Remote element references.
//!
//! Element lookups return ids minted by the server. [`RemoteElement`] pairs
//! such an id with the [`SessionHandle`] it belongs to; [`IosElement`] adds
//! the iOS-only `setValue` command. The driver is generic over any type
//! implementing [`FromElementId`], so callers choose which of the two (or
//! their own wrapper) lookups return.

use std::ops::Deref;

use serde_json::{json, Map, Value};

use crate::command::{prepare_arguments, DriverCommand};
use crate::executor::CommandError;
use crate::locator::By;
use crate::session::SessionHandle;

/// Key identifying an element reference in W3C responses.
pub const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Key identifying an element reference in legacy JSON wire responses.
pub const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// Extracts an element id from a response value.
///
/// Accepts both the W3C key and the legacy `ELEMENT` key.
pub fn element_id_from_value(value: &Value) -> Result<String, CommandError> {
    [W3C_ELEMENT_KEY, LEGACY_ELEMENT_KEY]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| CommandError::MalformedResponse(format!("not an element reference: {value}")))
}

/// Builds the JSON reference for an element id, carrying both keys.
pub fn element_reference(id: &str) -> Value {
    let mut map = Map::new();
    map.insert(W3C_ELEMENT_KEY.to_string(), json!(id));
    map.insert(LEGACY_ELEMENT_KEY.to_string(), json!(id));
    Value::Object(map)
}

/// Types that element lookups can produce.
pub trait FromElementId: Send + Sync + Sized + 'static {
    fn from_remote(element: RemoteElement) -> Self;
}

/// An element on the remote device.
#[derive(Debug, Clone)]
pub struct RemoteElement {
    id: String,
    handle: SessionHandle,
}

impl RemoteElement {
    pub fn new(id: impl Into<String>, handle: SessionHandle) -> Self {
        Self {
            id: id.into(),
            handle,
        }
    }

    /// The server-assigned element id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    fn id_arguments(&self) -> Map<String, Value> {
        prepare_arguments("id", self.id.as_str())
    }

    pub async fn click(&self) -> Result<(), CommandError> {
        self.handle
            .execute(DriverCommand::ClickElement, self.id_arguments())
            .await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), CommandError> {
        self.handle
            .execute(DriverCommand::ClearElement, self.id_arguments())
            .await?;
        Ok(())
    }

    /// Types text into the element.
    pub async fn send_keys(&self, text: &str) -> Result<(), CommandError> {
        let mut params = self.id_arguments();
        params.insert("text".to_string(), json!(text));
        params.insert(
            "value".to_string(),
            Value::Array(text.chars().map(|c| json!(c.to_string())).collect()),
        );
        self.handle
            .execute(DriverCommand::SendKeysToElement, params)
            .await?;
        Ok(())
    }

    /// The element's visible text.
    pub async fn text(&self) -> Result<String, CommandError> {
        let response = self
            .handle
            .execute(DriverCommand::GetElementText, self.id_arguments())
            .await?;
        Ok(response.value_as_string())
    }

    /// The value of a named attribute, or `None` when the server reports null.
    pub async fn attribute(&self, name: &str) -> Result<Option<String>, CommandError> {
        let mut params = self.id_arguments();
        params.insert("name".to_string(), json!(name));
        let response = self
            .handle
            .execute(DriverCommand::GetElementAttribute, params)
            .await?;
        Ok(match response.value {
            Value::Null => None,
            _ => Some(response.value_as_string()),
        })
    }

    /// Finds the first descendant matching `by`.
    pub async fn find_element(&self, by: &By) -> Result<RemoteElement, CommandError> {
        let mut params = by.to_arguments();
        params.insert("id".to_string(), json!(self.id));
        find_one(&self.handle, DriverCommand::FindChildElement, params).await
    }

    /// Finds every descendant matching `by`.
    pub async fn find_elements(&self, by: &By) -> Result<Vec<RemoteElement>, CommandError> {
        let mut params = by.to_arguments();
        params.insert("id".to_string(), json!(self.id));
        find_many(&self.handle, DriverCommand::FindChildElements, params).await
    }
}

impl PartialEq for RemoteElement {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.handle.session_id() == other.handle.session_id()
    }
}

impl FromElementId for RemoteElement {
    fn from_remote(element: RemoteElement) -> Self {
        element
    }
}

/// An element on an iOS device.
#[derive(Debug, Clone, PartialEq)]
pub struct IosElement(RemoteElement);

impl IosElement {
    /// Replaces the element's value in one step, without simulating typing.
    pub async fn set_value(&self, value: &str) -> Result<(), CommandError> {
        let mut params = self.0.id_arguments();
        params.insert("value".to_string(), json!(value));
        self.0.handle.execute(DriverCommand::SetValue, params).await?;
        Ok(())
    }

    pub fn into_remote(self) -> RemoteElement {
        self.0
    }
}

impl Deref for IosElement {
    type Target = RemoteElement;

    fn deref(&self) -> &RemoteElement {
        &self.0
    }
}

impl FromElementId for IosElement {
    fn from_remote(element: RemoteElement) -> Self {
        IosElement(element)
    }
}

pub(crate) async fn find_one(
    handle: &SessionHandle,
    command: DriverCommand,
    params: Map<String, Value>,
) -> Result<RemoteElement, CommandError> {
    let response = handle.execute(command, params).await?;
    let id = element_id_from_value(&response.value)?;
    Ok(RemoteElement::new(id, handle.clone()))
}

pub(crate) async fn find_many(
    handle: &SessionHandle,
    command: DriverCommand,
    params: Map<String, Value>,
) -> Result<Vec<RemoteElement>, CommandError> {
    let response = handle.execute(command, params).await?;
    match &response.value {
        Value::Array(items) => items
            .iter()
            .map(|item| element_id_from_value(item).map(|id| RemoteElement::new(id, handle.clone())))
            .collect(),
        other => Err(CommandError::MalformedResponse(format!(
            "expected element list, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_id_from_w3c_value() {
        let mut map = Map::new();
        map.insert(W3C_ELEMENT_KEY.to_string(), json!("w3c-id"));
        assert_eq!(element_id_from_value(&Value::Object(map)).unwrap(), "w3c-id");
    }

    #[test]
    fn element_id_from_legacy_value() {
        let value = json!({"ELEMENT": "legacy-id"});
        assert_eq!(element_id_from_value(&value).unwrap(), "legacy-id");
    }

    #[test]
    fn element_id_from_other_value_fails() {
        let err = element_id_from_value(&json!({"id": 3})).unwrap_err();
        assert!(matches!(err, CommandError::MalformedResponse(_)));
        assert!(element_id_from_value(&Value::Null).is_err());
    }

    #[test]
    fn element_reference_round_trips() {
        let reference = element_reference("abc");
        assert_eq!(element_id_from_value(&reference).unwrap(), "abc");
        assert_eq!(reference[LEGACY_ELEMENT_KEY], "abc");
    }
}

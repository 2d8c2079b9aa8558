//! Element location strategies.
//!
//! [`By`] names a lookup strategy and its selector. The iOS-specific
//! strategies are exposed as small composable traits on top of
//! [`FindsElements`]; a driver opts into a strategy by implementing the
//! (method-free) trait, and gets the convenience lookups from the defaults.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::command::prepare_arguments;
use crate::element::FromElementId;
use crate::executor::CommandError;

/// A lookup strategy plus its selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum By {
    Id(String),
    Name(String),
    ClassName(String),
    XPath(String),
    AccessibilityId(String),
    /// XCUITest class chain, e.g. `**/XCUIElementTypeButton[`label == "OK"`]`.
    IosClassChain(String),
    /// NSPredicate string, e.g. `type == 'XCUIElementTypeSwitch' AND value == '1'`.
    IosNsPredicate(String),
    /// UIAutomation JavaScript expression (legacy Instruments backend).
    IosUiAutomation(String),
}

impl By {
    /// The `using` value sent to the server.
    pub fn strategy(&self) -> &'static str {
        match self {
            By::Id(_) => "id",
            By::Name(_) => "name",
            By::ClassName(_) => "class name",
            By::XPath(_) => "xpath",
            By::AccessibilityId(_) => "accessibility id",
            By::IosClassChain(_) => "-ios class chain",
            By::IosNsPredicate(_) => "-ios predicate string",
            By::IosUiAutomation(_) => "-ios uiautomation",
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            By::Id(s)
            | By::Name(s)
            | By::ClassName(s)
            | By::XPath(s)
            | By::AccessibilityId(s)
            | By::IosClassChain(s)
            | By::IosNsPredicate(s)
            | By::IosUiAutomation(s) => s,
        }
    }

    /// `{"using": ..., "value": ...}` for the find commands.
    pub fn to_arguments(&self) -> Map<String, Value> {
        let mut params = prepare_arguments("using", self.strategy());
        params.insert("value".to_string(), Value::String(self.selector().to_string()));
        params
    }
}

/// Generic element lookup.
#[async_trait]
pub trait FindsElements<E: FromElementId>: Send + Sync {
    /// The first element matching `by`.
    async fn find_element(&self, by: By) -> Result<E, CommandError>;

    /// Every element matching `by`, possibly none.
    async fn find_elements(&self, by: By) -> Result<Vec<E>, CommandError>;
}

#[async_trait]
pub trait FindsByAccessibilityId<E: FromElementId>: FindsElements<E> {
    async fn find_element_by_accessibility_id(&self, id: &str) -> Result<E, CommandError> {
        self.find_element(By::AccessibilityId(id.to_string())).await
    }

    async fn find_elements_by_accessibility_id(&self, id: &str) -> Result<Vec<E>, CommandError> {
        self.find_elements(By::AccessibilityId(id.to_string())).await
    }
}

#[async_trait]
pub trait FindsByIosClassChain<E: FromElementId>: FindsElements<E> {
    async fn find_element_by_ios_class_chain(&self, chain: &str) -> Result<E, CommandError> {
        self.find_element(By::IosClassChain(chain.to_string())).await
    }

    async fn find_elements_by_ios_class_chain(&self, chain: &str) -> Result<Vec<E>, CommandError> {
        self.find_elements(By::IosClassChain(chain.to_string())).await
    }
}

#[async_trait]
pub trait FindsByIosNsPredicate<E: FromElementId>: FindsElements<E> {
    async fn find_element_by_ios_ns_predicate(&self, predicate: &str) -> Result<E, CommandError> {
        self.find_element(By::IosNsPredicate(predicate.to_string())).await
    }

    async fn find_elements_by_ios_ns_predicate(
        &self,
        predicate: &str,
    ) -> Result<Vec<E>, CommandError> {
        self.find_elements(By::IosNsPredicate(predicate.to_string())).await
    }
}

#[async_trait]
pub trait FindsByIosUiAutomation<E: FromElementId>: FindsElements<E> {
    async fn find_element_by_ios_ui_automation(&self, script: &str) -> Result<E, CommandError> {
        self.find_element(By::IosUiAutomation(script.to_string())).await
    }

    async fn find_elements_by_ios_ui_automation(
        &self,
        script: &str,
    ) -> Result<Vec<E>, CommandError> {
        self.find_elements(By::IosUiAutomation(script.to_string())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ios_strategies() {
        assert_eq!(By::IosClassChain("**/X".into()).strategy(), "-ios class chain");
        assert_eq!(By::IosNsPredicate("a == 1".into()).strategy(), "-ios predicate string");
        assert_eq!(By::IosUiAutomation(".buttons()".into()).strategy(), "-ios uiautomation");
        assert_eq!(By::AccessibilityId("ok".into()).strategy(), "accessibility id");
    }

    #[test]
    fn arguments_shape() {
        let by = By::IosNsPredicate("label == 'Login'".into());
        assert_eq!(
            Value::Object(by.to_arguments()),
            json!({"using": "-ios predicate string", "value": "label == 'Login'"})
        );
    }
}

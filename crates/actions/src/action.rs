use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::ActionKind;

/// One instruction produced by the model.
///
/// Field names on the wire are camelCase; `data` is always carried as a
/// string and decoded per kind by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "data_as_string")]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl Action {
    pub fn new(action_type: impl Into<String>, target: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            target: target.into(),
            source: None,
            data: data.into(),
            chart_type: None,
            title: None,
            position: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_chart_type(mut self, chart_type: impl Into<String>) -> Self {
        self.chart_type = Some(chart_type.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn kind(&self) -> ActionKind {
        ActionKind::from_tag(&self.action_type)
    }

    /// One-line description for previews: `Write formula → Sheet1!C2:C10`.
    pub fn describe(&self) -> String {
        let kind = self.kind();
        let mut line = format!("{} {} → {}", kind.icon(), kind.label(), self.target.trim());
        if let Some(source) = self.source.as_deref().filter(|s| !s.trim().is_empty()) {
            line.push_str(&format!(" (from {})", source.trim()));
        }
        if kind.is_unknown() {
            line.push_str(&format!(" [{}]", self.action_type));
        }
        line
    }
}

/// Models sometimes emit `data` as a JSON array or object instead of a
/// string; keep it as its JSON text.
fn data_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

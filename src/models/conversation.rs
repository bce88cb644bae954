use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const USER_ROLE: &str = "user";

/// 一轮对话，上游接口的 `contents` 元素。未知字段原样保留
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 对话片段。除 `text` 外的字段（如 inlineData）原样透传
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: USER_ROLE.to_string(),
            parts: vec![Part::text(text)],
            extra: Map::new(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == USER_ROLE
    }

    /// 第一个片段的文本
    pub fn first_text(&self) -> Option<&str> {
        self.parts.first().and_then(|p| p.text.as_deref())
    }
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            extra: Map::new(),
        }
    }
}

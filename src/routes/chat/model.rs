use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::models::Turn;

/// 请求体：`{ history: [...] }` 或 `{ message, history? }`
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ChatResponse {
    pub reply: String,
    pub cached: bool,
    pub queued: bool,
}

impl ChatRequest {
    /// 解析原始请求体。非 JSON 为 `InvalidBody`，结构不符为 `InvalidHistory`
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| AppError::InvalidBody)?;
        serde_json::from_value(value).map_err(|_| AppError::InvalidHistory)
    }

    /// 校验并裁剪对话，只保留最近 `limit` 轮
    pub fn into_history(self, limit: usize) -> Result<Vec<Turn>, AppError> {
        let mut history: Vec<Turn> = match (self.history, &self.message) {
            (None | Some(Value::Null), Some(_)) => Vec::new(),
            (Some(items @ Value::Array(_)), _) => {
                serde_json::from_value(items).map_err(|_| AppError::InvalidHistory)?
            }
            _ => return Err(AppError::InvalidHistory),
        };

        if let Some(message) = self.message {
            history.push(Turn::user(message));
        }

        if history.len() > limit {
            history.drain(..history.len() - limit);
        }
        Ok(history)
    }
}

impl ChatResponse {
    pub fn cached(reply: String) -> Self {
        Self {
            reply,
            cached: true,
            queued: false,
        }
    }

    pub fn generated(reply: String) -> Self {
        Self {
            reply,
            cached: false,
            queued: true,
        }
    }
}

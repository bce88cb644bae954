use crate::models::Turn;

/// 缓存键的最大字符数
pub const MAX_FINGERPRINT_CHARS: usize = 300;

/// 由对话生成缓存键：取最后一条用户消息的首段文本，
/// 找不到时退回整段对话的 JSON。结果去空白、转小写、截断到 300 字符。
///
/// 末尾用户消息相同的两段对话会得到同一个键。
pub fn fingerprint(history: &[Turn]) -> String {
    let last_user_text = history
        .iter()
        .rev()
        .find(|turn| turn.is_user())
        .and_then(Turn::first_text)
        .filter(|text| !text.is_empty());

    let source = match last_user_text {
        Some(text) => text.to_string(),
        None => serde_json::to_string(history).unwrap_or_default(),
    };

    source
        .trim()
        .to_lowercase()
        .chars()
        .take(MAX_FINGERPRINT_CHARS)
        .collect()
}

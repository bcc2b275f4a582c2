//! 대화 히스토리
//!
//! 히스토리는 호출자가 소유하며 매 호출마다 넘겨줍니다. 코어는 저장하지 않습니다.

use serde::{Deserialize, Serialize};

/// 발화자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// 대화 한 턴
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 프롬프트용 히스토리 문자열 (`User: ...` / `Assistant: ...` 줄 단위)
pub fn format_history(history: &[ChatTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_history() {
        let history = vec![
            ChatTurn::user("Tell me about the Acme contract."),
            ChatTurn::assistant("  It is a supply agreement.  "),
        ];
        assert_eq!(
            format_history(&history),
            "User: Tell me about the Acme contract.\nAssistant: It is a supply agreement."
        );
        assert_eq!(format_history(&[]), "");
    }

    #[test]
    fn test_role_json_aliases() {
        let turns: Vec<ChatTurn> = serde_json::from_str(
            r#"[{"role":"user","content":"hi"},{"role":"ai","content":"hello"},{"role":"human","content":"bye"}]"#,
        )
        .unwrap();
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[2].role, Role::User);

        let json = serde_json::to_string(&ChatTurn::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}

//! Static token table principal resolver.
//!
//! Stands in for the session-issuing authentication service. Tokens are
//! loaded once at startup from a JSON array:
//!
//! ```json
//! [{ "token": "t-driver-1", "userId": "d1", "role": "driver" }]
//! ```

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{AuthError, Principal, PrincipalResolver, Role, UserId, ValueObjectError};

#[derive(Debug, Error)]
pub enum PrincipalTableError {
    #[error("failed to read principal table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse principal table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid principal entry: {0}")]
    Invalid(#[from] ValueObjectError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrincipalEntry {
    token: String,
    user_id: String,
    role: Role,
}

/// トークン → プリンシパルの固定テーブル
#[derive(Debug, Default, Clone)]
pub struct StaticPrincipalResolver {
    principals: HashMap<String, Principal>,
}

impl StaticPrincipalResolver {
    pub fn new(entries: impl IntoIterator<Item = (String, Principal)>) -> Self {
        Self {
            principals: entries.into_iter().collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, PrincipalTableError> {
        let entries: Vec<PrincipalEntry> = serde_json::from_str(json)?;
        let mut principals = HashMap::with_capacity(entries.len());
        for entry in entries {
            let user_id = UserId::new(entry.user_id)?;
            principals.insert(entry.token, Principal::new(user_id, entry.role));
        }
        Ok(Self { principals })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PrincipalTableError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.principals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

#[async_trait]
impl PrincipalResolver for StaticPrincipalResolver {
    async fn resolve(&self, token: &str) -> Result<Principal, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.principals
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_from_json_table() {
        // テスト項目: JSON のトークン表からプリンシパルを解決できる
        // given (前提条件):
        let json = r#"[
            {"token": "t-d1", "userId": "d1", "role": "driver"},
            {"token": "t-root", "userId": "root", "role": "admin"}
        ]"#;
        let resolver = StaticPrincipalResolver::from_json(json).unwrap();

        // when (操作):
        let driver = resolver.resolve("t-d1").await.unwrap();

        // then (期待する結果):
        assert_eq!(resolver.len(), 2);
        assert_eq!(driver.user_id.as_str(), "d1");
        assert_eq!(driver.role, Role::Driver);
    }

    #[tokio::test]
    async fn test_resolve_unknown_or_empty_token() {
        // テスト項目: 未知のトークン・空トークンは認証エラー
        // given (前提条件):
        let resolver = StaticPrincipalResolver::default();

        // when (操作) / then (期待する結果):
        assert_eq!(resolver.resolve("").await, Err(AuthError::MissingToken));
        assert_eq!(resolver.resolve("nope").await, Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_from_json_rejects_invalid_entries() {
        // テスト項目: 不正なロールやユーザー ID を含む表は読み込めない
        // given (前提条件):
        let bad_role = r#"[{"token": "t", "userId": "u1", "role": "pilot"}]"#;
        let bad_user = r#"[{"token": "t", "userId": "", "role": "customer"}]"#;

        // when (操作) / then (期待する結果):
        assert!(matches!(
            StaticPrincipalResolver::from_json(bad_role),
            Err(PrincipalTableError::Parse(_))
        ));
        assert!(matches!(
            StaticPrincipalResolver::from_json(bad_user),
            Err(PrincipalTableError::Invalid(_))
        ));
    }
}

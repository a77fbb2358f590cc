//! UseCase: 接続受付処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - AdmitConnectionUseCase::execute() / open()
//! - トークンからプリンシパルを解決し、Registry に接続を登録する処理
//!
//! ### なぜこのテストが必要か
//! - 認証に失敗した接続が Registry に登録されないことを保証する
//! - 同一ユーザーの複数接続が許可されることを確認する
//!
//! ### どのような状況を想定しているか
//! - 正常系：有効なトークンでの接続
//! - 異常系：トークンなし、無効なトークン
//! - エッジケース：同一ユーザーによる 2 本目の接続

use std::sync::Arc;

use haiso_shared::time::Clock;

use crate::domain::{
    AuthError, Connection, ConnectionHandle, ConnectionId, ConnectionRegistry, ConnectionState,
    PrincipalResolver, Timestamp,
};

use super::error::AdmitError;

/// 接続受付のユースケース
pub struct AdmitConnectionUseCase {
    resolver: Arc<dyn PrincipalResolver>,
    registry: Arc<dyn ConnectionRegistry>,
    clock: Arc<dyn Clock>,
}

impl AdmitConnectionUseCase {
    pub fn new(
        resolver: Arc<dyn PrincipalResolver>,
        registry: Arc<dyn ConnectionRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            registry,
            clock,
        }
    }

    /// プリンシパルを解決して接続を登録する
    ///
    /// # Returns
    ///
    /// * `Ok(Connection)` - 登録された接続（state は `Connecting`）
    /// * `Err(AdmitError::Authentication)` - 解決に失敗。接続は登録されない
    pub async fn execute(
        &self,
        token: Option<&str>,
        handle: ConnectionHandle,
    ) -> Result<Connection, AdmitError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let principal = self.resolver.resolve(token).await?;

        let now = Timestamp::new(self.clock.now_millis());
        let connection = self.registry.admit(principal, handle, now).await;
        tracing::info!(
            "Connection '{}' admitted for {} '{}'",
            connection.id,
            connection.principal.role,
            connection.principal.user_id
        );
        Ok(connection)
    }

    /// WebSocket のアップグレード完了後に接続を `Open` にする
    pub async fn open(&self, id: &ConnectionId) -> bool {
        self.registry.set_state(id, ConnectionState::Open).await
    }
}

//! InMemory Room Router 実装
//!
//! ## 責務
//!
//! - ルームキーから購読中の接続（送信キュー）へのマッピング
//! - ルーム単位のファンアウト（publish）
//! - 配送に失敗した接続の Registry からの削除
//!
//! ## ロック
//!
//! ルーム表は `RwLock<HashMap<..>>`、各ルームのメンバー集合は個別の `Mutex` で保護する。
//! publish はルームのロックを保持したまま順に送信するため、同一ルーム内の配送順序は
//! 全メンバーで publish 順になる。ルーム表の書き込みロックを取るのは、ルームの生成と
//! 空ルームの破棄のときだけ。

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, mpsc::error::SendTimeoutError};

use crate::{
    domain::{
        ConnectionId, ConnectionRegistry, Event, MessagePushError, OutboundChannel,
        PublishOutcome, RoomKey, RoomRouter,
    },
    infrastructure::dto::conversion::encode_event,
};

struct Member {
    id: ConnectionId,
    outbound: OutboundChannel,
}

#[derive(Default)]
struct RoomMembers {
    members: Vec<Member>,
    /// ルーム表から外された。新規メンバーは新しいスロットに入る
    retired: bool,
}

type RoomSlot = Arc<Mutex<RoomMembers>>;

/// インメモリ Room Router 実装
pub struct InMemoryRoomRouter {
    registry: Arc<dyn ConnectionRegistry>,
    rooms: RwLock<HashMap<RoomKey, RoomSlot>>,
    /// 送信キューが満杯のまま待つ上限
    send_timeout: Duration,
}

impl InMemoryRoomRouter {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            rooms: RwLock::new(HashMap::new()),
            send_timeout,
        }
    }

    async fn slot(&self, room: &RoomKey) -> Option<RoomSlot> {
        self.rooms.read().await.get(room).cloned()
    }

    /// 空のルームをルーム表から外す
    async fn collect_if_empty(&self, room: &RoomKey) {
        let mut rooms = self.rooms.write().await;
        let Some(slot) = rooms.get(room).cloned() else {
            return;
        };

        let mut room_members = slot.lock().await;
        if room_members.members.is_empty() {
            room_members.retired = true;
            rooms.remove(room);
            tracing::debug!("Room '{}' is empty and was discarded", room);
        }
    }

    /// 配送失敗した接続を Registry と全ルームから削除
    async fn evict(&self, id: &ConnectionId) {
        if let Some(connection) = self.registry.remove(id).await {
            let rooms: Vec<RoomKey> = connection.rooms.into_iter().collect();
            self.leave_all(id, &rooms).await;
            tracing::info!(
                "Connection '{}' of user '{}' evicted after delivery failure",
                id,
                connection.principal.user_id
            );
        }
    }
}

#[async_trait]
impl RoomRouter for InMemoryRoomRouter {
    async fn join(&self, room: &RoomKey, id: ConnectionId) -> bool {
        let Some(outbound) = self.registry.outbound(&id).await else {
            return false;
        };

        loop {
            let slot = {
                let mut rooms = self.rooms.write().await;
                rooms.entry(room.clone()).or_default().clone()
            };

            let mut room_members = slot.lock().await;
            if room_members.retired {
                continue;
            }
            // 切断処理の leave_all はこのロックを待つため、ここで生存していれば取り残されない
            if self.registry.get(&id).await.is_none() {
                let now_empty = room_members.members.is_empty();
                drop(room_members);
                if now_empty {
                    self.collect_if_empty(room).await;
                }
                tracing::debug!("Connection '{}' closed before joining '{}'", id, room);
                return false;
            }
            if !room_members.members.iter().any(|m| m.id == id) {
                room_members.members.push(Member {
                    id,
                    outbound: outbound.clone(),
                });
                tracing::debug!(
                    "Connection '{}' joined room '{}' ({} members)",
                    id,
                    room,
                    room_members.members.len()
                );
            }
            return true;
        }
    }

    async fn leave(&self, room: &RoomKey, id: &ConnectionId) -> bool {
        let Some(slot) = self.slot(room).await else {
            return false;
        };

        let (removed, now_empty) = {
            let mut room_members = slot.lock().await;
            let before = room_members.members.len();
            room_members.members.retain(|m| &m.id != id);
            (
                room_members.members.len() != before,
                room_members.members.is_empty(),
            )
        };

        if now_empty {
            self.collect_if_empty(room).await;
        }
        if removed {
            tracing::debug!("Connection '{}' left room '{}'", id, room);
        }
        removed
    }

    async fn leave_all(&self, id: &ConnectionId, rooms: &[RoomKey]) {
        for room in rooms {
            self.leave(room, id).await;
        }
    }

    async fn publish(&self, room: &RoomKey, event: &Event) -> PublishOutcome {
        let Some(slot) = self.slot(room).await else {
            tracing::debug!("Publish to room '{}' without members", room);
            return PublishOutcome::default();
        };

        let frame = match encode_event(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to encode '{}' event: {}", event.event_type().as_str(), e);
                return PublishOutcome::default();
            }
        };

        let mut outcome = PublishOutcome::default();
        let now_empty = {
            let mut room_members = slot.lock().await;
            let mut failed = Vec::new();

            for member in &room_members.members {
                match member
                    .outbound
                    .send_timeout(frame.clone(), self.send_timeout)
                    .await
                {
                    Ok(()) => outcome.delivered += 1,
                    Err(e) => {
                        let error = match e {
                            SendTimeoutError::Timeout(_) => {
                                MessagePushError::Timeout(member.id.to_string())
                            }
                            SendTimeoutError::Closed(_) => {
                                MessagePushError::ChannelClosed(member.id.to_string())
                            }
                        };
                        tracing::warn!("Delivery to room '{}' failed: {}", room, error);
                        failed.push(member.id);
                    }
                }
            }

            room_members.members.retain(|m| !failed.contains(&m.id));
            outcome.evicted = failed;
            room_members.members.is_empty() && !outcome.evicted.is_empty()
        };

        for id in &outcome.evicted {
            self.evict(id).await;
        }
        if now_empty {
            self.collect_if_empty(room).await;
        }

        tracing::debug!(
            "Published '{}' to room '{}': {} delivered, {} evicted",
            event.event_type().as_str(),
            room,
            outcome.delivered,
            outcome.evicted.len()
        );
        outcome
    }

    async fn members(&self, room: &RoomKey) -> Vec<ConnectionId> {
        match self.slot(room).await {
            Some(slot) => slot.lock().await.members.iter().map(|m| m.id).collect(),
            None => Vec::new(),
        }
    }

    async fn room_sizes(&self) -> Vec<(RoomKey, usize)> {
        let slots: Vec<(RoomKey, RoomSlot)> = {
            let rooms = self.rooms.read().await;
            rooms.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let mut sizes = Vec::with_capacity(slots.len());
        for (room, slot) in slots {
            sizes.push((room, slot.lock().await.members.len()));
        }
        sizes.sort_by(|a, b| a.0.cmp(&b.0));
        sizes
    }
}

//! Value Objects
//!
//! 識別子・ロール・ルームキーなど、不変で値によって等価性が決まる型を定義します。
//! 生成時にバリデーションを行い、不正な値を持つインスタンスが存在しないことを保証します。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValueObjectError;

/// 識別子の最大長
const MAX_IDENTIFIER_LEN: usize = 128;

fn validate_identifier(kind: &'static str, value: &str) -> Result<(), ValueObjectError> {
    if value.is_empty() {
        return Err(ValueObjectError::Empty(kind));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValueObjectError::TooLong {
            kind,
            max: MAX_IDENTIFIER_LEN,
        });
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValueObjectError::InvalidCharacter(kind));
    }
    Ok(())
}

/// Server-generated opaque connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// 新しいランダムな ConnectionId を生成
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ユーザー ID（認証済みプリンシパルの識別子）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_identifier("user id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 注文 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

impl OrderId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_identifier("order id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OrderId> for String {
    fn from(value: OrderId) -> Self {
        value.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// チャットスレッド ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChatRoomId(String);

impl ChatRoomId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_identifier("chat room id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChatRoomId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChatRoomId> for String {
    fn from(value: ChatRoomId) -> Self {
        value.0
    }
}

/// Role of an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Merchant,
    Driver,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Merchant => "merchant",
            Role::Driver => "driver",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ValueObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "merchant" => Ok(Role::Merchant),
            "driver" => Ok(Role::Driver),
            "admin" => Ok(Role::Admin),
            other => Err(ValueObjectError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 認証済みのアイデンティティ（ユーザー ID + ロール）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// ルームの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Order,
    Chat,
    DriverLocation,
    AdminBroadcast,
    User,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Order => "order",
            RoomType::Chat => "chat",
            RoomType::DriverLocation => "driver_location",
            RoomType::AdminBroadcast => "admin_broadcast",
            RoomType::User => "user",
        }
    }
}

impl FromStr for RoomType {
    type Err = ValueObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(RoomType::Order),
            "chat" => Ok(RoomType::Chat),
            "driver_location" => Ok(RoomType::DriverLocation),
            "admin_broadcast" => Ok(RoomType::AdminBroadcast),
            "user" => Ok(RoomType::User),
            other => Err(ValueObjectError::UnknownRoomType(other.to_string())),
        }
    }
}

/// Typed room key.
///
/// Wire form is `<type>:<id>` (`order:42`, `chat:7`, `driver_location:d1`,
/// `user:u1`) except for the singleton `admin_broadcast`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoomKey {
    Order(OrderId),
    Chat(ChatRoomId),
    DriverLocation(UserId),
    AdminBroadcast,
    User(UserId),
}

impl RoomKey {
    pub fn room_type(&self) -> RoomType {
        match self {
            RoomKey::Order(_) => RoomType::Order,
            RoomKey::Chat(_) => RoomType::Chat,
            RoomKey::DriverLocation(_) => RoomType::DriverLocation,
            RoomKey::AdminBroadcast => RoomType::AdminBroadcast,
            RoomKey::User(_) => RoomType::User,
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomKey::Order(id) => write!(f, "order:{}", id),
            RoomKey::Chat(id) => write!(f, "chat:{}", id.as_str()),
            RoomKey::DriverLocation(id) => write!(f, "driver_location:{}", id),
            RoomKey::AdminBroadcast => f.write_str("admin_broadcast"),
            RoomKey::User(id) => write!(f, "user:{}", id),
        }
    }
}

impl FromStr for RoomKey {
    type Err = ValueObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == RoomType::AdminBroadcast.as_str() {
            return Ok(RoomKey::AdminBroadcast);
        }

        let (prefix, id) = s
            .split_once(':')
            .ok_or_else(|| ValueObjectError::MalformedRoomKey(s.to_string()))?;
        let id = id.to_string();

        match prefix.parse::<RoomType>()? {
            RoomType::Order => Ok(RoomKey::Order(OrderId::new(id)?)),
            RoomType::Chat => Ok(RoomKey::Chat(ChatRoomId::new(id)?)),
            RoomType::DriverLocation => Ok(RoomKey::DriverLocation(UserId::new(id)?)),
            RoomType::User => Ok(RoomKey::User(UserId::new(id)?)),
            RoomType::AdminBroadcast => Err(ValueObjectError::MalformedRoomKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for RoomKey {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomKey> for String {
    fn from(value: RoomKey) -> Self {
        value.to_string()
    }
}

/// Unix timestamp in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// `self` から `later` までの経過ミリ秒（負にはならない）
    pub fn millis_until(&self, later: Timestamp) -> i64 {
        (later.0 - self.0).max(0)
    }
}

/// 評価スコア（1〜5 の整数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, ValueObjectError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ValueObjectError::ScoreOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = ValueObjectError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(value: Score) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_rejects_empty_and_whitespace() {
        // テスト項目: 空文字列や空白を含む UserId は生成できない
        // given (前提条件):
        let empty = String::new();
        let spaced = "ali ce".to_string();

        // when (操作):
        let empty_result = UserId::new(empty);
        let spaced_result = UserId::new(spaced);

        // then (期待する結果):
        assert_eq!(empty_result, Err(ValueObjectError::Empty("user id")));
        assert_eq!(
            spaced_result,
            Err(ValueObjectError::InvalidCharacter("user id"))
        );
    }

    #[test]
    fn test_room_key_parses_every_room_type() {
        // テスト項目: すべてのルーム種別のキーが解析できる
        // given (前提条件):
        let keys = [
            "order:42",
            "chat:support-7",
            "driver_location:d1",
            "admin_broadcast",
            "user:u1",
        ];

        // when (操作):
        let parsed: Vec<RoomKey> = keys.iter().map(|k| k.parse().unwrap()).collect();

        // then (期待する結果):
        assert_eq!(parsed[0].room_type(), RoomType::Order);
        assert_eq!(parsed[1].room_type(), RoomType::Chat);
        assert_eq!(parsed[2].room_type(), RoomType::DriverLocation);
        assert_eq!(parsed[3], RoomKey::AdminBroadcast);
        assert_eq!(parsed[4].room_type(), RoomType::User);
        for (key, room) in keys.iter().zip(parsed.iter()) {
            assert_eq!(&room.to_string(), key);
        }
    }

    #[test]
    fn test_room_key_keeps_colons_inside_id() {
        // テスト項目: ID 部分に含まれるコロンはそのまま保持される
        // given (前提条件):
        let key = "chat:order:42";

        // when (操作):
        let room: RoomKey = key.parse().unwrap();

        // then (期待する結果):
        assert_eq!(room.room_type(), RoomType::Chat);
        assert_eq!(room.to_string(), key);
    }

    #[test]
    fn test_room_key_rejects_malformed_input() {
        // テスト項目: 不正な形式のルームキーはエラーになる
        // given (前提条件):
        let inputs = ["order", "unknown:1", "order:", "admin_broadcast:1"];

        // when (操作) / then (期待する結果):
        for input in inputs {
            assert!(input.parse::<RoomKey>().is_err(), "{input} should fail");
        }
    }

    #[test]
    fn test_score_range() {
        // テスト項目: スコアは 1〜5 の範囲のみ受け付ける
        // given (前提条件):

        // when (操作) / then (期待する結果):
        assert!(Score::new(0).is_err());
        assert!(Score::new(6).is_err());
        assert_eq!(Score::new(1).unwrap().value(), 1);
        assert_eq!(Score::new(5).unwrap().value(), 5);
    }

    #[test]
    fn test_role_from_str() {
        // テスト項目: ロール文字列が正しく解析される
        // given (前提条件):

        // when (操作) / then (期待する結果):
        assert_eq!("driver".parse::<Role>().unwrap(), Role::Driver);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_timestamp_millis_until_never_negative() {
        // テスト項目: 経過時間は負にならない
        // given (前提条件):
        let earlier = Timestamp::new(1_000);
        let later = Timestamp::new(3_500);

        // when (操作) / then (期待する結果):
        assert_eq!(earlier.millis_until(later), 2_500);
        assert_eq!(later.millis_until(earlier), 0);
    }
}

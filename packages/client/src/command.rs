//! Input line parsing for the interactive client.

use haiso_server::domain::{ChatRoomId, PresenceStatus, RoomKey};
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  /join <room>                 subscribe (order:42, chat:7, driver_location:d1, user:c1, admin_broadcast)
  /leave <room>                unsubscribe
  /chat <roomId> <message>     send to chat:<roomId>
  /presence <status>           online | offline | busy | away
  /location <lat> <lon>        publish your position (drivers only)
  /rate <orderId> <userId> <score> [comment]
  /help                        show this help
  /quit                        exit
  <text>                       send to the last chat room";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'; type /help")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    Invalid(String),
}

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Join(RoomKey),
    Leave(RoomKey),
    Chat { room_id: ChatRoomId, message: String },
    /// 直前のチャットルームに送る
    Say(String),
    Presence(PresenceStatus),
    Location { latitude: f64, longitude: f64 },
    Rate {
        order_id: String,
        rated_party_id: String,
        score: i64,
        comment: Option<String>,
    },
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let (name, args) = rest
        .split_once(char::is_whitespace)
        .map(|(name, args)| (name, args.trim()))
        .unwrap_or((rest, ""));

    match name {
        "join" => parse_room(args, "/join <room>").map(Command::Join),
        "leave" => parse_room(args, "/leave <room>").map(Command::Leave),
        "chat" => {
            let (room_id, message) = args
                .split_once(char::is_whitespace)
                .ok_or(CommandError::Usage("/chat <roomId> <message>"))?;
            let room_id = ChatRoomId::new(room_id.to_string())
                .map_err(|e| CommandError::Invalid(e.to_string()))?;
            Ok(Command::Chat {
                room_id,
                message: message.trim().to_string(),
            })
        }
        "presence" => {
            let status = match args {
                "online" => PresenceStatus::Online,
                "offline" => PresenceStatus::Offline,
                "busy" => PresenceStatus::Busy,
                "away" => PresenceStatus::Away,
                _ => return Err(CommandError::Usage("/presence online|offline|busy|away")),
            };
            Ok(Command::Presence(status))
        }
        "location" => {
            const USAGE: &str = "/location <lat> <lon>";
            let mut parts = args.split_whitespace();
            let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(CommandError::Usage(USAGE));
            };
            let latitude = lat.parse().map_err(|_| CommandError::Usage(USAGE))?;
            let longitude = lon.parse().map_err(|_| CommandError::Usage(USAGE))?;
            Ok(Command::Location {
                latitude,
                longitude,
            })
        }
        "rate" => {
            const USAGE: &str = "/rate <orderId> <userId> <score> [comment]";
            let mut parts = args.splitn(4, char::is_whitespace);
            let (Some(order_id), Some(rated_party_id), Some(score)) =
                (parts.next(), parts.next(), parts.next())
            else {
                return Err(CommandError::Usage(USAGE));
            };
            if order_id.is_empty() {
                return Err(CommandError::Usage(USAGE));
            }
            let score = score.parse().map_err(|_| CommandError::Usage(USAGE))?;
            let comment = parts
                .next()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            Ok(Command::Rate {
                order_id: order_id.to_string(),
                rated_party_id: rated_party_id.to_string(),
                score,
                comment,
            })
        }
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_room(args: &str, usage: &'static str) -> Result<RoomKey, CommandError> {
    if args.is_empty() {
        return Err(CommandError::Usage(usage));
    }
    args.parse()
        .map_err(|e: haiso_server::domain::ValueObjectError| CommandError::Invalid(e.to_string()))
}

/// Why a join attempt was refused. `Display` is the message shown to the
/// player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    RoomNotFound,
    InvalidName,
    InvalidPasscode,
    /// Cosmetic outside the selectable range.
    InvalidSelection,
    /// Cosmetic already used by an active player.
    SelectionTaken,
    NameInUse,
    RoomFull,
}

impl JoinError {
    /// Nothing more can be done on this connection after the error.
    pub fn closes_connection(self) -> bool {
        matches!(self, Self::RoomNotFound)
    }
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::RoomNotFound => "Room not found",
            Self::InvalidName => "Invalid name",
            Self::InvalidPasscode => "Invalid passcode",
            Self::InvalidSelection => "Invalid cosmetic selection",
            Self::SelectionTaken => "Cosmetic already taken",
            Self::NameInUse => "Name in use",
            Self::RoomFull => "Room full",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for JoinError {}

/// A privileged room command that could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Sender is not bound to a player in a live room.
    NotJoined,
    NotHost,
    WrongState,
    NoPlayers,
}

impl CommandError {
    /// Only an empty room is worth telling the host about; the other cases
    /// are dropped without a reply.
    pub fn user_message(self) -> Option<&'static str> {
        match self {
            Self::NoPlayers => Some("No players in room"),
            Self::NotJoined | Self::NotHost | Self::WrongState => None,
        }
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotJoined => write!(f, "connection has not joined a room"),
            Self::NotHost => write!(f, "only the host may do that"),
            Self::WrongState => write!(f, "not allowed in the current room state"),
            Self::NoPlayers => write!(f, "no players in room"),
        }
    }
}

impl std::error::Error for CommandError {}

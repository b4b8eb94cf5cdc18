/// Closed error taxonomy for room operations. Every failing transition maps
/// to exactly one of these; the server crate translates them to HTTP status
/// codes and WebSocket error frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    RoomNotFound,
    Forbidden,
    PlayerNotFound,
    QuestionAlreadyInPlay,
    NoActiveQuestion,
    BuzzersAlreadyOpen,
    BuzzNotAvailable,
    AlreadyAttempted,
    NoAnsweringPlayer,
    TurnRequired,
    SlotAlreadyUsed,
    UniqueQuestionUnavailable,
    QuestionProviderUnavailable,
    InvalidShareCode,
    ShareCodeNotFound,
    Validation(String),
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomNotFound => write!(f, "Room not found"),
            Self::Forbidden => write!(f, "Not authorized for this room"),
            Self::PlayerNotFound => write!(f, "Player not found"),
            Self::QuestionAlreadyInPlay => write!(f, "A question is already in play"),
            Self::NoActiveQuestion => write!(f, "No question is active"),
            Self::BuzzersAlreadyOpen => write!(f, "Buzzers are already open"),
            Self::BuzzNotAvailable => write!(f, "Buzzing is not available right now"),
            Self::AlreadyAttempted => write!(f, "You already attempted this question"),
            Self::NoAnsweringPlayer => write!(f, "No player is answering"),
            Self::TurnRequired => write!(f, "No player has the turn"),
            Self::SlotAlreadyUsed => write!(f, "That category and difficulty was already played"),
            Self::UniqueQuestionUnavailable => {
                write!(f, "No unused question is available")
            },
            Self::QuestionProviderUnavailable => {
                write!(f, "The question provider is unavailable")
            },
            Self::InvalidShareCode => write!(f, "Share code must be 4 digits"),
            Self::ShareCodeNotFound => write!(f, "Share code not found or expired"),
            Self::Validation(m) => write!(f, "{m}"),
        }
    }
}

impl std::error::Error for RoomError {}

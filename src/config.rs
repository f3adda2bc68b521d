//! Tunables for the engine and the room server.
//!
//! The constants are the production values; [`GameConfig`] and
//! [`ServerConfig`] default to them and expose `with_*` builders so tests can
//! shrink windows or pin the random seed.

use std::time::Duration;

/// Maximum number of players in one room.
pub const MAX_PLAYERS: usize = 10;

/// Minimum number of players needed to start a game.
pub const MIN_PLAYERS: usize = 2;

/// Cards dealt to each player at the start of a game.
pub const HAND_SIZE: usize = 7;

/// Time a player has to call UNO before they can be caught.
pub const DECLARE_WINDOW: Duration = Duration::from_millis(3000);

/// How long a disconnected seat is held during a game.
pub const RECONNECT_GRACE: Duration = Duration::from_secs(5 * 60);

/// Number of symbols in a room code.
pub const ROOM_CODE_LENGTH: usize = 6;

/// Symbols used in room codes. `I`, `O`, `0` and `1` are left out so codes
/// can be read aloud and typed without ambiguity.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Default capacity of each connection's outbound channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── GameConfig ──────────────────────────────────────────────────────

/// Rules tunables handed to every [`TurnEngine`](crate::engine::TurnEngine).
///
/// # Example
///
/// ```
/// use uno_server::config::GameConfig;
/// use std::time::Duration;
///
/// let config = GameConfig::new().with_declare_window(Duration::ZERO);
/// assert_eq!(config.hand_size, 7);
/// assert_eq!(config.declare_window, Duration::ZERO);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Cards dealt per player.
    pub hand_size: usize,
    /// Time before a pending UNO call can be caught.
    pub declare_window: Duration,
}

impl GameConfig {
    /// Create a configuration with the production values.
    pub fn new() -> Self {
        Self {
            hand_size: HAND_SIZE,
            declare_window: DECLARE_WINDOW,
        }
    }

    /// Set the number of cards dealt per player. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_hand_size(mut self, hand_size: usize) -> Self {
        self.hand_size = hand_size.max(1);
        self
    }

    /// Set the UNO call window.
    #[must_use]
    pub fn with_declare_window(mut self, window: Duration) -> Self {
        self.declare_window = window;
        self
    }

    /// The declare window in whole milliseconds.
    pub(crate) fn declare_window_millis(&self) -> u64 {
        u64::try_from(self.declare_window.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── ServerConfig ────────────────────────────────────────────────────

/// Configuration for a [`RoomServer`](crate::server::RoomServer).
///
/// # Example
///
/// ```
/// use uno_server::config::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new()
///     .with_seed(42)
///     .with_reconnect_grace(Duration::from_secs(30));
/// assert_eq!(config.max_players, 10);
/// assert_eq!(config.seed, Some(42));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Rules tunables for every game started on this server.
    pub game: GameConfig,
    /// Room capacity.
    pub max_players: usize,
    /// Players required before the host may start.
    pub min_players: usize,
    /// How long a disconnected seat survives during a game.
    pub reconnect_grace: Duration,
    /// Capacity of each connection's outbound channel.
    ///
    /// When a consumer cannot keep up, messages are dropped (with a warning
    /// logged) so one slow client never stalls the room actor.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the room actor gets to exit after [`shutdown`](crate::server::RoomServer::shutdown).
    pub shutdown_timeout: Duration,
    /// Fixed seed for room codes, player ids, shuffles and card ids.
    /// Connection ids stay random. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl ServerConfig {
    /// Create a configuration with the production values.
    pub fn new() -> Self {
        Self {
            game: GameConfig::new(),
            max_players: MAX_PLAYERS,
            min_players: MIN_PLAYERS,
            reconnect_grace: RECONNECT_GRACE,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            seed: None,
        }
    }

    /// Replace the rules tunables.
    #[must_use]
    pub fn with_game(mut self, game: GameConfig) -> Self {
        self.game = game;
        self
    }

    /// Set the room capacity. Values below 2 are clamped to 2.
    #[must_use]
    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players.max(2);
        self
    }

    /// Set the number of players required to start. Values below 2 are clamped to 2.
    #[must_use]
    pub fn with_min_players(mut self, min_players: usize) -> Self {
        self.min_players = min_players.max(2);
        self
    }

    /// Set the reconnection grace period.
    #[must_use]
    pub fn with_reconnect_grace(mut self, grace: Duration) -> Self {
        self.reconnect_grace = grace;
        self
    }

    /// Set the capacity of each outbound channel. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Pin all randomness to a seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

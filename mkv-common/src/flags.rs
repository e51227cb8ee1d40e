//! # Meta Get Flags
//!
//! Purpose: Map the logical metadata requests of a `mg` command onto the
//! single-letter tokens the server understands.
//!
//! ## Design Principles
//! 1. **Stable Order**: Tokens are emitted in the order flags were first set.
//! 2. **Explicit Suppression**: `value = false` removes the `v` token even
//!    when other flags are requested.
//! 3. **Value by Default**: `GetOptions::default()` asks for the value only.

/// One metadata flag understood by the `mg` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GetFlag {
    /// Interpret the key as base64 encoded binary.
    Base64,
    /// Return the item CAS token.
    Cas,
    /// Return the client flags token.
    Flags,
    /// Return whether the item has been hit before.
    Hit,
    /// Return the key as a token.
    Key,
    /// Return seconds since the item was last accessed.
    LastAccess,
    /// Opaque marker copied back with the response.
    Opaque,
    /// Noreply semantics for return codes.
    NoReply,
    /// Return the item size token.
    Size,
    /// Return remaining TTL in seconds (-1 for unlimited).
    Ttl,
    /// Do not bump the item in the LRU.
    NoLru,
    /// Return the item value in a data block.
    Value,
}

impl GetFlag {
    /// Every flag, in protocol documentation order.
    pub const ALL: [GetFlag; 12] = [
        GetFlag::Base64,
        GetFlag::Cas,
        GetFlag::Flags,
        GetFlag::Hit,
        GetFlag::Key,
        GetFlag::LastAccess,
        GetFlag::Opaque,
        GetFlag::NoReply,
        GetFlag::Size,
        GetFlag::Ttl,
        GetFlag::NoLru,
        GetFlag::Value,
    ];

    /// Wire token for this flag.
    pub const fn token(self) -> u8 {
        match self {
            GetFlag::Base64 => b'b',
            GetFlag::Cas => b'c',
            GetFlag::Flags => b'f',
            GetFlag::Hit => b'h',
            GetFlag::Key => b'k',
            GetFlag::LastAccess => b'l',
            GetFlag::Opaque => b'O',
            GetFlag::NoReply => b'q',
            GetFlag::Size => b's',
            GetFlag::Ttl => b't',
            GetFlag::NoLru => b'u',
            GetFlag::Value => b'v',
        }
    }
}

/// Ordered set of flag requests for a single `mg` command.
///
/// Each flag appears at most once; setting it again updates the existing
/// entry in place so the emitted order follows first insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOptions {
    entries: Vec<(GetFlag, bool)>,
}

macro_rules! flag_setters {
    ($($(#[$doc:meta])* $name:ident => $flag:expr),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(self, enabled: bool) -> Self {
                self.with($flag, enabled)
            }
        )*
    };
}

impl GetOptions {
    /// Creates an empty option set (no tokens, not even `v`).
    pub fn new() -> Self {
        GetOptions {
            entries: Vec::with_capacity(4),
        }
    }

    /// Sets `flag` and returns the updated options.
    pub fn with(mut self, flag: GetFlag, enabled: bool) -> Self {
        self.set(flag, enabled);
        self
    }

    /// Sets `flag` in place.
    pub fn set(&mut self, flag: GetFlag, enabled: bool) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == flag) {
            Some(entry) => entry.1 = enabled,
            None => self.entries.push((flag, enabled)),
        }
    }

    /// Returns the explicit setting for `flag`, if any.
    pub fn get(&self, flag: GetFlag) -> Option<bool> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == flag)
            .map(|(_, enabled)| *enabled)
    }

    /// True when the response is expected to carry a data block.
    pub fn wants_value(&self) -> bool {
        self.get(GetFlag::Value).unwrap_or(false)
    }

    /// Tokens to emit, in insertion order.
    pub fn tokens(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(flag, _)| flag.token())
    }

    flag_setters! {
        /// `b`: key is base64 encoded.
        base64 => GetFlag::Base64,
        /// `c`: return CAS token.
        cas => GetFlag::Cas,
        /// `f`: return client flags.
        flags => GetFlag::Flags,
        /// `h`: return hit-before marker.
        hit => GetFlag::Hit,
        /// `k`: return key.
        key => GetFlag::Key,
        /// `l`: return seconds since last access.
        last_access => GetFlag::LastAccess,
        /// `O`: opaque marker.
        opaque => GetFlag::Opaque,
        /// `q`: noreply semantics.
        noreply => GetFlag::NoReply,
        /// `s`: return item size.
        size => GetFlag::Size,
        /// `t`: return remaining TTL.
        ttl => GetFlag::Ttl,
        /// `u`: do not bump the LRU.
        no_lru => GetFlag::NoLru,
        /// `v`: return the value.
        value => GetFlag::Value,
    }
}

impl Default for GetOptions {
    fn default() -> Self {
        GetOptions::new().value(true)
    }
}

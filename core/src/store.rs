use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};

use rkyv::api::high::{HighDeserializer, HighSerializer, HighValidator};
use rkyv::bytecheck::CheckBytes;
use rkyv::rancor::Error;
use rkyv::ser::allocator::ArenaHandle;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

use crate::chat::ChatLog;
use crate::identity::DisplayNames;
use crate::tile::TileState;

pub const TILES_KEY: &str = "monad-tiles";
pub const GAME_TIMER_KEY: &str = "game-timer";
pub const CHAT_MESSAGES_KEY: &str = "chat-messages";
pub const USERNAMES_KEY: &str = "usernames";
pub const WALLET_ADDRESSES_KEY: &str = "wallet-addresses";

pub const TILES: SharedField<TileState> = SharedField::new(TILES_KEY);
pub const GAME_TIMER: SharedField<u32> = SharedField::new(GAME_TIMER_KEY);
pub const CHAT_MESSAGES: SharedField<ChatLog> = SharedField::new(CHAT_MESSAGES_KEY);
pub const USERNAMES: SharedField<DisplayNames> = SharedField::new(USERNAMES_KEY);
pub const WALLET_ADDRESSES: SharedField<DisplayNames> = SharedField::new(WALLET_ADDRESSES_KEY);

pub fn encode<T>(value: &T) -> Option<Vec<u8>>
where
    T: for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, Error>>,
{
    rkyv::to_bytes::<Error>(value).ok().map(|bytes| bytes.into_vec())
}

/// Bytes handed back by a store carry no alignment guarantee, so they are
/// copied into an aligned buffer before validation.
pub fn decode<T>(bytes: &[u8]) -> Option<T>
where
    T: Archive,
    T::Archived:
        for<'a> CheckBytes<HighValidator<'a, Error>> + Deserialize<T, HighDeserializer<Error>>,
{
    let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    rkyv::from_bytes::<T, Error>(&aligned).ok()
}

/// Replicated key-value state owned by the sync layer. Writes are last-write-wins
/// per key; nothing spans more than one key.
pub trait SharedStore {
    fn load(&self, key: &str) -> Option<Vec<u8>>;

    fn save(&mut self, key: &str, bytes: Vec<u8>);

    /// Read-modify-write of one key. Returning `None` from `apply` leaves the
    /// key untouched. Stores that can serialize updates should override this.
    fn update(&mut self, key: &str, apply: &mut dyn FnMut(Option<Vec<u8>>) -> Option<Vec<u8>>) {
        let current = self.load(key);
        if let Some(next) = apply(current) {
            self.save(key, next);
        }
    }
}

/// Typed handle on one shared key.
pub struct SharedField<T> {
    key: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> SharedField<T> {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            _value: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }
}

impl<T> Clone for SharedField<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SharedField<T> {}

impl<T> SharedField<T>
where
    T: Archive + for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, Error>>,
    T::Archived:
        for<'a> CheckBytes<HighValidator<'a, Error>> + Deserialize<T, HighDeserializer<Error>>,
{
    /// Missing and undecodable values both read as `default`.
    pub fn read_or_else<S>(&self, store: &S, default: impl FnOnce() -> T) -> T
    where
        S: SharedStore + ?Sized,
    {
        store
            .load(self.key)
            .and_then(|bytes| decode::<T>(&bytes))
            .unwrap_or_else(default)
    }

    pub fn read_or_default<S>(&self, store: &S) -> T
    where
        S: SharedStore + ?Sized,
        T: Default,
    {
        self.read_or_else(store, T::default)
    }

    pub fn write<S>(&self, store: &mut S, value: &T)
    where
        S: SharedStore + ?Sized,
    {
        match encode(value) {
            Some(bytes) => store.save(self.key, bytes),
            None => tracing::warn!(key = self.key, "failed to encode shared value"),
        }
    }

    /// Applies `mutate` to the latest stored value and writes the result back.
    pub fn update<S, D, F>(&self, store: &mut S, default: D, mut mutate: F) -> Option<T>
    where
        S: SharedStore + ?Sized,
        D: Fn() -> T,
        F: FnMut(&mut T),
    {
        let mut result = None;
        let key = self.key;
        store.update(key, &mut |current: Option<Vec<u8>>| {
            let mut value = current
                .as_deref()
                .and_then(decode::<T>)
                .unwrap_or_else(&default);
            mutate(&mut value);
            let bytes = encode(&value);
            if bytes.is_none() {
                tracing::warn!(key, "failed to encode shared value");
            }
            result = Some(value);
            bytes
        });
        result
    }
}

/// In-process store. Clones share the same map; `update` runs under the lock.
#[derive(Clone, Default)]
pub struct MemoryStore {
    fields: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.fields
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SharedStore for MemoryStore {
    fn load(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    fn save(&mut self, key: &str, bytes: Vec<u8>) {
        self.lock().insert(key.to_string(), bytes);
    }

    fn update(&mut self, key: &str, apply: &mut dyn FnMut(Option<Vec<u8>>) -> Option<Vec<u8>>) {
        let mut fields = self.lock();
        let current = fields.get(key).cloned();
        if let Some(next) = apply(current) {
            fields.insert(key.to_string(), next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::tile_key;

    #[test]
    fn missing_field_reads_default() {
        let store = MemoryStore::new();
        assert_eq!(GAME_TIMER.read_or_else(&store, || 30), 30);
        assert!(TILES.read_or_default(&store).is_empty());
    }

    #[test]
    fn garbage_bytes_read_default() {
        let mut store = MemoryStore::new();
        store.save(GAME_TIMER_KEY, vec![0xff]);
        assert_eq!(GAME_TIMER.read_or_else(&store, || 30), 30);
    }

    #[test]
    fn update_sees_latest_value() {
        let mut store = MemoryStore::new();
        let mut other = store.clone();
        TILES.update(&mut store, TileState::new, |tiles| {
            tiles.toggle(tile_key('M', 0, 0));
        });
        TILES.update(&mut other, TileState::new, |tiles| {
            tiles.toggle(tile_key('M', 0, 6));
        });
        let tiles = TILES.read_or_default(&store);
        assert!(tiles.is_flipped(&tile_key('M', 0, 0)));
        assert!(tiles.is_flipped(&tile_key('M', 0, 6)));
        assert_eq!(store.keys(), vec![TILES_KEY.to_string()]);
    }

    #[test]
    fn write_then_read_timer() {
        let mut store = MemoryStore::new();
        GAME_TIMER.write(&mut store, &17);
        assert_eq!(GAME_TIMER.read_or_else(&store, || 30), 17);
    }
}

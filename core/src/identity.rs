use rkyv::{Archive, Deserialize, Serialize};

use crate::store::{SharedStore, USERNAMES, WALLET_ADDRESSES};

const ADDRESS_PREFIX_CHARS: usize = 6;
const ADDRESS_SUFFIX_CHARS: usize = 4;
const USER_ID_PREFIX_CHARS: usize = 6;

/// Presence entry as reported by the sync layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedUser {
    pub user_id: String,
    pub is_you: bool,
}

pub fn local_user_id(users: &[ConnectedUser]) -> Option<&str> {
    users
        .iter()
        .find(|user| user.is_you)
        .map(|user| user.user_id.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct NameEntry {
    pub user_id: String,
    pub value: String,
}

/// Connection id -> chosen string. Backs both the username and wallet maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct DisplayNames {
    entries: Vec<NameEntry>,
}

impl DisplayNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.value.as_str())
            .filter(|value| !value.is_empty())
    }

    pub fn set(&mut self, user_id: &str, value: &str) {
        match self.entries.iter_mut().find(|entry| entry.user_id == user_id) {
            Some(entry) => entry.value = value.to_string(),
            None => self.entries.push(NameEntry {
                user_id: user_id.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn username<S: SharedStore + ?Sized>(store: &S, user_id: &str) -> Option<String> {
    USERNAMES
        .read_or_default(store)
        .get(user_id)
        .map(str::to_string)
}

pub fn has_username<S: SharedStore + ?Sized>(store: &S, user_id: &str) -> bool {
    username(store, user_id).is_some()
}

/// Stores the trimmed draft as `user_id`'s name. Blank drafts are ignored.
pub fn claim_username<S: SharedStore + ?Sized>(store: &mut S, user_id: &str, draft: &str) -> bool {
    let name = draft.trim();
    if name.is_empty() {
        return false;
    }
    USERNAMES.update(store, DisplayNames::new, |names| names.set(user_id, name));
    tracing::info!(user_id, name, "username claimed");
    true
}

pub fn link_wallet<S: SharedStore + ?Sized>(store: &mut S, user_id: &str, address: &str) -> bool {
    let address = address.trim();
    if address.is_empty() {
        return false;
    }
    WALLET_ADDRESSES.update(store, DisplayNames::new, |wallets| wallets.set(user_id, address));
    true
}

pub fn wallet_address<S: SharedStore + ?Sized>(store: &S, user_id: &str) -> Option<String> {
    WALLET_ADDRESSES
        .read_or_default(store)
        .get(user_id)
        .map(str::to_string)
}

pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= ADDRESS_PREFIX_CHARS + ADDRESS_SUFFIX_CHARS {
        return address.to_string();
    }
    let head: String = chars[..ADDRESS_PREFIX_CHARS].iter().collect();
    let tail: String = chars[chars.len() - ADDRESS_SUFFIX_CHARS..].iter().collect();
    format!("{head}...{tail}")
}

pub fn display_name(user_id: &str, usernames: &DisplayNames, wallets: &DisplayNames) -> String {
    if let Some(name) = usernames.get(user_id) {
        return name.to_string();
    }
    if let Some(address) = wallets.get(user_id) {
        return short_address(address);
    }
    let prefix: String = user_id.chars().take(USER_ID_PREFIX_CHARS).collect();
    format!("User {prefix}")
}

pub fn display_name_in<S: SharedStore + ?Sized>(store: &S, user_id: &str) -> String {
    display_name(
        user_id,
        &USERNAMES.read_or_default(store),
        &WALLET_ADDRESSES.read_or_default(store),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn local_user_is_flagged_entry() {
        let users = vec![
            ConnectedUser {
                user_id: "a1".to_string(),
                is_you: false,
            },
            ConnectedUser {
                user_id: "b2".to_string(),
                is_you: true,
            },
        ];
        assert_eq!(local_user_id(&users), Some("b2"));
        assert_eq!(local_user_id(&users[..1]), None);
    }

    #[test]
    fn display_name_fallbacks() {
        let mut usernames = DisplayNames::new();
        let mut wallets = DisplayNames::new();
        usernames.set("alice-conn", "alice");
        wallets.set("alice-conn", "0xabcdef0123456789");
        wallets.set("bob-conn", "0x1234567890abcdef");

        assert_eq!(display_name("alice-conn", &usernames, &wallets), "alice");
        assert_eq!(display_name("bob-conn", &usernames, &wallets), "0x1234...cdef");
        assert_eq!(display_name("carol-conn", &usernames, &wallets), "User carol-");
    }

    #[test]
    fn short_address_keeps_short_values() {
        assert_eq!(short_address("0xabc"), "0xabc");
    }

    #[test]
    fn claim_username_trims_and_rejects_blank() {
        let mut store = MemoryStore::new();
        assert!(!claim_username(&mut store, "u1", "   "));
        assert!(!has_username(&store, "u1"));
        assert!(claim_username(&mut store, "u1", "  neo "));
        assert_eq!(username(&store, "u1").as_deref(), Some("neo"));
    }

    #[test]
    fn wallet_link_feeds_display_name() {
        let mut store = MemoryStore::new();
        assert!(link_wallet(&mut store, "u2", "0x98b09019c91cd15f4ddc"));
        assert_eq!(display_name_in(&store, "u2"), "0x98b0...4ddc");
        assert!(!has_username(&store, "u2"));
    }
}

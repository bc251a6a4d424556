//! Human-friendly session nicknames.
//!
//! A nickname is three words drawn at random, e.g. `SwiftCopperOtter`.
//! Names are unique among live sessions of one [`NicknamePool`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::seq::IndexedRandom;

const MOODS: &[&str] = &[
    "Swift", "Quiet", "Brave", "Lucky", "Clever", "Rusty", "Sleepy", "Jolly", "Nimble", "Stormy",
    "Gentle", "Bold", "Curious", "Sunny", "Mighty", "Patient",
];

const MATERIALS: &[&str] = &[
    "Copper", "Silver", "Cobalt", "Amber", "Granite", "Velvet", "Crimson", "Ivory", "Jade",
    "Onyx", "Indigo", "Bronze", "Scarlet", "Teal",
];

const CREATURES: &[&str] = &[
    "Otter", "Falcon", "Badger", "Heron", "Lynx", "Gecko", "Walrus", "Marmot", "Puffin", "Beetle",
    "Coyote", "Narwhal", "Raven", "Tortoise",
];

/// Random draws before falling back to a counter.
const MAX_ATTEMPTS: usize = 256;

#[derive(Default)]
pub struct NicknamePool {
    in_use: Mutex<HashSet<String>>,
    fallback: AtomicU64,
}

impl NicknamePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a nickname no live session is using.
    pub fn acquire(&self) -> String {
        let mut rng = rand::rng();
        let mut in_use = self.in_use.lock();
        for _ in 0..MAX_ATTEMPTS {
            let name = format!(
                "{}{}{}",
                MOODS.choose(&mut rng).copied().unwrap_or_default(),
                MATERIALS.choose(&mut rng).copied().unwrap_or_default(),
                CREATURES.choose(&mut rng).copied().unwrap_or_default(),
            );
            if in_use.insert(name.clone()) {
                return name;
            }
        }
        loop {
            let n = self.fallback.fetch_add(1, Ordering::Relaxed) + 1;
            let name = format!("Robot{n}");
            if in_use.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Return `name` to the pool. Unknown names are ignored.
    pub fn release(&self, name: &str) {
        self.in_use.lock().remove(name);
    }

    pub fn in_use(&self) -> usize {
        self.in_use.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nicknames_are_three_words() {
        let pool = NicknamePool::new();
        let name = pool.acquire();
        assert!(MOODS.iter().any(|w| name.starts_with(w)), "{name}");
        assert!(CREATURES.iter().any(|w| name.ends_with(w)), "{name}");
    }

    #[test]
    fn live_nicknames_are_unique() {
        let pool = NicknamePool::new();
        let names: HashSet<String> = (0..500).map(|_| pool.acquire()).collect();
        assert_eq!(names.len(), 500);
        assert_eq!(pool.in_use(), 500);
    }

    #[test]
    fn exhausted_pool_falls_back_to_counter() {
        let pool = NicknamePool::new();
        let total = MOODS.len() * MATERIALS.len() * CREATURES.len();
        {
            let mut in_use = pool.in_use.lock();
            for m in MOODS {
                for t in MATERIALS {
                    for c in CREATURES {
                        in_use.insert(format!("{m}{t}{c}"));
                    }
                }
            }
        }
        assert_eq!(pool.in_use(), total);
        assert_eq!(pool.acquire(), "Robot1");
        assert_eq!(pool.acquire(), "Robot2");
    }

    #[test]
    fn released_names_can_be_reused() {
        let pool = NicknamePool::new();
        let name = pool.acquire();
        pool.release(&name);
        assert_eq!(pool.in_use(), 0);
    }
}

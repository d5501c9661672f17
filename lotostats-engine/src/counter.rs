//! Compteurs sérialisables de l'instantané.
//!
//! `NumberMap` associe un numéro à une valeur (fréquence, dernier concours) avec
//! des clés "05" en JSON. `OrderedCounter` conserve l'ordre de première
//! rencontre des clés : c'est lui qui départage les égalités du classement des
//! paires.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use serde::de::{Error, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use lotostats_db::models::format_number;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumberMap(BTreeMap<u8, u32>);

impl NumberMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, number: u8) -> Option<u32> {
        self.0.get(&number).copied()
    }

    pub fn count(&self, number: u8) -> u32 {
        self.get(number).unwrap_or(0)
    }

    pub fn increment(&mut self, number: u8) {
        *self.0.entry(number).or_insert(0) += 1;
    }

    pub fn set(&mut self, number: u8, value: u32) {
        self.0.insert(number, value);
    }

    /// Retourne `false` si le numéro avait déjà une valeur (conservée).
    pub fn set_if_absent(&mut self, number: u8, value: u32) -> bool {
        match self.0.entry(number) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn add(&mut self, other: &NumberMap) {
        for (&number, &count) in &other.0 {
            *self.0.entry(number).or_insert(0) += count;
        }
    }

    /// Écrase les valeurs de `self` par celles de `newer`.
    pub fn overwrite_with(&mut self, newer: &NumberMap) {
        for (&number, &value) in &newer.0 {
            self.0.insert(number, value);
        }
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|&v| v as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.0.iter().map(|(&n, &v)| (n, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for NumberMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (&number, value) in &self.0 {
            map.serialize_entry(&format_number(number), value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NumberMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, u32>::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        for (key, value) in raw {
            let number = key
                .parse::<u8>()
                .map_err(|_| D::Error::custom(format!("clé de numéro invalide : '{}'", key)))?;
            map.insert(number, value);
        }
        Ok(NumberMap(map))
    }
}

/// Clé textuelle d'un `OrderedCounter`.
pub trait CounterKey: Clone + Eq + Hash {
    fn encode(&self) -> String;
    fn decode(raw: &str) -> Option<Self>;
}

impl CounterKey for String {
    fn encode(&self) -> String {
        self.clone()
    }

    fn decode(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

/// Paire non ordonnée, toujours stockée (plus petit, plus grand).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NumberPair {
    pub low: u8,
    pub high: u8,
}

impl NumberPair {
    pub fn new(a: u8, b: u8) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }
}

impl fmt::Display for NumberPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.low, self.high)
    }
}

impl CounterKey for NumberPair {
    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(raw: &str) -> Option<Self> {
        let (a, b) = raw.split_once('-')?;
        Some(NumberPair::new(a.parse().ok()?, b.parse().ok()?))
    }
}

impl Serialize for NumberPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for NumberPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NumberPair::decode(&raw).ok_or_else(|| D::Error::custom(format!("paire invalide : '{}'", raw)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedCounter<K: CounterKey> {
    entries: Vec<(K, u32)>,
    index: HashMap<K, usize>,
}

impl<K: CounterKey> Default for OrderedCounter<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: CounterKey> OrderedCounter<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: K) {
        self.add(key, 1);
    }

    pub fn add(&mut self, key: K, amount: u32) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 += amount,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, amount));
            }
        }
    }

    pub fn get(&self, key: &K) -> u32 {
        self.index.get(key).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    /// Ajoute les comptes d'un compteur construit sur des tirages plus anciens :
    /// ses clés inconnues sont rangées après celles déjà présentes, comme si
    /// le parcours décroissant avait continué.
    pub fn append_older(&mut self, older: &OrderedCounter<K>) {
        for (key, count) in &older.entries {
            self.add(key.clone(), *count);
        }
    }

    /// Les `n` plus grands comptes ; à égalité, la première clé rencontrée passe devant.
    pub fn top(&self, n: usize) -> Vec<(K, u32)> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted.truncate(n);
        sorted
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u32)> + '_ {
        self.entries.iter().map(|(k, c)| (k, *c))
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| *c as u64).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: CounterKey> Serialize for OrderedCounter<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, count) in &self.entries {
            map.serialize_entry(&key.encode(), count)?;
        }
        map.end()
    }
}

struct OrderedCounterVisitor<K>(PhantomData<K>);

impl<'de, K: CounterKey> Visitor<'de> for OrderedCounterVisitor<K> {
    type Value = OrderedCounter<K>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("un objet clé -> compte")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut counter = OrderedCounter::new();
        while let Some((raw, count)) = access.next_entry::<String, u32>()? {
            let key = K::decode(&raw)
                .ok_or_else(|| A::Error::custom(format!("clé invalide : '{}'", raw)))?;
            counter.add(key, count);
        }
        Ok(counter)
    }
}

impl<'de, K: CounterKey> Deserialize<'de> for OrderedCounter<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedCounterVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_map_set_if_absent_keeps_first() {
        let mut map = NumberMap::new();
        assert!(map.set_if_absent(5, 103));
        assert!(!map.set_if_absent(5, 101));
        assert_eq!(map.get(5), Some(103));
        assert_eq!(map.get(6), None);
        assert_eq!(map.count(6), 0);
    }

    #[test]
    fn test_number_map_add_and_overwrite() {
        let mut a = NumberMap::new();
        a.increment(1);
        a.increment(1);
        let mut b = NumberMap::new();
        b.increment(1);
        b.increment(2);
        a.add(&b);
        assert_eq!(a.count(1), 3);
        assert_eq!(a.count(2), 1);
        assert_eq!(a.total(), 4);

        let mut newer = NumberMap::new();
        newer.set(1, 99);
        a.overwrite_with(&newer);
        assert_eq!(a.get(1), Some(99));
        assert_eq!(a.get(2), Some(1));
    }

    #[test]
    fn test_number_map_padded_json() {
        let mut map = NumberMap::new();
        map.set(5, 2);
        map.set(44, 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"05":2,"44":1}"#);
        let restored: NumberMap = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, map);
        assert!(serde_json::from_str::<NumberMap>(r#"{"x":1}"#).is_err());
    }

    #[test]
    fn test_pair_is_unordered() {
        assert_eq!(NumberPair::new(19, 12), NumberPair::new(12, 19));
        assert_eq!(NumberPair::new(19, 12).to_string(), "12-19");
        assert_eq!(NumberPair::decode("05-33"), Some(NumberPair::new(5, 33)));
        assert_eq!(NumberPair::decode("0533"), None);
    }

    #[test]
    fn test_top_ties_keep_first_seen() {
        let mut counter = OrderedCounter::new();
        counter.increment("b".to_string());
        counter.increment("a".to_string());
        counter.increment("c".to_string());
        counter.increment("c".to_string());
        counter.increment("a".to_string());
        counter.increment("b".to_string());
        counter.increment("d".to_string());

        let top: Vec<String> = counter.top(3).into_iter().map(|(k, _)| k).collect();
        assert_eq!(top, vec!["b", "a", "c"]);
        assert_eq!(counter.top(10).len(), 4);
    }

    #[test]
    fn test_append_older_orders_new_keys_last() {
        let mut newer = OrderedCounter::new();
        newer.increment(NumberPair::new(3, 4));
        let mut older = OrderedCounter::new();
        older.increment(NumberPair::new(1, 2));
        older.increment(NumberPair::new(3, 4));

        newer.append_older(&older);
        let keys: Vec<NumberPair> = newer.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![NumberPair::new(3, 4), NumberPair::new(1, 2)]);
        assert_eq!(newer.get(&NumberPair::new(3, 4)), 2);
        assert_eq!(newer.total(), 3);
    }

    #[test]
    fn test_ordered_counter_json_keeps_order() {
        let mut counter = OrderedCounter::new();
        counter.add(NumberPair::new(40, 50), 1);
        counter.add(NumberPair::new(1, 2), 3);
        let json = serde_json::to_string(&counter).unwrap();
        assert_eq!(json, r#"{"40-50":1,"01-02":3}"#);
        let restored: OrderedCounter<NumberPair> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, counter);
    }
}

//! `LibraryKey`: the tagged `(type_tag, id)` key with a total order that
//! groups keys by tag first, id second.
//!
//! The ordering is expressed directly as `redb::Key::compare` — `redb`
//! binds it to the table's key type at `TableDefinition` construction,
//! so the comparator is fixed before the database is ever opened and
//! there is no separate registration step to get wrong.

use std::cmp::Ordering;

use bincode::{Decode, Encode};
use redb::TypeName;

/// Which namespace an id belongs to. Declaration order is comparator
/// order: `Object` sorts before `Resource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Encode, Decode)]
#[repr(u8)]
pub enum KeyTag {
    Object = 0,
    Resource = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct LibraryKey {
    pub tag: KeyTag,
    pub id: i64,
}

impl LibraryKey {
    pub fn object(id: i64) -> Self {
        LibraryKey { tag: KeyTag::Object, id }
    }

    pub fn resource(id: i64) -> Self {
        LibraryKey { tag: KeyTag::Resource, id }
    }

    fn encode(&self) -> [u8; 9] {
        let mut buf = [0u8; 9];
        buf[0] = self.tag as u8;
        buf[1..9].copy_from_slice(&self.id.to_be_bytes());
        buf
    }

    fn decode(data: &[u8]) -> Self {
        let tag = match data[0] {
            0 => KeyTag::Object,
            1 => KeyTag::Resource,
            other => panic!("corrupt LibraryKey tag byte: {other}"),
        };
        let id = i64::from_be_bytes(data[1..9].try_into().expect("9-byte key"));
        LibraryKey { tag, id }
    }

    pub fn lower_bound(tag: KeyTag) -> Self {
        LibraryKey { tag, id: i64::MIN }
    }

    pub fn upper_bound(tag: KeyTag) -> Self {
        LibraryKey { tag, id: i64::MAX }
    }
}

impl redb::Value for LibraryKey {
    type SelfType<'a> = LibraryKey;
    type AsBytes<'a> = [u8; 9];

    fn fixed_width() -> Option<usize> {
        Some(9)
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        LibraryKey::decode(data)
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a>
    where
        Self: 'b,
    {
        value.encode()
    }

    fn type_name() -> TypeName {
        TypeName::new("eems::LibraryKey")
    }
}

impl redb::Key for LibraryKey {
    fn compare(data1: &[u8], data2: &[u8]) -> Ordering {
        LibraryKey::decode(data1).cmp(&LibraryKey::decode(data2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_orders_before_id() {
        let a = LibraryKey::object(i64::MAX);
        let b = LibraryKey::resource(i64::MIN);
        assert!(a < b, "any Object key must sort before any Resource key");
    }

    #[test]
    fn id_orders_ascending_within_tag() {
        let a = LibraryKey::object(1);
        let b = LibraryKey::object(2);
        assert!(a < b);
    }

    #[test]
    fn negative_ids_order_correctly() {
        let a = LibraryKey::object(-1);
        let b = LibraryKey::object(0);
        assert!(a < b);
    }

    #[test]
    fn compare_matches_encoded_round_trip() {
        let k = LibraryKey::resource(42);
        let bytes = <LibraryKey as redb::Value>::as_bytes(&k);
        let back = <LibraryKey as redb::Value>::from_bytes(&bytes);
        assert_eq!(k, back);
    }

    #[test]
    fn compare_is_total_order() {
        let keys = [
            LibraryKey::object(-5),
            LibraryKey::object(0),
            LibraryKey::object(5),
            LibraryKey::resource(-5),
            LibraryKey::resource(5),
        ];
        for i in 0..keys.len() {
            for j in 0..keys.len() {
                let a = <LibraryKey as redb::Value>::as_bytes(&keys[i]);
                let b = <LibraryKey as redb::Value>::as_bytes(&keys[j]);
                let expected = keys[i].cmp(&keys[j]);
                assert_eq!(<LibraryKey as redb::Key>::compare(&a, &b), expected);
            }
        }
    }
}

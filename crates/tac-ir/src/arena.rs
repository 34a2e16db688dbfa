use std::{fmt, hash::Hash, iter::FusedIterator, marker::PhantomData, slice};

use buggy::{Bug, BugExt as _};

/// A typed index into an [`Arena`].
pub trait Key: Copy + Clone + fmt::Debug + Eq + PartialEq + Hash + Sized + 'static {
    fn to_usize(self) -> usize;
    fn from_u32(id: u32) -> Self;
}

/// Append-only storage that hands out stable, typed keys.
///
/// Items are never removed, so a key stays valid for the lifetime of the
/// arena. Unreachable items are simply no longer referenced.
#[derive(Clone, Debug, PartialEq)]
pub struct Arena<K, V> {
    items: Vec<V>,
    _marker: PhantomData<fn() -> K>,
}

impl<K, V> Arena<K, V> {
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Number of items ever inserted.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<K, V> Arena<K, V>
where
    K: Key,
{
    pub fn insert(&mut self, item: V) -> Result<K, Bug> {
        self.insert_with_key(|_| item)
    }

    /// Inserts the item produced by `f`, which learns its own key first.
    pub fn insert_with_key<F>(&mut self, f: F) -> Result<K, Bug>
    where
        F: FnOnce(K) -> V,
    {
        let id = u32::try_from(self.items.len()).assume("arena index fits in `u32`")?;
        let key = K::from_u32(id);
        self.items.push(f(key));
        Ok(key)
    }

    pub fn get(&self, id: K) -> Option<&V> {
        self.items.get(id.to_usize())
    }

    pub fn get_mut(&mut self, id: K) -> Option<&mut V> {
        self.items.get_mut(id.to_usize())
    }

    pub fn contains(&self, id: K) -> bool {
        id.to_usize() < self.items.len()
    }

    pub fn iter(&self) -> ArenaIter<'_, K, V> {
        ArenaIter {
            iter: self.items.iter(),
            next: 0,
            _marker: PhantomData,
        }
    }
}

impl<K, V> std::ops::Index<K> for Arena<K, V>
where
    K: Key,
{
    type Output = V;

    fn index(&self, id: K) -> &Self::Output {
        &self.items[id.to_usize()]
    }
}

impl<K, V> Default for Arena<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, K, V> IntoIterator for &'a Arena<K, V>
where
    K: Key,
{
    type Item = (K, &'a V);
    type IntoIter = ArenaIter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ArenaIter<'a, K, V> {
    iter: slice::Iter<'a, V>,
    next: u32,
    _marker: PhantomData<fn() -> K>,
}

impl<'a, K, V> Iterator for ArenaIter<'a, K, V>
where
    K: Key,
{
    type Item = (K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let item = self.iter.next()?;
        let key = K::from_u32(self.next);
        // Insertion caps the arena at `u32::MAX` items.
        self.next = self.next.saturating_add(1);
        Some((key, item))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ArenaIter<'_, K, V> where K: Key {}

impl<K, V> FusedIterator for ArenaIter<'_, K, V> where K: Key {}

macro_rules! new_key_type {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Copy,
            Clone,
            Default,
            Debug,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            std::hash::Hash,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        $vis struct $name(u32);

        impl $crate::arena::Key for $name {
            #[inline]
            fn to_usize(self) -> usize {
                self.0 as usize
            }

            #[inline]
            fn from_u32(id: u32) -> Self {
                Self(id)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
pub(crate) use new_key_type;

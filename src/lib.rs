//! A reduce-side join (lite) over IMDB-style datasets.
//!
//! Two line-oriented sources, movie titles and cast credits, are joined on
//! their title identifier and reduced to the number of movies a single actor
//! appeared in per release year. The work runs as two chained MapReduce
//! stages on an in-process engine: map tasks emit key-value pairs, the engine
//! groups them by key, and a reduce function is called once per group.

use bytes::Bytes;
use std::hash::Hasher;

pub mod codec;
pub mod config;
pub mod pipeline;
pub mod standalone;
pub mod utils;
pub mod workload;

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
///
/// This accomodates both batch (all keys emitted at once) and lazy
/// (keys only emitted when the iterator is consumed) map operations.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes a key-value pair and auxiliary arguments.
///
/// The key is the path of the source file and the value is one input split
/// of that file. It returns an iterator that yields the emitted pairs.
pub type MapFn = fn(kv: KeyValue, aux: Bytes) -> MapOutput;

/// A reduce function takes in a key, an iterator over every value emitted
/// for that key, and an auxiliary argument. It returns the encoded output
/// lines for the group; an empty buffer means nothing is emitted.
pub type ReduceFn = fn(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    aux: Bytes,
) -> anyhow::Result<Bytes>;

/// A single-input map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyValue {
    /// The key.
    pub key: Bytes,
    /// The value.
    pub value: Bytes,
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the key of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn key(&self) -> Bytes {
        self.key.clone()
    }

    /// Get the value of this key-value pair.
    #[inline]
    pub fn value(&self) -> Bytes {
        self.value.clone()
    }

    /// Consumes the key-value pair and returns the key.
    #[inline]
    pub fn into_key(self) -> Bytes {
        self.key
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> Bytes {
        self.value
    }
}

/// Hashes an intermediate key. Compute a reduce partition for a given key
/// by calculating `ihash(key) % n_reduce`.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key);
    // Masked to 31 bits, always fits.
    (hasher.finish() & 0x7fff_ffff) as u32
}

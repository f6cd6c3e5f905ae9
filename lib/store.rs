//! Storage for blocks and basis transformations produced during a DMRG run,
//! keyed by which end of the chain they grow from and their length.

use std::fmt;
use rustc_hash::FxHashMap as HashMap;
use crate::{
    DMRGError,
    DMRGResult,
    block::Block,
    sparse::SpMat,
};

/// An end of the chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Return the other end.
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Return a one-letter label.
    pub fn label(self) -> char {
        match self {
            Self::Left => 'l',
            Self::Right => 'r',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Marks what kind of item a [`Store`] holds, for error reporting.
pub trait StoreItem {
    fn missing(side: Side, length: usize) -> DMRGError;
}

impl StoreItem for Block {
    fn missing(side: Side, length: usize) -> DMRGError {
        DMRGError::MissingBlock { side, length }
    }
}

impl StoreItem for SpMat<f64> {
    fn missing(side: Side, length: usize) -> DMRGError {
        DMRGError::MissingTransformation { side, length }
    }
}

/// A map from `(side, length)` to items.
#[derive(Clone, Debug)]
pub struct Store<V> {
    data: HashMap<(Side, usize), V>,
}

impl<V> Default for Store<V> {
    fn default() -> Self { Self { data: HashMap::default() } }
}

impl<V> Store<V> {
    pub fn new() -> Self { Self::default() }

    /// Insert an item, returning the one previously stored under the same key,
    /// if any.
    pub fn insert(&mut self, side: Side, length: usize, item: V) -> Option<V> {
        self.data.insert((side, length), item)
    }

    pub fn get(&self, side: Side, length: usize) -> Option<&V> {
        self.data.get(&(side, length))
    }

    pub fn contains(&self, side: Side, length: usize) -> bool {
        self.data.contains_key(&(side, length))
    }

    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

impl<V: StoreItem> Store<V> {
    /// Like [`get`][Self::get], but failing with a `Missing*` error if the
    /// item is absent.
    pub fn require(&self, side: Side, length: usize) -> DMRGResult<&V> {
        self.get(side, length).ok_or_else(|| V::missing(side, length))
    }
}

/// Blocks, by side and length.
pub type BlockStore = Store<Block>;

/// Transformations from enlarged to truncated bases, by the side and length
/// of the block they produced.
pub type TransformStore = Store<SpMat<f64>>;

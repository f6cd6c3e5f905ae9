//! Total-*S*<sub>*z*</sub> quantum numbers and the grouping of basis states by
//! them.
//!
//! A [`Sector`] stores twice the magnetization so that half-integer values
//! compare and hash exactly. A [`SectorIndex`] maps each distinct sector found
//! in a list of per-state labels to the positions of the states carrying it.
//!
//! ```
//! use sz_dmrg::sector::{ Sector, SectorIndex };
//!
//! let labels: Vec<Sector>
//!     = [1, -1, -1, 1].into_iter().map(Sector::from_twice).collect();
//! let index = SectorIndex::new(&labels);
//! assert_eq!(index.get(Sector::from_twice(1)), Some([0, 3].as_slice()));
//! assert_eq!(index.get(Sector::from_twice(-1)), Some([1, 2].as_slice()));
//! assert_eq!(index.get(Sector::from_twice(3)), None);
//! ```

use std::{
    fmt,
    ops::{ Add, Neg, Sub },
};
use rustc_hash::FxHashMap as HashMap;
use crate::{ DMRGError, DMRGResult };

/// A total-*S*<sub>*z*</sub> value, stored as 2*S*<sub>*z*</sub>.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sector(i32);

impl Sector {
    /// *S*<sub>*z*</sub> = 0.
    pub const ZERO: Self = Self(0);

    /// Create from twice the magnetization.
    pub const fn from_twice(twice_sz: i32) -> Self { Self(twice_sz) }

    /// Create from a magnetization, which must be an integer or half-integer.
    pub fn from_sz(sz: f64) -> DMRGResult<Self> {
        let twice = (2.0 * sz).round();
        if !sz.is_finite()
            || (2.0 * sz - twice).abs() > 1e-9
            || twice.abs() > i32::MAX as f64
        {
            return Err(DMRGError::InvalidSector(
                format!("Sz = {sz} is not a half-integer")
            ));
        }
        Ok(Self(twice as i32))
    }

    /// Return twice the magnetization.
    pub const fn twice(self) -> i32 { self.0 }

    /// Return the magnetization.
    pub fn sz(self) -> f64 { f64::from(self.0) / 2.0 }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 2 == 0 {
            write!(f, "{}", self.0 / 2)
        } else {
            write!(f, "{}/2", self.0)
        }
    }
}

impl Add for Sector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self { Self(self.0 + rhs.0) }
}

impl Sub for Sector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self { Self(self.0 - rhs.0) }
}

impl Neg for Sector {
    type Output = Self;

    fn neg(self) -> Self { Self(-self.0) }
}

/// Positions of basis states grouped by sector.
///
/// Sectors are iterated in the order in which they first appear in the label
/// list, and positions within a sector are increasing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectorIndex {
    order: Vec<(Sector, Vec<usize>)>,
    lookup: HashMap<Sector, usize>,
}

impl SectorIndex {
    /// Build from per-state sector labels.
    pub fn new(sectors: &[Sector]) -> Self {
        sectors.iter().copied().collect()
    }

    /// Return the positions of states in sector `s`, if any.
    pub fn get(&self, s: Sector) -> Option<&[usize]> {
        self.lookup.get(&s).map(|k| self.order[*k].1.as_slice())
    }

    /// Return `true` if any state is in sector `s`.
    pub fn contains(&self, s: Sector) -> bool { self.lookup.contains_key(&s) }

    /// Return the number of distinct sectors.
    pub fn len(&self) -> usize { self.order.len() }

    /// Return `true` if there are no sectors.
    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    /// Return the total number of indexed states.
    pub fn num_states(&self) -> usize {
        self.order.iter().map(|(_, pos)| pos.len()).sum()
    }

    /// Iterate over sectors and their positions in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (Sector, &[usize])> + '_ {
        self.order.iter().map(|(s, pos)| (*s, pos.as_slice()))
    }
}

impl FromIterator<Sector> for SectorIndex {
    fn from_iter<I>(iter: I) -> Self
    where I: IntoIterator<Item = Sector>
    {
        let mut order: Vec<(Sector, Vec<usize>)> = Vec::new();
        let mut lookup: HashMap<Sector, usize> = HashMap::default();
        for (i, s) in iter.into_iter().enumerate() {
            if let Some(k) = lookup.get(&s) {
                order[*k].1.push(i);
            } else {
                lookup.insert(s, order.len());
                order.push((s, vec![i]));
            }
        }
        Self { order, lookup }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_integers() {
        assert_eq!(Sector::from_sz(0.5).unwrap(), Sector::from_twice(1));
        assert_eq!(Sector::from_sz(-1.5).unwrap().twice(), -3);
        assert_eq!(Sector::from_sz(2.0).unwrap().sz(), 2.0);
        assert!(Sector::from_sz(0.25).is_err());
        assert!(Sector::from_sz(f64::NAN).is_err());
        assert_eq!(Sector::from_twice(1) + Sector::from_twice(-3), Sector::from_twice(-2));
        assert_eq!(Sector::ZERO - Sector::from_twice(1), -Sector::from_twice(1));
    }

    #[test]
    fn display() {
        assert_eq!(Sector::ZERO.to_string(), "0");
        assert_eq!(Sector::from_twice(4).to_string(), "2");
        assert_eq!(Sector::from_twice(-3).to_string(), "-3/2");
        assert_eq!(Sector::from_twice(1).to_string(), "1/2");
    }

    #[test]
    fn index_order() {
        let labels: Vec<Sector>
            = [2, 0, 0, -2, 0, 2].into_iter().map(Sector::from_twice).collect();
        let index = SectorIndex::new(&labels);
        assert_eq!(index.len(), 3);
        assert_eq!(index.num_states(), 6);
        let order: Vec<(i32, Vec<usize>)>
            = index.iter().map(|(s, pos)| (s.twice(), pos.to_vec())).collect();
        assert_eq!(
            order,
            vec![(2, vec![0, 5]), (0, vec![1, 2, 4]), (-2, vec![3])],
        );
        assert!(index.contains(Sector::from_twice(-2)));
        assert!(!index.contains(Sector::from_twice(4)));
        assert!(SectorIndex::new(&[]).is_empty());
    }
}

//! Named filters for filtered reads.
//!
//! A filter is a numbered set of allowed user-mapping indices. Filters are
//! defined between reads and referenced per dimension by a filtered read's
//! action vector; they live only as long as the session.

use hashbrown::HashSet;

use crate::error::{Error, ErrorKind, Result};

#[derive(Debug)]
pub(crate) struct Filter {
    pub nr: i32,
    allowed: HashSet<i32>,
}

impl Filter {
    pub fn contains(&self, map: i32) -> bool {
        self.allowed.contains(&map)
    }
}

/// The per-handle filter collection plus the filter currently under
/// definition.
#[derive(Debug, Default)]
pub(crate) struct FilterSet {
    filters: Vec<Filter>,
    pending: Option<Filter>,
}

impl FilterSet {
    pub fn exists(&self, nr: i32) -> bool {
        self.filters.iter().any(|f| f.nr == nr)
    }

    pub fn get(&self, nr: i32) -> Option<&Filter> {
        self.filters.iter().find(|f| f.nr == nr)
    }

    /// Begin defining filter `nr`.
    pub fn start(&mut self, nr: i32) -> Result<()> {
        if nr < 1 {
            return Err(Error::new(ErrorKind::FilterUnknown));
        }
        if self.exists(nr) {
            return Err(Error::new(ErrorKind::FilterAlreadyExists));
        }
        self.pending = Some(Filter {
            nr,
            allowed: HashSet::new(),
        });
        Ok(())
    }

    /// Add a user-mapping index to the filter under definition.
    pub fn register(&mut self, map: i32) -> Result<()> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::FilterUnknown))?;
        if map < 1 {
            return Err(Error::new(ErrorKind::BadElementIndex));
        }
        pending.allowed.insert(map);
        Ok(())
    }

    /// Freeze the filter under definition.
    pub fn done(&mut self) -> Result<()> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| Error::new(ErrorKind::FilterUnknown))?;
        self.filters.push(pending);
        Ok(())
    }

    pub fn memory_used(&self) -> usize {
        self.filters
            .iter()
            .map(|f| f.allowed.len() * std::mem::size_of::<i32>() * 2)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_query() {
        let mut filters = FilterSet::default();
        assert!(!filters.exists(1));
        filters.start(1).unwrap();
        filters.register(1).unwrap();
        filters.register(3).unwrap();
        filters.done().unwrap();
        assert!(filters.exists(1));
        let f = filters.get(1).unwrap();
        assert!(f.contains(1) && f.contains(3));
        assert!(!f.contains(2));
    }

    #[test]
    fn duplicate_number_rejected() {
        let mut filters = FilterSet::default();
        filters.start(1).unwrap();
        filters.done().unwrap();
        assert_eq!(
            filters.start(1).unwrap_err().kind(),
            Some(ErrorKind::FilterAlreadyExists)
        );
    }

    #[test]
    fn register_needs_start() {
        let mut filters = FilterSet::default();
        assert!(filters.register(1).is_err());
        assert!(filters.done().is_err());
    }
}

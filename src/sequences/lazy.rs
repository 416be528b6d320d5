//! Functionality for lazy-loading data off disk into memory.
//!
//! The main functionality is the very generic [`LazyLoader`]. This is generic over the loading
//! function and the key type. It mainly handles loading data into a [`RefCell`], caching the
//! most recently loaded key's worth of data.
//!
use std::cell::{Ref, RefCell};

use crate::error::GenomeLakeError;

/// A lazy-loader function that takes a reader type `R` and
/// uses it to load in data of type `T`.
type LoaderFunc<R, T, K> = Box<dyn Fn(&mut R, &K) -> Result<T, GenomeLakeError>>;

/// Lazy loader, which uses [`RefCell`] to store mutable reader and data, used for lazy loading and
/// storing one key's worth of data.
///
/// # Generics
///  * `R`: the reader type.
///  * `T`: the data type.
///  * `K`: the key type.
///
/// A [`LazyLoader`] is neither `Send` nor `Sync`.
pub struct LazyLoader<R, T, K>
where
    K: std::fmt::Debug,
{
    key: RefCell<Option<K>>,
    reader: RefCell<R>,
    loader: LoaderFunc<R, T, K>,
    data: RefCell<Option<T>>,
}

impl<R, T, K> std::fmt::Debug for LazyLoader<R, T, K>
where
    K: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyLoader")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<R, T, K> LazyLoader<R, T, K>
where
    K: std::fmt::Debug + Clone + PartialEq,
{
    pub fn new<F>(reader: R, loader: F) -> LazyLoader<R, T, K>
    where
        F: Fn(&mut R, &K) -> Result<T, GenomeLakeError> + 'static,
    {
        LazyLoader {
            key: RefCell::new(None),
            reader: RefCell::new(reader),
            loader: Box::new(loader),
            data: RefCell::new(None),
        }
    }

    /// Return a `bool` indicating whether the specified `key` is cached.
    pub fn is_loaded(&self, key: &K) -> bool {
        let loaded_key = self.key.borrow();
        match &*loaded_key {
            None => false,
            Some(existing_key) => *key == *existing_key,
        }
    }

    fn load(&self, key: &K) -> Result<T, GenomeLakeError> {
        let mut reader = self.reader.borrow_mut();
        (self.loader)(&mut reader, key)
    }

    /// Clear out the cache.
    pub fn clear(&self) {
        *self.data.borrow_mut() = None;
        *self.key.borrow_mut() = None;
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_none()
    }

    /// Load the data corresponding to `key`, using the cached copy if `key` was
    /// the last key loaded.
    ///
    /// A failed load leaves the cache empty.
    pub fn get_data(&self, key: &K) -> Result<Ref<'_, T>, GenomeLakeError> {
        if !self.is_loaded(key) {
            self.clear();
            let new_data = self.load(key)?;
            *self.data.borrow_mut() = Some(new_data);
            *self.key.borrow_mut() = Some(key.clone());
        }

        Ref::filter_map(self.data.borrow(), Option::as_ref).map_err(|_| {
            GenomeLakeError::IOError(std::io::Error::other(format!(
                "lazy-loaded data for key {:?} is unavailable",
                key
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::LazyLoader;
    use crate::error::GenomeLakeError;

    fn counting_loader() -> LazyLoader<usize, Vec<usize>, usize> {
        // the reader counts how many loads were performed
        LazyLoader::new(0usize, |loads: &mut usize, key: &usize| {
            *loads += 1;
            if *key == 99 {
                return Err(GenomeLakeError::MissingSequence(key.to_string()));
            }
            Ok(vec![*key; 3])
        })
    }

    #[test]
    fn test_lazyload_caches_last_key() {
        let lazy = counting_loader();
        assert!(lazy.is_empty());
        assert!(!lazy.is_loaded(&1));

        assert_eq!(*lazy.get_data(&1).unwrap(), vec![1, 1, 1]);
        assert!(lazy.is_loaded(&1));
        assert_eq!(*lazy.get_data(&1).unwrap(), vec![1, 1, 1]);
        assert_eq!(*lazy.reader.borrow(), 1);

        assert_eq!(*lazy.get_data(&2).unwrap(), vec![2, 2, 2]);
        assert!(!lazy.is_loaded(&1));
        assert_eq!(*lazy.reader.borrow(), 2);
    }

    #[test]
    fn test_lazyload_failure_clears_cache() {
        let lazy = counting_loader();
        lazy.get_data(&1).unwrap();
        assert!(lazy.get_data(&99).is_err());
        assert!(lazy.is_empty());
        assert!(!lazy.is_loaded(&1));
    }

    #[test]
    fn test_lazyload_clear() {
        let lazy = counting_loader();
        lazy.get_data(&4).unwrap();
        lazy.clear();
        assert!(lazy.is_empty());
        assert!(!lazy.is_loaded(&4));
    }
}

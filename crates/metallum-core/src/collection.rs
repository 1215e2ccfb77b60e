//! Ordered, filterable collections of entities and search rows
//!
//! Filtering goes through a per-type accessor table ([`Queryable::ATTRIBUTES`])
//! rather than reflection, so the set of filterable names is fixed per type
//! and unknown names are reported before any element is inspected.

use std::fmt::Display;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::{MetallumError, Result};

/// Types that can be filtered by attribute name.
pub trait Queryable: 'static {
    /// Entity name used in error messages
    const ENTITY: &'static str;

    /// Filterable attribute names and their string accessors
    const ATTRIBUTES: &'static [(&'static str, fn(&Self) -> String)];

    /// Accessor registered under `name`
    fn accessor(name: &str) -> Option<fn(&Self) -> String> {
        Self::ATTRIBUTES
            .iter()
            .find(|(attribute, _)| *attribute == name)
            .map(|(_, accessor)| *accessor)
    }

    /// String form of the attribute `name`, if the type exposes it
    fn attribute(&self, name: &str) -> Option<String> {
        Self::accessor(name).map(|accessor| accessor(self))
    }
}

/// Attribute-equality criteria, combined with logical AND.
///
/// Values are compared by their lower-cased `Display` form, so
/// `AlbumType::FullLength`, `"Full-length"` and `"full-length"` all match
/// the same rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    terms: Vec<(String, String)>,
}

impl Criteria {
    /// Empty criteria (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Require attribute `name` to equal `value`.
    pub fn eq(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.terms.push((name.into(), normalize(&value.to_string())));
        self
    }

    /// Whether no criterion was added
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

fn normalize(value: &str) -> String {
    value.to_lowercase()
}

/// Ordered sequence of `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Collection<T> {
    /// Wrap a vector, keeping its order
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Queryable + Clone> Collection<T> {
    /// Elements matching every criterion, in their original order.
    ///
    /// The source collection is left untouched.
    ///
    /// # Errors
    /// Returns `MetallumError::UnknownFilterAttribute` if a criterion names
    /// an attribute `T` does not expose.
    ///
    /// # Example
    /// ```
    /// use metallum_core::{AlbumEntry, AlbumType, Collection, Criteria};
    ///
    /// let albums: Collection<AlbumEntry> = vec![
    ///     AlbumEntry { id: 1, title: "Kill 'Em All".into(), album_type: AlbumType::FullLength,
    ///                  year: Some(1983), review_count: 0, score: None },
    ///     AlbumEntry { id: 2, title: "Jump in the Fire".into(), album_type: AlbumType::Single,
    ///                  year: Some(1984), review_count: 0, score: None },
    /// ].into();
    ///
    /// let full = albums.filter(&Criteria::new().eq("type", AlbumType::FullLength)).unwrap();
    /// assert_eq!(full.len(), 1);
    /// ```
    pub fn filter(&self, criteria: &Criteria) -> Result<Collection<T>> {
        let mut resolved = Vec::with_capacity(criteria.terms.len());
        for (name, expected) in &criteria.terms {
            let accessor =
                T::accessor(name).ok_or_else(|| MetallumError::UnknownFilterAttribute {
                    attribute: name.clone(),
                    entity: T::ENTITY,
                })?;
            resolved.push((accessor, expected));
        }

        let mut working: Vec<&T> = self.items.iter().collect();
        for (accessor, expected) in resolved {
            working.retain(|item| normalize(&accessor(*item)) == *expected);
        }

        Ok(working.into_iter().cloned().collect())
    }

    /// Shorthand for a single-criterion [`filter`](Self::filter).
    pub fn filter_by(&self, name: &str, value: impl Display) -> Result<Collection<T>> {
        self.filter(&Criteria::new().eq(name, value))
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> Index<usize> for Collection<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::str::FromStr;

use crate::error::{CircleError, Result};

const EXCLUDE_PREFIX: &str = "not:";

/// Test results are named `failure`/`success` upstream but users type `failed`/`passed`.
pub const TEST_RESULT_ALIASES: &[(&str, &str)] = &[("failed", "failure"), ("passed", "success")];

/// Include/exclude filter over status values.
///
/// An empty include set admits everything; exclusion always wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFilter<T: Eq + Hash> {
    include: HashSet<T>,
    exclude: HashSet<T>,
}

impl<T: Eq + Hash> Default for StatusFilter<T> {
    fn default() -> Self {
        Self {
            include: HashSet::new(),
            exclude: HashSet::new(),
        }
    }
}

impl<T: Eq + Hash> StatusFilter<T> {
    pub fn new(include: impl IntoIterator<Item = T>, exclude: impl IntoIterator<Item = T>) -> Self {
        Self {
            include: include.into_iter().collect(),
            exclude: exclude.into_iter().collect(),
        }
    }

    pub fn only(include: impl IntoIterator<Item = T>) -> Self {
        Self::new(include, [])
    }

    pub fn matches(&self, value: &T) -> bool {
        (self.include.is_empty() || self.include.contains(value)) && !self.exclude.contains(value)
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

impl<T> StatusFilter<T>
where
    T: Eq + Hash + FromStr,
    T::Err: Display,
{
    /// Parses CLI values such as `failed` or `not:success`.
    ///
    /// Values may also be comma separated. Aliases are resolved after the
    /// `not:` prefix is removed.
    ///
    /// # Errors
    ///
    /// Returns [`CircleError::Config`] for a value that does not name a status.
    pub fn parse<S: AsRef<str>>(raw_values: &[S], aliases: &[(&str, &str)]) -> Result<Self> {
        let mut filter = Self::default();

        for raw in raw_values
            .iter()
            .flat_map(|value| value.as_ref().split(','))
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            let (target, name) = match raw.strip_prefix(EXCLUDE_PREFIX) {
                Some(name) => (&mut filter.exclude, name),
                None => (&mut filter.include, raw),
            };

            let name = aliases
                .iter()
                .find(|(alias, _)| *alias == name)
                .map_or(name, |(_, canonical)| *canonical);

            let status = name
                .parse()
                .map_err(|e| CircleError::Config(format!("Invalid status filter '{raw}': {e}")))?;
            target.insert(status);
        }

        Ok(filter)
    }
}

use std::collections::BTreeSet;

use thiserror::Error;

use crate::bounds::{BoundsError, GeoBounds};
use crate::category::Category;
use crate::time::{TimePreset, Timestamp};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("invalid viewport: {0}")]
    Viewport(#[from] BoundsError),
}

/// The current query intent: which categories, since when, and where.
///
/// Values are immutable; every change goes through [`QueryParams::apply`] and
/// produces a fresh value that replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryParams {
    pub categories: BTreeSet<Category>,
    pub since: Option<Timestamp>,
    pub viewport: Option<GeoBounds>,
}

/// A parameter change requested by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamIntent {
    ToggleCategory(Category),
    SelectAllCategories,
    ClearCategories,
    SetCategories(BTreeSet<Category>),
    SetSince(Option<Timestamp>),
    /// Selecting the preset that is already active clears `since`.
    TogglePreset { preset: TimePreset, now: Timestamp },
    SetViewport(Option<GeoBounds>),
    /// Same parameters, new logical query.
    Refetch,
}

impl QueryParams {
    /// Every known category, no time bound, no viewport.
    pub fn all_categories() -> Self {
        Self {
            categories: Category::all_known().collect(),
            ..Self::default()
        }
    }

    pub fn with_categories<I, C>(categories: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Category>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    pub fn viewport(mut self, viewport: GeoBounds) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// An empty filter excludes everything; no network work is needed.
    pub fn excludes_everything(&self) -> bool {
        self.categories.is_empty()
    }

    /// True when the filter names every known category, so the `types`
    /// constraint can be left off the request.
    pub fn covers_all_known(&self) -> bool {
        Category::KNOWN
            .iter()
            .all(|name| self.categories.contains(&Category::from(*name)))
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if let Some(viewport) = &self.viewport {
            viewport.validate()?;
        }
        Ok(())
    }

    pub fn active_preset(&self, now: Timestamp) -> Option<TimePreset> {
        TimePreset::detect(self.since, now)
    }

    pub fn apply(&self, intent: ParamIntent) -> QueryParams {
        let mut next = self.clone();
        match intent {
            ParamIntent::ToggleCategory(category) => {
                if !next.categories.remove(&category) {
                    next.categories.insert(category);
                }
            }
            ParamIntent::SelectAllCategories => {
                next.categories = Category::all_known().collect();
            }
            ParamIntent::ClearCategories => next.categories.clear(),
            ParamIntent::SetCategories(categories) => next.categories = categories,
            ParamIntent::SetSince(since) => next.since = since,
            ParamIntent::TogglePreset { preset, now } => {
                next.since = if self.active_preset(now) == Some(preset) {
                    None
                } else {
                    Some(preset.since(now))
                };
            }
            ParamIntent::SetViewport(viewport) => next.viewport = viewport,
            ParamIntent::Refetch => {}
        }
        next
    }
}

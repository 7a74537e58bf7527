//! Cascading Montadora → Família → SubFamília filter.
//!
//! The selection state lives in the visitor session. Changing a level clears
//! every level below it, and no level may hold a selection while its parent
//! is empty. Each change reports which option list must be fetched next and
//! whether the result page should be re-queried.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use ancora_core::{FamilyId, ManufacturerId, SubfamilyId};

use crate::catalog::{FilterApi, FilterOption, GuidedFilter};

/// A level of the cascade, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Manufacturer,
    Family,
    Subfamily,
}

impl Level {
    /// Name shown to visitors.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Manufacturer => "montadora",
            Self::Family => "família",
            Self::Subfamily => "subfamília",
        }
    }

    /// The level this one depends on.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Manufacturer => None,
            Self::Family => Some(Self::Manufacturer),
            Self::Subfamily => Some(Self::Family),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors from cascade transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CascadeError {
    /// The level's parent has no selection.
    #[error("cannot select {level} while {parent} is empty")]
    ParentEmpty { level: Level, parent: Level },

    /// The id is not among the level's options.
    #[error("unknown {level} option: {id}")]
    UnknownOption { level: Level, id: String },
}

impl CascadeError {
    /// Message safe to show to the visitor.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ParentEmpty { parent, .. } => format!("Selecione a {parent} primeiro."),
            Self::UnknownOption { level, .. } => format!("Opção de {level} inválida."),
        }
    }
}

/// A selected option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection<I> {
    /// Catalog id of the option.
    pub id: I,
    /// Display name, as listed by the catalog.
    pub name: String,
}

/// What a selection change requires next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Level whose options must be (re)loaded.
    pub fetch: Option<Level>,
    /// Whether the result page must be re-queried.
    pub requery: bool,
}

/// Cascade selection state of one visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cascade {
    pub manufacturer: Option<Selection<ManufacturerId>>,
    pub family: Option<Selection<FamilyId>>,
    pub subfamily: Option<Selection<SubfamilyId>>,
}

impl Cascade {
    /// Select a manufacturer. An empty id clears the whole cascade.
    pub fn select_manufacturer(&mut self, id: ManufacturerId, name: &str) -> Transition {
        self.family = None;
        self.subfamily = None;

        if id.is_empty() {
            self.manufacturer = None;
            return Transition {
                fetch: None,
                requery: false,
            };
        }

        self.manufacturer = Some(Selection {
            id,
            name: name.trim().to_string(),
        });
        Transition {
            fetch: Some(Level::Family),
            requery: self.is_queryable(),
        }
    }

    /// Select a family. An empty id clears family and subfamily.
    ///
    /// # Errors
    ///
    /// Returns `CascadeError::ParentEmpty` if no manufacturer is selected;
    /// the state is left unchanged.
    pub fn select_family(&mut self, id: FamilyId, name: &str) -> Result<Transition, CascadeError> {
        if id.is_empty() {
            self.family = None;
            self.subfamily = None;
            return Ok(Transition {
                fetch: None,
                requery: false,
            });
        }
        if self.manufacturer.is_none() {
            return Err(CascadeError::ParentEmpty {
                level: Level::Family,
                parent: Level::Manufacturer,
            });
        }

        self.subfamily = None;
        self.family = Some(Selection {
            id,
            name: name.trim().to_string(),
        });
        Ok(Transition {
            fetch: Some(Level::Subfamily),
            requery: self.is_queryable(),
        })
    }

    /// Select a subfamily. An empty id clears it.
    ///
    /// # Errors
    ///
    /// Returns `CascadeError::ParentEmpty` if no family is selected; the
    /// state is left unchanged.
    pub fn select_subfamily(
        &mut self,
        id: SubfamilyId,
        name: &str,
    ) -> Result<Transition, CascadeError> {
        if id.is_empty() {
            let had_selection = self.subfamily.take().is_some();
            return Ok(Transition {
                fetch: None,
                requery: had_selection && self.is_queryable(),
            });
        }
        if self.family.is_none() {
            return Err(CascadeError::ParentEmpty {
                level: Level::Subfamily,
                parent: Level::Family,
            });
        }

        self.subfamily = Some(Selection {
            id,
            name: name.trim().to_string(),
        });
        Ok(Transition {
            fetch: None,
            requery: self.is_queryable(),
        })
    }

    /// Whether manufacturer and family are both selected.
    #[must_use]
    pub const fn is_queryable(&self) -> bool {
        self.manufacturer.is_some() && self.family.is_some()
    }

    /// Whether anything is selected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.manufacturer.is_none()
    }

    /// Forget every selection (a text search took over).
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Guided search filter, once manufacturer and family are selected.
    #[must_use]
    pub fn to_guided_filter(&self) -> Option<GuidedFilter> {
        let manufacturer = self.manufacturer.as_ref()?;
        let family = self.family.as_ref()?;
        Some(GuidedFilter {
            montadora_nome: manufacturer.name.clone(),
            familia_id: family.id.clone(),
            familia_nome: family.name.clone(),
            subfamilia_id: self.subfamily.as_ref().map(|s| s.id.clone()),
        })
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Option lists to render for the current selection.
#[derive(Debug, Clone, Default)]
pub struct CascadeOptions {
    /// Every manufacturer.
    pub manufacturers: Vec<FilterOption<ManufacturerId>>,
    /// Families, once a manufacturer is selected.
    pub families: Vec<FilterOption<FamilyId>>,
    /// Subfamilies of the selected family.
    pub subfamilies: Vec<FilterOption<SubfamilyId>>,
}

/// Applies selections against the catalog's option lists.
pub struct CascadeController<'a, C> {
    api: &'a C,
}

impl<'a, C: FilterApi> CascadeController<'a, C> {
    #[must_use]
    pub const fn new(api: &'a C) -> Self {
        Self { api }
    }

    /// Option lists for every level that may hold a selection.
    ///
    /// Levels whose parent is empty get no options. A failed fetch leaves
    /// that list empty.
    #[instrument(skip_all)]
    pub async fn options(&self, cascade: &Cascade) -> CascadeOptions {
        let manufacturers = self.api.manufacturers().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load manufacturers");
            Vec::new()
        });

        let families = if cascade.manufacturer.is_some() {
            self.api.families().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to load families");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let subfamilies = match &cascade.family {
            Some(family) => self.api.subfamilies(&family.id).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, family = %family.id, "failed to load subfamilies");
                Vec::new()
            }),
            None => Vec::new(),
        };

        CascadeOptions {
            manufacturers,
            families,
            subfamilies,
        }
    }

    /// Select the option `id` at `level`, resolving its name from the
    /// catalog's list. An empty id clears the level and everything below.
    ///
    /// # Errors
    ///
    /// Returns `CascadeError::ParentEmpty` when the parent level is empty and
    /// `CascadeError::UnknownOption` when `id` is not offered. The cascade is
    /// unchanged on error.
    #[instrument(skip(self, cascade))]
    pub async fn select(
        &self,
        cascade: &mut Cascade,
        level: Level,
        id: &str,
    ) -> Result<Transition, CascadeError> {
        let id = id.trim();
        if id.is_empty() {
            return match level {
                Level::Manufacturer => Ok(cascade.select_manufacturer(ManufacturerId::default(), "")),
                Level::Family => cascade.select_family(FamilyId::default(), ""),
                Level::Subfamily => cascade.select_subfamily(SubfamilyId::default(), ""),
            };
        }

        let parent_empty = match level {
            Level::Manufacturer => false,
            Level::Family => cascade.manufacturer.is_none(),
            Level::Subfamily => cascade.family.is_none(),
        };
        if let (true, Some(parent)) = (parent_empty, level.parent()) {
            return Err(CascadeError::ParentEmpty { level, parent });
        }

        let unknown = || CascadeError::UnknownOption {
            level,
            id: id.to_string(),
        };

        match level {
            Level::Manufacturer => {
                let list = self.api.manufacturers().await.unwrap_or_default();
                let option = find(&list, id).ok_or_else(unknown)?;
                Ok(cascade.select_manufacturer(option.id.clone(), &option.name))
            }
            Level::Family => {
                let list = self.api.families().await.unwrap_or_default();
                let option = find(&list, id).ok_or_else(unknown)?;
                cascade.select_family(option.id.clone(), &option.name)
            }
            Level::Subfamily => {
                let Some(family) = cascade.family.as_ref() else {
                    return Err(CascadeError::ParentEmpty {
                        level,
                        parent: Level::Family,
                    });
                };
                let list = self.api.subfamilies(&family.id).await.unwrap_or_default();
                let option = find(&list, id).ok_or_else(unknown)?;
                cascade.select_subfamily(option.id.clone(), &option.name)
            }
        }
    }
}

fn find<'l, I: AsRef<str>>(list: &'l [FilterOption<I>], id: &str) -> Option<&'l FilterOption<I>> {
    list.iter().find(|o| o.id.as_ref() == id)
}

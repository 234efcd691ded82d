//! Per-identity templates derived from enrollment samples.
//!
//! A template is the element-wise mean of all samples of one identity. It is
//! always recomputed from the full sample set, never updated incrementally.

use crate::types::{Embedding, EnrollmentData};
use crate::vector::{self, VectorError};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("identity {0:?} has no enrollment embeddings")]
    EmptyEnrollment(String),
    #[error("identity {identity:?}: {source}")]
    Vector {
        identity: String,
        #[source]
        source: VectorError,
    },
}

impl TemplateError {
    /// Identity the error refers to.
    pub fn identity(&self) -> &str {
        match self {
            Self::EmptyEnrollment(identity) | Self::Vector { identity, .. } => identity,
        }
    }
}

/// Identity → template mapping, read-only once built.
///
/// Backed by a `BTreeMap`, so iteration is always in identity-name order.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: BTreeMap<String, Embedding>,
    dim: Option<usize>,
    excluded: Vec<TemplateError>,
}

impl TemplateStore {
    /// Derive one template per identity.
    ///
    /// The store dimension is the most common template length (the smaller
    /// one on a tie). Identities that cannot produce a template (no samples,
    /// inconsistent sample lengths, or a length different from the store
    /// dimension) are left out with a warning; the rest are still built.
    pub fn build(data: &EnrollmentData) -> Self {
        Self::build_with_dim(data, None)
    }

    /// Like [`build`](Self::build), but with the dimension fixed by the
    /// caller, usually the embedder's output length. `None` falls back to
    /// the most common template length.
    pub fn build_with_dim(data: &EnrollmentData, expected_dim: Option<usize>) -> Self {
        let candidates: Vec<(&str, usize, Result<Embedding, TemplateError>)> = data
            .iter()
            .map(|(identity, samples)| (identity, samples.len(), compute_template(identity, samples)))
            .collect();

        let dim = expected_dim.or_else(|| {
            most_common_dim(candidates.iter().filter_map(|(_, _, t)| t.as_ref().ok()))
        });

        let mut templates = BTreeMap::new();
        let mut excluded = Vec::new();

        for (identity, samples, candidate) in candidates {
            let checked = candidate.and_then(|template| match dim {
                Some(expected) if template.dim() != expected => Err(TemplateError::Vector {
                    identity: identity.to_string(),
                    source: VectorError::DimensionMismatch {
                        expected,
                        actual: template.dim(),
                    },
                }),
                _ => Ok(template),
            });
            match checked {
                Ok(template) => {
                    tracing::debug!(identity, samples, "template built");
                    templates.insert(identity.to_string(), template);
                }
                Err(err) => {
                    tracing::warn!(identity, error = %err, "identity excluded from template store");
                    excluded.push(err);
                }
            }
        }

        let dim = if templates.is_empty() { None } else { dim };
        Self {
            templates,
            dim,
            excluded,
        }
    }

    /// Read-only view of all templates.
    pub fn templates(&self) -> &BTreeMap<String, Embedding> {
        &self.templates
    }

    pub fn get(&self, identity: &str) -> Option<&Embedding> {
        self.templates.get(identity)
    }

    /// Template length shared by every template, `None` when empty.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Identities left out by [`build`](Self::build), with the reason.
    pub fn excluded(&self) -> &[TemplateError] {
        &self.excluded
    }
}

fn compute_template(identity: &str, samples: &[Embedding]) -> Result<Embedding, TemplateError> {
    if samples.is_empty() {
        return Err(TemplateError::EmptyEnrollment(identity.to_string()));
    }

    vector::mean(samples)
        .map(Embedding::new)
        .map_err(|source: VectorError| TemplateError::Vector {
            identity: identity.to_string(),
            source,
        })
}

fn most_common_dim<'a>(templates: impl Iterator<Item = &'a Embedding>) -> Option<usize> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for template in templates {
        *counts.entry(template.dim()).or_default() += 1;
    }
    // Ascending key order, so a strictly greater count is needed to win a tie
    counts
        .into_iter()
        .fold(None, |best: Option<(usize, usize)>, (dim, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((dim, count)),
        })
        .map(|(dim, _)| dim)
}

/// Template store shared between matchers and a re-enrollment writer.
///
/// Readers take a snapshot; a rebuild produces a complete new store and
/// swaps it in, so no reader ever sees a store mid-rebuild.
#[derive(Debug, Default)]
pub struct SharedTemplates {
    current: RwLock<Arc<TemplateStore>>,
}

impl SharedTemplates {
    pub fn new(store: TemplateStore) -> Self {
        Self {
            current: RwLock::new(Arc::new(store)),
        }
    }

    /// The store as of now. Stays valid after later swaps.
    pub fn snapshot(&self) -> Arc<TemplateStore> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in `store`, returning the previous one.
    pub fn replace(&self, store: TemplateStore) -> Arc<TemplateStore> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(store))
    }
}

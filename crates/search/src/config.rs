use crate::error::{Result, SearchError};
use crate::factor::{FactorCategory, RelevanceFactor};
use serde::{Deserialize, Serialize};

/// Additive weight per factor. `shared_ancestor` and `query_term` are per
/// unit (common directory segment, matched term).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceWeights {
    pub active_file: f64,
    pub definition: f64,
    pub type_definition: f64,
    pub implementation: f64,
    pub referenced_type: f64,
    pub call_hierarchy: f64,
    pub forward_dependency: f64,
    pub reverse_dependency: f64,
    pub same_directory: f64,
    pub neighbor_directory: f64,
    pub shared_ancestor: f64,
    pub query_term: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            active_file: 1000.0,
            definition: 60.0,
            type_definition: 45.0,
            implementation: 45.0,
            referenced_type: 30.0,
            call_hierarchy: 35.0,
            forward_dependency: 40.0,
            reverse_dependency: 30.0,
            same_directory: 20.0,
            neighbor_directory: 10.0,
            shared_ancestor: 2.0,
            query_term: 15.0,
        }
    }
}

impl RelevanceWeights {
    pub fn weight(&self, factor: RelevanceFactor) -> f64 {
        match factor {
            RelevanceFactor::ActiveFile => self.active_file,
            RelevanceFactor::Definition => self.definition,
            RelevanceFactor::TypeDefinition => self.type_definition,
            RelevanceFactor::Implementation => self.implementation,
            RelevanceFactor::ReferencedType => self.referenced_type,
            RelevanceFactor::CallHierarchy => self.call_hierarchy,
            RelevanceFactor::ForwardDependency => self.forward_dependency,
            RelevanceFactor::ReverseDependency => self.reverse_dependency,
            RelevanceFactor::SameDirectory => self.same_directory,
            RelevanceFactor::NeighborDirectory => self.neighbor_directory,
            RelevanceFactor::SharedAncestor => self.shared_ancestor,
            RelevanceFactor::QueryTerm => self.query_term,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorToggles {
    pub active_file: bool,
    pub symbols: bool,
    pub dependencies: bool,
    pub proximity: bool,
    pub query_terms: bool,
}

impl Default for FactorToggles {
    fn default() -> Self {
        Self {
            active_file: true,
            symbols: true,
            dependencies: true,
            proximity: true,
            query_terms: true,
        }
    }
}

impl FactorToggles {
    pub fn is_enabled(&self, category: FactorCategory) -> bool {
        match category {
            FactorCategory::ActiveFile => self.active_file,
            FactorCategory::Symbols => self.symbols,
            FactorCategory::Dependencies => self.dependencies,
            FactorCategory::Proximity => self.proximity,
            FactorCategory::QueryTerms => self.query_terms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    pub weights: RelevanceWeights,
    pub enabled: FactorToggles,
    /// Shortlist length handed to the selector.
    pub max_candidates: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            weights: RelevanceWeights::default(),
            enabled: FactorToggles::default(),
            max_candidates: 40,
        }
    }
}

impl RelevanceConfig {
    pub fn validate(&self) -> Result<()> {
        for factor in RelevanceFactor::ALL {
            let value = self.weights.weight(factor);
            if !value.is_finite() {
                return Err(SearchError::InvalidWeight {
                    factor: factor.as_str(),
                    value,
                });
            }
        }
        if self.max_candidates == 0 {
            return Err(SearchError::EmptyShortlist);
        }
        Ok(())
    }

    /// Weight applied for `factor`, or `None` when its category is disabled.
    pub fn effective_weight(&self, factor: RelevanceFactor) -> Option<f64> {
        self.enabled
            .is_enabled(factor.category())
            .then(|| self.weights.weight(factor))
    }
}

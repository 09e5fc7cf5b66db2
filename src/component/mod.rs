//! Layer-1 platform components and their bring-up order
//!
//! Components are declared with their direct dependencies. The registry
//! validates the declarations once and fixes a total order in which every
//! component comes after everything it depends on; ties keep declaration
//! order. That order is the only order components are ever activated in.

pub mod orchestrator;

pub use orchestrator::{ComponentOrchestrator, ResolvedResource};

use std::collections::BTreeSet;
use std::str::FromStr;

use crate::{Error, Result};

/// A layer-1 platform component
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    /// Cluster DNS service
    KubeDns,
    /// Cluster-wide system services
    KelSystem,
    /// HTTP/TLS router
    Router,
    /// API cache
    ApiCache,
    /// API database
    ApiDatabase,
    /// API web tier
    ApiWeb,
}

impl Component {
    /// Every component, in declaration order
    pub const ALL: [Component; 6] = [
        Component::KubeDns,
        Component::KelSystem,
        Component::Router,
        Component::ApiCache,
        Component::ApiDatabase,
        Component::ApiWeb,
    ];

    /// Name used on the command line and by the cluster collaborator
    pub fn name(&self) -> &'static str {
        match self {
            Self::KubeDns => "kube-dns",
            Self::KelSystem => "kel-system",
            Self::Router => "router",
            Self::ApiCache => "api-cache",
            Self::ApiDatabase => "api-database",
            Self::ApiWeb => "api-web",
        }
    }
}

impl FromStr for Component {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| Error::unknown_component(s))
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A component and the components it must come after
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// The component
    pub component: Component,
    /// Direct dependencies
    pub depends_on: Vec<Component>,
}

impl ComponentDescriptor {
    /// Declare a component with its direct dependencies
    pub fn new(component: Component, depends_on: impl IntoIterator<Item = Component>) -> Self {
        Self {
            component,
            depends_on: depends_on.into_iter().collect(),
        }
    }
}

/// Validated, dependency-ordered set of components
#[derive(Clone, Debug)]
pub struct ComponentRegistry {
    ordered: Vec<ComponentDescriptor>,
}

impl ComponentRegistry {
    /// Validate declarations and fix the activation order
    ///
    /// Fails with [`Error::InvalidRegistry`] on duplicate declarations,
    /// dependencies on undeclared components, and dependency cycles.
    pub fn new(declarations: Vec<ComponentDescriptor>) -> Result<Self> {
        let mut declared = BTreeSet::new();
        for decl in &declarations {
            if !declared.insert(decl.component) {
                return Err(Error::InvalidRegistry(format!(
                    "{} is declared more than once",
                    decl.component
                )));
            }
        }
        for decl in &declarations {
            if let Some(dep) = decl.depends_on.iter().find(|d| !declared.contains(*d)) {
                return Err(Error::InvalidRegistry(format!(
                    "{} depends on undeclared component {}",
                    decl.component, dep
                )));
            }
        }

        // Stable Kahn: always take the earliest declaration whose
        // dependencies are all placed.
        let mut placed = BTreeSet::new();
        let mut pending = declarations;
        let mut ordered = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|d| d.depends_on.iter().all(|dep| placed.contains(dep)));
            match ready {
                Some(idx) => {
                    let decl = pending.remove(idx);
                    placed.insert(decl.component);
                    ordered.push(decl);
                }
                None => {
                    let stuck: Vec<&str> = pending.iter().map(|d| d.component.name()).collect();
                    return Err(Error::InvalidRegistry(format!(
                        "dependency cycle among {}",
                        stuck.join(", ")
                    )));
                }
            }
        }

        Ok(Self { ordered })
    }

    /// The platform's standard components
    ///
    /// Orders as kube-dns, kel-system, router, api-cache, api-database,
    /// api-web.
    pub fn standard() -> Self {
        use Component::*;
        let declarations = vec![
            ComponentDescriptor::new(KubeDns, []),
            ComponentDescriptor::new(KelSystem, [KubeDns]),
            ComponentDescriptor::new(Router, [KelSystem]),
            ComponentDescriptor::new(ApiCache, [KelSystem]),
            ComponentDescriptor::new(ApiDatabase, [KelSystem]),
            ComponentDescriptor::new(ApiWeb, [Router, ApiCache, ApiDatabase]),
        ];
        // Acyclic and closed, so validation always succeeds
        Self::new(declarations.clone()).unwrap_or(Self {
            ordered: declarations,
        })
    }

    /// Descriptors in activation order
    pub fn list_components(&self) -> &[ComponentDescriptor] {
        &self.ordered
    }

    /// Components in activation order
    pub fn components(&self) -> impl Iterator<Item = Component> + '_ {
        self.ordered.iter().map(|d| d.component)
    }

    /// Whether a component is registered
    pub fn contains(&self, component: Component) -> bool {
        self.ordered.iter().any(|d| d.component == component)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

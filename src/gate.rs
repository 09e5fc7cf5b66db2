//! Stage preconditions
//!
//! Every check here runs before the document is touched. A command either
//! passes all of its guards and then mutates and persists, or fails with
//! nothing written.

use crate::config::{GceProvider, Provider};
use crate::{Error, Result};

/// Hint shown when layer 0 is configured twice
const LAYER0_AGAIN_HINT: &str = "Delete the cluster document to re-configure.";

/// Hint shown when layer 1 is configured before layer 0
const LAYER1_EARLY_HINT: &str = "No cluster document found. Did you configure layer 0?";

/// Hint shown when layer 1 is configured twice
const LAYER1_AGAIN_HINT: &str = "Remove layer-1 configuration to re-configure.";

/// A parameter that must be present before a stage can run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequiredField {
    /// Parameter name as spelled on the command line
    pub name: &'static str,
    /// Whether the caller supplied it
    pub present: bool,
}

impl RequiredField {
    /// A field backed by an optional value
    pub fn of<T>(name: &'static str, value: &Option<T>) -> Self {
        Self {
            name,
            present: value.is_some(),
        }
    }
}

/// Layer-0 parameters subject to presence checks
#[derive(Clone, Copy, Debug, Default)]
pub struct Layer0Inputs<'a> {
    /// `--name`
    pub name: Option<&'a str>,
    /// `--provider`
    pub provider: Option<&'a str>,
    /// `--gce-project-id`
    pub gce_project_id: Option<&'a str>,
    /// `--gce-region`
    pub gce_region: Option<&'a str>,
    /// `--gce-zone`
    pub gce_zone: Option<&'a str>,
}

/// Layer-0 parameters that passed their presence checks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer0Checked<'a> {
    /// Cluster name
    pub name: &'a str,
    /// Provider placement built from the provider fields
    pub provider: Provider,
}

impl<'a> Layer0Inputs<'a> {
    /// Check presence in precedence order and hand back the checked values
    pub fn require(&self) -> Result<Layer0Checked<'a>> {
        require_fields(&layer0_required_fields(self))?;
        match (
            self.name,
            self.provider,
            self.gce_project_id,
            self.gce_region,
            self.gce_zone,
        ) {
            (Some(name), Some("gce"), Some(project_id), Some(region), Some(zone)) => {
                Ok(Layer0Checked {
                    name,
                    provider: Provider::Gce(GceProvider {
                        project_id: project_id.to_string(),
                        region: region.to_string(),
                        zone: zone.to_string(),
                    }),
                })
            }
            (_, provider, ..) => Err(Error::validation(format!(
                "unsupported provider {}",
                provider.unwrap_or_default()
            ))),
        }
    }
}

/// Required layer-0 fields in precedence order
///
/// `name`, then `provider`, then whatever the chosen provider needs.
pub fn layer0_required_fields(inputs: &Layer0Inputs<'_>) -> Vec<RequiredField> {
    let mut fields = vec![
        RequiredField::of("name", &inputs.name),
        RequiredField::of("provider", &inputs.provider),
    ];
    if inputs.provider == Some("gce") {
        fields.extend([
            RequiredField::of("gce-project-id", &inputs.gce_project_id),
            RequiredField::of("gce-region", &inputs.gce_region),
            RequiredField::of("gce-zone", &inputs.gce_zone),
        ]);
    }
    fields
}

/// Layer 0 may only be configured on a fresh document
pub fn guard_layer0(document_exists: bool) -> Result<()> {
    if document_exists {
        return Err(Error::already_configured(LAYER0_AGAIN_HINT));
    }
    Ok(())
}

/// Layer 1 needs an existing document without a layer-1 section
pub fn guard_layer1(document_exists: bool, layer1_present: bool) -> Result<()> {
    if !document_exists {
        return Err(Error::not_configured(LAYER1_EARLY_HINT));
    }
    if layer1_present {
        return Err(Error::already_configured(LAYER1_AGAIN_HINT));
    }
    Ok(())
}

/// Fail with the first absent field, in declaration order
pub fn require_fields(fields: &[RequiredField]) -> Result<()> {
    match fields.iter().find(|f| !f.present) {
        Some(missing) => Err(Error::missing_parameter(missing.name)),
        None => Ok(()),
    }
}

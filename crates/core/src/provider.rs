use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationReason};

/// The canonical set of cloud providers a resource can belong to.
///
/// Serialized as the lowercase tag (`"aws"`, `"azure"`, ...). Provider tags
/// produced by scanners and stored rows always come from this set; free-form
/// strings are rejected at the edge via [`std::str::FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    /// Amazon Web Services.
    Aws,
    /// Microsoft Azure.
    Azure,
    /// Google Cloud Platform.
    Gcp,
    /// Oracle Cloud Infrastructure.
    Oci,
    /// A custom, non-cloud resource source.
    Custom,
}

impl CloudProvider {
    /// All canonical providers, in declaration order.
    pub const ALL: [Self; 5] = [Self::Aws, Self::Azure, Self::Gcp, Self::Oci, Self::Custom];

    /// The lowercase canonical tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
            Self::Oci => "oci",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CloudProvider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "azure" => Ok(Self::Azure),
            "gcp" => Ok(Self::Gcp),
            "oci" => Ok(Self::Oci),
            "custom" => Ok(Self::Custom),
            _ => Err(ValidationError::new(
                "provider",
                ValidationReason::UnknownProvider,
            )),
        }
    }
}

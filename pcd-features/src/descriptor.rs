use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Neighbourhood shape descriptors derived from the eigenvalues
/// `l1 >= l2 >= l3` of the local covariance matrix, normalised by their sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Descriptor {
    #[serde(rename = "eigenvalue_sum")]
    EigenvalueSum,
    #[serde(rename = "omnivariance")]
    Omnivariance,
    #[serde(rename = "eigenentropy")]
    Eigenentropy,
    #[serde(rename = "anisotropy")]
    Anisotropy,
    #[serde(rename = "planarity")]
    Planarity,
    #[serde(rename = "linearity")]
    Linearity,
    #[serde(rename = "PCA1")]
    Pca1,
    #[serde(rename = "PCA2")]
    Pca2,
    #[serde(rename = "surface_variation")]
    SurfaceVariation,
    #[serde(rename = "sphericity")]
    Sphericity,
    #[serde(rename = "verticality")]
    Verticality,
    #[serde(rename = "nx")]
    NormalX,
    #[serde(rename = "ny")]
    NormalY,
    #[serde(rename = "nz")]
    NormalZ,
}

impl Descriptor {
    pub const ALL: [Descriptor; 14] = [
        Descriptor::EigenvalueSum,
        Descriptor::Omnivariance,
        Descriptor::Eigenentropy,
        Descriptor::Anisotropy,
        Descriptor::Planarity,
        Descriptor::Linearity,
        Descriptor::Pca1,
        Descriptor::Pca2,
        Descriptor::SurfaceVariation,
        Descriptor::Sphericity,
        Descriptor::Verticality,
        Descriptor::NormalX,
        Descriptor::NormalY,
        Descriptor::NormalZ,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Descriptor::EigenvalueSum => "eigenvalue_sum",
            Descriptor::Omnivariance => "omnivariance",
            Descriptor::Eigenentropy => "eigenentropy",
            Descriptor::Anisotropy => "anisotropy",
            Descriptor::Planarity => "planarity",
            Descriptor::Linearity => "linearity",
            Descriptor::Pca1 => "PCA1",
            Descriptor::Pca2 => "PCA2",
            Descriptor::SurfaceVariation => "surface_variation",
            Descriptor::Sphericity => "sphericity",
            Descriptor::Verticality => "verticality",
            Descriptor::NormalX => "nx",
            Descriptor::NormalY => "ny",
            Descriptor::NormalZ => "nz",
        }
    }

    /// Evaluates the descriptor. `eigenvalues` are sorted descending and
    /// normalised to sum to one, `sum` is their sum before normalisation and
    /// `normal` the eigenvector of the smallest eigenvalue.
    pub fn evaluate(&self, eigenvalues: [f64; 3], sum: f64, normal: [f64; 3]) -> f64 {
        let [l1, l2, l3] = eigenvalues;
        match self {
            Descriptor::EigenvalueSum => sum,
            Descriptor::Omnivariance => (l1 * l2 * l3).cbrt(),
            Descriptor::Eigenentropy => -[l1, l2, l3]
                .iter()
                .filter(|l| **l > 0.0)
                .map(|l| l * l.ln())
                .sum::<f64>(),
            Descriptor::Anisotropy => (l1 - l3) / l1,
            Descriptor::Planarity => (l2 - l3) / l1,
            Descriptor::Linearity => (l1 - l2) / l1,
            Descriptor::Pca1 => l1,
            Descriptor::Pca2 => l2,
            Descriptor::SurfaceVariation => l3,
            Descriptor::Sphericity => l3 / l1,
            Descriptor::Verticality => 1.0 - normal[2].abs(),
            Descriptor::NormalX => normal[0],
            Descriptor::NormalY => normal[1],
            Descriptor::NormalZ => normal[2],
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Descriptor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Descriptor::ALL
            .iter()
            .find(|d| d.name() == s)
            .copied()
            .ok_or_else(|| format!("unknown descriptor '{}'", s))
    }
}

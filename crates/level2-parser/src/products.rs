//! Level II products and the moment blocks that carry them.
//!
//! The product to block-name mapping is a static table so a new product is
//! one more row rather than another match arm.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Radar products decodable from Message 31 moment blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadarProduct {
    #[serde(alias = "REF", alias = "reflectivity")]
    BaseReflectivity,
    #[serde(alias = "VEL", alias = "velocity")]
    BaseVelocity,
    #[serde(alias = "SW")]
    SpectrumWidth,
    #[serde(alias = "RHO", alias = "CC")]
    CorrelationCoefficient,
    #[serde(alias = "ZDR")]
    DifferentialReflectivity,
    #[serde(alias = "KDP", alias = "PHI")]
    SpecificDifferentialPhase,
}

struct ProductEntry {
    product: RadarProduct,
    code: &'static str,
    /// Exact 3-byte block names accepted for this product
    block_names: &'static [&'static str],
    units: &'static str,
}

const PRODUCT_TABLE: &[ProductEntry] = &[
    ProductEntry {
        product: RadarProduct::BaseReflectivity,
        code: "REF",
        block_names: &["REF"],
        units: "dBZ",
    },
    ProductEntry {
        product: RadarProduct::BaseVelocity,
        code: "VEL",
        block_names: &["VEL"],
        units: "m/s",
    },
    ProductEntry {
        product: RadarProduct::SpectrumWidth,
        code: "SW",
        block_names: &["SW "],
        units: "m/s",
    },
    ProductEntry {
        product: RadarProduct::CorrelationCoefficient,
        code: "RHO",
        block_names: &["RHO"],
        units: "",
    },
    ProductEntry {
        product: RadarProduct::DifferentialReflectivity,
        code: "ZDR",
        block_names: &["ZDR"],
        units: "dB",
    },
    ProductEntry {
        product: RadarProduct::SpecificDifferentialPhase,
        code: "KDP",
        block_names: &["PHI", "KDP"],
        units: "deg/km",
    },
];

impl RadarProduct {
    pub const ALL: [RadarProduct; 6] = [
        RadarProduct::BaseReflectivity,
        RadarProduct::BaseVelocity,
        RadarProduct::SpectrumWidth,
        RadarProduct::CorrelationCoefficient,
        RadarProduct::DifferentialReflectivity,
        RadarProduct::SpecificDifferentialPhase,
    ];

    fn entry(&self) -> &'static ProductEntry {
        // Every variant has exactly one row; covered by test_table_is_complete
        PRODUCT_TABLE
            .iter()
            .find(|e| e.product == *self)
            .unwrap_or(&PRODUCT_TABLE[0])
    }

    /// Moment block names carrying this product.
    pub fn block_names(&self) -> &'static [&'static str] {
        self.entry().block_names
    }

    /// Whether a 3-byte moment block name carries this product.
    pub fn matches_block(&self, name: &str) -> bool {
        self.block_names().iter().any(|n| *n == name)
    }

    /// Short product code (e.g. "REF").
    pub fn code(&self) -> &'static str {
        self.entry().code
    }

    pub fn units(&self) -> &'static str {
        self.entry().units
    }

    /// Reflectivity products blend by maximum in composites.
    pub fn is_reflectivity(&self) -> bool {
        matches!(self, RadarProduct::BaseReflectivity)
    }
}

impl fmt::Display for RadarProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for RadarProduct {
    type Err = String;

    /// Accepts product codes, block names and descriptive names, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace(['_', '-', ' '], "");
        let by_name = match wanted.as_str() {
            "BASEREFLECTIVITY" | "REFLECTIVITY" => Some(RadarProduct::BaseReflectivity),
            "BASEVELOCITY" | "VELOCITY" => Some(RadarProduct::BaseVelocity),
            "SPECTRUMWIDTH" => Some(RadarProduct::SpectrumWidth),
            "CORRELATIONCOEFFICIENT" | "CC" => Some(RadarProduct::CorrelationCoefficient),
            "DIFFERENTIALREFLECTIVITY" => Some(RadarProduct::DifferentialReflectivity),
            "SPECIFICDIFFERENTIALPHASE" => Some(RadarProduct::SpecificDifferentialPhase),
            _ => None,
        };
        if let Some(product) = by_name {
            return Ok(product);
        }

        PRODUCT_TABLE
            .iter()
            .find(|e| e.code == wanted || e.block_names.iter().any(|n| n.trim_end() == wanted))
            .map(|e| e.product)
            .ok_or_else(|| format!("unknown radar product '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_complete() {
        for product in RadarProduct::ALL {
            let rows = PRODUCT_TABLE.iter().filter(|e| e.product == product).count();
            assert_eq!(rows, 1, "{:?}", product);
        }
    }

    #[test]
    fn test_block_names() {
        assert_eq!(RadarProduct::BaseReflectivity.block_names(), &["REF"]);
        assert_eq!(RadarProduct::BaseVelocity.block_names(), &["VEL"]);
        assert_eq!(RadarProduct::SpectrumWidth.block_names(), &["SW "]);
        assert_eq!(RadarProduct::CorrelationCoefficient.block_names(), &["RHO"]);
        assert_eq!(RadarProduct::DifferentialReflectivity.block_names(), &["ZDR"]);
        assert_eq!(
            RadarProduct::SpecificDifferentialPhase.block_names(),
            &["PHI", "KDP"]
        );
    }

    #[test]
    fn test_matches_block_is_exact() {
        assert!(RadarProduct::SpectrumWidth.matches_block("SW "));
        assert!(!RadarProduct::SpectrumWidth.matches_block("SW"));
        assert!(RadarProduct::SpecificDifferentialPhase.matches_block("PHI"));
        assert!(RadarProduct::SpecificDifferentialPhase.matches_block("KDP"));
        assert!(!RadarProduct::BaseReflectivity.matches_block("VEL"));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("ref".parse::<RadarProduct>(), Ok(RadarProduct::BaseReflectivity));
        assert_eq!("BaseVelocity".parse::<RadarProduct>(), Ok(RadarProduct::BaseVelocity));
        assert_eq!("sw".parse::<RadarProduct>(), Ok(RadarProduct::SpectrumWidth));
        assert_eq!("rho".parse::<RadarProduct>(), Ok(RadarProduct::CorrelationCoefficient));
        assert_eq!("zdr".parse::<RadarProduct>(), Ok(RadarProduct::DifferentialReflectivity));
        assert_eq!("phi".parse::<RadarProduct>(), Ok(RadarProduct::SpecificDifferentialPhase));
        assert_eq!(
            "specific_differential_phase".parse::<RadarProduct>(),
            Ok(RadarProduct::SpecificDifferentialPhase)
        );
        assert!("hail".parse::<RadarProduct>().is_err());
    }
}

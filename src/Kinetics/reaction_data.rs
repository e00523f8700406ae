//! Tagged reaction records: the closed set of reaction kinds with their
//! kind-specific rate parameters, reactant/product multisets and third-body
//! efficiency maps. These records are shared-immutable once installed in the
//! engine; modification goes through the engine's dedicated path.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ChemEngineError;
use crate::Kinetics::falloff::FalloffBlend;
use crate::Kinetics::rate_const::{Arrhenius, ChebyshevData, PlogPoint};

/// The closed set of reaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReactionType {
    #[serde(rename = "elementary", alias = "elem")]
    Elementary,
    #[serde(rename = "three-body", alias = "threebody")]
    ThreeBody,
    #[serde(rename = "falloff")]
    Falloff,
    #[serde(rename = "chemically-activated", alias = "chemact")]
    ChemicallyActivated,
    #[serde(rename = "plog", alias = "pressure")]
    Plog,
    #[serde(rename = "chebyshev")]
    Chebyshev,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementaryData {
    pub rate: Arrhenius,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreeBodyData {
    pub rate: Arrhenius,
    /// Per-species collision efficiencies; species not listed use the default.
    pub efficiencies: HashMap<String, f64>,
    pub default_efficiency: f64,
}

/// Shared payload of falloff and chemically-activated reactions: both carry
/// a low- and a high-pressure Arrhenius pair plus the blending function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FalloffData {
    pub low_rate: Arrhenius,
    pub high_rate: Arrhenius,
    pub efficiencies: HashMap<String, f64>,
    pub default_efficiency: f64,
    pub blend: FalloffBlend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlogData {
    /// (pressure, Arrhenius) points; duplicate pressures sum their rates.
    pub rates: Vec<PlogPoint>,
}

/// Kind-specific kinetic data. Serialized untagged, most specific shape
/// first; the `reaction_type` field of the record is the authoritative tag
/// and is validated against the payload at install time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReactionKinetics {
    Chebyshev(ChebyshevData),
    Plog(PlogData),
    Falloff(FalloffData),
    ThreeBody(ThreeBodyData),
    Elementary(ElementaryData),
}

/// One reaction as supplied by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionData {
    #[serde(rename = "type")]
    pub reaction_type: ReactionType,
    pub equation: String,
    /// species name -> stoichiometric coefficient
    pub reactants: HashMap<String, f64>,
    pub products: HashMap<String, f64>,
    pub reversible: bool,
    #[serde(flatten)]
    pub data: ReactionKinetics,
}

impl ReactionData {
    /// Check that the tag matches the kinetic payload. Falloff and
    /// chemically-activated reactions share the falloff payload.
    pub fn validate(&self) -> Result<(), ChemEngineError> {
        let ok = matches!(
            (&self.reaction_type, &self.data),
            (ReactionType::Elementary, ReactionKinetics::Elementary(_))
                | (ReactionType::ThreeBody, ReactionKinetics::ThreeBody(_))
                | (ReactionType::Falloff, ReactionKinetics::Falloff(_))
                | (ReactionType::ChemicallyActivated, ReactionKinetics::Falloff(_))
                | (ReactionType::Plog, ReactionKinetics::Plog(_))
                | (ReactionType::Chebyshev, ReactionKinetics::Chebyshev(_))
        );
        if ok {
            Ok(())
        } else {
            Err(ChemEngineError::InvalidKind {
                equation: self.equation.clone(),
                details: format!(
                    "tag {:?} does not match the kinetic payload",
                    self.reaction_type
                ),
            })
        }
    }

    /// Net change in moles, products minus reactants.
    pub fn delta_n(&self) -> f64 {
        let np: f64 = self.products.values().sum();
        let nr: f64 = self.reactants.values().sum();
        np - nr
    }

    //////////////////// CONSTRUCTORS ////////////////////

    pub fn elementary(
        equation: &str,
        reactants: HashMap<String, f64>,
        products: HashMap<String, f64>,
        reversible: bool,
        rate: Arrhenius,
    ) -> Self {
        Self {
            reaction_type: ReactionType::Elementary,
            equation: equation.to_string(),
            reactants,
            products,
            reversible,
            data: ReactionKinetics::Elementary(ElementaryData { rate }),
        }
    }

    pub fn three_body(
        equation: &str,
        reactants: HashMap<String, f64>,
        products: HashMap<String, f64>,
        reversible: bool,
        rate: Arrhenius,
        efficiencies: HashMap<String, f64>,
        default_efficiency: f64,
    ) -> Self {
        Self {
            reaction_type: ReactionType::ThreeBody,
            equation: equation.to_string(),
            reactants,
            products,
            reversible,
            data: ReactionKinetics::ThreeBody(ThreeBodyData {
                rate,
                efficiencies,
                default_efficiency,
            }),
        }
    }

    pub fn falloff(
        equation: &str,
        reactants: HashMap<String, f64>,
        products: HashMap<String, f64>,
        reversible: bool,
        data: FalloffData,
    ) -> Self {
        Self {
            reaction_type: ReactionType::Falloff,
            equation: equation.to_string(),
            reactants,
            products,
            reversible,
            data: ReactionKinetics::Falloff(data),
        }
    }

    pub fn chemically_activated(
        equation: &str,
        reactants: HashMap<String, f64>,
        products: HashMap<String, f64>,
        reversible: bool,
        data: FalloffData,
    ) -> Self {
        Self {
            reaction_type: ReactionType::ChemicallyActivated,
            equation: equation.to_string(),
            reactants,
            products,
            reversible,
            data: ReactionKinetics::Falloff(data),
        }
    }

    pub fn plog(
        equation: &str,
        reactants: HashMap<String, f64>,
        products: HashMap<String, f64>,
        reversible: bool,
        rates: Vec<PlogPoint>,
    ) -> Self {
        Self {
            reaction_type: ReactionType::Plog,
            equation: equation.to_string(),
            reactants,
            products,
            reversible,
            data: ReactionKinetics::Plog(PlogData { rates }),
        }
    }

    pub fn chebyshev(
        equation: &str,
        reactants: HashMap<String, f64>,
        products: HashMap<String, f64>,
        reversible: bool,
        data: ChebyshevData,
    ) -> Self {
        Self {
            reaction_type: ReactionType::Chebyshev,
            equation: equation.to_string(),
            reactants,
            products,
            reversible,
            data: ReactionKinetics::Chebyshev(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries
            .iter()
            .map(|&(name, nu)| (name.to_string(), nu))
            .collect()
    }

    #[test]
    fn validate_accepts_matching_tag() {
        let r = ReactionData::elementary(
            "H2 + OH => H2O + H",
            side(&[("H2", 1.0), ("OH", 1.0)]),
            side(&[("H2O", 1.0), ("H", 1.0)]),
            false,
            Arrhenius::new(2.16e8, 1.51, 1.435e7),
        );
        assert!(r.validate().is_ok());
        assert_eq!(r.delta_n(), 0.0);
    }

    #[test]
    fn validate_rejects_mismatched_tag() {
        let mut r = ReactionData::elementary(
            "A => B",
            side(&[("A", 1.0)]),
            side(&[("B", 1.0)]),
            false,
            Arrhenius::new(1.0, 0.0, 0.0),
        );
        r.reaction_type = ReactionType::Plog;
        assert!(matches!(
            r.validate(),
            Err(ChemEngineError::InvalidKind { .. })
        ));
    }

    #[test]
    fn record_round_trips_through_json() {
        let r = ReactionData::three_body(
            "H + H + M => H2 + M",
            side(&[("H", 2.0)]),
            side(&[("H2", 1.0)]),
            false,
            Arrhenius::new(1.0e10, -1.0, 0.0),
            side(&[("H2", 2.5), ("H2O", 12.0)]),
            1.0,
        );
        let text = serde_json::to_string(&r).unwrap();
        let back: ReactionData = serde_json::from_str(&text).unwrap();
        assert!(back.validate().is_ok());
        assert_eq!(back.reaction_type, ReactionType::ThreeBody);
        match back.data {
            ReactionKinetics::ThreeBody(tb) => {
                assert_eq!(tb.efficiencies.len(), 2);
                assert_eq!(tb.default_efficiency, 1.0);
            }
            _ => panic!("payload kind changed in round trip"),
        }
    }
}

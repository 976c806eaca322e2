use crate::types::PointDirection;
use rust_decimal::Decimal;
use serde::de::{Deserializer, Error as DeError};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Formula {
    Fixed,
    PlacePercent,
    StartersPlus,
    EntrantsPlus,
    Average,
    AverageNonDiscardable,
    Tie,
    Manual,
}

impl Formula {
    pub fn token(self) -> &'static str {
        match self {
            Self::Fixed => "FIX",
            Self::PlacePercent => "PLC%",
            Self::StartersPlus => "CTS+",
            Self::EntrantsPlus => "SER+",
            Self::Average => "AVE",
            Self::AverageNonDiscardable => "AVE ND",
            Self::Tie => "TIE",
            Self::Manual => "MAN",
        }
    }
}

impl Serialize for Formula {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.token())
    }
}

impl<'de> Deserialize<'de> for Formula {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_formula_str(&raw).map_err(D::Error::custom)
    }
}

fn parse_formula_str(raw: &str) -> Result<Formula, String> {
    let token = raw.trim().to_ascii_uppercase();
    match token.as_str() {
        "FIX" => Ok(Formula::Fixed),
        "PLC%" => Ok(Formula::PlacePercent),
        "CTS+" => Ok(Formula::StartersPlus),
        "SER+" => Ok(Formula::EntrantsPlus),
        "AVE" => Ok(Formula::Average),
        "AVE ND" | "AVE_ND" => Ok(Formula::AverageNonDiscardable),
        "TIE" => Ok(Formula::Tie),
        "MAN" => Ok(Formula::Manual),
        _ => Err(format!("unsupported formula '{}'", raw)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCode {
    pub name: String,
    pub formula: Formula,
    #[serde(default)]
    pub value: Option<Decimal>,
    #[serde(default = "default_true")]
    pub discardable: bool,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub came_to_start: bool,
    #[serde(default)]
    pub preserve_result: bool,
    #[serde(default)]
    pub adjust_other_scores: bool,
}

fn default_true() -> bool {
    true
}

impl ScoreCode {
    pub fn new(name: impl AsRef<str>, formula: Formula) -> Self {
        Self {
            name: name.as_ref().trim().to_ascii_uppercase(),
            formula,
            value: None,
            discardable: true,
            started: false,
            finished: false,
            came_to_start: false,
            preserve_result: false,
            adjust_other_scores: false,
        }
    }

    pub fn with_value(mut self, value: Decimal) -> Self {
        self.value = Some(value);
        self
    }

    pub fn non_discardable(mut self) -> Self {
        self.discardable = false;
        self
    }

    pub fn coming_to_start(mut self) -> Self {
        self.came_to_start = true;
        self
    }

    pub fn starting(mut self) -> Self {
        self.started = true;
        self.came_to_start = true;
        self
    }

    pub fn finishing(mut self) -> Self {
        self.started = true;
        self.came_to_start = true;
        self.finished = true;
        self
    }

    pub fn preserving_result(mut self) -> Self {
        self.preserve_result = true;
        self
    }

    pub fn adjusting_others(mut self) -> Self {
        self.adjust_other_scores = true;
        self
    }

    pub fn key(&self) -> String {
        self.name.trim().to_ascii_uppercase()
    }

    pub fn counts_as_discardable(&self) -> bool {
        self.discardable && self.formula != Formula::AverageNonDiscardable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSystem {
    pub name: String,
    pub discard_pattern: Vec<u32>,
    #[serde(default)]
    pub participation_percent: Option<Decimal>,
    pub direction: PointDirection,
    #[serde(default)]
    pub cascade_adjustments: bool,
    #[serde(default)]
    pub default_code: Option<String>,
    #[serde(default)]
    pub codes: Vec<ScoreCode>,
    #[serde(default)]
    pub parent: Option<Box<ScoringSystem>>,
}

impl ScoringSystem {
    pub fn new(name: impl AsRef<str>, direction: PointDirection) -> Self {
        Self {
            name: name.as_ref().trim().to_string(),
            discard_pattern: vec![0],
            participation_percent: None,
            direction,
            cascade_adjustments: false,
            default_code: None,
            codes: Vec::new(),
            parent: None,
        }
    }

    pub fn with_discard_pattern(mut self, pattern: Vec<u32>) -> Self {
        self.discard_pattern = pattern;
        self
    }

    pub fn with_participation_percent(mut self, percent: Decimal) -> Self {
        self.participation_percent = Some(percent);
        self
    }

    pub fn with_cascade(mut self, cascade: bool) -> Self {
        self.cascade_adjustments = cascade;
        self
    }

    pub fn with_default_code(mut self, code: impl AsRef<str>) -> Self {
        self.default_code = Some(code.as_ref().trim().to_ascii_uppercase());
        self
    }

    pub fn with_codes(mut self, codes: Vec<ScoreCode>) -> Self {
        self.codes = codes;
        self
    }

    pub fn with_parent(mut self, parent: ScoringSystem) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(input)
    }

    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, String> {
        let path_ref = path.as_ref();
        let raw = fs::read_to_string(path_ref)
            .map_err(|e| format!("failed to read {}: {}", path_ref.display(), e))?;
        let ext = path_ref
            .extension()
            .and_then(|v| v.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => {
                Self::from_yaml_str(&raw).map_err(|e| format!("yaml parse failed: {}", e))
            }
            "json" => Self::from_json_str(&raw).map_err(|e| format!("json parse failed: {}", e)),
            _ => Err(format!(
                "unsupported system extension '{}'; expected .yaml/.yml/.json",
                ext
            )),
        }
    }

    pub fn effective_codes(&self) -> EffectiveCodeSet {
        let mut merged: HashMap<String, ScoreCode> = HashMap::new();
        let mut default_code = None;
        self.merge_into(&mut merged, &mut default_code);
        EffectiveCodeSet {
            codes: merged,
            default_code,
        }
    }

    fn merge_into(&self, merged: &mut HashMap<String, ScoreCode>, default_code: &mut Option<String>) {
        if let Some(parent) = self.parent.as_ref() {
            parent.merge_into(merged, default_code);
        }
        for code in &self.codes {
            merged.insert(code.key(), code.clone());
        }
        if let Some(name) = self.default_code.as_ref() {
            *default_code = Some(name.trim().to_ascii_uppercase());
        }
    }

    pub fn discards_for(&self, races_sailed: usize) -> u32 {
        if races_sailed == 0 || self.discard_pattern.is_empty() {
            return 0;
        }
        let index = races_sailed.min(self.discard_pattern.len()) - 1;
        self.discard_pattern[index]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveCodeSet {
    codes: HashMap<String, ScoreCode>,
    default_code: Option<String>,
}

impl EffectiveCodeSet {
    pub fn lookup(&self, name: &str) -> Option<&ScoreCode> {
        self.codes.get(&name.trim().to_ascii_uppercase())
    }

    pub fn default_code(&self) -> Option<&ScoreCode> {
        self.default_code
            .as_deref()
            .and_then(|name| self.codes.get(name))
    }

    pub fn default_code_name(&self) -> Option<&str> {
        self.default_code.as_deref()
    }

    pub fn codes(&self) -> impl Iterator<Item = &ScoreCode> {
        self.codes.values()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }
}

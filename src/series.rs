use crate::types::{CompetitorId, RaceId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: CompetitorId,
    pub name: String,
}

impl Competitor {
    pub fn new(id: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self {
            id: CompetitorId::new(id),
            name: name.as_ref().trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub competitor: CompetitorId,
    #[serde(default)]
    pub place: Option<u32>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub code_points: Option<Decimal>,
}

impl Score {
    pub fn place(competitor: impl AsRef<str>, place: u32) -> Self {
        Self {
            competitor: CompetitorId::new(competitor),
            place: Some(place),
            code: None,
            code_points: None,
        }
    }

    pub fn coded(competitor: impl AsRef<str>, code: impl AsRef<str>) -> Self {
        Self {
            competitor: CompetitorId::new(competitor),
            place: None,
            code: Some(code.as_ref().trim().to_ascii_uppercase()),
            code_points: None,
        }
    }

    pub fn coded_at(competitor: impl AsRef<str>, code: impl AsRef<str>, place: u32) -> Self {
        Self {
            competitor: CompetitorId::new(competitor),
            place: Some(place),
            code: Some(code.as_ref().trim().to_ascii_uppercase()),
            code_points: None,
        }
    }

    pub fn manual(competitor: impl AsRef<str>, code: impl AsRef<str>, points: Decimal) -> Self {
        Self {
            competitor: CompetitorId::new(competitor),
            place: None,
            code: Some(code.as_ref().trim().to_ascii_uppercase()),
            code_points: Some(points),
        }
    }

    pub fn code_key(&self) -> Option<String> {
        self.code
            .as_ref()
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: RaceId,
    pub name: String,
    pub order: u32,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub scores: Vec<Score>,
}

impl Race {
    pub fn new(id: impl AsRef<str>, name: impl AsRef<str>, order: u32) -> Self {
        Self {
            id: RaceId::new(id),
            name: name.as_ref().trim().to_string(),
            order,
            date: None,
            scores: Vec::new(),
        }
    }

    pub fn with_scores(mut self, scores: Vec<Score>) -> Self {
        self.scores = scores;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub competitors: Vec<Competitor>,
    pub races: Vec<Race>,
    #[serde(default)]
    pub trend: bool,
}

impl Series {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().trim().to_string(),
            competitors: Vec::new(),
            races: Vec::new(),
            trend: false,
        }
    }

    pub fn with_competitors(mut self, competitors: Vec<Competitor>) -> Self {
        self.competitors = competitors;
        self
    }

    pub fn with_races(mut self, races: Vec<Race>) -> Self {
        self.races = races;
        self
    }

    pub fn with_trend(mut self, trend: bool) -> Self {
        self.trend = trend;
        self
    }

    pub fn races_by_order(&self) -> Vec<&Race> {
        let mut ordered: Vec<&Race> = self.races.iter().collect();
        ordered.sort_by_key(|r| r.order);
        ordered
    }

    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

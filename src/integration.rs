use crate::series::{Competitor, Race, Score, Series};
use crate::types::{CompetitorId, RaceId};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCompetitorRow {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRaceRow {
    pub id: String,
    pub name: String,
    pub order: u32,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalResultRow {
    pub competitor: String,
    pub place: Option<u32>,
    pub code: Option<String>,
    pub code_points: Option<Decimal>,
}

pub trait ExternalSeriesSource {
    fn competitors(&self) -> Vec<ExternalCompetitorRow>;
    fn races(&self) -> Vec<ExternalRaceRow>;
    fn results(&self, race_id: &str) -> Vec<ExternalResultRow>;
}

pub struct SeriesAssembler<S> {
    source: S,
}

impl<S> SeriesAssembler<S>
where
    S: ExternalSeriesSource,
{
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn assemble(&self, name: impl AsRef<str>, trend: bool) -> Series {
        let competitors: Vec<Competitor> = self
            .source
            .competitors()
            .into_iter()
            .map(|row| Competitor {
                id: CompetitorId::new(&row.id),
                name: row.name.trim().to_string(),
            })
            .collect();

        let mut races = Vec::new();
        for row in self.source.races() {
            let scores = self
                .source
                .results(&row.id)
                .into_iter()
                .map(|result| Score {
                    competitor: CompetitorId::new(&result.competitor),
                    place: result.place,
                    code: result
                        .code
                        .map(|c| c.trim().to_ascii_uppercase())
                        .filter(|c| !c.is_empty()),
                    code_points: result.code_points,
                })
                .collect();
            races.push(Race {
                id: RaceId::new(&row.id),
                name: row.name.trim().to_string(),
                order: row.order,
                date: row.date,
                scores,
            });
        }

        Series::new(name)
            .with_competitors(competitors)
            .with_races(races)
            .with_trend(trend)
    }
}

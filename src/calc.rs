use crate::series::{Competitor, Race, Score, Series};
use crate::system::{EffectiveCodeSet, Formula, ScoreCode, ScoringSystem};
use crate::types::{CompetitorId, PointDirection, RaceId};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalcError {
    Configuration(String),
    Data(String),
}

impl std::fmt::Display for CalcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalcError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            CalcError::Data(msg) => write!(f, "data error: {}", msg),
        }
    }
}

impl std::error::Error for CalcError {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculatedScore {
    pub place: Option<u32>,
    pub code: Option<String>,
    pub value: Decimal,
    pub discard: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorResult {
    pub scores: BTreeMap<RaceId, CalculatedScore>,
    pub total: Option<Decimal>,
    pub rank: Option<u32>,
    pub trend: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesResults {
    pub results: BTreeMap<CompetitorId, CompetitorResult>,
}

impl SeriesResults {
    pub fn result(&self, competitor: &CompetitorId) -> Option<&CompetitorResult> {
        self.results.get(competitor)
    }

    pub fn standings(&self) -> Vec<(&CompetitorId, &CompetitorResult)> {
        let mut rows: Vec<(&CompetitorId, &CompetitorResult)> = self.results.iter().collect();
        rows.sort_by(|(a_id, a), (b_id, b)| match (a.rank, b.rank) {
            (Some(ra), Some(rb)) => ra.cmp(&rb).then_with(|| a_id.cmp(b_id)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a_id.cmp(b_id),
        });
        rows
    }
}

#[derive(Debug, Clone)]
struct Cell {
    place: Option<u32>,
    code: Option<String>,
    value: Decimal,
    pending_average: bool,
    sailed: bool,
    started: bool,
    discardable: bool,
    discard: bool,
}

struct RaceOutcome {
    cells: Vec<Cell>,
    fallback: Decimal,
}

enum RawEntry<'a> {
    Plain {
        place: u32,
    },
    Coded {
        place: Option<u32>,
        code: &'a ScoreCode,
        label: String,
        points: Option<Decimal>,
    },
}

#[derive(Debug, Clone)]
pub struct SeriesScorer {
    system: ScoringSystem,
    codes: EffectiveCodeSet,
}

impl SeriesScorer {
    pub fn new(system: ScoringSystem) -> Result<Self, CalcError> {
        let codes = system.effective_codes();
        if system.discard_pattern.is_empty() {
            return Err(CalcError::Configuration(
                "discard pattern must not be empty".to_string(),
            ));
        }
        if let Some(percent) = system.participation_percent {
            if percent <= Decimal::ZERO || percent > Decimal::ONE {
                return Err(CalcError::Configuration(format!(
                    "participation percent {} outside (0, 1]",
                    percent
                )));
            }
        }
        if let Some(name) = codes.default_code_name() {
            if codes.lookup(name).is_none() {
                return Err(CalcError::Configuration(format!(
                    "default code {} is not defined",
                    name
                )));
            }
        }
        for code in codes.codes() {
            if let Some(value) = code.value {
                if value < Decimal::ZERO {
                    return Err(CalcError::Configuration(format!(
                        "code {} has negative value {}",
                        code.name, value
                    )));
                }
            }
            if matches!(code.formula, Formula::Fixed | Formula::PlacePercent)
                && code.value.is_none()
            {
                return Err(CalcError::Configuration(format!(
                    "code {} with formula {} requires a value",
                    code.name,
                    code.formula.token()
                )));
            }
        }
        Ok(Self { system, codes })
    }

    pub fn system(&self) -> &ScoringSystem {
        &self.system
    }

    pub fn effective_codes(&self) -> &EffectiveCodeSet {
        &self.codes
    }

    pub fn calculate(&self, series: &Series) -> Result<SeriesResults, CalcError> {
        let mut comp_index: HashMap<CompetitorId, usize> = HashMap::new();
        for (idx, competitor) in series.competitors.iter().enumerate() {
            if comp_index.insert(competitor.id.clone(), idx).is_some() {
                return Err(CalcError::Data(format!(
                    "duplicate competitor {}",
                    competitor.id.as_str()
                )));
            }
        }
        let entrants = series.competitors.len();
        let races = series.races_by_order();
        let mut seen_races = HashSet::new();
        for race in &races {
            if !seen_races.insert(race.id.clone()) {
                return Err(CalcError::Data(format!(
                    "duplicate race {}",
                    race.id.as_str()
                )));
            }
        }

        let mut outcomes = Vec::with_capacity(races.len());
        for race in &races {
            outcomes.push(self.resolve_race(race, &series.competitors, &comp_index)?);
        }
        let fallbacks: Vec<Decimal> = outcomes.iter().map(|o| o.fallback).collect();

        let mut cells: Vec<Vec<Cell>> = (0..entrants)
            .map(|_| Vec::with_capacity(races.len()))
            .collect();
        for outcome in outcomes {
            for (idx, cell) in outcome.cells.into_iter().enumerate() {
                cells[idx].push(cell);
            }
        }

        resolve_averages(&mut cells, &fallbacks);

        let total_races = races.len();
        let mut totals: Vec<Option<Decimal>> = vec![None; entrants];
        for (idx, comp_cells) in cells.iter_mut().enumerate() {
            if !self.meets_participation(comp_cells, total_races) {
                continue;
            }
            self.plan_discards(comp_cells);
            totals[idx] = Some(
                comp_cells
                    .iter()
                    .filter(|c| !c.discard)
                    .map(|c| c.value)
                    .sum(),
            );
        }

        let ranks = self.assign_ranks(series, &cells, &totals);
        let trends = self.compute_trends(series, &ranks)?;

        let mut results = BTreeMap::new();
        for (idx, competitor) in series.competitors.iter().enumerate() {
            let mut scores = BTreeMap::new();
            for (race, cell) in races.iter().zip(cells[idx].iter()) {
                scores.insert(
                    race.id.clone(),
                    CalculatedScore {
                        place: cell.place,
                        code: cell.code.clone(),
                        value: cell.value,
                        discard: cell.discard,
                    },
                );
            }
            results.insert(
                competitor.id.clone(),
                CompetitorResult {
                    scores,
                    total: totals[idx],
                    rank: ranks[idx],
                    trend: trends[idx],
                },
            );
        }
        Ok(SeriesResults { results })
    }

    fn resolve_race(
        &self,
        race: &Race,
        competitors: &[Competitor],
        comp_index: &HashMap<CompetitorId, usize>,
    ) -> Result<RaceOutcome, CalcError> {
        let entrants = competitors.len();
        let mut raw: Vec<Option<&Score>> = vec![None; entrants];
        for score in &race.scores {
            let idx = *comp_index.get(&score.competitor).ok_or_else(|| {
                CalcError::Data(format!(
                    "race {} scores unknown competitor {}",
                    race.id.as_str(),
                    score.competitor.as_str()
                ))
            })?;
            if raw[idx].is_some() {
                return Err(CalcError::Data(format!(
                    "race {} has duplicate score for {}",
                    race.id.as_str(),
                    score.competitor.as_str()
                )));
            }
            if score.place == Some(0) {
                return Err(CalcError::Data(format!(
                    "race {} has place 0 for {}",
                    race.id.as_str(),
                    score.competitor.as_str()
                )));
            }
            raw[idx] = Some(score);
        }

        let mut entries = Vec::with_capacity(entrants);
        for (idx, slot) in raw.iter().enumerate() {
            entries.push(self.classify(race, *slot, competitors[idx].id.as_str())?);
        }

        let starters = entries
            .iter()
            .filter(|e| match e {
                RawEntry::Plain { .. } => true,
                RawEntry::Coded { code, .. } => code.started,
            })
            .count();
        let fleet = entries
            .iter()
            .filter(|e| match e {
                RawEntry::Plain { .. } => true,
                RawEntry::Coded { code, .. } => code.came_to_start,
            })
            .count();
        let fallback = self.fallback_value(entrants, starters);

        let cascade = self.system.cascade_adjustments;
        let mut vacated: Vec<u32> = Vec::new();
        if cascade {
            for entry in &entries {
                if let RawEntry::Coded {
                    place: Some(place),
                    code,
                    ..
                } = entry
                {
                    if code.adjust_other_scores && !code.preserve_result {
                        vacated.push(*place);
                    }
                }
            }
        }
        let adjusted = |place: u32| -> u32 {
            let shift = vacated.iter().filter(|v| **v < place).count() as u32;
            place.saturating_sub(shift).max(1)
        };

        let mut groups: HashMap<u32, u32> = HashMap::new();
        for entry in &entries {
            if let Some(place) = occupied_place(entry, cascade) {
                *groups.entry(adjusted(place)).or_insert(0) += 1;
            }
        }
        let tie_value = |place: u32| -> Decimal {
            let adjusted_place = adjusted(place);
            let size = groups.get(&adjusted_place).copied().unwrap_or(1);
            Decimal::from(2 * adjusted_place as u64 + size as u64 - 1) / Decimal::from(2u64)
        };

        let mut cells = Vec::with_capacity(entrants);
        for entry in &entries {
            let cell = match entry {
                RawEntry::Plain { place } => Cell {
                    place: Some(*place),
                    code: None,
                    value: tie_value(*place),
                    pending_average: false,
                    sailed: true,
                    started: true,
                    discardable: true,
                    discard: false,
                },
                RawEntry::Coded {
                    place,
                    code,
                    label,
                    points,
                } => {
                    let (value, pending_average) = match code.formula {
                        Formula::Fixed => (code.value.unwrap_or(Decimal::ZERO), false),
                        Formula::StartersPlus => (
                            Decimal::from(starters as u64)
                                + code.value.unwrap_or(Decimal::ONE),
                            false,
                        ),
                        Formula::EntrantsPlus => (
                            Decimal::from(entrants as u64)
                                + code.value.unwrap_or(Decimal::ONE),
                            false,
                        ),
                        Formula::PlacePercent => {
                            let place = (*place).ok_or_else(|| {
                                CalcError::Data(format!(
                                    "race {} code {} requires a place",
                                    race.id.as_str(),
                                    label
                                ))
                            })?;
                            let percent = code.value.unwrap_or(Decimal::ZERO);
                            let penalty = (percent * Decimal::from(fleet as u64)
                                / Decimal::from(100u64))
                            .round_dp_with_strategy(
                                0,
                                RoundingStrategy::MidpointAwayFromZero,
                            );
                            let candidate = Decimal::from(adjusted(place) as u64) + penalty;
                            if self.system.direction.worse(candidate, fallback) {
                                (fallback, false)
                            } else {
                                (candidate, false)
                            }
                        }
                        Formula::Tie => {
                            let place = (*place).ok_or_else(|| {
                                CalcError::Data(format!(
                                    "race {} code {} requires a place",
                                    race.id.as_str(),
                                    label
                                ))
                            })?;
                            (tie_value(place), false)
                        }
                        Formula::Manual => {
                            let points = (*points).ok_or_else(|| {
                                CalcError::Data(format!(
                                    "race {} code {} requires code points",
                                    race.id.as_str(),
                                    label
                                ))
                            })?;
                            if points < Decimal::ZERO {
                                return Err(CalcError::Data(format!(
                                    "race {} code {} has negative points {}",
                                    race.id.as_str(),
                                    label,
                                    points
                                )));
                            }
                            (points, false)
                        }
                        Formula::Average | Formula::AverageNonDiscardable => {
                            (Decimal::ZERO, true)
                        }
                    };
                    Cell {
                        place: *place,
                        code: Some(label.clone()),
                        value,
                        pending_average,
                        sailed: code.came_to_start,
                        started: code.started,
                        discardable: code.counts_as_discardable(),
                        discard: false,
                    }
                }
            };
            cells.push(cell);
        }
        Ok(RaceOutcome { cells, fallback })
    }

    fn classify<'a>(
        &'a self,
        race: &Race,
        score: Option<&Score>,
        competitor: &str,
    ) -> Result<RawEntry<'a>, CalcError> {
        let absent = || -> Result<RawEntry<'a>, CalcError> {
            let default = self.codes.default_code().ok_or_else(|| {
                CalcError::Configuration(format!(
                    "race {} has no score for {} and no default code",
                    race.id.as_str(),
                    competitor
                ))
            })?;
            Ok(RawEntry::Coded {
                place: None,
                code: default,
                label: default.key(),
                points: None,
            })
        };

        let score = match score {
            Some(score) => score,
            None => return absent(),
        };
        match score.code_key() {
            Some(key) => {
                let code = match self.codes.lookup(&key) {
                    Some(code) => code,
                    None => self.codes.default_code().ok_or_else(|| {
                        CalcError::Configuration(format!(
                            "race {} has unknown code {} for {} and no default code",
                            race.id.as_str(),
                            key,
                            competitor
                        ))
                    })?,
                };
                Ok(RawEntry::Coded {
                    place: score.place,
                    code,
                    label: key,
                    points: score.code_points,
                })
            }
            None => match score.place {
                Some(place) => Ok(RawEntry::Plain { place }),
                None => absent(),
            },
        }
    }

    fn fallback_value(&self, entrants: usize, starters: usize) -> Decimal {
        match self.codes.default_code() {
            Some(code) => match code.formula {
                Formula::Fixed => code.value.unwrap_or(Decimal::ZERO),
                Formula::StartersPlus => {
                    Decimal::from(starters as u64) + code.value.unwrap_or(Decimal::ONE)
                }
                Formula::EntrantsPlus => {
                    Decimal::from(entrants as u64) + code.value.unwrap_or(Decimal::ONE)
                }
                _ => Decimal::from(entrants as u64) + Decimal::ONE,
            },
            None => Decimal::from(entrants as u64) + Decimal::ONE,
        }
    }

    fn meets_participation(&self, cells: &[Cell], total_races: usize) -> bool {
        let threshold = match self.system.participation_percent {
            Some(threshold) => threshold,
            None => return true,
        };
        if total_races == 0 {
            return true;
        }
        let started = cells.iter().filter(|c| c.started).count();
        Decimal::from(started as u64) / Decimal::from(total_races as u64) >= threshold
    }

    fn plan_discards(&self, cells: &mut [Cell]) {
        if cells.is_empty() {
            return;
        }
        let sailed = cells.iter().filter(|c| c.sailed).count();
        let allowed = (self.system.discards_for(sailed) as usize).min(cells.len() - 1);
        let direction = self.system.direction;
        let mut candidates: Vec<usize> = (0..cells.len())
            .filter(|&idx| cells[idx].discardable)
            .collect();
        candidates.sort_by(|&a, &b| {
            worse_first(direction, cells[a].value, cells[b].value).then(b.cmp(&a))
        });
        for idx in candidates.into_iter().take(allowed) {
            cells[idx].discard = true;
        }
    }

    fn assign_ranks(
        &self,
        series: &Series,
        cells: &[Vec<Cell>],
        totals: &[Option<Decimal>],
    ) -> Vec<Option<u32>> {
        let direction = self.system.direction;
        let kept: Vec<Vec<Decimal>> = cells
            .iter()
            .map(|comp_cells| {
                let mut values: Vec<Decimal> = comp_cells
                    .iter()
                    .filter(|c| !c.discard)
                    .map(|c| c.value)
                    .collect();
                values.sort_by(|a, b| better_first(direction, *a, *b));
                values
            })
            .collect();

        let tie_cmp = |a: usize, b: usize| -> Ordering {
            let bests = kept[a]
                .iter()
                .zip(kept[b].iter())
                .map(|(x, y)| better_first(direction, *x, *y))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or_else(|| kept[b].len().cmp(&kept[a].len()));
            if bests != Ordering::Equal {
                return bests;
            }
            cells[a]
                .iter()
                .zip(cells[b].iter())
                .rev()
                .map(|(x, y)| better_first(direction, x.value, y.value))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        };

        let mut order: Vec<(usize, Decimal)> = totals
            .iter()
            .enumerate()
            .filter_map(|(idx, total)| total.map(|t| (idx, t)))
            .collect();
        order.sort_by(|&(a, a_total), &(b, b_total)| {
            better_first(direction, a_total, b_total)
                .then_with(|| tie_cmp(a, b))
                .then_with(|| series.competitors[a].id.cmp(&series.competitors[b].id))
        });

        let mut ranks: Vec<Option<u32>> = vec![None; totals.len()];
        for (pos, &(idx, _)) in order.iter().enumerate() {
            let rank = if pos == 0 {
                1
            } else {
                let prev = order[pos - 1].0;
                if totals[idx] == totals[prev] && tie_cmp(prev, idx) == Ordering::Equal {
                    ranks[prev].unwrap_or(1)
                } else {
                    pos as u32 + 1
                }
            };
            ranks[idx] = Some(rank);
        }
        ranks
    }

    fn compute_trends(
        &self,
        series: &Series,
        ranks: &[Option<u32>],
    ) -> Result<Vec<Option<i32>>, CalcError> {
        if !series.trend || series.races.len() < 2 {
            return Ok(vec![None; series.competitors.len()]);
        }
        let mut prior = series.clone();
        prior.trend = false;
        if let Some(last) = prior
            .races
            .iter()
            .enumerate()
            .max_by_key(|(_, race)| race.order)
            .map(|(idx, _)| idx)
        {
            prior.races.remove(last);
        }
        let previous = self.calculate(&prior)?;

        let mut trends = vec![None; series.competitors.len()];
        for (idx, competitor) in series.competitors.iter().enumerate() {
            let current = match ranks[idx] {
                Some(rank) => rank,
                None => continue,
            };
            let before = previous
                .result(&competitor.id)
                .and_then(|result| result.rank);
            if let Some(before) = before {
                trends[idx] = Some(before as i32 - current as i32);
            }
        }
        Ok(trends)
    }
}

fn occupied_place(entry: &RawEntry<'_>, cascade: bool) -> Option<u32> {
    match entry {
        RawEntry::Plain { place } => Some(*place),
        RawEntry::Coded { place, code, .. } => {
            let vacates = cascade && code.adjust_other_scores && !code.preserve_result;
            if vacates {
                return None;
            }
            match code.formula {
                Formula::Tie | Formula::PlacePercent => *place,
                _ => None,
            }
        }
    }
}

fn resolve_averages(cells: &mut [Vec<Cell>], fallbacks: &[Decimal]) {
    for comp_cells in cells.iter_mut() {
        let known: Vec<(usize, Decimal)> = comp_cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.pending_average)
            .map(|(idx, cell)| (idx, cell.value))
            .collect();
        for (idx, cell) in comp_cells.iter_mut().enumerate() {
            if !cell.pending_average {
                continue;
            }
            let others: Vec<Decimal> = known
                .iter()
                .filter(|(other, _)| *other != idx)
                .map(|(_, value)| *value)
                .collect();
            cell.value = if others.is_empty() {
                fallbacks[idx]
            } else {
                others.iter().copied().sum::<Decimal>() / Decimal::from(others.len() as u64)
            };
            cell.pending_average = false;
        }
    }
}

fn better_first(direction: PointDirection, a: Decimal, b: Decimal) -> Ordering {
    if a == b {
        Ordering::Equal
    } else if direction.better(a, b) {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn worse_first(direction: PointDirection, a: Decimal, b: Decimal) -> Ordering {
    better_first(direction, a, b).reverse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_system(id: &str) -> ScoringSystem {
        let path = format!("{}/systems/{id}.yaml", env!("CARGO_MANIFEST_DIR"));
        ScoringSystem::from_path(path).expect("system should load")
    }

    fn scorer(system: ScoringSystem) -> SeriesScorer {
        SeriesScorer::new(system).expect("system should validate")
    }

    fn d(value: i64) -> Decimal {
        Decimal::from(value)
    }

    fn competitor_id(index: u32) -> String {
        format!("C{:02}", index)
    }

    fn fleet_series(entrants: u32) -> Series {
        let competitors = (1..=entrants)
            .map(|i| Competitor::new(competitor_id(i), format!("Boat {}", i)))
            .collect();
        let scores = (1..=entrants)
            .map(|i| Score::place(competitor_id(i), i))
            .collect();
        Series::new("Test Series")
            .with_competitors(competitors)
            .with_races(vec![Race::new("R1", "Race 1", 1).with_scores(scores)])
    }

    fn set_score(series: &mut Series, race: &str, score: Score) {
        let race = series
            .races
            .iter_mut()
            .find(|r| r.id.as_str() == race)
            .expect("race should exist");
        race.scores.retain(|s| s.competitor != score.competitor);
        race.scores.push(score);
    }

    fn value_of(results: &SeriesResults, competitor: &str, race: &str) -> Decimal {
        results
            .result(&CompetitorId::new(competitor))
            .expect("competitor should have a result")
            .scores
            .get(&RaceId::new(race))
            .expect("race should have a score")
            .value
    }

    fn rank_of(results: &SeriesResults, competitor: &str) -> Option<u32> {
        results.result(&CompetitorId::new(competitor)).unwrap().rank
    }

    #[test]
    fn plain_places_score_face_value() {
        let results = scorer(load_system("appendix_a"))
            .calculate(&fleet_series(5))
            .unwrap();
        for i in 1..=5 {
            assert_eq!(value_of(&results, &competitor_id(i), "R1"), d(i as i64));
        }
        assert_eq!(rank_of(&results, "C01"), Some(1));
        assert_eq!(rank_of(&results, "C05"), Some(5));
    }

    #[test]
    fn three_races_with_pattern_discard_exactly_one_each() {
        let system = load_system("appendix_a").with_discard_pattern(vec![0, 1]);
        let competitors = vec![
            Competitor::new("A", "Alpha"),
            Competitor::new("B", "Bravo"),
            Competitor::new("C", "Charlie"),
        ];
        let series = Series::new("Three By Three")
            .with_competitors(competitors)
            .with_races(vec![
                Race::new("R1", "Race 1", 1).with_scores(vec![
                    Score::place("A", 1),
                    Score::place("B", 2),
                    Score::place("C", 3),
                ]),
                Race::new("R2", "Race 2", 2).with_scores(vec![
                    Score::place("A", 2),
                    Score::place("B", 3),
                    Score::place("C", 1),
                ]),
                Race::new("R3", "Race 3", 3).with_scores(vec![
                    Score::place("A", 3),
                    Score::place("B", 1),
                    Score::place("C", 2),
                ]),
            ]);

        let results = scorer(system).calculate(&series).unwrap();
        for id in ["A", "B", "C"] {
            let result = results.result(&CompetitorId::new(id)).unwrap();
            let discards = result.scores.values().filter(|s| s.discard).count();
            assert_eq!(discards, 1, "competitor {} should discard one race", id);
            assert_eq!(result.total, Some(d(3)));
        }
        assert_eq!(rank_of(&results, "B"), Some(1));
        assert_eq!(rank_of(&results, "C"), Some(2));
        assert_eq!(rank_of(&results, "A"), Some(3));
    }

    #[test]
    fn percentage_penalty_rounds_half_up() {
        let mut series = fleet_series(23);
        set_score(&mut series, "R1", Score::coded_at("C03", "SCP", 3));
        let results = scorer(load_system("appendix_a")).calculate(&series).unwrap();
        assert_eq!(value_of(&results, "C03", "R1"), d(8));
        assert_eq!(value_of(&results, "C02", "R1"), d(2));
        assert_eq!(value_of(&results, "C04", "R1"), d(4));
    }

    #[test]
    fn percentage_penalty_never_exceeds_non_finisher() {
        let mut system = load_system("appendix_a");
        system
            .codes
            .push(ScoreCode::new("DPI", Formula::PlacePercent).with_value(d(100)).finishing());
        let mut series = fleet_series(5);
        set_score(&mut series, "R1", Score::coded_at("C04", "DPI", 4));
        let results = scorer(system).calculate(&series).unwrap();
        assert_eq!(value_of(&results, "C04", "R1"), d(6));
    }

    #[test]
    fn disqualification_cascade_shifts_worse_places_up() {
        let mut series = fleet_series(23);
        set_score(&mut series, "R1", Score::coded_at("C02", "DSQ", 2));
        let results = scorer(load_system("appendix_a")).calculate(&series).unwrap();
        assert_eq!(value_of(&results, "C02", "R1"), d(24));
        assert_eq!(value_of(&results, "C01", "R1"), d(1));
        assert_eq!(value_of(&results, "C03", "R1"), d(2));
        assert_eq!(value_of(&results, "C23", "R1"), d(22));
    }

    #[test]
    fn cascading_codes_sharing_a_place_clamp_the_adjustment() {
        let mut series = fleet_series(4);
        set_score(&mut series, "R1", Score::coded_at("C01", "DSQ", 1));
        set_score(&mut series, "R1", Score::coded_at("C02", "DSQ", 1));
        set_score(&mut series, "R1", Score::coded_at("C03", "DSQ", 1));
        set_score(&mut series, "R1", Score::place("C04", 2));
        let results = scorer(load_system("appendix_a")).calculate(&series).unwrap();
        assert_eq!(value_of(&results, "C04", "R1"), d(1));
        assert_eq!(value_of(&results, "C01", "R1"), d(5));
        assert_eq!(rank_of(&results, "C04"), Some(1));
    }

    #[test]
    fn high_point_without_cascade_leaves_other_scores_alone() {
        let mut series = fleet_series(23);
        set_score(&mut series, "R1", Score::coded_at("C02", "DSQ", 2));
        let results = scorer(load_system("high_point_percentage"))
            .calculate(&series)
            .unwrap();
        assert_eq!(value_of(&results, "C02", "R1"), d(0));
        assert_eq!(value_of(&results, "C03", "R1"), d(3));
        assert_eq!(value_of(&results, "C23", "R1"), d(23));
    }

    #[test]
    fn tie_code_averages_the_shared_place() {
        let mut series = fleet_series(10);
        set_score(&mut series, "R1", Score::coded_at("C04", "TIE", 3));
        let results = scorer(load_system("appendix_a")).calculate(&series).unwrap();
        assert_eq!(value_of(&results, "C03", "R1"), Decimal::new(35, 1));
        assert_eq!(value_of(&results, "C04", "R1"), Decimal::new(35, 1));
        assert_eq!(value_of(&results, "C05", "R1"), d(5));
        assert_eq!(rank_of(&results, "C03"), Some(3));
        assert_eq!(rank_of(&results, "C04"), Some(3));
        assert_eq!(rank_of(&results, "C05"), Some(5));
    }

    #[test]
    fn equal_totals_resolve_by_most_bests_then_last_race() {
        let competitors = vec![
            Competitor::new("A", "Alpha"),
            Competitor::new("B", "Bravo"),
            Competitor::new("C", "Charlie"),
        ];
        let mut races = Vec::new();
        for order in 1..=6u32 {
            let (a, b, c) = if order <= 3 { (1, 2, 3) } else { (3, 2, 1) };
            races.push(
                Race::new(format!("R{}", order), format!("Race {}", order), order).with_scores(
                    vec![
                        Score::place("A", a),
                        Score::place("B", b),
                        Score::place("C", c),
                    ],
                ),
            );
        }
        let series = Series::new("Six Races")
            .with_competitors(competitors)
            .with_races(races);

        let system = load_system("appendix_a").with_discard_pattern(vec![0]);
        let results = scorer(system).calculate(&series).unwrap();
        for id in ["A", "B", "C"] {
            assert_eq!(
                results.result(&CompetitorId::new(id)).unwrap().total,
                Some(d(12))
            );
        }
        assert_eq!(rank_of(&results, "C"), Some(1));
        assert_eq!(rank_of(&results, "A"), Some(2));
        assert_eq!(rank_of(&results, "B"), Some(3));
    }

    #[test]
    fn most_bests_prefers_more_kept_scores_on_equal_prefix() {
        let system = ScoringSystem::new("High Point Club", PointDirection::HighPoint)
            .with_discard_pattern(vec![0, 0, 1])
            .with_default_code("DNC")
            .with_codes(vec![
                ScoreCode::new("DNC", Formula::Fixed).with_value(Decimal::ZERO),
                ScoreCode::new("MAN", Formula::Manual).finishing(),
            ]);
        let competitors = vec![
            Competitor::new("A", "Alpha"),
            Competitor::new("B", "Bravo"),
        ];
        let races = vec![
            Race::new("R1", "Race 1", 1).with_scores(vec![
                Score::manual("A", "MAN", d(5)),
                Score::manual("B", "MAN", d(5)),
            ]),
            Race::new("R2", "Race 2", 2).with_scores(vec![
                Score::manual("A", "MAN", d(3)),
                Score::manual("B", "MAN", d(3)),
            ]),
            Race::new("R3", "Race 3", 3).with_scores(vec![Score::manual("A", "MAN", d(2))]),
        ];
        let series = Series::new("Club Cup")
            .with_competitors(competitors)
            .with_races(races);

        let results = scorer(system).calculate(&series).unwrap();
        assert_eq!(
            results.result(&CompetitorId::new("A")).unwrap().total,
            Some(d(8))
        );
        assert_eq!(
            results.result(&CompetitorId::new("B")).unwrap().total,
            Some(d(8))
        );
        assert_eq!(rank_of(&results, "B"), Some(1));
        assert_eq!(rank_of(&results, "A"), Some(2));
    }

    #[test]
    fn fully_tied_competitors_share_a_rank() {
        let competitors = vec![
            Competitor::new("A", "Alpha"),
            Competitor::new("B", "Bravo"),
            Competitor::new("C", "Charlie"),
            Competitor::new("D", "Delta"),
        ];
        let race = |id: &str, order: u32| {
            Race::new(id, id, order).with_scores(vec![
                Score::manual("A", "MAN", d(5)),
                Score::manual("B", "MAN", d(5)),
                Score::manual("C", "MAN", d(7)),
                Score::manual("D", "MAN", d(8)),
            ])
        };
        let series = Series::new("Manual Series")
            .with_competitors(competitors)
            .with_races(vec![race("R1", 1), race("R2", 2)]);

        let results = scorer(load_system("appendix_a")).calculate(&series).unwrap();
        assert_eq!(rank_of(&results, "A"), Some(1));
        assert_eq!(rank_of(&results, "B"), Some(1));
        assert_eq!(rank_of(&results, "C"), Some(3));
        assert_eq!(rank_of(&results, "D"), Some(4));
    }

    #[test]
    fn non_discardable_score_is_never_discarded() {
        let competitors = vec![Competitor::new("A", "Alpha"), Competitor::new("B", "Bravo")];
        let series = Series::new("Protected")
            .with_competitors(competitors)
            .with_races(vec![
                Race::new("R1", "Race 1", 1).with_scores(vec![
                    Score::manual("A", "MAN", d(1)),
                    Score::manual("B", "MAN", d(4)),
                ]),
                Race::new("R2", "Race 2", 2).with_scores(vec![
                    Score::manual("A", "MAN", d(2)),
                    Score::manual("B", "MAN", d(4)),
                ]),
                Race::new("R3", "Race 3", 3).with_scores(vec![
                    Score::coded("A", "DNE"),
                    Score::manual("B", "MAN", d(4)),
                ]),
            ]);

        let system = load_system("appendix_a").with_discard_pattern(vec![0, 0, 1]);
        let results = scorer(system).calculate(&series).unwrap();
        let a = results.result(&CompetitorId::new("A")).unwrap();
        assert_eq!(a.scores.get(&RaceId::new("R3")).unwrap().value, d(3));
        assert!(!a.scores.get(&RaceId::new("R3")).unwrap().discard);
        assert!(a.scores.get(&RaceId::new("R2")).unwrap().discard);
        assert_eq!(a.total, Some(d(4)));
    }

    #[test]
    fn average_code_uses_mean_of_other_races() {
        let competitors = vec![
            Competitor::new("A", "Alpha"),
            Competitor::new("B", "Bravo"),
            Competitor::new("C", "Charlie"),
        ];
        let series = Series::new("Redress")
            .with_competitors(competitors)
            .with_races(vec![
                Race::new("R1", "Race 1", 1).with_scores(vec![
                    Score::place("A", 2),
                    Score::place("B", 1),
                    Score::place("C", 3),
                ]),
                Race::new("R2", "Race 2", 2).with_scores(vec![
                    Score::coded("A", "RDG"),
                    Score::place("B", 1),
                    Score::place("C", 2),
                ]),
                Race::new("R3", "Race 3", 3).with_scores(vec![
                    Score::place("A", 3),
                    Score::place("B", 1),
                    Score::place("C", 2),
                ]),
            ]);

        let system = load_system("appendix_a").with_discard_pattern(vec![0]);
        let results = scorer(system).calculate(&series).unwrap();
        assert_eq!(value_of(&results, "A", "R2"), Decimal::new(25, 1));
    }

    #[test]
    fn average_with_no_other_races_scores_as_default_code() {
        let competitors = vec![Competitor::new("A", "Alpha"), Competitor::new("B", "Bravo")];
        let series = Series::new("Lone Redress")
            .with_competitors(competitors)
            .with_races(vec![Race::new("R1", "Race 1", 1).with_scores(vec![
                Score::coded("A", "RDG"),
                Score::place("B", 1),
            ])]);

        let results = scorer(load_system("appendix_a")).calculate(&series).unwrap();
        assert_eq!(value_of(&results, "A", "R1"), d(3));
    }

    #[test]
    fn unknown_code_falls_back_to_default_code() {
        let mut series = fleet_series(5);
        set_score(&mut series, "R1", Score::coded("C05", "XYZ"));
        let results = scorer(load_system("appendix_a")).calculate(&series).unwrap();
        assert_eq!(value_of(&results, "C05", "R1"), d(6));
        let cell = results
            .result(&CompetitorId::new("C05"))
            .unwrap()
            .scores
            .get(&RaceId::new("R1"))
            .unwrap()
            .clone();
        assert_eq!(cell.code.as_deref(), Some("XYZ"));
    }

    #[test]
    fn unknown_code_without_default_aborts_calculation() {
        let system = ScoringSystem::new("No Default", PointDirection::LowPoint)
            .with_codes(vec![ScoreCode::new("DNF", Formula::EntrantsPlus)]);
        let mut series = fleet_series(3);
        set_score(&mut series, "R1", Score::coded("C03", "XYZ"));
        let err = scorer(system).calculate(&series).unwrap_err();
        assert!(matches!(err, CalcError::Configuration(_)));
    }

    #[test]
    fn missing_score_resolves_via_default_code() {
        let competitors = vec![Competitor::new("A", "Alpha"), Competitor::new("B", "Bravo")];
        let series = Series::new("Absent")
            .with_competitors(competitors)
            .with_races(vec![
                Race::new("R1", "Race 1", 1).with_scores(vec![Score::place("A", 1)])
            ]);

        let results = scorer(load_system("appendix_a")).calculate(&series).unwrap();
        let b = results.result(&CompetitorId::new("B")).unwrap();
        let cell = b.scores.get(&RaceId::new("R1")).unwrap();
        assert_eq!(cell.value, d(3));
        assert_eq!(cell.code.as_deref(), Some("DNC"));
        assert_eq!(cell.place, None);
    }

    #[test]
    fn participation_threshold_unranks_low_attendance() {
        let system = load_system("appendix_a")
            .with_discard_pattern(vec![0])
            .with_participation_percent(Decimal::new(5, 1));
        let competitors = vec![Competitor::new("A", "Alpha"), Competitor::new("B", "Bravo")];
        let mut races = Vec::new();
        for order in 1..=4u32 {
            let mut scores = vec![Score::place("A", 1)];
            if order == 1 {
                scores.push(Score::place("B", 2));
            } else {
                scores.push(Score::coded("B", "DNC"));
            }
            races.push(Race::new(format!("R{}", order), format!("Race {}", order), order)
                .with_scores(scores));
        }
        let series = Series::new("Sparse")
            .with_competitors(competitors)
            .with_races(races);

        let results = scorer(system).calculate(&series).unwrap();
        let b = results.result(&CompetitorId::new("B")).unwrap();
        assert_eq!(b.total, None);
        assert_eq!(b.rank, None);
        assert_eq!(b.scores.len(), 4);
        assert_eq!(rank_of(&results, "A"), Some(1));
    }

    #[test]
    fn high_point_discards_lowest_values_and_drops_later_race_on_ties() {
        let system = load_system("high_point_percentage").with_discard_pattern(vec![0, 1]);
        let competitors = vec![Competitor::new("A", "Alpha"), Competitor::new("B", "Bravo")];
        let series = Series::new("High Point")
            .with_competitors(competitors)
            .with_races(vec![
                Race::new("R1", "Race 1", 1).with_scores(vec![
                    Score::manual("A", "MAN", d(5)),
                    Score::manual("B", "MAN", d(2)),
                ]),
                Race::new("R2", "Race 2", 2).with_scores(vec![
                    Score::manual("A", "MAN", d(1)),
                    Score::manual("B", "MAN", d(2)),
                ]),
            ]);

        let results = scorer(system).calculate(&series).unwrap();
        let a = results.result(&CompetitorId::new("A")).unwrap();
        assert!(a.scores.get(&RaceId::new("R2")).unwrap().discard);
        assert_eq!(a.total, Some(d(5)));
        let b = results.result(&CompetitorId::new("B")).unwrap();
        assert!(b.scores.get(&RaceId::new("R2")).unwrap().discard);
        assert!(!b.scores.get(&RaceId::new("R1")).unwrap().discard);
        assert_eq!(b.total, Some(d(2)));
        assert_eq!(rank_of(&results, "A"), Some(1));
        assert_eq!(rank_of(&results, "B"), Some(2));
    }

    #[test]
    fn trend_reports_rank_movement_against_prior_race() {
        let competitors = vec![Competitor::new("A", "Alpha"), Competitor::new("B", "Bravo")];
        let series = Series::new("Trending")
            .with_competitors(competitors)
            .with_races(vec![
                Race::new("R1", "Race 1", 1).with_scores(vec![
                    Score::place("A", 1),
                    Score::place("B", 2),
                ]),
                Race::new("R2", "Race 2", 2).with_scores(vec![
                    Score::place("A", 2),
                    Score::place("B", 1),
                ]),
            ])
            .with_trend(true);

        let results = scorer(load_system("appendix_a")).calculate(&series).unwrap();
        assert_eq!(rank_of(&results, "B"), Some(1));
        assert_eq!(rank_of(&results, "A"), Some(2));
        assert_eq!(results.result(&CompetitorId::new("B")).unwrap().trend, Some(1));
        assert_eq!(results.result(&CompetitorId::new("A")).unwrap().trend, Some(-1));
    }

    #[test]
    fn identical_inputs_produce_identical_results() {
        let mut series = fleet_series(8);
        set_score(&mut series, "R1", Score::coded_at("C02", "DSQ", 2));
        set_score(&mut series, "R1", Score::coded("C07", "DNF"));
        let scorer = scorer(load_system("appendix_a"));
        let first = scorer.calculate(&series).unwrap();
        let second = scorer.calculate(&series).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_score_is_a_data_error() {
        let mut series = fleet_series(3);
        series.races[0].scores.push(Score::place("C02", 2));
        let err = scorer(load_system("appendix_a")).calculate(&series).unwrap_err();
        assert!(matches!(err, CalcError::Data(_)));
    }

    #[test]
    fn unknown_competitor_is_a_data_error() {
        let mut series = fleet_series(3);
        series.races[0].scores.push(Score::place("GHOST", 4));
        let err = scorer(load_system("appendix_a")).calculate(&series).unwrap_err();
        assert!(matches!(err, CalcError::Data(_)));
    }

    #[test]
    fn zero_place_is_a_data_error() {
        let mut series = fleet_series(3);
        set_score(&mut series, "R1", Score::place("C03", 0));
        let err = scorer(load_system("appendix_a")).calculate(&series).unwrap_err();
        assert!(matches!(err, CalcError::Data(_)));
    }

    #[test]
    fn manual_code_without_points_is_a_data_error() {
        let mut series = fleet_series(3);
        set_score(&mut series, "R1", Score::coded("C03", "MAN"));
        let err = scorer(load_system("appendix_a")).calculate(&series).unwrap_err();
        assert!(matches!(err, CalcError::Data(_)));
    }

    #[test]
    fn scorer_rejects_invalid_configuration() {
        let empty_pattern = ScoringSystem::new("Bad", PointDirection::LowPoint)
            .with_discard_pattern(Vec::new());
        assert!(SeriesScorer::new(empty_pattern).is_err());

        let fixed_without_value = ScoringSystem::new("Bad", PointDirection::LowPoint)
            .with_codes(vec![ScoreCode::new("DNC", Formula::Fixed)]);
        assert!(SeriesScorer::new(fixed_without_value).is_err());

        let dangling_default = ScoringSystem::new("Bad", PointDirection::LowPoint)
            .with_default_code("DNC");
        assert!(SeriesScorer::new(dangling_default).is_err());

        let bad_threshold = ScoringSystem::new("Bad", PointDirection::LowPoint)
            .with_participation_percent(Decimal::new(15, 1));
        assert!(SeriesScorer::new(bad_threshold).is_err());
    }

    #[test]
    fn club_system_inherits_and_overrides_parent_codes() {
        let system = load_system("club_series");
        let scorer = SeriesScorer::new(system).unwrap();
        let codes = scorer.effective_codes();
        assert_eq!(codes.lookup("DSQ").unwrap().formula, Formula::StartersPlus);
        assert_eq!(codes.lookup("DNC").unwrap().formula, Formula::EntrantsPlus);
        assert!(codes.lookup("TIE").is_some());

        let mut series = fleet_series(10);
        set_score(&mut series, "R1", Score::coded_at("C02", "DSQ", 2));
        set_score(&mut series, "R1", Score::coded("C10", "DNC"));
        let results = scorer.calculate(&series).unwrap();
        assert_eq!(value_of(&results, "C02", "R1"), d(10));
        assert_eq!(value_of(&results, "C10", "R1"), d(11));
        assert_eq!(value_of(&results, "C03", "R1"), d(2));
    }

    #[test]
    fn scoring_system_files_load_and_validate() {
        for id in ["appendix_a", "high_point_percentage", "club_series"] {
            let system = load_system(id);
            assert!(
                SeriesScorer::new(system).is_ok(),
                "system {} should validate",
                id
            );
        }
    }
}

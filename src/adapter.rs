use crate::calc::{CalcError, SeriesResults, SeriesScorer};
use crate::series::Series;
use crate::system::ScoringSystem;
use std::collections::HashMap;

pub trait ScoringSystemProvider {
    fn system(&self, name: &str) -> Option<ScoringSystem>;
}

#[derive(Debug, Default, Clone)]
pub struct StaticSystemProvider {
    map: HashMap<String, ScoringSystem>,
}

impl StaticSystemProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, system: ScoringSystem) {
        self.map.insert(system.name.trim().to_ascii_uppercase(), system);
    }
}

impl ScoringSystemProvider for StaticSystemProvider {
    fn system(&self, name: &str) -> Option<ScoringSystem> {
        self.map.get(&name.trim().to_ascii_uppercase()).cloned()
    }
}

pub struct FnSystemProvider<F> {
    lookup: F,
}

impl<F> FnSystemProvider<F> {
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }
}

impl<F> ScoringSystemProvider for FnSystemProvider<F>
where
    F: Fn(&str) -> Option<ScoringSystem>,
{
    fn system(&self, name: &str) -> Option<ScoringSystem> {
        (self.lookup)(name)
    }
}

pub fn recalculate_with(
    provider: &dyn ScoringSystemProvider,
    system_name: &str,
    series: &Series,
) -> Result<SeriesResults, CalcError> {
    let system = provider.system(system_name).ok_or_else(|| {
        CalcError::Configuration(format!("unknown scoring system {}", system_name))
    })?;
    SeriesScorer::new(system)?.calculate(series)
}

//! Symbol universe evaluated on each run.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseMember {
    pub symbol: String,
    pub sector: Option<String>,
}

impl UniverseMember {
    pub fn new(symbol: &str, sector: Option<&str>) -> Self {
        UniverseMember {
            symbol: symbol.to_string(),
            sector: sector.map(String::from),
        }
    }

    /// Sector used for exposure accounting; unclassified symbols share "".
    pub fn sector_key(&self) -> &str {
        self.sector.as_deref().unwrap_or("")
    }
}

/// Drop the reference instrument and duplicate symbols, keeping first
/// occurrence order.
pub fn tradable(members: Vec<UniverseMember>, reference_symbol: &str) -> Vec<UniverseMember> {
    let mut seen = std::collections::HashSet::new();
    members
        .into_iter()
        .filter(|m| m.symbol != reference_symbol)
        .filter(|m| seen.insert(m.symbol.clone()))
        .collect()
}

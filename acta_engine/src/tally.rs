use log::debug;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

use crate::acta::{Party, VoteEntry, BLANCO, NULO};
use crate::config::Organization;

// ******** Output data structures *********

/// Preferential votes received by the candidates of one party.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
pub struct PreferentialRow {
    /// `counts[i]` is the number of preferential votes for candidate `i + 1`.
    pub counts: Vec<u64>,
    pub total: u64,
}

impl PreferentialRow {
    fn empty(max_preferential: u32) -> PreferentialRow {
        PreferentialRow {
            counts: vec![0; max_preferential as usize],
            total: 0,
        }
    }

    /// Votes for candidate number `candidate` (1-based). Zero outside of the matrix.
    pub fn candidate(&self, candidate: u32) -> u64 {
        match candidate {
            0 => 0,
            c => self.counts.get((c - 1) as usize).cloned().unwrap_or(0),
        }
    }

    fn record(&mut self, candidate: Option<u32>) {
        if let Some(c) = candidate {
            if c >= 1 && (c as usize) <= self.counts.len() {
                self.counts[(c - 1) as usize] += 1;
                self.total += 1;
            }
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy, Serialize)]
pub struct TallyStatistics {
    #[serde(rename = "totalValidVotes")]
    pub total_valid_votes: u64,
    #[serde(rename = "blankAndNull")]
    pub blank_and_null: u64,
    #[serde(rename = "totalVotersWhoVoted")]
    pub total_voters_who_voted: u64,
    #[serde(rename = "totalElectores")]
    pub total_electores: u32,
    /// Percentage in `[0, 100]` when the entries do not exceed the electores.
    #[serde(rename = "participationRate")]
    pub participation_rate: f64,
    #[serde(rename = "absenteeismRate")]
    pub absenteeism_rate: f64,
}

#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct TallyReport {
    /// Votes per party, in the order of the configured organizations. Parties
    /// outside of the configuration come last, in order of first appearance.
    #[serde(rename = "voteCount", serialize_with = "serialize_in_order")]
    pub vote_count: Vec<(String, u64)>,
    /// One row per configured party. BLANCO and NULO rows stay at zero.
    #[serde(rename = "preferentialMatrix", serialize_with = "serialize_in_order")]
    pub preferential_matrix: Vec<(String, PreferentialRow)>,
    pub statistics: TallyStatistics,
}

/// Writes party-keyed pairs as an object, keeping their order.
#[allow(clippy::ptr_arg)]
fn serialize_in_order<S: Serializer, V: Serialize>(
    pairs: &Vec<(String, V)>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(pairs.iter().map(|(party, value)| (party, value)))
}

impl TallyReport {
    pub fn votes_for(&self, party: &str) -> u64 {
        self.vote_count
            .iter()
            .find(|(p, _)| p == party)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    pub fn preferential_for(&self, party: &str) -> Option<&PreferentialRow> {
        self.preferential_matrix
            .iter()
            .find(|(p, _)| p == party)
            .map(|(_, row)| row)
    }

    pub fn total_votes(&self) -> u64 {
        self.vote_count.iter().map(|(_, c)| *c).sum()
    }
}

/// Aggregates the entries of an acta.
///
/// Arguments:
/// * `entries` the recorded votes, in ballot order
/// * `organizations` the parties to report on, BLANCO and NULO included
/// * `max_preferential` the number of candidates in the preferential matrix
/// * `total_electores` the electores of the mesa, for the participation rate
pub fn tally_entries(
    entries: &[VoteEntry],
    organizations: &[Organization],
    max_preferential: u32,
    total_electores: u32,
) -> TallyReport {
    debug!(
        "tally_entries: {} entries, {} organizations, {} candidates",
        entries.len(),
        organizations.len(),
        max_preferential
    );

    // Seed every configured party so that parties without votes still appear.
    let mut vote_count: Vec<(String, u64)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut preferential_matrix: Vec<(String, PreferentialRow)> = Vec::new();
    let mut rows: HashMap<String, usize> = HashMap::new();
    for org in organizations.iter() {
        if positions.contains_key(&org.key) {
            continue;
        }
        positions.insert(org.key.clone(), vote_count.len());
        vote_count.push((org.key.clone(), 0));
        let row = if org.is_special() {
            PreferentialRow::empty(0)
        } else {
            rows.insert(org.key.clone(), preferential_matrix.len());
            PreferentialRow::empty(max_preferential)
        };
        preferential_matrix.push((org.key.clone(), row));
    }

    for e in entries.iter() {
        let key = e.party.key();
        match positions.get(key) {
            Some(idx) => vote_count[*idx].1 += 1,
            None => {
                positions.insert(key.to_string(), vote_count.len());
                vote_count.push((key.to_string(), 1));
            }
        }
        if let Some(idx) = rows.get(key) {
            let row = &mut preferential_matrix[*idx].1;
            row.record(e.preferential_vote1);
            row.record(e.preferential_vote2);
        }
    }

    let statistics = compute_statistics(&vote_count, total_electores);
    TallyReport {
        vote_count,
        preferential_matrix,
        statistics,
    }
}

fn compute_statistics(vote_count: &[(String, u64)], total_electores: u32) -> TallyStatistics {
    let special = |key: &str| Party::from(key).is_special();
    let total_valid_votes: u64 = vote_count
        .iter()
        .filter(|(p, _)| !special(p))
        .map(|(_, c)| *c)
        .sum();
    let count_of = |key: &str| {
        vote_count
            .iter()
            .filter(|(p, _)| p == key)
            .map(|(_, c)| *c)
            .sum::<u64>()
    };
    let blank_and_null = count_of(BLANCO) + count_of(NULO);
    let total_voters_who_voted = total_valid_votes + blank_and_null;
    let participation_rate = if total_electores > 0 {
        total_voters_who_voted as f64 / total_electores as f64 * 100.0
    } else {
        0.0
    };
    TallyStatistics {
        total_valid_votes,
        blank_and_null,
        total_voters_who_voted,
        total_electores,
        participation_rate,
        absenteeism_rate: 100.0 - participation_rate,
    }
}

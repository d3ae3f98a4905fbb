use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{
    common::{
        candidate::CandidateStatus,
        election::{CandidateId, ElectionId, Phase},
    },
    db::{Candidate, Vote},
};

/// One approved candidate's share of the vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate_id: CandidateId,
    pub full_name: String,
    pub party: Option<String>,
    pub votes: u64,
    /// Share of all votes cast in the election, to two decimal places.
    pub percentage: f64,
}

/// The tally of an election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ElectionId,
    pub phase: Option<Phase>,
    pub total_votes: u64,
    /// Most votes first, ties broken by name.
    pub candidates: Vec<CandidateResult>,
}

impl ElectionResults {
    /// Count `votes` for each approved candidate.
    pub fn tally(
        election_id: ElectionId,
        phase: Option<Phase>,
        candidates: &[Candidate],
        votes: &[Vote],
    ) -> Self {
        let mut counts: HashMap<CandidateId, u64> = HashMap::new();
        for vote in votes.iter().filter(|v| v.election_id == election_id) {
            *counts.entry(vote.candidate_id).or_default() += 1;
        }
        let total_votes = counts.values().sum();

        let mut results: Vec<_> = candidates
            .iter()
            .filter(|c| c.election_id == election_id && c.status == CandidateStatus::Approved)
            .map(|c| {
                let votes = counts.get(&c.id).copied().unwrap_or_default();
                CandidateResult {
                    candidate_id: c.id,
                    full_name: c.full_name.clone(),
                    party: c.party.clone(),
                    votes,
                    percentage: percentage(votes, total_votes),
                }
            })
            .collect();
        results.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });

        Self {
            election_id,
            phase,
            total_votes,
            candidates: results,
        }
    }
}

fn percentage(votes: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (votes as f64 * 10_000.0 / total as f64).round() / 100.0
}

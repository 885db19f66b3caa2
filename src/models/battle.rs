use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Verdict;

/// One side of a versus battle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contender {
    pub tmdb_id: i64,
    pub title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub tmdb_vote_average: Option<f64>,
    pub verdict: Option<Verdict>,
    pub imdb_score: Option<f64>,
}

/// Outcome of an AI-judged 1v1 battle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BattleResult {
    pub winner_id: i64,
    pub loser_id: i64,
    pub winner_title: String,
    pub loser_title: String,
    pub kill_reason: String,
    pub breakdown: String,
    pub winner_headline: String,
    pub loser_headline: String,
    pub movie_a: Contender,
    pub movie_b: Contender,
}

impl BattleResult {
    /// Battles are cached per unordered pair; this key is the same either way round
    pub fn pair_key(a: i64, b: i64) -> (i64, i64) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Returns the result with `movie_a` being the requested first contender
    pub fn oriented(mut self, movie_a_id: i64) -> Self {
        if self.movie_a.tmdb_id != movie_a_id && self.movie_b.tmdb_id == movie_a_id {
            std::mem::swap(&mut self.movie_a, &mut self.movie_b);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contender(tmdb_id: i64, title: &str) -> Contender {
        Contender {
            tmdb_id,
            title: title.to_string(),
            poster_path: None,
            backdrop_path: None,
            release_date: None,
            tmdb_vote_average: None,
            verdict: None,
            imdb_score: None,
        }
    }

    fn result() -> BattleResult {
        BattleResult {
            winner_id: 1,
            loser_id: 2,
            winner_title: "Alien".to_string(),
            loser_title: "Aliens".to_string(),
            kill_reason: "In space no one can hear you lose.".to_string(),
            breakdown: "...".to_string(),
            winner_headline: "Flawless Victory".to_string(),
            loser_headline: "Still A Classic".to_string(),
            movie_a: contender(1, "Alien"),
            movie_b: contender(2, "Aliens"),
        }
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(BattleResult::pair_key(9, 3), (3, 9));
        assert_eq!(BattleResult::pair_key(3, 9), (3, 9));
    }

    #[test]
    fn test_oriented_swaps_when_requested_in_reverse() {
        let flipped = result().oriented(2);
        assert_eq!(flipped.movie_a.tmdb_id, 2);
        assert_eq!(flipped.movie_b.tmdb_id, 1);
        assert_eq!(flipped.winner_id, 1);
    }

    #[test]
    fn test_oriented_keeps_matching_order() {
        let same = result().oriented(1);
        assert_eq!(same.movie_a.tmdb_id, 1);
    }
}

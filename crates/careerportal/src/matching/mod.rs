//! Counsellor auto-assignment by interest/specialization keyword overlap.

mod keywords;

use keywords::keywords_for;

use serde::Serialize;
use std::cmp::Ordering;

/// Points for an interest found inside the specialization text.
const DIRECT_MATCH_SCORE: u32 = 2;
/// Points for an interest containing one of the specialization category's keywords.
const KEYWORD_MATCH_SCORE: u32 = 1;

/// The subset of a counsellor that matching looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct CounsellorProfile {
    pub id: i64,
    pub specialization: String,
    pub rating: f64,
}

/// Outcome of a matching run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounsellorMatch {
    pub counsellor_id: i64,
    pub score: u32,
    /// True if nobody scored and the highest rated counsellor was picked.
    pub by_rating: bool,
}

/// Splits a comma-separated interest list into trimmed, lower-cased tokens.
pub fn normalize_interests(interests: &str) -> Vec<String> {
    interests
        .split(',')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Scores one counsellor against normalized interest tokens.
pub fn score(specialization: &str, interests: &[String]) -> u32 {
    let specialization = specialization.trim().to_lowercase();
    let category_keywords = keywords_for(&specialization);

    interests
        .iter()
        .map(|interest| {
            if specialization.contains(interest.as_str()) {
                DIRECT_MATCH_SCORE
            } else if category_keywords
                .is_some_and(|keywords| keywords.iter().any(|k| interest.contains(k)))
            {
                KEYWORD_MATCH_SCORE
            } else {
                0
            }
        })
        .sum()
}

/// Picks the best counsellor for a student's interests.
///
/// `available` must already be filtered to available counsellors and ordered by
/// id ascending. The strictly highest score wins, so on a tie the earliest
/// (lowest id) counsellor is kept. If nobody scores, the highest rated
/// counsellor is returned, again preferring the lowest id on a tie.
pub fn best_match(interests: &str, available: &[CounsellorProfile]) -> Option<CounsellorMatch> {
    let tokens = normalize_interests(interests);

    let mut best: Option<CounsellorMatch> = None;
    for counsellor in available {
        let s = score(&counsellor.specialization, &tokens);
        if s > best.map_or(0, |b| b.score) {
            best = Some(CounsellorMatch {
                counsellor_id: counsellor.id,
                score: s,
                by_rating: false,
            });
        }
    }

    best.or_else(|| {
        available
            .iter()
            .reduce(|top, c| {
                match c.rating.partial_cmp(&top.rating).unwrap_or(Ordering::Equal) {
                    Ordering::Greater => c,
                    Ordering::Equal if c.id < top.id => c,
                    _ => top,
                }
            })
            .map(|c| CounsellorMatch {
                counsellor_id: c.id,
                score: 0,
                by_rating: true,
            })
    })
}

/// Returns the id of the counsellor to assign, or `None` if nobody is available.
pub fn assign_counsellor(interests: &str, available: &[CounsellorProfile]) -> Option<i64> {
    best_match(interests, available).map(|m| m.counsellor_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counsellor(id: i64, specialization: &str, rating: f64) -> CounsellorProfile {
        CounsellorProfile {
            id,
            specialization: specialization.to_string(),
            rating,
        }
    }

    #[test]
    fn test_normalize_interests() {
        assert_eq!(
            normalize_interests(" Technology, MUSIC ,, "),
            vec!["technology".to_string(), "music".to_string()]
        );
        assert!(normalize_interests("").is_empty());
    }

    #[test]
    fn test_direct_match_scores_two() {
        let tokens = normalize_interests("technology, music");
        assert_eq!(score("Technology", &tokens), 2);
    }

    #[test]
    fn test_keyword_match_scores_one() {
        let tokens = normalize_interests("software development");
        assert_eq!(score("Technology", &tokens), 1);
    }

    #[test]
    fn test_keywords_need_exact_category_name() {
        // "Technology, Business" is not a category name, so only direct matches count
        let tokens = normalize_interests("software");
        assert_eq!(score("Technology, Business", &tokens), 0);
        let tokens = normalize_interests("business");
        assert_eq!(score("Technology, Business", &tokens), 2);
    }

    #[test]
    fn test_no_counsellors_yields_none() {
        assert_eq!(assign_counsellor("technology", &[]), None);
    }

    #[test]
    fn test_highest_score_wins() {
        let available = vec![
            counsellor(1, "Law", 4.9),
            counsellor(2, "Technology", 3.0),
            counsellor(3, "Arts", 4.0),
        ];
        let m = best_match("technology, programming", &available).unwrap();
        assert_eq!(m.counsellor_id, 2);
        assert_eq!(m.score, 3);
        assert!(!m.by_rating);
    }

    #[test]
    fn test_tie_keeps_first_counsellor() {
        let available = vec![
            counsellor(4, "Technology", 1.0),
            counsellor(7, "technology", 5.0),
        ];
        assert_eq!(assign_counsellor("technology", &available), Some(4));
    }

    #[test]
    fn test_falls_back_to_highest_rating() {
        let available = vec![
            counsellor(1, "Law", 3.5),
            counsellor(2, "Healthcare", 4.5),
            counsellor(3, "Arts", 4.5),
        ];
        let m = best_match("astronomy", &available).unwrap();
        assert_eq!(m.counsellor_id, 2);
        assert!(m.by_rating);
    }

    #[test]
    fn test_empty_interests_fall_back() {
        let available = vec![counsellor(5, "Science", 2.0), counsellor(6, "Law", 2.5)];
        assert_eq!(assign_counsellor("", &available), Some(6));
    }

    #[test]
    fn test_direct_match_property() {
        let available = vec![
            counsellor(1, "Business", 5.0),
            counsellor(2, "Career planning and civil engineering", 1.0),
        ];
        // "civil engineering" is a literal substring of counsellor 2's specialization
        let m = best_match("cooking, civil engineering", &available).unwrap();
        assert_eq!(m.counsellor_id, 2);
        assert!(m.score >= 2);
    }
}

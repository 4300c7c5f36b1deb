use super::model::SearchConfig;
use super::{CLUSTER_COUNT, MAX_RELATED, TREND_MONTHS};
use chrono::{Datelike, Local, NaiveDate};

/// Builds the instruction sent to the model for one submission.
pub fn build_prompt(config: &SearchConfig) -> String {
    build_prompt_at(config, Local::now().date_naive())
}

pub(crate) fn build_prompt_at(config: &SearchConfig, today: NaiveDate) -> String {
    let year = today.year();
    let mut prompt = format!(
        "Perform a high-precision SEO keyword analysis for the query: \"{query}\" on the platform \"{platform}\" \
         for the region \"{country}\" (Language: {language}).\n\
         Today's date is {today}.\n\n\
         DATA REQUIREMENTS:\n\
         1. Estimate current monthly search volume for the {prev}-{year} period.\n\
         2. Provide an estimated CPC in USD and a competition score between 0 and 1.\n\
         3. Classify search intent as exactly one of: Informational, Transactional, Commercial, Navigational.\n\
         4. Generate exactly {months} monthly trend data points (historical and predicted), labelled like \"Jan {year}\".\n\
         5. Identify up to {related} highly relevant long-tail variations, each with its own volume, cpc, competition and intent.\n\
         6. Create exactly {clusters} topical authority clusters (groups of related keywords for content siloing).\n\
         7. If this is a local search (contains \"near me\", \"in [City]\", etc.), factor in the specific geography.\n\
         8. Provide a concise 2-sentence SEO strategy summary.\n\
         9. Score how relevant the keyword is on comparable platforms in platformComparison, and give an overall confidenceScore between 0 and 1.",
        query = config.query.trim(),
        platform = config.platform,
        country = config.country,
        language = config.language,
        today = today.format("%Y-%m-%d"),
        prev = year - 1,
        months = TREND_MONTHS,
        related = MAX_RELATED,
        clusters = CLUSTER_COUNT,
    );

    if looks_local(&config.query) {
        prompt.push_str(&format!(
            "\n\nThis query has local intent. Estimate volumes for searchers located in {} rather than national totals.",
            config.country
        ));
    }
    if let Some(point) = config.location {
        prompt.push_str(&format!(
            "\n\nThe searcher is near latitude {:.4}, longitude {:.4}.",
            point.lat, point.lng
        ));
    }

    prompt.push_str("\n\nReturn a strictly valid JSON object following the provided schema.");
    prompt
}

const QUESTION_LEADS: &[&str] = &[
    "should", "how", "what", "why", "when", "which", "who", "is", "are", "can", "do", "does",
];
// "invest in Tesla" names a company, not a place
const NON_PLACE_LEADS: &[&str] = &[
    "invest", "investing", "interested", "believe", "trust", "stock", "stocks", "shares", "made",
    "written", "built", "log", "sign",
];
const MAX_PLACE_WORDS: usize = 3;

/// Cheap check for queries that only make sense relative to a place.
pub fn looks_local(query: &str) -> bool {
    let lower = query.to_lowercase();
    let phrases = ["near me", "nearby", "near by", "close to me", "around me", "open now", "closest"];
    if phrases.iter().any(|p| lower.contains(p)) {
        return true;
    }

    // "plumber in Denver": the query ends with "in" and a short capitalized place name
    let words: Vec<&str> = query.split_whitespace().collect();
    let Some(first) = words.first() else { return false };
    if QUESTION_LEADS.contains(&first.to_lowercase().as_str()) {
        return false;
    }
    let Some(at) = words.iter().rposition(|w| w.eq_ignore_ascii_case("in")) else { return false };
    let place = &words[at + 1..];
    let lead = at.checked_sub(1).map(|i| words[i].to_lowercase());

    !place.is_empty()
        && place.len() <= MAX_PLACE_WORDS
        && place.iter().all(|w| w.chars().next().is_some_and(char::is_uppercase))
        && !lead.is_some_and(|l| NON_PLACE_LEADS.contains(&l.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::model::Platform;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn prompt_embeds_config_and_requirements() {
        let config = SearchConfig::new("best running shoes")
            .platform(Platform::Amazon)
            .country("GB")
            .language("en");
        let prompt = build_prompt_at(&config, day());

        assert!(prompt.contains("\"best running shoes\""));
        assert!(prompt.contains("\"Amazon\""));
        assert!(prompt.contains("\"GB\""));
        assert!(prompt.contains("2024-2025"));
        assert!(prompt.contains("exactly 12 monthly trend"));
        assert!(prompt.contains("up to 12"));
        assert!(prompt.contains("exactly 3 topical"));
        assert!(prompt.contains("2-sentence"));
        assert!(!prompt.contains("local intent"));
        assert!(prompt.ends_with("following the provided schema."));
    }

    #[test]
    fn local_queries_get_geography_note() {
        let config = SearchConfig::new("pizza near me").country("IT");
        let prompt = build_prompt_at(&config, day());
        assert!(prompt.contains("searchers located in IT"));
    }

    #[test]
    fn coordinates_are_appended() {
        let config = SearchConfig::new("coffee").location(40.7128, -74.006);
        let prompt = build_prompt_at(&config, day());
        assert!(prompt.contains("latitude 40.7128, longitude -74.0060"));
    }

    #[test]
    fn local_detection() {
        assert!(looks_local("Dentist Near Me"));
        assert!(looks_local("plumber in Denver"));
        assert!(looks_local("pharmacy open now"));
        assert!(!looks_local("best running shoes"));
        assert!(looks_local("italian restaurant in New York"));
        assert!(!looks_local("what to invest in today"));
        assert!(!looks_local("should I invest in Tesla"));
        assert!(!looks_local("invest in Tesla stock"));
        assert!(!looks_local("invest in Tesla"));
        assert!(!looks_local("made in China electronics"));
        assert!(!looks_local("in"));
    }
}

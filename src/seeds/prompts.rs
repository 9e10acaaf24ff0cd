// Prompt text for the completion calls, kept in one place so wording can
// be tuned without touching the pipeline code.

use rand::Rng;

use crate::diversity::AvoidHints;
use crate::puzzles::DataSource;

/// FRED series with clear causal stories. The generation prompt is told
/// to pick from this list only, which keeps made-up series ids out.
pub const FRED_SERIES_EXAMPLES: [&str; 27] = [
    "UNRATE",
    "ICSA",
    "GDPC1",
    "GDP",
    "INDPRO",
    "RSXFS",
    "PAYEMS",
    "HOUST",
    "CIVPART",
    "FEDFUNDS",
    "CPIAUCSL",
    "M2SL",
    "DSPIC96",
    "T10Y2Y",
    "TOTALSA",
    "PERMIT",
    "DCOILWTICO",
    "VIXCLS",
    "BAMLH0A0HYM2",
    "TEDRATE",
    "UMCSENT",
    "TCU",
    "CSUSHPISA",
    "PSAVERT",
    "MORTGAGE30US",
    "GDI",
    "A191RL1Q225SBEA",
];

/// NBER Macrohistory files as chapter/filename, no extension. Coverage
/// is mostly 1860s to 1940s.
pub const NBER_SERIES_EXAMPLES: [&str; 5] = [
    "01/a01005a",
    "01/a01001a",
    "02/a02001a",
    "03/a03001a",
    "04/a04031a",
];

/// Era suggestions rotated into the prompt to reduce repeated trends.
const ERA_SUGGESTIONS: [&str; 6] = [
    "Focus on the early 1980s (1980-1983): Volcker recession, inflation fighting.",
    "Focus on the early 1990s (1990-1992): 1990-1991 recession.",
    "Focus on 2000-2003: Dot-com bust, 2001 recession, 9/11 aftermath.",
    "Focus on 2007-2010: 2008 financial crisis, Great Recession, housing crash.",
    "Focus on 2011-2015: Eurozone crisis, oil price swings, taper tantrum.",
    "Focus on a specific policy or shock (e.g. oil crisis, Fed rate cycle) rather than the same events every time.",
];

const NBER_ERA_SUGGESTIONS: [&str; 5] = [
    "Focus on 1929-1933: Great Depression, stock market crash.",
    "Focus on 1893-1897: Panic of 1893 and aftermath.",
    "Focus on 1907-1908: Panic of 1907.",
    "Focus on 1914-1918: World War I.",
    "Focus on 1920-1921: Post-WWI recession.",
];

/// Few-shot examples shown to the model for output format only. The
/// prompt forbids copying their content.
pub const FEW_SHOT_SEEDS_JSON: &str = r#"[
  {
    "seriesId": "UNRATE",
    "startDate": "2020-01-01",
    "endDate": "2020-12-31",
    "correctEvent": "COVID-19 pandemic",
    "acceptableAnswers": ["covid", "covid-19", "coronavirus", "pandemic"],
    "explanation": "Lockdowns and layoffs in spring 2020 caused a sharp rise in unemployment.",
    "hints": [
      "Think about a major global disruption that began in early 2020.",
      "It led to widespread lockdowns and a sharp drop in economic activity.",
      "The event is often referred to by a short acronym or number.",
      "COVID-19 pandemic"
    ]
  },
  {
    "seriesId": "FEDFUNDS",
    "startDate": "2007-01-01",
    "endDate": "2009-12-31",
    "correctEvent": "2008 financial crisis",
    "acceptableAnswers": ["2008", "financial crisis", "recession", "fed", "rate cuts"],
    "explanation": "The Fed cut rates aggressively in response to the 2008 crisis.",
    "hints": [
      "Consider a major financial shock that peaked around 2008.",
      "Central banks responded by cutting interest rates sharply.",
      "It is often called the Great Recession or named after a year.",
      "2008 financial crisis"
    ]
  },
  {
    "source": "google_trends",
    "searchTerm": "toilet paper",
    "startDate": "2020-01-01",
    "endDate": "2020-06-30",
    "correctEvent": "COVID-19 pandemic",
    "acceptableAnswers": ["covid", "covid-19", "coronavirus", "pandemic", "panic buying"],
    "explanation": "Panic buying and stockpiling in early 2020 caused a spike in search interest for toilet paper.",
    "hints": [
      "Think about what people suddenly searched for in early 2020.",
      "Shortages and stockpiling drove interest in this everyday product.",
      "The event was a global health crisis with lockdowns.",
      "COVID-19 pandemic"
    ]
  },
  {
    "source": "nber",
    "seriesId": "01/a01005a",
    "startDate": "1929-01-01",
    "endDate": "1933-12-31",
    "correctEvent": "Great Depression",
    "acceptableAnswers": ["great depression", "1929", "stock market crash", "depression"],
    "explanation": "Crop production index fell during the Great Depression as demand and prices collapsed.",
    "hints": [
      "Consider a major global economic collapse that began in 1929.",
      "Agricultural and industrial output dropped sharply in the early 1930s.",
      "The event is often named after a year or a single word.",
      "Great Depression"
    ]
  }
]"#;

fn era_suggestion(source: DataSource) -> &'static str {
    let eras: &[&str] = match source {
        DataSource::Nber => &NBER_ERA_SUGGESTIONS,
        DataSource::Fred | DataSource::GoogleTrends => &ERA_SUGGESTIONS,
    };
    eras[rand::thread_rng().gen_range(0..eras.len())]
}

fn source_instruction(source: DataSource, releases: Option<&str>, era_hint: &str) -> String {
    match source {
        DataSource::Fred => {
            let discovery = match releases {
                Some(list) => format!(
                    "\n- OR discover a series instead of naming one: set \"fredDiscovery\": \"search\" \
                     with \"searchText\": <topic>, or \"fredDiscovery\": \"release\" with \
                     \"releaseId\": <id> from this list: {list}"
                ),
                None => String::new(),
            };
            format!(
                "You MUST output a FRED seed with \"source\": \"fred\".\n\
                 - seriesId: from this list ONLY: {}{discovery}\n\
                 - startDate, endDate: YYYY-MM-DD (must match the event's timeline)\n\
                 - correctEvent, acceptableAnswers (list), explanation, hints (array of 4 strings, increasingly obvious)\n\
                 \n\
                 Variety rules:\n\
                 - Pick a UNIQUE combination: do not repeat the same series + date range as the examples.\n\
                 - Prefer different events (e.g. 1980s recession, dot-com bust, 1990s recession, 2008 crisis) and vary the decade.\n\
                 - This time: {era_hint}",
                FRED_SERIES_EXAMPLES.join(", ")
            )
        }
        DataSource::Nber => format!(
            "You MUST output an NBER Macrohistory seed with \"source\": \"nber\".\n\
             - seriesId: from this list ONLY (format chapter/filename, e.g. 01/a01005a): {}\n\
             - startDate, endDate: YYYY-MM-DD (NBER data is mostly 1860s-1940s; pick a range within the series coverage)\n\
             - correctEvent, acceptableAnswers (list), explanation, hints (array of 4 strings, increasingly obvious)\n\
             \n\
             NBER data is historical (1800s-1940s). Pick a well-known causal event in that era, e.g.:\n\
             Panic of 1893, Panic of 1907, World War I, post-WWI recession, Great Depression (1929-1933), New Deal era, Dust Bowl.\n\
             - This time: {era_hint}",
            NBER_SERIES_EXAMPLES.join(", ")
        ),
        DataSource::GoogleTrends => format!(
            "You MUST output a Google Trends seed with \"source\": \"google_trends\".\n\
             - searchTerm: a phrase people actually search (e.g. \"bankruptcy\", \"foreclosure\", \"gold price\", \"oil crisis\", \"recession\", \"layoffs\")\n\
             - startDate, endDate: YYYY-MM-DD\n\
             - correctEvent, acceptableAnswers (list), explanation, hints (array of 4 strings, increasingly obvious)\n\
             \n\
             Variety rules:\n\
             - Pick a UNIQUE search term and event: do not repeat toilet paper, face mask, or COVID. Vary the decade and type of event.\n\
             - This time: {era_hint}"
        ),
    }
}

fn avoid_instruction(avoid: &AvoidHints) -> String {
    if avoid.is_empty() {
        return String::new();
    }
    let mut text = String::from("\n\nSession constraint:");
    if !avoid.intervals.is_empty() {
        let ranges: Vec<String> = avoid
            .intervals
            .iter()
            .map(|(start, end)| format!("{start} to {end}"))
            .collect();
        text.push_str(&format!(
            " This session has already shown puzzles covering these date ranges: {}. \
             You MUST pick a startDate and endDate that do not overlap any of them.",
            ranges.join("; ")
        ));
    }
    if !avoid.metric_keys.is_empty() {
        text.push_str(&format!(
            " These series/search terms were already used and MUST NOT be repeated: {}.",
            avoid.metric_keys.join(", ")
        ));
    }
    text
}

/// Build the seed-generation prompt for one source. `releases` is an
/// optional "id: name" listing of FRED releases for indirect discovery.
pub fn build_seed_prompt(source: DataSource, releases: Option<&str>, avoid: &AvoidHints) -> String {
    let era_hint = era_suggestion(source);
    format!(
        "You are creating a single \"causal guessr\" puzzle: a time-series chart where the player \
         must guess what real-world event caused the trend. They get 4 guesses and a hint after \
         each wrong guess. Do not give away the answer until the 4th hint.\n\
         \n\
         {}{}\n\
         \n\
         Output exactly one JSON object with the required keys. No other text, no markdown, no code block.\n\
         Examples (format only; do not copy content; pick different series/terms, dates, and events):\n\
         {}\n\
         \n\
         Reply with only the JSON object.",
        source_instruction(source, releases, era_hint),
        avoid_instruction(avoid),
        FEW_SHOT_SEEDS_JSON
    )
}

/// Build the yes/no prompt asking whether a guess means the same thing
/// as the correct answer.
pub fn build_guess_prompt(guess: &str, correct_event: &str, other_acceptable: &str) -> String {
    format!(
        "The correct answer for this puzzle is: \"{correct_event}\".\n\
         Other acceptable answers include: {other_acceptable}.\n\
         \n\
         The user guessed: \"{guess}\"\n\
         \n\
         Is the user's guess correct? (Same event, same meaning, or an equivalent way to say the correct answer.)\n\
         Reply with ONLY the word true or false, nothing else."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::RawSeed;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_few_shot_examples_parse_as_raw_seeds() {
        let seeds: Vec<RawSeed> = serde_json::from_str(FEW_SHOT_SEEDS_JSON).unwrap();
        assert_eq!(seeds.len(), 4);
        assert_eq!(seeds[0].series_id.as_deref(), Some("UNRATE"));
        assert_eq!(seeds[2].search_term.as_deref(), Some("toilet paper"));
        assert_eq!(seeds[3].source.as_deref(), Some("nber"));
    }

    #[test]
    fn test_fred_prompt_names_series_and_format() {
        let prompt = build_seed_prompt(DataSource::Fred, None, &AvoidHints::default());
        assert!(prompt.contains("\"source\": \"fred\""));
        assert!(prompt.contains("UNRATE"));
        assert!(prompt.contains("Reply with only the JSON object."));
        assert!(!prompt.contains("Session constraint"));
        assert!(!prompt.contains("fredDiscovery"));
    }

    #[test]
    fn test_fred_prompt_offers_discovery_when_releases_known() {
        let prompt = build_seed_prompt(
            DataSource::Fred,
            Some("175: Gross Domestic Product, 53: Employment Situation"),
            &AvoidHints::default(),
        );
        assert!(prompt.contains("fredDiscovery"));
        assert!(prompt.contains("175: Gross Domestic Product"));
    }

    #[test]
    fn test_trends_and_nber_prompts_name_their_keys() {
        let prompt = build_seed_prompt(DataSource::GoogleTrends, None, &AvoidHints::default());
        assert!(prompt.contains("searchTerm"));
        assert!(prompt.contains("\"source\": \"google_trends\""));

        let prompt = build_seed_prompt(DataSource::Nber, None, &AvoidHints::default());
        assert!(prompt.contains("01/a01005a"));
        assert!(prompt.contains("\"source\": \"nber\""));
    }

    #[test]
    fn test_avoid_block_lists_session_history() {
        let avoid = AvoidHints {
            intervals: vec![(date("2020-01-01"), date("2020-12-31"))],
            metric_keys: vec!["fred:unrate".into()],
        };
        let prompt = build_seed_prompt(DataSource::Fred, None, &avoid);
        assert!(prompt.contains("Session constraint"));
        assert!(prompt.contains("2020-01-01 to 2020-12-31"));
        assert!(prompt.contains("fred:unrate"));
    }

    #[test]
    fn test_guess_prompt_quotes_guess_and_answer() {
        let prompt = build_guess_prompt("the covid recession", "COVID-19 pandemic", "covid, pandemic");
        assert!(prompt.contains("\"the covid recession\""));
        assert!(prompt.contains("\"COVID-19 pandemic\""));
        assert!(prompt.contains("covid, pandemic"));
        assert!(prompt.contains("ONLY the word true or false"));
    }
}

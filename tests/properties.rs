use content_audit::SIMILARITY_THRESHOLD;
use content_audit::processing::features::extract_features;
use content_audit::processing::similarity::rank_matches;
use proptest::prelude::*;

proptest! {
    #[test]
    fn thin_flag_follows_word_count(words in prop::collection::vec("[a-z]{1,12}", 1..1200)) {
        let text = words.join(" ");
        let features = extract_features(&text).expect("non-empty text has features");
        prop_assert_eq!(features.word_count, words.len());
        prop_assert_eq!(features.is_thin(), words.len() < 500);
    }

    #[test]
    fn readability_is_a_pure_function(text in "[a-z]{1,10}( [a-z]{1,10}){0,40}(\\. [a-z]{1,10}( [a-z]{1,10}){0,10}){0,5}") {
        let first = extract_features(&text).expect("features");
        let second = extract_features(&text).expect("features");
        prop_assert_eq!(first.readability.to_bits(), second.readability.to_bits());
        prop_assert_eq!(first.sentence_count, second.sentence_count);
    }

    #[test]
    fn ranked_matches_are_sorted_filtered_and_exclude_self(
        scores in prop::collection::vec(-1.0f32..=1.0, 0..64),
        self_idx in any::<prop::sample::Index>(),
    ) {
        let urls: Vec<String> = (0..scores.len())
            .map(|i| format!("https://corpus.example/{i}"))
            .collect();
        let query_url = if urls.is_empty() {
            "https://site.example/query".to_string()
        } else {
            urls[self_idx.index(urls.len())].clone()
        };

        let matches = rank_matches(&urls, &scores, &query_url);

        for pair in matches.windows(2) {
            prop_assert!(pair[0].similarity >= pair[1].similarity);
        }
        for found in &matches {
            prop_assert!(found.similarity > SIMILARITY_THRESHOLD);
            prop_assert_ne!(&found.url, &query_url);
        }
        let expected = scores
            .iter()
            .zip(&urls)
            .filter(|(score, url)| **score > SIMILARITY_THRESHOLD && **url != query_url)
            .count();
        prop_assert_eq!(matches.len(), expected);
    }
}

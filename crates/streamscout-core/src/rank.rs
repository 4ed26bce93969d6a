//! Candidate deduplication and ranking

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::types::StreamCandidate;

/// Collapses duplicate URLs, keeping the first-discovered entry
pub fn dedup(candidates: Vec<StreamCandidate>) -> Vec<StreamCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect()
}

/// Numeric height from a quality label ("1080p" → 1080, "4K" → 2160)
///
/// `None` for "auto" and anything unparseable.
pub fn quality_height(label: &str) -> Option<u32> {
    let label = label.trim().to_ascii_lowercase();
    if label == "4k" || label == "uhd" {
        return Some(2160);
    }

    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u32>().ok().filter(|h| *h > 0)
}

/// Sorts candidates by preference
///
/// Container order is `hls > mp4 > webm > dash > unknown`; within a
/// container, higher quality first and "auto" last. The sort is stable, so
/// discovery order breaks remaining ties.
pub fn rank(mut candidates: Vec<StreamCandidate>) -> Vec<StreamCandidate> {
    candidates.sort_by_key(|c| (c.container_type, Reverse(quality_height(&c.quality_label))));
    candidates
}

/// Deduplicates, then ranks
pub fn dedup_and_rank(candidates: Vec<StreamCandidate>) -> Vec<StreamCandidate> {
    rank(dedup(candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContainerType;
    use proptest::prelude::*;

    fn candidate(url: &str, container: ContainerType, quality: Option<&str>, provider: &str) -> StreamCandidate {
        StreamCandidate::new(url, container, quality, provider, "https://embed.example/e/1")
            .expect("valid candidate")
    }

    #[test]
    fn test_ranking_order_by_container() {
        let ranked = rank(vec![
            candidate("https://a.example/1", ContainerType::Unknown, None, "t"),
            candidate("https://a.example/2.mp4", ContainerType::Mp4, None, "t"),
            candidate("https://a.example/3.m3u8", ContainerType::Hls, None, "t"),
            candidate("https://a.example/4.webm", ContainerType::Webm, None, "t"),
        ]);

        let order: Vec<ContainerType> = ranked.iter().map(|c| c.container_type).collect();
        assert_eq!(
            order,
            vec![
                ContainerType::Hls,
                ContainerType::Mp4,
                ContainerType::Webm,
                ContainerType::Unknown,
            ]
        );
    }

    #[test]
    fn test_quality_tie_break() {
        let ranked = rank(vec![
            candidate("https://a.example/480.m3u8", ContainerType::Hls, Some("480p"), "t"),
            candidate("https://a.example/1080.m3u8", ContainerType::Hls, Some("1080p"), "t"),
        ]);
        assert_eq!(ranked[0].quality_label, "1080p");
        assert_eq!(ranked[1].quality_label, "480p");
    }

    #[test]
    fn test_auto_sorts_last_within_container() {
        let ranked = rank(vec![
            candidate("https://a.example/auto.mp4", ContainerType::Mp4, None, "t"),
            candidate("https://a.example/360.mp4", ContainerType::Mp4, Some("360p"), "t"),
        ]);
        assert_eq!(ranked[0].quality_label, "360p");
        assert_eq!(ranked[1].quality_label, "auto");
    }

    #[test]
    fn test_dedup_keeps_first_discovered() {
        let deduped = dedup(vec![
            candidate("https://a.example/v.m3u8", ContainerType::Hls, Some("720p"), "live_capture"),
            candidate("https://a.example/other.mp4", ContainerType::Mp4, None, "scan"),
            candidate("https://a.example/v.m3u8", ContainerType::Hls, Some("1080p"), "raw_embed_scan"),
        ]);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].source_provider, "live_capture");
        assert_eq!(deduped[0].quality_label, "720p");
    }

    #[test]
    fn test_quality_height() {
        assert_eq!(quality_height("1080p"), Some(1080));
        assert_eq!(quality_height("720"), Some(720));
        assert_eq!(quality_height("4K"), Some(2160));
        assert_eq!(quality_height("auto"), None);
        assert_eq!(quality_height("HD"), None);
        assert_eq!(quality_height(""), None);
    }

    fn arb_container() -> impl Strategy<Value = ContainerType> {
        prop_oneof![
            Just(ContainerType::Hls),
            Just(ContainerType::Mp4),
            Just(ContainerType::Webm),
            Just(ContainerType::Dash),
            Just(ContainerType::Unknown),
        ]
    }

    proptest! {
        #[test]
        fn test_dedup_and_rank_unique_urls(
            entries in proptest::collection::vec((0u8..6, arb_container(), prop_oneof![Just("auto"), Just("480p"), Just("1080p")]), 0..20)
        ) {
            let input: Vec<StreamCandidate> = entries
                .iter()
                .map(|(n, ct, q)| candidate(&format!("https://a.example/{n}"), *ct, Some(q), "t"))
                .collect();
            let distinct: HashSet<String> = input.iter().map(|c| c.url.clone()).collect();

            let output = dedup_and_rank(input);
            prop_assert_eq!(output.len(), distinct.len());

            for pair in output.windows(2) {
                prop_assert!(pair[0].container_type <= pair[1].container_type);
            }
        }
    }
}

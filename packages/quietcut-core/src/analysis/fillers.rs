//! Tier-gated filler-word detection over transcript segments.
//!
//! The lexicon is fixed and partitioned by how strong a disfluency signal
//! each token carries. The caller's sensitivity scalar gates which tiers are
//! admitted; it also scales the per-word confidence bar (`sensitivity * 0.5`,
//! looser than the silence threshold because word confidences are noisy).

use serde::{Deserialize, Serialize};

use crate::constants::DUPLICATE_WORD_GAP_MS;
use crate::transcript::TranscriptSegment;

/// Core disfluencies, admitted at any sensitivity.
const TIER_CORE: &[&str] = &["euh", "heu", "euuh", "heuuh", "hum", "hmm", "mmmh"];

/// Hesitation interjections, admitted at sensitivity >= 0.5.
const TIER_MEDIUM: &[&str] = &["ben", "bah", "bof", "ah", "aah", "oh", "ooh"];

/// Weak verbal tics, admitted at sensitivity >= 0.7.
const TIER_WEAK: &[&str] = &[
    "en fait",
    "du coup",
    "genre",
    "tu vois",
    "c'est-à-dire",
    "enfin bon",
    "bon ben",
];

/// Sensitivity floor for [`TIER_MEDIUM`].
const TIER_MEDIUM_FLOOR: f64 = 0.5;

/// Sensitivity floor for [`TIER_WEAK`].
const TIER_WEAK_FLOOR: f64 = 0.7;

/// A detected filler occurrence. Produced here, consumed once by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillerHit {
    /// The matched token in its normalized form.
    pub word: String,
    /// Start of the removable span, seconds.
    pub start_s: f64,
    /// End of the removable span, seconds.
    pub end_s: f64,
    /// Confidence of the match in `[0, 1]` (minimum over matched words).
    pub confidence: f64,
}

/// Result of a detection pass.
#[derive(Debug, Clone, Default)]
pub struct FillerScan {
    /// Hits, sorted by start time and de-duplicated.
    pub hits: Vec<FillerHit>,
    /// True when at least one segment carried no word-level timings; the
    /// orchestrator surfaces this as a warning (timings are never fabricated).
    pub missing_word_timings: bool,
}

/// Detects filler occurrences across transcript segments.
pub fn detect(segments: &[TranscriptSegment], sensitivity: f64) -> FillerScan {
    let sensitivity = sensitivity.clamp(0.0, 1.0);
    let admitted = admitted_lexicon(sensitivity);
    let confidence_bar = sensitivity * 0.5;

    let mut scan = FillerScan::default();

    for segment in segments {
        match &segment.words {
            Some(words) if !words.is_empty() => {
                scan_words(words, &admitted, confidence_bar, &mut scan.hits);
            }
            _ => {
                scan.missing_word_timings = true;
                // Without word timings only an exact whole-segment match can
                // produce an interval (the parent segment's own bounds).
                let norm = normalize(&segment.text);
                if admitted.iter().any(|entry| *entry == norm) && segment.end_s > segment.start_s {
                    scan.hits.push(FillerHit {
                        word: norm,
                        start_s: segment.start_s,
                        end_s: segment.end_s,
                        confidence: 1.0,
                    });
                }
            }
        }
    }

    scan.hits.sort_by(|a, b| {
        a.start_s
            .partial_cmp(&b.start_s)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scan.hits
        .dedup_by(|a, b| a.start_s == b.start_s && a.end_s == b.end_s);
    scan
}

/// Scans one segment's word list for lexicon matches and tight duplicates.
fn scan_words(
    words: &[crate::transcript::WordTiming],
    admitted: &[String],
    confidence_bar: f64,
    hits: &mut Vec<FillerHit>,
) {
    let norms: Vec<String> = words.iter().map(|w| normalize(&w.text)).collect();
    let max_gap_s = DUPLICATE_WORD_GAP_MS as f64 / 1000.0;

    for i in 0..words.len() {
        if norms[i].is_empty() {
            continue;
        }

        // Single-word lexicon match.
        if admitted.iter().any(|e| *e == norms[i]) && words[i].confidence >= confidence_bar {
            push_hit(hits, &norms[i], words[i].start_s, words[i].end_s, words[i].confidence);
        }

        // Two-word lexicon match ("en fait", "tu vois", ...).
        if i + 1 < words.len() && !norms[i + 1].is_empty() {
            let bigram = format!("{} {}", norms[i], norms[i + 1]);
            let confidence = words[i].confidence.min(words[i + 1].confidence);
            if admitted.iter().any(|e| *e == bigram) && confidence >= confidence_bar {
                push_hit(hits, &bigram, words[i].start_s, words[i + 1].end_s, confidence);
            }
        }

        // Immediate duplicate ("je je"): only when the repeat follows within
        // the duplicate gap. Treated as tier-core regardless of sensitivity.
        if i + 1 < words.len()
            && norms[i + 1] == norms[i]
            && words[i + 1].start_s - words[i].end_s <= max_gap_s
            && words[i + 1].confidence >= confidence_bar
        {
            push_hit(
                hits,
                &norms[i + 1],
                words[i + 1].start_s,
                words[i + 1].end_s,
                words[i + 1].confidence,
            );
        }
    }
}

fn push_hit(hits: &mut Vec<FillerHit>, word: &str, start_s: f64, end_s: f64, confidence: f64) {
    if end_s > start_s {
        hits.push(FillerHit {
            word: word.to_string(),
            start_s,
            end_s,
            confidence,
        });
    }
}

/// Lexicon entries admitted at the given sensitivity, pre-normalized.
fn admitted_lexicon(sensitivity: f64) -> Vec<String> {
    let mut entries: Vec<String> = TIER_CORE.iter().map(|e| normalize(e)).collect();
    if sensitivity >= TIER_MEDIUM_FLOOR {
        entries.extend(TIER_MEDIUM.iter().map(|e| normalize(e)));
    }
    if sensitivity >= TIER_WEAK_FLOOR {
        entries.extend(TIER_WEAK.iter().map(|e| normalize(e)));
    }
    entries
}

/// Normalizes a token: lowercase, accent-folded, punctuation stripped.
///
/// Inner whitespace collapses to single spaces so multi-word entries compare
/// structurally ("en   fait" == "en fait").
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.to_lowercase().chars() {
        let folded = fold_accent(c);
        for f in folded.chars() {
            if f.is_alphanumeric() {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(f);
            } else if f.is_whitespace() {
                pending_space = true;
            }
            // Punctuation drops silently ("euh," -> "euh", "c'est" -> "cest").
        }
    }
    out
}

/// Folds the accented characters that occur in the lexicon's language.
fn fold_accent(c: char) -> &'static str {
    match c {
        'à' | 'â' | 'ä' => "a",
        'é' | 'è' | 'ê' | 'ë' => "e",
        'î' | 'ï' => "i",
        'ô' | 'ö' => "o",
        'ù' | 'û' | 'ü' => "u",
        'ç' => "c",
        'œ' => "oe",
        'a' => "a",
        'b' => "b",
        'c' => "c",
        'd' => "d",
        'e' => "e",
        'f' => "f",
        'g' => "g",
        'h' => "h",
        'i' => "i",
        'j' => "j",
        'k' => "k",
        'l' => "l",
        'm' => "m",
        'n' => "n",
        'o' => "o",
        'p' => "p",
        'q' => "q",
        'r' => "r",
        's' => "s",
        't' => "t",
        'u' => "u",
        'v' => "v",
        'w' => "w",
        'x' => "x",
        'y' => "y",
        'z' => "z",
        '0' => "0",
        '1' => "1",
        '2' => "2",
        '3' => "3",
        '4' => "4",
        '5' => "5",
        '6' => "6",
        '7' => "7",
        '8' => "8",
        '9' => "9",
        ' ' => " ",
        _ => "\u{0}",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{TranscriptSegment, WordTiming};

    fn word(text: &str, start_s: f64, end_s: f64, confidence: f64) -> WordTiming {
        WordTiming {
            text: text.to_string(),
            start_s,
            end_s,
            confidence,
        }
    }

    fn segment(words: Vec<WordTiming>) -> TranscriptSegment {
        let start_s = words.first().map(|w| w.start_s).unwrap_or(0.0);
        let end_s = words.last().map(|w| w.end_s).unwrap_or(0.0);
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        TranscriptSegment {
            start_s,
            end_s,
            text,
            words: Some(words),
        }
    }

    #[test]
    fn core_fillers_match_at_low_sensitivity() {
        let segs = vec![segment(vec![
            word("Euh,", 5.10, 5.35, 0.9),
            word("bonjour", 5.4, 5.9, 0.99),
        ])];
        let scan = detect(&segs, 0.3);
        assert_eq!(scan.hits.len(), 1);
        assert_eq!(scan.hits[0].word, "euh");
        assert_eq!(scan.hits[0].start_s, 5.10);
        assert_eq!(scan.hits[0].end_s, 5.35);
    }

    #[test]
    fn medium_tier_requires_half_sensitivity() {
        let segs = vec![segment(vec![word("bah", 1.0, 1.2, 0.95)])];
        assert!(detect(&segs, 0.4).hits.is_empty());
        assert_eq!(detect(&segs, 0.5).hits.len(), 1);
    }

    #[test]
    fn weak_tier_bigrams_require_high_sensitivity() {
        let segs = vec![segment(vec![
            word("en", 2.0, 2.1, 0.9),
            word("fait", 2.1, 2.4, 0.9),
        ])];
        assert!(detect(&segs, 0.5).hits.is_empty());
        let scan = detect(&segs, 0.7);
        assert_eq!(scan.hits.len(), 1);
        assert_eq!(scan.hits[0].word, "en fait");
        assert_eq!(scan.hits[0].end_s, 2.4);
    }

    #[test]
    fn confidence_bar_scales_with_sensitivity() {
        // Bar at sensitivity 0.7 is 0.35.
        let segs = vec![segment(vec![word("euh", 0.5, 0.8, 0.30)])];
        assert!(detect(&segs, 0.7).hits.is_empty());
        assert_eq!(detect(&segs, 0.5).hits.len(), 1); // bar 0.25
    }

    #[test]
    fn accents_fold_before_matching() {
        let segs = vec![segment(vec![
            word("c'est-à-dire", 3.0, 3.5, 0.9),
        ])];
        let scan = detect(&segs, 0.8);
        assert_eq!(scan.hits.len(), 1);
        assert_eq!(scan.hits[0].word, "cestadire");
    }

    #[test]
    fn tight_duplicates_are_hits() {
        let segs = vec![segment(vec![
            word("je", 1.0, 1.1, 0.9),
            word("je", 1.15, 1.3, 0.9),
            word("pense", 1.35, 1.8, 0.95),
        ])];
        let scan = detect(&segs, 0.7);
        assert_eq!(scan.hits.len(), 1);
        assert_eq!(scan.hits[0].start_s, 1.15);
        assert_eq!(scan.hits[0].end_s, 1.3);
    }

    #[test]
    fn slow_repetitions_are_not_duplicates() {
        let segs = vec![segment(vec![
            word("je", 1.0, 1.1, 0.9),
            word("je", 1.5, 1.7, 0.9), // 400 ms gap > 250 ms
        ])];
        assert!(detect(&segs, 0.7).hits.is_empty());
    }

    #[test]
    fn segment_without_words_sets_warning_flag() {
        let segs = vec![TranscriptSegment {
            start_s: 0.0,
            end_s: 2.0,
            text: "bonjour tout le monde".into(),
            words: None,
        }];
        let scan = detect(&segs, 0.7);
        assert!(scan.hits.is_empty());
        assert!(scan.missing_word_timings);
    }

    #[test]
    fn bare_filler_segment_uses_segment_interval() {
        let segs = vec![TranscriptSegment {
            start_s: 4.0,
            end_s: 4.4,
            text: "Euh...".into(),
            words: None,
        }];
        let scan = detect(&segs, 0.7);
        assert_eq!(scan.hits.len(), 1);
        assert_eq!(scan.hits[0].start_s, 4.0);
        assert_eq!(scan.hits[0].end_s, 4.4);
        assert!(scan.missing_word_timings);
    }

    #[test]
    fn output_is_sorted_and_deduplicated() {
        let segs = vec![
            segment(vec![word("hum", 6.0, 6.2, 0.9)]),
            segment(vec![word("euh", 1.0, 1.3, 0.9), word("euh", 1.0, 1.3, 0.9)]),
        ];
        let scan = detect(&segs, 0.3);
        assert!(scan
            .hits
            .windows(2)
            .all(|w| w[0].start_s <= w[1].start_s));
        // The duplicated (1.0, 1.3) pair collapses to one hit.
        assert_eq!(
            scan.hits
                .iter()
                .filter(|h| h.start_s == 1.0 && h.end_s == 1.3)
                .count(),
            1
        );
    }
}

//! Deterministic stand-ins for the language-detection, translation, and
//! embedding models (§4.3). There is no model-serving crate in the
//! corpus this worker is grounded on, so these are plain deterministic
//! functions rather than a loaded neural model; loading them is
//! simulated by [`Models::load`] so the `/health` gate still behaves
//! the way a real model load would.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use tripwhisper::domain::EMBEDDING_DIM;

/// Language codes this worker can detect and translate from, each with
/// a handful of marker words used for detection and a word-level
/// translation table into `eng_Latn`.
const MARKERS: &[(&str, &[&str])] = &[
    (
        "fra_Latn",
        &["les", "des", "une", "cerca", "près", "évitez", "touristiques", "vers"],
    ),
    (
        "spa_Latn",
        &["los", "las", "una", "cerca", "evite", "turísticos", "torre", "restaurantes"],
    ),
    (
        "deu_Latn",
        &["der", "die", "das", "und", "nicht", "touristen", "vermeiden"],
    ),
    (
        "por_Latn",
        &["os", "as", "uma", "perto", "evite", "turísticos", "torre"],
    ),
];

/// Word-level dictionary translating common tip vocabulary into
/// `eng_Latn`. Unknown tokens pass through unchanged; this is a stand-in
/// model, not a real translator, so coverage is intentionally small.
fn translation_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: std::sync::OnceLock<HashMap<&'static str, &'static str>> =
        std::sync::OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("évitez", "avoid"),
            ("evite", "avoid"),
            ("vermeiden", "avoid"),
            ("les", "the"),
            ("los", "the"),
            ("las", "the"),
            ("der", "the"),
            ("die", "the"),
            ("das", "the"),
            ("os", "the"),
            ("as", "the"),
            ("restaurants", "restaurants"),
            ("restaurantes", "restaurants"),
            ("touristiques", "tourist"),
            ("turísticos", "tourist"),
            ("touristen", "tourist"),
            ("près", "near"),
            ("cerca", "near"),
            ("perto", "near"),
            ("de", "of"),
            ("la", "the"),
            ("uma", "a"),
            ("une", "a"),
            ("tour", "tower"),
            ("torre", "tower"),
        ])
    })
}

/// Loaded, process-wide model state (§4.3). Construction is cheap; the
/// simulated load latency lives in [`load`](Models::load) so the
/// `/health` readiness gate has something real to wait on.
pub struct Models {
    target_language: String,
}

impl Models {
    pub fn new(target_language: String) -> Self {
        Self { target_language }
    }

    /// Simulates the one-time startup cost of loading the translation
    /// and embedding models (§4.3: "the worker loads ... once per
    /// process at startup").
    pub async fn load(&self) {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    pub fn detect_language(&self, text: &str) -> String {
        let lower = text.to_lowercase();
        let mut best: Option<(&str, usize)> = None;

        for (lang, markers) in MARKERS {
            let hits = markers.iter().filter(|m| lower.contains(**m)).count();
            if hits > 0 && best.map(|(_, n)| hits > n).unwrap_or(true) {
                best = Some((lang, hits));
            }
        }

        best.map(|(lang, _)| lang.to_string())
            .unwrap_or_else(|| self.target_language.clone())
    }

    /// Translates `text` from `source_language` into the target
    /// language. A verbatim pass-through if the source is already the
    /// target (§4.3).
    pub fn translate(&self, text: &str, source_language: &str) -> String {
        if source_language == self.target_language {
            return text.to_string();
        }

        let table = translation_table();
        text.split_whitespace()
            .map(|word| {
                let bare: String = word
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .collect::<String>()
                    .to_lowercase();
                table.get(bare.as_str()).copied().unwrap_or(word)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Embeds `text` via the hashing trick: each lowercased token is
    /// hashed into a bucket of a fixed-length vector, signed by another
    /// bit of the same hash, then the vector is L2-normalized. Bit-
    /// identical for identical input within a process lifetime, since
    /// `DefaultHasher`'s seed is fixed (§4.3 determinism).
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; EMBEDDING_DIM];

        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();

            let bucket = (h % EMBEDDING_DIM as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> Models {
        Models::new("eng_Latn".to_string())
    }

    #[test]
    fn embedding_is_deterministic() {
        let m = models();
        let a = m.embed("avoid the tourist restaurants near the tower");
        let b = m.embed("avoid the tourist restaurants near the tower");
        assert_eq!(a, b);
    }

    #[test]
    fn embedding_has_expected_dimension_and_unit_norm() {
        let m = models();
        let v = m.embed("some tip text");
        assert_eq!(v.len(), EMBEDDING_DIM);
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn detects_french_markers() {
        let m = models();
        let lang = m.detect_language("Évitez les restaurants touristiques près de la tour");
        assert_eq!(lang, "fra_Latn");
    }

    #[test]
    fn defaults_to_target_language_when_no_markers_match() {
        let m = models();
        let lang = m.detect_language("avoid the tourist restaurants near the tower");
        assert_eq!(lang, "eng_Latn");
    }

    #[test]
    fn translate_passes_through_when_source_is_target() {
        let m = models();
        let text = "avoid the tourist restaurants near the tower";
        assert_eq!(m.translate(text, "eng_Latn"), text);
    }

    #[test]
    fn translate_maps_known_vocabulary() {
        let m = models();
        let out = m.translate("Évitez les restaurants touristiques près de la tour", "fra_Latn");
        assert!(out.to_lowercase().contains("avoid"));
        assert!(out.to_lowercase().contains("tower"));
    }
}

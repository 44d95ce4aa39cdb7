//! Keyword similarity ranking over review text.
//!
//! Candidates and the query share one binary bag-of-words space whose
//! vocabulary is every non-stop-word token found in the candidates. Rows are
//! ordered by cosine distance to the query.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is a valid regex"));

static ENGLISH_STOP_WORDS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "across", "after", "afterwards", "again", "against", "all",
        "almost", "alone", "along", "already", "also", "although", "always", "am", "among",
        "amongst", "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone",
        "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
        "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind",
        "being", "below", "beside", "besides", "between", "beyond", "bill", "both", "bottom",
        "but", "by", "call", "can", "cannot", "cant", "co", "con", "could", "couldnt", "cry",
        "de", "describe", "detail", "do", "done", "down", "due", "during", "each", "eg",
        "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc", "even",
        "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen",
        "fifty", "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty",
        "found", "four", "from", "front", "full", "further", "get", "give", "go", "had", "has",
        "hasnt", "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein",
        "hereupon", "hers", "herself", "him", "himself", "his", "how", "however", "hundred",
        "i", "ie", "if", "in", "inc", "indeed", "interest", "into", "is", "it", "its", "itself",
        "keep", "last", "latter", "latterly", "least", "less", "ltd", "made", "many", "may",
        "me", "meanwhile", "might", "mill", "mine", "more", "moreover", "most", "mostly",
        "move", "much", "must", "my", "myself", "name", "namely", "neither", "never",
        "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
        "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
        "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
        "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem",
        "seemed", "seeming", "seems", "serious", "several", "she", "should", "show", "side",
        "since", "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something",
        "sometime", "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than",
        "that", "the", "their", "them", "themselves", "then", "thence", "there", "thereafter",
        "thereby", "therefore", "therein", "thereupon", "these", "they", "thick", "thin",
        "third", "this", "those", "though", "three", "through", "throughout", "thru", "thus",
        "to", "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "un",
        "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were",
        "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
        "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither",
        "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without",
        "would", "yet", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Check whether a lower-cased token is an English stop word.
pub fn is_stop_word(token: &str) -> bool {
    ENGLISH_STOP_WORDS.contains(token)
}

/// Lower-cased tokens of two or more word characters, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

/// One ranked candidate: its position in the input and its cosine distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f64,
}

/// Nearest-neighbor ranker over a binary bag-of-words space.
///
/// # Example
///
/// ```
/// use roastindex::similarity::SimilarityRanker;
///
/// let reviews = ["Fruity and bright cup", "Chocolate, nutty finish", "Bright acidity"];
/// let ranked = SimilarityRanker::new(&reviews).nearest(&["fruity", "bright"], 2);
///
/// assert_eq!(ranked.len(), 2);
/// assert_eq!(ranked[0].position, 0);
/// assert_eq!(ranked[1].position, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimilarityRanker {
    vocabulary: FxHashMap<String, usize>,
    /// Sorted, deduplicated vocabulary ids per candidate.
    documents: Vec<Vec<usize>>,
}

impl SimilarityRanker {
    /// Fit the vocabulary on the candidate texts.
    pub fn new<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut vocabulary: FxHashMap<String, usize> = FxHashMap::default();
        let documents = texts
            .iter()
            .map(|text| {
                let mut ids: Vec<usize> = tokenize(text.as_ref())
                    .into_iter()
                    .map(|token| {
                        let next = vocabulary.len();
                        *vocabulary.entry(token).or_insert(next)
                    })
                    .collect();
                ids.sort_unstable();
                ids.dedup();
                ids
            })
            .collect();

        log::debug!(
            "Fitted similarity vocabulary of {} terms over {} candidates",
            vocabulary.len(),
            texts.len()
        );
        Self {
            vocabulary,
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Project the keywords into the fitted space. Unknown terms vanish.
    fn project(&self, keywords: &[&str]) -> Vec<usize> {
        let mut ids: Vec<usize> = tokenize(&keywords.join(" "))
            .iter()
            .filter_map(|token| self.vocabulary.get(token).copied())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// The `min(k, len)` candidates closest to the keywords, nearest first.
    ///
    /// Equal distances keep candidate order. No keywords or `k == 0` gives
    /// an empty result.
    pub fn nearest(&self, keywords: &[&str], k: usize) -> Vec<Neighbor> {
        if k == 0 || keywords.is_empty() {
            return Vec::new();
        }

        let query = self.project(keywords);
        let mut ranked: Vec<Neighbor> = self
            .documents
            .iter()
            .enumerate()
            .map(|(position, doc)| Neighbor {
                position,
                distance: cosine_distance(&query, doc),
            })
            .collect();
        ranked.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        ranked.truncate(k);
        ranked
    }
}

/// Cosine distance between two binary vectors given as sorted id lists.
fn cosine_distance(a: &[usize], b: &[usize]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }

    let (mut i, mut j, mut shared) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }
    let similarity = shared as f64 / ((a.len() as f64) * (b.len() as f64)).sqrt();
    (1.0 - similarity).max(0.0)
}

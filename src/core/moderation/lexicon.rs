// Banned-term lexicon for the lexical filter.
//
// A term is a normalized root plus the exception substrings that suppress a
// match (root "еб" must not fire inside "мебель"). The built-in set mirrors
// the marketplace's moderation rules; a deployment can replace it with a
// plain-text file (see `Lexicon::from_file`).
//
// NO async, no I/O beyond the optional file load - pure data.

use std::fmt;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("failed to read term list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("term list line {line}: expected 'category: root [= exc1, exc2]'")]
    Malformed { line: usize },

    #[error("term list line {line}: unknown category '{category}'")]
    UnknownCategory { line: usize, category: String },

    #[error("term list line {line}: missing term root")]
    MissingRoot { line: usize },

    #[error("term list contains no terms")]
    Empty,

    #[error("invalid contact pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// ============================================================================
// CATEGORIES
// ============================================================================

/// Why a piece of text was rejected by the local filter.
///
/// `Links` and `Phones` are produced by the contact-pattern pass, the rest by
/// term matching. The order of the term categories below is the order checks
/// ran in the marketplace rules, most critical first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermCategory {
    Links,
    Phones,
    Extremism,
    Hate,
    Adult,
    Drugs,
    Threats,
    Profanity,
    Scam,
}

impl TermCategory {
    /// The message shown to the user when this category rejects their text.
    pub fn user_reason(&self) -> &'static str {
        match self {
            TermCategory::Links => "Ссылки запрещены в объявлениях",
            TermCategory::Phones => {
                "Телефоны запрещены в объявлениях. Покупатели свяжутся через бота."
            }
            TermCategory::Extremism => "Экстремистский контент запрещён",
            TermCategory::Hate => "Разжигание межнациональной розни запрещено",
            TermCategory::Adult => "Контент для взрослых запрещён",
            TermCategory::Drugs => "Реклама запрещённых веществ запрещена",
            TermCategory::Threats => "Угрозы и призывы к насилию запрещены",
            TermCategory::Profanity => "Нецензурная лексика запрещена",
            TermCategory::Scam => "Подозрительный контент (возможное мошенничество)",
        }
    }

    /// Category identifier accepted in term-list files. Only term-backed
    /// categories can be parsed; links/phones are pattern passes, not terms.
    fn parse(id: &str) -> Option<Self> {
        match id {
            "extremism" => Some(TermCategory::Extremism),
            "hate" => Some(TermCategory::Hate),
            "adult" => Some(TermCategory::Adult),
            "drugs" => Some(TermCategory::Drugs),
            "threats" => Some(TermCategory::Threats),
            "profanity" => Some(TermCategory::Profanity),
            "scam" => Some(TermCategory::Scam),
            _ => None,
        }
    }
}

impl fmt::Display for TermCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = match self {
            TermCategory::Links => "links",
            TermCategory::Phones => "phones",
            TermCategory::Extremism => "extremism",
            TermCategory::Hate => "hate",
            TermCategory::Adult => "adult",
            TermCategory::Drugs => "drugs",
            TermCategory::Threats => "threats",
            TermCategory::Profanity => "profanity",
            TermCategory::Scam => "scam",
        };
        write!(f, "{}", id)
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Normalize text the way submitters try to defeat the filter: lowercase,
/// fold Latin/digit lookalikes into Cyrillic ("xyй", "п0рно", "6лять"),
/// drop separator junk ("х.у-й"), collapse stutter ("хуууй") and whitespace.
///
/// Roots and exceptions are passed through the same function at load time, so
/// matching always happens in one consistent string space.
pub fn normalize(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        match ch {
            'a' => folded.push('а'),
            'b' => folded.push('в'),
            'c' => folded.push('с'),
            'e' => folded.push('е'),
            'h' => folded.push('н'),
            'k' => folded.push('к'),
            'l' => folded.push('л'),
            'm' => folded.push('м'),
            'n' => folded.push('н'),
            'o' => folded.push('о'),
            'p' => folded.push('р'),
            'r' => folded.push('г'),
            's' => folded.push('с'),
            't' => folded.push('т'),
            'u' => folded.push('у'),
            'x' => folded.push('х'),
            'y' => folded.push('у'),
            'z' => folded.push('з'),
            '0' => folded.push('о'),
            '1' => folded.push('и'),
            '3' => folded.push('з'),
            '4' => folded.push('ч'),
            '6' => folded.push('б'),
            '7' => folded.push('т'),
            '8' => folded.push('в'),
            '9' => folded.push('д'),
            '@' => folded.push('а'),
            '$' => folded.push('с'),
            '|' => folded.push('и'),
            '○' => folded.push('о'),
            'ё' => folded.push('е'),
            'і' => folded.push('и'),
            '*' | '_' | '-' | '.' | ',' | '!' | '?' => {}
            c if c.is_whitespace() => folded.push(' '),
            c => folded.push(c),
        }
    }

    // Runs of 3+ identical characters collapse to one, then any remaining
    // double spaces collapse so spaced-out letters line up with plain roots.
    let mut out = String::with_capacity(folded.len());
    let mut chars = folded.chars().peekable();
    while let Some(c) = chars.next() {
        let mut run = 1usize;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }
        let emit = if run >= 3 { 1 } else { run };
        for _ in 0..emit {
            if c == ' ' && out.ends_with(' ') {
                continue;
            }
            out.push(c);
        }
    }
    out.trim().to_string()
}

// ============================================================================
// TERMS
// ============================================================================

/// One banned root with its suppression exceptions, all stored normalized.
#[derive(Debug, Clone)]
pub struct Term {
    pub category: TermCategory,
    pub root: String,
    pub exceptions: Vec<String>,
}

impl Term {
    pub fn new(category: TermCategory, root: &str, exceptions: &[&str]) -> Self {
        Self {
            category,
            root: normalize(root),
            exceptions: exceptions.iter().map(|e| normalize(e)).collect(),
        }
    }
}

/// Ordered term set owned by the filter for its process lifetime.
#[derive(Debug, Clone)]
pub struct Lexicon {
    terms: Vec<Term>,
}

impl Lexicon {
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The built-in marketplace term set. Order matters: the filter reports
    /// the first matching term in this order.
    pub fn builtin() -> Self {
        use TermCategory::*;

        let terms = vec![
            // Terrorism and extremism
            Term::new(Extremism, "теракт", &[]),
            Term::new(Extremism, "террор", &[]),
            Term::new(Extremism, "джихад", &[]),
            Term::new(Extremism, "шахид", &[]),
            Term::new(Extremism, "игил", &[]),
            Term::new(Extremism, "взрывчатк", &[]),
            Term::new(Extremism, "вербовк", &[]),
            Term::new(Extremism, "экстремист", &[]),
            Term::new(Extremism, "экстремизм", &[]),
            // Ethnic slurs
            Term::new(Hate, "черномаз", &[]),
            Term::new(Hate, "узкоглаз", &[]),
            Term::new(Hate, "жид", &["жидк", "ожида"]),
            Term::new(Hate, "хач", &["хачапури", "хачу"]),
            // Adult content
            Term::new(Adult, "порн", &[]),
            Term::new(Adult, "проститу", &[]),
            Term::new(Adult, "эскорт", &[]),
            Term::new(Adult, "минет", &[]),
            Term::new(Adult, "анал", &["канал", "аналог", "анализ", "аналит", "банал"]),
            Term::new(Adult, "интим услуг", &[]),
            Term::new(Adult, "интим-услуг", &[]),
            Term::new(Adult, "вебкам", &[]),
            Term::new(Adult, "онлифанс", &[]),
            Term::new(Adult, "педофил", &[]),
            Term::new(Adult, "зоофил", &[]),
            Term::new(Adult, "изнасилов", &[]),
            // Drugs
            Term::new(Drugs, "наркот", &[]),
            Term::new(
                Drugs,
                "героин",
                &["героиня", "героини", "героине", "героиню", "героиней"],
            ),
            Term::new(Drugs, "кокаин", &[]),
            Term::new(Drugs, "гашиш", &[]),
            Term::new(Drugs, "мефедрон", &[]),
            Term::new(Drugs, "марихуан", &[]),
            Term::new(Drugs, "экстази", &[]),
            Term::new(Drugs, "спайс", &["спайси"]),
            Term::new(Drugs, "закладк", &["закладки для книг"]),
            Term::new(
                Drugs,
                "клад",
                &["склад", "кладов", "укладк", "прокладк", "закладк", "кладб", "оклад"],
            ),
            // Threats and violence
            Term::new(Threats, "убью", &[]),
            Term::new(Threats, "убий", &[]),
            Term::new(Threats, "зарежу", &[]),
            Term::new(Threats, "застрелю", &[]),
            Term::new(Threats, "задушу", &[]),
            Term::new(Threats, "сожгу", &[]),
            Term::new(Threats, "покалечу", &[]),
            // Profanity
            Term::new(Profanity, "хуй", &[]),
            Term::new(Profanity, "пизд", &[]),
            Term::new(Profanity, "пезд", &[]),
            Term::new(Profanity, "еб", &["мебел", "неб", "хлеб", "реб", "чеб", "теб"]),
            Term::new(Profanity, "бляд", &[]),
            Term::new(Profanity, "блят", &[]),
            Term::new(Profanity, "сука", &["барсука"]),
            Term::new(Profanity, "мудак", &[]),
            Term::new(Profanity, "мудил", &[]),
            Term::new(Profanity, "залуп", &[]),
            Term::new(Profanity, "гандон", &[]),
            Term::new(Profanity, "гондон", &[]),
            Term::new(Profanity, "пидор", &[]),
            Term::new(Profanity, "пидар", &[]),
            Term::new(Profanity, "жоп", &[]),
            Term::new(Profanity, "говн", &[]),
            Term::new(Profanity, "дерьм", &[]),
            Term::new(Profanity, "fuck", &[]),
            Term::new(Profanity, "shit", &[]),
            Term::new(Profanity, "bitch", &[]),
            // Scams
            Term::new(Scam, "заработок без вложений", &[]),
            Term::new(Scam, "легкие деньги", &[]),
            Term::new(Scam, "быстрый заработок", &[]),
            Term::new(Scam, "пирамид", &["пирамидк"]),
            Term::new(Scam, "казино", &[]),
            Term::new(Scam, "бинарные опционы", &[]),
            Term::new(Scam, "букмекер", &[]),
            Term::new(Scam, "обнал", &[]),
        ];

        Self { terms }
    }

    /// Load a replacement term list from a plain-text file.
    ///
    /// Line format: `category: root = exc1, exc2` (exceptions optional).
    /// `#` starts a comment, blank lines are ignored. Categories are the
    /// identifiers `extremism`, `hate`, `adult`, `drugs`, `threats`,
    /// `profanity`, `scam`. Term order in the file is match order.
    pub fn from_file(path: &Path) -> Result<Self, LexiconError> {
        let src = std::fs::read_to_string(path).map_err(|source| LexiconError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&src)
    }

    pub fn parse(src: &str) -> Result<Self, LexiconError> {
        let mut terms = Vec::new();

        for (idx, raw_line) in src.lines().enumerate() {
            let line = idx + 1;
            let content = match raw_line.split_once('#') {
                Some((before, _)) => before.trim(),
                None => raw_line.trim(),
            };
            if content.is_empty() {
                continue;
            }

            let (category_id, rest) = content
                .split_once(':')
                .ok_or(LexiconError::Malformed { line })?;
            let category_id = category_id.trim();
            let category = TermCategory::parse(category_id).ok_or_else(|| {
                LexiconError::UnknownCategory {
                    line,
                    category: category_id.to_string(),
                }
            })?;

            let (root, exceptions) = match rest.split_once('=') {
                Some((root, excs)) => {
                    let exceptions: Vec<&str> = excs
                        .split(',')
                        .map(|e| e.trim())
                        .filter(|e| !e.is_empty())
                        .collect();
                    (root.trim(), exceptions)
                }
                None => (rest.trim(), Vec::new()),
            };
            if root.is_empty() {
                return Err(LexiconError::MissingRoot { line });
            }

            terms.push(Term::new(category, root, &exceptions));
        }

        if terms.is_empty() {
            return Err(LexiconError::Empty);
        }
        Ok(Self { terms })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_folds_lookalikes() {
        assert_eq!(normalize("ХУЙ"), "хуй");
        assert_eq!(normalize("xyй"), "хуй");
        assert_eq!(normalize("п0рн0"), "порно");
        assert_eq!(normalize("6лять"), "блять");
        assert_eq!(normalize("нарк○тики"), "наркотики");
    }

    #[test]
    fn test_normalize_strips_separators_and_stutter() {
        assert_eq!(normalize("х.у-й"), "хуй");
        assert_eq!(normalize("гашшшиш"), "гашиш");
        // Two repeats are legitimate spelling and stay.
        assert_eq!(normalize("ссора"), "ссора");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("продам   детскую \n коляску"), "продам детскую коляску");
    }

    #[test]
    fn test_term_stores_normalized_forms() {
        let term = Term::new(TermCategory::Adult, "Интим-Услуг", &["КАНАЛ"]);
        assert_eq!(term.root, "интимуслуг");
        assert_eq!(term.exceptions, vec!["канал".to_string()]);
    }

    #[test]
    fn test_builtin_lexicon_is_not_empty() {
        let lexicon = Lexicon::builtin();
        assert!(lexicon.len() > 40);
        // Match order is load order; extremism terms come first.
        assert_eq!(lexicon.terms()[0].category, TermCategory::Extremism);
    }

    #[test]
    fn test_parse_accepts_documented_format() {
        let src = "\
# marketplace overrides
profanity: еб = мебел, неб
drugs: гашиш
scam: пирамид = пирамидк  # toy pyramids are fine
";
        let lexicon = Lexicon::parse(src).unwrap();
        assert_eq!(lexicon.len(), 3);
        assert_eq!(lexicon.terms()[0].root, "еб");
        assert_eq!(lexicon.terms()[0].exceptions.len(), 2);
        assert_eq!(lexicon.terms()[2].category, TermCategory::Scam);
        assert_eq!(lexicon.terms()[2].exceptions, vec!["пирамидк".to_string()]);
    }

    #[test]
    fn test_parse_rejects_unknown_category() {
        let err = Lexicon::parse("nonsense: root").unwrap_err();
        assert!(matches!(err, LexiconError::UnknownCategory { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_missing_root() {
        let err = Lexicon::parse("profanity: = мебел").unwrap_err();
        assert!(matches!(err, LexiconError::MissingRoot { line: 1 }));
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        let err = Lexicon::parse("# only a comment\n\n").unwrap_err();
        assert!(matches!(err, LexiconError::Empty));
    }

    #[test]
    fn test_from_file_loads_terms_and_reports_io_errors() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "drugs: гашиш").unwrap();
        writeln!(file, "threats: убью").unwrap();
        let lexicon = Lexicon::from_file(file.path()).unwrap();
        assert_eq!(lexicon.len(), 2);

        let err = Lexicon::from_file(Path::new("/no/such/terms.txt")).unwrap_err();
        assert!(matches!(err, LexiconError::Io { .. }));
    }
}

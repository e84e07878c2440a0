use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

/// Schooling stage inferred from a cohort's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GradeLevel {
    Grade1,
    Grade2,
    Grade3,
    Grade4,
    Grade5,
    Grade6,
    Grade7,
    Grade8,
    Grade9,
    Grade10,
    Grade11,
    Grade12,
    Elementary,
    MiddleSchool,
    HighSchool,
    Primary,
    Secondary,
    /// No recognizable pattern.
    Unknown,
}

impl GradeLevel {
    pub const ALL: [GradeLevel; 18] = [
        GradeLevel::Grade1,
        GradeLevel::Grade2,
        GradeLevel::Grade3,
        GradeLevel::Grade4,
        GradeLevel::Grade5,
        GradeLevel::Grade6,
        GradeLevel::Grade7,
        GradeLevel::Grade8,
        GradeLevel::Grade9,
        GradeLevel::Grade10,
        GradeLevel::Grade11,
        GradeLevel::Grade12,
        GradeLevel::Elementary,
        GradeLevel::MiddleSchool,
        GradeLevel::HighSchool,
        GradeLevel::Primary,
        GradeLevel::Secondary,
        GradeLevel::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GradeLevel::Grade1 => "Grade 1",
            GradeLevel::Grade2 => "Grade 2",
            GradeLevel::Grade3 => "Grade 3",
            GradeLevel::Grade4 => "Grade 4",
            GradeLevel::Grade5 => "Grade 5",
            GradeLevel::Grade6 => "Grade 6",
            GradeLevel::Grade7 => "Grade 7",
            GradeLevel::Grade8 => "Grade 8",
            GradeLevel::Grade9 => "Grade 9",
            GradeLevel::Grade10 => "Grade 10",
            GradeLevel::Grade11 => "Grade 11",
            GradeLevel::Grade12 => "Grade 12",
            GradeLevel::Elementary => "Elementary",
            GradeLevel::MiddleSchool => "Middle School",
            GradeLevel::HighSchool => "High School",
            GradeLevel::Primary => "Primary",
            GradeLevel::Secondary => "Secondary",
            GradeLevel::Unknown => "Grade Level",
        }
    }

    /// Case-insensitive lookup by display label.
    pub fn from_label(s: &str) -> Option<GradeLevel> {
        let wanted = s.trim();
        GradeLevel::ALL
            .into_iter()
            .find(|g| g.label().eq_ignore_ascii_case(wanted))
    }

    fn from_number(n: u8) -> Option<GradeLevel> {
        if !(1..=12).contains(&n) {
            return None;
        }
        Some(GradeLevel::ALL[usize::from(n) - 1])
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for GradeLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

enum Matcher {
    Pattern(Regex),
    Keyword(&'static str),
}

impl Matcher {
    fn matches(&self, normalized: &str) -> bool {
        match self {
            Matcher::Pattern(re) => re.is_match(normalized),
            Matcher::Keyword(k) => normalized.contains(k),
        }
    }
}

struct Rule {
    matcher: Matcher,
    level: GradeLevel,
}

// "grade", at least one whitespace, the number, then end of input or a non-digit.
fn grade_pattern(numbers: &str) -> Regex {
    Regex::new(&format!(r"grade\s+(?:{numbers})(?:[^0-9]|$)")).expect("valid grade pattern")
}

// Evaluated top to bottom; the first matching rule wins.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    let mut rules = Vec::with_capacity(20);

    for n in 1u8..=12 {
        if let Some(level) = GradeLevel::from_number(n) {
            rules.push(Rule {
                matcher: Matcher::Pattern(grade_pattern(&n.to_string())),
                level,
            });
        }
    }

    // Range buckets. Shadowed by the exact grades above; kept so the buckets
    // still apply if the exact list is ever narrowed.
    for (numbers, level) in [
        ("[1-3]", GradeLevel::Elementary),
        ("[4-7]", GradeLevel::MiddleSchool),
        ("8|9|10|11|12", GradeLevel::HighSchool),
    ] {
        rules.push(Rule {
            matcher: Matcher::Pattern(grade_pattern(numbers)),
            level,
        });
    }

    for (keyword, level) in [
        ("elementary", GradeLevel::Elementary),
        ("middle", GradeLevel::MiddleSchool),
        ("high", GradeLevel::HighSchool),
        ("primary", GradeLevel::Primary),
        ("secondary", GradeLevel::Secondary),
    ] {
        rules.push(Rule {
            matcher: Matcher::Keyword(keyword),
            level,
        });
    }

    rules
});

/// Infers the grade level from a free-text cohort name.
///
/// Never fails: labels with no recognizable grade number or keyword map to
/// [`GradeLevel::Unknown`] ("Grade Level").
pub fn classify_grade_level(label: &str) -> GradeLevel {
    let normalized = label.trim().to_lowercase();
    if normalized.is_empty() {
        return GradeLevel::Unknown;
    }
    RULES
        .iter()
        .find(|rule| rule.matcher.matches(&normalized))
        .map(|rule| rule.level)
        .unwrap_or(GradeLevel::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_exact_grade_maps_to_itself() {
        for n in 1u8..=12 {
            let got = classify_grade_level(&format!("Grade {n}"));
            assert_eq!(got.label(), format!("Grade {n}"));
        }
    }

    #[test]
    fn grade_one_does_not_shadow_two_digit_grades() {
        assert_eq!(classify_grade_level("grade 1"), GradeLevel::Grade1);
        assert_eq!(classify_grade_level("grade 10"), GradeLevel::Grade10);
        assert_eq!(classify_grade_level("Grade 11 Science"), GradeLevel::Grade11);
        assert_eq!(classify_grade_level("grade 12B"), GradeLevel::Grade12);
        assert_eq!(classify_grade_level("Grade 1A"), GradeLevel::Grade1);
    }

    #[test]
    fn case_and_surrounding_whitespace_are_ignored() {
        assert_eq!(classify_grade_level("GRADE 9"), GradeLevel::Grade9);
        assert_eq!(classify_grade_level("  grade   9  "), GradeLevel::Grade9);
        assert_eq!(classify_grade_level("\tGrade\t9\n"), GradeLevel::Grade9);
    }

    #[test]
    fn grade_without_separator_is_not_a_grade() {
        assert_eq!(classify_grade_level("Grade9"), GradeLevel::Unknown);
    }

    #[test]
    fn number_wins_over_keyword() {
        assert_eq!(classify_grade_level("Grade 9 High School"), GradeLevel::Grade9);
        assert_eq!(classify_grade_level("Primary Grade 2"), GradeLevel::Grade2);
    }

    #[test]
    fn keywords_follow_fixed_precedence() {
        assert_eq!(
            classify_grade_level("Middle Elementary Academy"),
            GradeLevel::Elementary
        );
        assert_eq!(classify_grade_level("High Middle"), GradeLevel::MiddleSchool);
        assert_eq!(classify_grade_level("Secondary High"), GradeLevel::HighSchool);
        assert_eq!(classify_grade_level("Primary 2025"), GradeLevel::Primary);
        assert_eq!(classify_grade_level("SECONDARY"), GradeLevel::Secondary);
    }

    #[test]
    fn out_of_table_numbers_fall_back() {
        assert_eq!(classify_grade_level("Grade 13"), GradeLevel::Unknown);
        assert_eq!(classify_grade_level("Grade 0"), GradeLevel::Unknown);
        assert_eq!(classify_grade_level("grade 120"), GradeLevel::Unknown);
    }

    #[test]
    fn out_of_table_numbers_still_reach_keywords() {
        assert_eq!(
            classify_grade_level("Grade 13 High School"),
            GradeLevel::HighSchool
        );
        assert_eq!(
            classify_grade_level("Grade 0 Elementary"),
            GradeLevel::Elementary
        );
    }

    #[test]
    fn unmatched_and_empty_fall_back() {
        assert_eq!(classify_grade_level("Staff Pool"), GradeLevel::Unknown);
        assert_eq!(classify_grade_level(""), GradeLevel::Unknown);
        assert_eq!(classify_grade_level("   "), GradeLevel::Unknown);
        assert_eq!(GradeLevel::Unknown.label(), "Grade Level");
    }

    #[test]
    fn range_buckets_apply_to_their_numbers() {
        let bucket = |n: &str| {
            RULES[12..15]
                .iter()
                .find(|r| r.matcher.matches(&format!("grade {n}")))
                .map(|r| r.level)
        };
        assert_eq!(bucket("2"), Some(GradeLevel::Elementary));
        assert_eq!(bucket("5"), Some(GradeLevel::MiddleSchool));
        assert_eq!(bucket("10"), Some(GradeLevel::HighSchool));
        assert_eq!(bucket("13"), None);
    }

    #[test]
    fn labels_round_trip_through_from_label() {
        for level in GradeLevel::ALL {
            assert_eq!(GradeLevel::from_label(level.label()), Some(level));
        }
        assert_eq!(GradeLevel::from_label("middle school"), Some(GradeLevel::MiddleSchool));
        assert_eq!(GradeLevel::from_label("Grade 13"), None);
    }

    #[test]
    fn serializes_as_label() {
        let v = serde_json::to_value(GradeLevel::HighSchool).expect("serialize");
        assert_eq!(v, serde_json::json!("High School"));
    }
}

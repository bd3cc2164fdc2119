use serde::Serialize;

/// How the answer should be framed, chosen from keywords in the question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Concise,
    Location,
    Skills,
}

impl Strategy {
    /// `"where"` takes precedence over `"skill"`.
    pub fn plan(question: &str) -> Self {
        let q = question.to_lowercase();
        if q.contains("where") {
            Strategy::Location
        } else if q.contains("skill") {
            Strategy::Skills
        } else {
            Strategy::Concise
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            Strategy::Concise => "Answer concisely based on retrieved context.",
            Strategy::Location => "Focus on location and city information.",
            Strategy::Skills => "Focus on relevant skills and technologies.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_from_keywords() {
        assert_eq!(Strategy::plan("Where are AI jobs?"), Strategy::Location);
        assert_eq!(Strategy::plan("Which SKILLS matter?"), Strategy::Skills);
        assert_eq!(Strategy::plan("Is green energy growing?"), Strategy::Concise);
    }

    #[test]
    fn location_wins_over_skills() {
        assert_eq!(
            Strategy::plan("Where can I use my skills?"),
            Strategy::Location
        );
    }

    #[test]
    fn instruction_text() {
        assert_eq!(
            Strategy::Skills.instruction(),
            "Focus on relevant skills and technologies."
        );
    }
}

use crate::error::{QaError, Result};

const JOB_MARKET_DOCUMENTS: [&str; 5] = [
    "Germany has strong demand for AI, data science, and software engineering roles, \
     with major hubs in Berlin, Munich, and Hamburg. Companies hire ML engineers, \
     data scientists, MLOps, and cloud engineers.",
    "The green energy sector in Germany is expanding. Renewable energy, wind, solar, \
     and EV manufacturing create jobs in engineering, analytics, and project management.",
    "Frankfurt is Germany’s finance hub; fintech and quantitative roles are concentrated \
     there and in Berlin. Demand for cloud, cybersecurity, and compliance skills is high.",
    "Healthcare and digital health are growing in Germany: telemedicine, healthcare data \
     analysts, and health IT engineers are in demand.",
    "Common skills in demand: Python, SQL, cloud platforms (AWS, GCP, Azure), \
     Docker/Kubernetes, machine learning frameworks, NLP, and large language models.",
];

const FIXED_PARAGRAPH: &str = "The German job market is strong for skilled professionals. \
     Berlin, Munich, Hamburg and Frankfurt are the main hubs for technology and finance jobs. \
     Software engineers, data scientists and cloud engineers are in high demand, and \
     renewable energy and healthcare are growing sectors. Employers look for Python, SQL, \
     cloud platforms and machine learning skills, and many international teams work in English.";

/// Immutable, non-empty list of documents addressed by position.
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Vec<String>,
}

impl Corpus {
    pub fn new(documents: Vec<String>) -> Result<Self> {
        if documents.is_empty() {
            return Err(QaError::EmptyCorpus);
        }
        Ok(Self { documents })
    }

    /// The five paragraphs searched by the retrieval mode.
    pub fn job_market() -> Self {
        Self {
            documents: JOB_MARKET_DOCUMENTS.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Single paragraph used as the whole context by the fixed mode.
    pub fn fixed_paragraph() -> Self {
        Self {
            documents: vec![FIXED_PARAGRAPH.to_string()],
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.documents.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    // Never true for a constructed corpus.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(String::as_str)
    }

    /// All documents joined by a blank line.
    pub fn context(&self) -> String {
        self.documents.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_corpus() {
        assert!(matches!(Corpus::new(Vec::new()), Err(QaError::EmptyCorpus)));
    }

    #[test]
    fn job_market_has_five_documents() {
        let corpus = Corpus::job_market();
        assert_eq!(corpus.len(), 5);
        assert!(corpus.get(2).unwrap().starts_with("Frankfurt"));
        assert!(corpus.get(5).is_none());
    }

    #[test]
    fn fixed_paragraph_context_is_the_paragraph() {
        let corpus = Corpus::fixed_paragraph();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.context(), corpus.get(0).unwrap());
    }

    #[test]
    fn context_joins_with_blank_line() {
        let corpus = Corpus::new(vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(corpus.context(), "a\n\nb");
    }
}

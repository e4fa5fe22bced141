use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use log::debug;

/// Document types found in an intake packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    RgCpf,
    CertidaoNascimento,
    ComprovanteResidencia,
    TermoRepresentacao,
    Procuracao,
    ContratoAdvocaticios,
    Unknown,
}

impl DocumentType {
    pub const ALL: [DocumentType; 7] = [
        DocumentType::RgCpf,
        DocumentType::CertidaoNascimento,
        DocumentType::ComprovanteResidencia,
        DocumentType::TermoRepresentacao,
        DocumentType::Procuracao,
        DocumentType::ContratoAdvocaticios,
        DocumentType::Unknown,
    ];

    /// Label used for extracted file names (`<LABEL>.pdf`)
    pub fn label(self) -> &'static str {
        match self {
            DocumentType::RgCpf => "RG_CPF",
            DocumentType::CertidaoNascimento => "CERTIDAO_NASCIMENTO",
            DocumentType::ComprovanteResidencia => "COMPROVANTE_RESIDENCIA",
            DocumentType::TermoRepresentacao => "TERMO_REPRESENTACAO",
            DocumentType::Procuracao => "PROCURACAO",
            DocumentType::ContratoAdvocaticios => "CONTRATO_ADVOCATICIOS",
            DocumentType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        DocumentType::ALL
            .iter()
            .copied()
            .find(|doc_type| doc_type.label() == wanted)
            .ok_or_else(|| format!("unknown document type: {}", s))
    }
}

/// Ordered pattern table. Earlier entries win when a page matches several
/// sets, so the order here is part of the classification contract.
const PATTERN_TABLE: &[(DocumentType, &[&str])] = &[
    (
        DocumentType::RgCpf,
        &[
            r"CARTEIRA\s+DE\s+IDENTIDADE",
            r"REGISTRO\s+GERAL",
            r"CADASTRO\s+DE\s+PESSOAS?\s+F[ÍI]SICAS?",
            r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b",
        ],
    ),
    (
        DocumentType::CertidaoNascimento,
        &[
            r"CERTID[ÃA]O\s+DE\s+NASCIMENTO",
            r"FILIA[ÇC][ÃA]O",
            r"REGISTRO\s+CIVIL\s+DAS\s+PESSOAS\s+NATURAIS",
            r"AV[ÓO]S\s+(PATERNOS|MATERNOS)",
        ],
    ),
    (
        DocumentType::ComprovanteResidencia,
        &[
            r"COMPROVANTE\s+DE\s+(RESID[ÊE]NCIA|ENDERE[ÇC]O)",
            r"CONTA\s+DE\s+(LUZ|[ÁA]GUA|ENERGIA|G[ÁA]S|TELEFONE)",
            r"ENERGIA\s+EL[ÉE]TRICA",
            r"\bCEP\b",
            r"\b\d{5}-\d{3}\b",
            r"\bKWH\b",
        ],
    ),
    (
        DocumentType::TermoRepresentacao,
        &[
            r"TERMO\s+DE\s+REPRESENTA[ÇC][ÃA]O",
            r"INSTITUTO\s+NACIONAL\s+DO\s+SEGURO\s+SOCIAL",
            r"\bINSS\b",
            r"PREVIDENCI[ÁA]RI[OA]",
        ],
    ),
    (
        DocumentType::Procuracao,
        &[
            r"PROCURA[ÇC][ÃA]O",
            r"OUTORGANTE",
            r"OUTORGAD[OA]",
        ],
    ),
    (
        DocumentType::ContratoAdvocaticios,
        &[
            r"CONTRATO\s+DE\s+(PRESTA[ÇC][ÃA]O\s+DE\s+SERVI[ÇC]OS\s+)?ADVOCAT[ÍI]CIOS",
            r"HONOR[ÁA]RIOS",
            r"CONTRATANTE",
            r"CONTRATAD[OA]",
        ],
    ),
];

/// Compiled pattern sets, in table order
static PATTERN_SETS: Lazy<Vec<PatternSet>> = Lazy::new(|| {
    PATTERN_TABLE
        .iter()
        .map(|(doc_type, patterns)| PatternSet {
            doc_type: *doc_type,
            patterns: patterns
                .iter()
                .map(|pattern| {
                    RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .expect("Invalid classification pattern")
                })
                .collect(),
        })
        .collect()
});

struct PatternSet {
    doc_type: DocumentType,
    patterns: Vec<Regex>,
}

impl PatternSet {
    fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(text))
    }
}

/// Rule-based page classifier
///
/// Stateless: the verdict for a page depends on its text alone, never on
/// pages seen earlier.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentClassifier;

impl DocumentClassifier {
    pub fn new() -> Self {
        DocumentClassifier
    }

    /// Map page text to a document type; empty text is `Unknown`
    pub fn classify(&self, text: &str) -> DocumentType {
        let upper = text.to_uppercase();
        if upper.trim().is_empty() {
            return DocumentType::Unknown;
        }

        let doc_type = PATTERN_SETS
            .iter()
            .find(|set| set.matches(&upper))
            .map(|set| set.doc_type)
            .unwrap_or(DocumentType::Unknown);

        debug!("Classified {} characters as {}", text.len(), doc_type);
        doc_type
    }

    /// Classify pages in ascending order into a document map
    pub fn build_map<'a, I>(&self, pages: I) -> DocumentMap
    where
        I: IntoIterator<Item = (u32, &'a str)>,
    {
        let mut map = DocumentMap::default();
        for (page_number, text) in pages {
            map.insert(self.classify(text), page_number);
        }
        map
    }
}

/// Document type → 1-based pages, in order of first appearance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMap {
    entries: Vec<(DocumentType, Vec<u32>)>,
}

impl DocumentMap {
    pub fn insert(&mut self, doc_type: DocumentType, page_number: u32) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == doc_type) {
            Some((_, pages)) => pages.push(page_number),
            None => self.entries.push((doc_type, vec![page_number])),
        }
    }

    pub fn pages(&self, doc_type: DocumentType) -> &[u32] {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == doc_type)
            .map(|(_, pages)| pages.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentType, &[u32])> {
        self.entries.iter().map(|(doc_type, pages)| (*doc_type, pages.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_each_type() {
        let classifier = DocumentClassifier::new();
        let cases = [
            ("República Federativa - Carteira de Identidade", DocumentType::RgCpf),
            ("Certidão de Nascimento", DocumentType::CertidaoNascimento),
            ("Conta de luz - vencimento 10/05", DocumentType::ComprovanteResidencia),
            ("Termo de representação perante o INSS", DocumentType::TermoRepresentacao),
            ("pelo presente instrumento o outorgante nomeia", DocumentType::Procuracao),
            ("Contrato de prestação de serviços advocatícios", DocumentType::ContratoAdvocaticios),
        ];

        for (text, expected) in cases {
            assert_eq!(classifier.classify(text), expected, "text: {}", text);
        }
    }

    #[test]
    fn test_empty_and_unmatched_text_is_unknown() {
        let classifier = DocumentClassifier::new();
        assert_eq!(classifier.classify(""), DocumentType::Unknown);
        assert_eq!(classifier.classify("   \n "), DocumentType::Unknown);
        assert_eq!(classifier.classify("lorem ipsum dolor sit amet"), DocumentType::Unknown);
    }

    #[test]
    fn test_earlier_pattern_set_wins() {
        let classifier = DocumentClassifier::new();
        // CPF number (RG_CPF) and OUTORGANTE (PROCURACAO) on the same page
        let text = "PROCURAÇÃO - OUTORGANTE: JOSÉ, CPF 123.456.789-09";
        assert_eq!(classifier.classify(text), DocumentType::RgCpf);

        // FILIAÇÃO (CERTIDAO_NASCIMENTO) beats CEP (COMPROVANTE_RESIDENCIA)
        let text = "filiação: ana e josé - cep 01310-100";
        assert_eq!(classifier.classify(text), DocumentType::CertidaoNascimento);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = DocumentClassifier::new();
        let texts = ["HONORÁRIOS", "", "FATURA CEP 12345-678", "registro geral"];

        let first: Vec<DocumentType> = texts.iter().map(|t| classifier.classify(t)).collect();
        let second: Vec<DocumentType> = texts.iter().rev().map(|t| classifier.classify(t)).collect();
        let second: Vec<DocumentType> = second.into_iter().rev().collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_document_map_keeps_page_order() {
        let classifier = DocumentClassifier::new();
        let pages = [
            (1, "CARTEIRA DE IDENTIDADE"),
            (2, "CPF 111.222.333-44"),
            (3, "sem texto reconhecível"),
            (4, "OUTORGADO"),
            (5, "OUTORGANTE"),
        ];

        let map = classifier.build_map(pages.iter().map(|(n, t)| (*n, *t)));

        assert_eq!(map.pages(DocumentType::RgCpf), &[1, 2]);
        assert_eq!(map.pages(DocumentType::Unknown), &[3]);
        assert_eq!(map.pages(DocumentType::Procuracao), &[4, 5]);
        assert!(map.pages(DocumentType::CertidaoNascimento).is_empty());

        let order: Vec<DocumentType> = map.iter().map(|(doc_type, _)| doc_type).collect();
        assert_eq!(order, vec![DocumentType::RgCpf, DocumentType::Unknown, DocumentType::Procuracao]);
    }

    #[test]
    fn test_label_round_trip_through_from_str() {
        assert_eq!("rg_cpf".parse::<DocumentType>().unwrap(), DocumentType::RgCpf);
        assert_eq!(DocumentType::TermoRepresentacao.to_string(), "TERMO_REPRESENTACAO");
        assert!("PASSAPORTE".parse::<DocumentType>().is_err());
    }
}

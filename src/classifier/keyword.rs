use once_cell::sync::Lazy;
use regex::Regex;

use crate::classifier::{ClassifierResult, FieldClassifier, KEYWORD};
use crate::field::{CandidateField, DetectionMethod, FieldType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Whole-word hit
    Exact,
    /// Substring hit
    Partial,
}

impl MatchTier {
    pub fn confidence(self) -> f32 {
        match self {
            MatchTier::Exact => 0.9,
            MatchTier::Partial => 0.7,
        }
    }
}

pub struct KeywordRule {
    pub field_type: FieldType,
    pub tier: MatchTier,
    pattern: Regex,
}

impl KeywordRule {
    pub fn is_match(&self, signals: &str) -> bool {
        self.pattern.is_match(signals)
    }
}

// Order matters: more specific types come before the ones whose words they
// contain (birth-date before date, username before full-name, ...).
const KEYWORDS: &[(FieldType, &[&str], &[&str])] = &[
    (FieldType::Cnpj, &["cnpj"], &["cnpj"]),
    (FieldType::Cpf, &["cpf"], &["cpf"]),
    (FieldType::Rg, &["rg", "identidade", "registro geral"], &[]),
    (
        FieldType::Cep,
        &["cep", "zip", "zipcode", "postal code", "código postal", "codigo postal"],
        &["postal", "zipcode"],
    ),
    (FieldType::Email, &["email", "e-mail", "correo"], &["email", "e-mail", "mail"]),
    (FieldType::Password, &["password", "senha", "passwd", "pwd"], &["senha", "password"]),
    (
        FieldType::Mobile,
        &["celular", "mobile", "cellphone", "whatsapp", "cel"],
        &["celular", "whats"],
    ),
    (FieldType::Phone, &["telefone", "phone", "tel", "fone"], &["telefone", "phone", "fone"]),
    (
        FieldType::BirthDate,
        &[
            "data de nascimento",
            "nascimento",
            "birthdate",
            "birthday",
            "birth date",
            "date of birth",
            "dob",
        ],
        &["nasc", "birth"],
    ),
    (FieldType::Date, &["data", "date"], &[]),
    (
        FieldType::Username,
        &["username", "user name", "usuario", "usuário", "login"],
        &["username"],
    ),
    (
        FieldType::Company,
        &["empresa", "company", "razão social", "razao social", "organization", "organização"],
        &["empresa", "compan"],
    ),
    (
        FieldType::FirstName,
        &["first name", "firstname", "first_name", "given name", "primeiro nome", "fname"],
        &["firstname"],
    ),
    (
        FieldType::LastName,
        &["last name", "lastname", "last_name", "sobrenome", "surname", "family name", "lname"],
        &["lastname", "sobrenome"],
    ),
    (
        FieldType::FullName,
        &["nome completo", "full name", "fullname", "full_name", "nome", "name"],
        &["nome", "name"],
    ),
    (FieldType::Website, &["website", "site", "url", "homepage"], &["website", "site"]),
    (FieldType::Street, &["rua", "logradouro", "street", "avenida"], &["logradouro", "street"]),
    (FieldType::Address, &["endereço", "endereco", "address"], &["endere", "address"]),
    (
        FieldType::HouseNumber,
        &["número", "numero", "nº", "house number", "street number", "num"],
        &[],
    ),
    (
        FieldType::Complement,
        &["complemento", "complement", "apartamento", "apto", "suite"],
        &["complemento"],
    ),
    (FieldType::Neighborhood, &["bairro", "neighborhood", "district"], &["bairro"]),
    (FieldType::City, &["cidade", "city", "município", "municipio"], &["cidade", "munic"]),
    (FieldType::State, &["estado", "state", "uf", "province"], &[]),
    (FieldType::Country, &["país", "pais", "country"], &["country"]),
    (
        FieldType::Text,
        &[],
        &[
            "observa",
            "comentário",
            "comentario",
            "comment",
            "mensagem",
            "message",
            "descri",
        ],
    ),
];

// Letters and digits only, so `_`, `-` and spaces in attribute names all
// count as word boundaries ("cpf_titular" hits the exact `cpf` rule).
const BOUNDARY_START: &str = r"(?:^|[^\p{L}\p{N}])";
const BOUNDARY_END: &str = r"(?:$|[^\p{L}\p{N}])";

static RULES: Lazy<Vec<KeywordRule>> = Lazy::new(build_rules);

fn alternation(words: &[&str]) -> String {
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

fn build_rules() -> Vec<KeywordRule> {
    let exact = KEYWORDS
        .iter()
        .filter(|(_, words, _)| !words.is_empty())
        .map(|(field_type, words, _)| KeywordRule {
            field_type: *field_type,
            tier: MatchTier::Exact,
            pattern: Regex::new(&format!(
                "{}(?:{}){}",
                BOUNDARY_START,
                alternation(words),
                BOUNDARY_END
            ))
            .expect("keyword pattern"),
        });

    let partial = KEYWORDS
        .iter()
        .filter(|(_, _, words)| !words.is_empty())
        .map(|(field_type, _, words)| KeywordRule {
            field_type: *field_type,
            tier: MatchTier::Partial,
            pattern: Regex::new(&alternation(words)).expect("keyword pattern"),
        });

    exact.chain(partial).collect()
}

pub fn keyword_rules() -> &'static [KeywordRule] {
    &RULES
}

/// First matching rule for an already lower-cased signal string.
pub fn match_keywords(signals: &str) -> Option<(FieldType, MatchTier)> {
    if signals.trim().is_empty() {
        return None;
    }
    RULES
        .iter()
        .find(|rule| rule.is_match(signals))
        .map(|rule| (rule.field_type, rule.tier))
}

pub struct KeywordClassifier;

impl FieldClassifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        KEYWORD
    }

    fn detect(&self, field: &CandidateField) -> Option<ClassifierResult> {
        let (field_type, tier) = match_keywords(&field.signals)?;
        Some(ClassifierResult::new(
            field_type,
            tier.confidence(),
            DetectionMethod::Keyword,
        ))
    }
}

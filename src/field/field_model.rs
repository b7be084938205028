use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dom::NodeId;
use crate::field::signals::build_signals;

// ============================================================================
// Semantic field types
// ============================================================================

/// The domain meaning of a control's expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Email,
    Password,
    Cpf,
    Cnpj,
    Rg,
    Phone,
    Mobile,
    Cep,
    BirthDate,
    Date,
    Time,
    FirstName,
    LastName,
    FullName,
    Username,
    Company,
    Website,
    Street,
    Address,
    HouseNumber,
    Complement,
    Neighborhood,
    City,
    State,
    Country,
    Number,
    Text,
    Select,
    Checkbox,
    Radio,
    Unknown,
}

impl FieldType {
    pub const ALL: [FieldType; 31] = [
        FieldType::Email,
        FieldType::Password,
        FieldType::Cpf,
        FieldType::Cnpj,
        FieldType::Rg,
        FieldType::Phone,
        FieldType::Mobile,
        FieldType::Cep,
        FieldType::BirthDate,
        FieldType::Date,
        FieldType::Time,
        FieldType::FirstName,
        FieldType::LastName,
        FieldType::FullName,
        FieldType::Username,
        FieldType::Company,
        FieldType::Website,
        FieldType::Street,
        FieldType::Address,
        FieldType::HouseNumber,
        FieldType::Complement,
        FieldType::Neighborhood,
        FieldType::City,
        FieldType::State,
        FieldType::Country,
        FieldType::Number,
        FieldType::Text,
        FieldType::Select,
        FieldType::Checkbox,
        FieldType::Radio,
        FieldType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Email => "email",
            FieldType::Password => "password",
            FieldType::Cpf => "cpf",
            FieldType::Cnpj => "cnpj",
            FieldType::Rg => "rg",
            FieldType::Phone => "phone",
            FieldType::Mobile => "mobile",
            FieldType::Cep => "cep",
            FieldType::BirthDate => "birth-date",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::FirstName => "first-name",
            FieldType::LastName => "last-name",
            FieldType::FullName => "full-name",
            FieldType::Username => "username",
            FieldType::Company => "company",
            FieldType::Website => "website",
            FieldType::Street => "street",
            FieldType::Address => "address",
            FieldType::HouseNumber => "house-number",
            FieldType::Complement => "complement",
            FieldType::Neighborhood => "neighborhood",
            FieldType::City => "city",
            FieldType::State => "state",
            FieldType::Country => "country",
            FieldType::Number => "number",
            FieldType::Text => "text",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Unknown => "unknown",
        }
    }

    /// `text` and `unknown` carry no domain meaning.
    pub fn is_generic(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Unknown)
    }

    pub fn category(&self) -> FieldCategory {
        match self {
            FieldType::FirstName
            | FieldType::LastName
            | FieldType::FullName
            | FieldType::BirthDate
            | FieldType::Company => FieldCategory::Personal,
            FieldType::Email | FieldType::Phone | FieldType::Mobile | FieldType::Website => {
                FieldCategory::Contact
            }
            FieldType::Cpf | FieldType::Cnpj | FieldType::Rg => FieldCategory::Document,
            FieldType::Cep
            | FieldType::Street
            | FieldType::Address
            | FieldType::HouseNumber
            | FieldType::Complement
            | FieldType::Neighborhood
            | FieldType::City
            | FieldType::State
            | FieldType::Country => FieldCategory::Address,
            FieldType::Password | FieldType::Username => FieldCategory::Authentication,
            FieldType::Select | FieldType::Checkbox | FieldType::Radio => FieldCategory::Choice,
            FieldType::Date
            | FieldType::Time
            | FieldType::Number
            | FieldType::Text
            | FieldType::Unknown => FieldCategory::Generic,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    /// Accepts the canonical kebab-case names plus common spellings that
    /// models and oracles produce (`birth_date`, `tel`, `zip`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");

        if let Some(t) = FieldType::ALL.iter().find(|t| t.as_str() == normalized) {
            return Ok(*t);
        }

        let alias = match normalized.as_str() {
            "e-mail" | "mail" => FieldType::Email,
            "tel" | "telephone" | "telefone" => FieldType::Phone,
            "cellphone" | "celular" => FieldType::Mobile,
            "zip" | "zipcode" | "zip-code" | "postal-code" => FieldType::Cep,
            "birthdate" | "birthday" | "date-of-birth" => FieldType::BirthDate,
            "firstname" | "given-name" => FieldType::FirstName,
            "lastname" | "surname" | "family-name" => FieldType::LastName,
            "name" | "fullname" => FieldType::FullName,
            "url" | "site" => FieldType::Website,
            "textarea" => FieldType::Text,
            _ => return Err(format!("unknown field type '{}'", s)),
        };
        Ok(alias)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldCategory {
    Personal,
    Contact,
    Document,
    Address,
    Authentication,
    Choice,
    Generic,
}

// ============================================================================
// Detection provenance
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    ExactType,
    Keyword,
    Similarity,
    Learned,
    Oracle,
    HtmlFallback,
    CustomSelect,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::ExactType => "exact-type",
            DetectionMethod::Keyword => "keyword",
            DetectionMethod::Similarity => "similarity",
            DetectionMethod::Learned => "learned",
            DetectionMethod::Oracle => "oracle",
            DetectionMethod::HtmlFallback => "html-fallback",
            DetectionMethod::CustomSelect => "custom-select",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CandidateField
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub text: String,
}

/// One interactive control, before and after classification.
///
/// Rebuilt from the live page on every detection pass; `element` is only
/// meaningful for the `Page` that produced it, `selector` re-resolves it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateField {
    #[serde(skip)]
    pub element: NodeId,
    pub selector: String,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,

    pub field_type: FieldType,
    pub category: FieldCategory,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autocomplete: Option<String>,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,

    pub signals: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_method: Option<DetectionMethod>,
    pub detection_confidence: f32,
    pub detection_duration_ms: f64,
}

impl CandidateField {
    pub fn new(element: NodeId, selector: &str, tag: &str) -> Self {
        CandidateField {
            element,
            selector: selector.to_string(),
            tag: tag.to_lowercase(),
            input_type: None,
            field_type: FieldType::Unknown,
            category: FieldCategory::Generic,
            label: None,
            name: None,
            id: None,
            placeholder: None,
            autocomplete: None,
            required: false,
            options: Vec::new(),
            signals: String::new(),
            adapter_name: None,
            detection_method: None,
            detection_confidence: 0.0,
            detection_duration_ms: 0.0,
        }
    }

    pub fn with_input_type(mut self, input_type: &str) -> Self {
        self.input_type = Some(input_type.to_lowercase());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self.refresh_signals();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self.refresh_signals();
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self.refresh_signals();
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self.refresh_signals();
        self
    }

    pub fn with_autocomplete(mut self, autocomplete: &str) -> Self {
        self.autocomplete = Some(autocomplete.to_string());
        self.refresh_signals();
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self.category = field_type.category();
        self
    }

    pub fn refresh_signals(&mut self) {
        self.signals = build_signals(self);
    }

    pub fn apply_detection(&mut self, field_type: FieldType, method: DetectionMethod, confidence: f32) {
        self.field_type = field_type;
        self.category = field_type.category();
        self.detection_method = Some(method);
        self.detection_confidence = confidence.clamp(0.0, 1.0);
    }

    pub fn is_custom(&self) -> bool {
        self.adapter_name.is_some()
    }
}

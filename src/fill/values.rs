use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::classifier::OracleClient;
use crate::classifier::oracle::parse_oracle_answer;
use crate::field::{CandidateField, FieldType};

// ============================================================================
// Value generation
// ============================================================================

/// Produces a plausible value for a semantic type. Must not panic for any type.
pub trait ValueGenerator: Send + Sync {
    fn generate(&self, field_type: FieldType) -> String;
}

/// One fixed, well-formed sample per type (valid CPF/CNPJ check digits).
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleValueGenerator;

impl ValueGenerator for SampleValueGenerator {
    fn generate(&self, field_type: FieldType) -> String {
        let value = match field_type {
            FieldType::Email => "usuario@example.com",
            FieldType::Password => "Senha@12345",
            FieldType::Cpf => "529.982.247-25",
            FieldType::Cnpj => "11.222.333/0001-81",
            FieldType::Rg => "12.345.678-9",
            FieldType::Phone => "(11) 3456-7890",
            FieldType::Mobile => "(11) 98765-4321",
            FieldType::Cep => "01310-100",
            FieldType::BirthDate => "1990-05-15",
            FieldType::Date => "2025-01-15",
            FieldType::Time => "09:30",
            FieldType::FirstName => "Maria",
            FieldType::LastName => "Silva",
            FieldType::FullName => "Maria Silva",
            FieldType::Username => "mariasilva",
            FieldType::Company => "Empresa Exemplo Ltda",
            FieldType::Website => "https://example.com",
            FieldType::Street => "Avenida Paulista",
            FieldType::Address => "Avenida Paulista, 1000",
            FieldType::HouseNumber => "1000",
            FieldType::Complement => "Apto 42",
            FieldType::Neighborhood => "Bela Vista",
            FieldType::City => "São Paulo",
            FieldType::State => "SP",
            FieldType::Country => "Brasil",
            FieldType::Number => "42",
            FieldType::Checkbox => "true",
            // Empty means "first available option" to choice fillers.
            FieldType::Select | FieldType::Radio => "",
            FieldType::Text | FieldType::Unknown => "test",
        };
        value.to_string()
    }
}

// ============================================================================
// Value resolution
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueSource {
    Generator,
    Option,
    Oracle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedValue {
    pub selector: String,
    pub value: String,
    pub source: ValueSource,
}

/// Decides what goes into a classified field.
#[async_trait]
pub trait FieldValueResolver: Send + Sync {
    async fn resolve(
        &self,
        field: &CandidateField,
        page_url: &str,
        oracle: Option<&dyn OracleClient>,
        force_oracle_first: bool,
    ) -> ResolvedValue;
}

/// Resolves through a `ValueGenerator`. Choice fields with known options
/// take the first real option; with `force_oracle_first` the oracle may
/// re-type the field before generation.
pub struct GeneratorResolver {
    generator: Arc<dyn ValueGenerator>,
}

impl Default for GeneratorResolver {
    fn default() -> Self {
        Self::new(Arc::new(SampleValueGenerator))
    }
}

impl GeneratorResolver {
    pub fn new(generator: Arc<dyn ValueGenerator>) -> Self {
        Self { generator }
    }

    async fn oracle_type(oracle: &dyn OracleClient, field: &CandidateField) -> Option<FieldType> {
        if !oracle.is_available().await {
            return None;
        }
        match oracle.generate(field).await {
            Ok(answer) => parse_oracle_answer(&answer).filter(|t| !t.is_generic()),
            Err(e) => {
                debug!(selector = %field.selector, error = %e, "oracle value hint failed");
                None
            }
        }
    }
}

#[async_trait]
impl FieldValueResolver for GeneratorResolver {
    async fn resolve(
        &self,
        field: &CandidateField,
        page_url: &str,
        oracle: Option<&dyn OracleClient>,
        force_oracle_first: bool,
    ) -> ResolvedValue {
        if force_oracle_first {
            if let Some(oracle) = oracle {
                if let Some(field_type) = Self::oracle_type(oracle, field).await {
                    debug!(url = page_url, selector = %field.selector, %field_type, "value typed by oracle");
                    return ResolvedValue {
                        selector: field.selector.clone(),
                        value: self.generator.generate(field_type),
                        source: ValueSource::Oracle,
                    };
                }
            }
        }

        let is_choice = matches!(field.field_type, FieldType::Select | FieldType::Radio);
        if is_choice {
            if let Some(option) = field.options.iter().find(|o| !o.value.trim().is_empty()) {
                return ResolvedValue {
                    selector: field.selector.clone(),
                    value: option.value.clone(),
                    source: ValueSource::Option,
                };
            }
        }

        ResolvedValue {
            selector: field.selector.clone(),
            value: self.generator.generate(field.field_type),
            source: ValueSource::Generator,
        }
    }
}

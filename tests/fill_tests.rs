use std::sync::Arc;

use form_sense::dom::{DomEvent, NodeSnapshot, Selector};
use form_sense::field::{CandidateField, FieldOption, FieldType};
use form_sense::fill::{
    FieldValueResolver, FormFiller, GeneratorResolver, SampleValueGenerator, ValueGenerator,
    ValueSource, fill_native,
};
use form_sense::screen::{FieldDetector, collect_native_fields};

mod common;
use crate::common::mocks::MockOracle;
use crate::common::pages::{URL, antd_select, input, page_with, registration_form, select};

fn sel(source: &str) -> Selector {
    Selector::parse(source).unwrap()
}

fn choice_field(field_type: FieldType, options: &[(&str, &str)]) -> CandidateField {
    let mut field = CandidateField::new(Default::default(), "#choice", "select").with_type(field_type);
    field.options = options
        .iter()
        .map(|(value, text)| FieldOption {
            value: value.to_string(),
            text: text.to_string(),
        })
        .collect();
    field
}

// ============================================================================
// Value generation
// ============================================================================

#[test]
fn sample_generator_covers_every_type() {
    let generator = SampleValueGenerator;
    for field_type in FieldType::ALL {
        let value = generator.generate(field_type);
        let is_choice = matches!(field_type, FieldType::Select | FieldType::Radio);
        assert_eq!(value.is_empty(), is_choice, "{}", field_type);
    }

    assert_eq!(generator.generate(FieldType::Cpf), "529.982.247-25");
    assert_eq!(generator.generate(FieldType::Email), "usuario@example.com");
    assert_eq!(generator.generate(FieldType::Unknown), "test");
    assert_eq!(generator.generate(FieldType::Checkbox), "true");
}

#[tokio::test]
async fn resolver_uses_first_real_option_for_choices() {
    let resolver = GeneratorResolver::default();
    let field = choice_field(FieldType::Select, &[("", "Selecione"), ("PR", "Paraná")]);

    let resolved = resolver.resolve(&field, URL, None, false).await;
    assert_eq!(resolved.value, "PR");
    assert_eq!(resolved.source, ValueSource::Option);

    let empty = choice_field(FieldType::Select, &[]);
    let resolved = resolver.resolve(&empty, URL, None, false).await;
    assert_eq!(resolved.value, "");
    assert_eq!(resolved.source, ValueSource::Generator);
}

#[tokio::test]
async fn resolver_lets_a_forced_oracle_retype_the_field() {
    let resolver = GeneratorResolver::default();
    let field = choice_field(FieldType::Text, &[]);
    let oracle = MockOracle::answering("cnpj");

    let resolved = resolver.resolve(&field, URL, Some(&oracle), true).await;
    assert_eq!(resolved.value, "11.222.333/0001-81");
    assert_eq!(resolved.source, ValueSource::Oracle);

    // Not forced: the oracle is never asked.
    let resolved = resolver.resolve(&field, URL, Some(&oracle), false).await;
    assert_eq!(resolved.source, ValueSource::Generator);
    assert_eq!(oracle.generate_calls(), 1);
}

#[tokio::test]
async fn resolver_ignores_unusable_oracle_hints() {
    let resolver = GeneratorResolver::default();
    let field = choice_field(FieldType::Cep, &[]);

    for oracle in [
        MockOracle::unavailable(),
        MockOracle::failing(),
        MockOracle::answering("text"),
        MockOracle::answering("no idea"),
    ] {
        let resolved = resolver.resolve(&field, URL, Some(&oracle), true).await;
        assert_eq!(resolved.value, "01310-100");
        assert_eq!(resolved.source, ValueSource::Generator);
    }
}

// ============================================================================
// Native filling
// ============================================================================

#[test]
fn text_fill_sets_value_and_fires_user_events() {
    let page = page_with([input("text", "cidade")]);
    let field = collect_native_fields(&page).remove(0);
    let mut events = page.subscribe_events();

    assert!(fill_native(&page, &field, "Recife"));
    assert_eq!(page.value(field.element).as_deref(), Some("Recife"));
    assert_eq!(page.focused(), Some(field.element));

    let mut fired = Vec::new();
    while let Ok(e) = events.try_recv() {
        assert_eq!(e.target, field.element);
        fired.push(e.event);
    }
    assert_eq!(
        fired,
        vec![DomEvent::Focus, DomEvent::Input, DomEvent::Change, DomEvent::Blur]
    );
}

#[test]
fn select_fill_matches_text_or_value_and_skips_placeholders() {
    let page = page_with([select(
        "uf",
        &[("", "Selecione"), ("SP", "São Paulo"), ("PR", "Paraná")],
    )]);
    let field = collect_native_fields(&page).remove(0);

    assert!(fill_native(&page, &field, "paraná"));
    assert_eq!(page.value(field.element).as_deref(), Some("PR"));

    assert!(fill_native(&page, &field, "SP"));
    assert_eq!(page.value(field.element).as_deref(), Some("SP"));

    assert!(fill_native(&page, &field, ""));
    assert_eq!(page.value(field.element).as_deref(), Some("SP"));
}

#[test]
fn select_without_real_options_is_not_filled() {
    let page = page_with([select("uf", &[("", "Selecione")])]);
    let field = collect_native_fields(&page).remove(0);
    assert!(!fill_native(&page, &field, "SP"));
}

#[test]
fn checkbox_and_radio_fill() {
    let page = page_with([
        input("checkbox", "aceite"),
        input("radio", "plano").attr("value", "mensal").checked(true),
        input("radio", "plano").attr("value", "anual"),
    ]);
    let fields = collect_native_fields(&page);

    assert!(fill_native(&page, &fields[0], "sim"));
    assert!(page.is_checked(fields[0].element));
    assert!(fill_native(&page, &fields[0], "false"));
    assert!(!page.is_checked(fields[0].element));

    assert!(fill_native(&page, &fields[2], ""));
    assert!(page.is_checked(fields[2].element));
    assert!(!page.is_checked(fields[1].element));
}

#[test]
fn detached_field_is_not_filled() {
    let page = page_with([input("text", "cidade")]);
    let field = collect_native_fields(&page).remove(0);
    page.remove(field.element);
    assert!(!fill_native(&page, &field, "Recife"));
}

// ============================================================================
// Whole-page filling
// ============================================================================

#[tokio::test]
async fn fill_page_fills_every_detected_field() {
    let page = page_with(registration_form());
    let filler = FormFiller::new(Arc::new(FieldDetector::with_defaults()));

    let report = filler.fill_page(&page).await;
    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.filled_count(), 4);
    assert_eq!(report.skipped_count(), 0);

    let value = |s: &str| page.value(page.query_one(&sel(s)).unwrap());
    assert_eq!(value("#email").as_deref(), Some("usuario@example.com"));
    assert_eq!(value("#cpf").as_deref(), Some("529.982.247-25"));
    assert_eq!(value("#fone").as_deref(), Some("(11) 3456-7890"));
    assert_eq!(value("#obs").as_deref(), Some("test"));
}

#[tokio::test(start_paused = true)]
async fn unresponsive_widget_is_reported_and_the_pass_continues() {
    let mut children = vec![antd_select("Estado")];
    children.extend(registration_form());
    let page = page_with(children);
    let filler = FormFiller::new(Arc::new(FieldDetector::with_defaults()));

    let report = filler.fill_page(&page).await;
    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.skipped_count(), 1);

    let widget = &report.outcomes[0];
    assert_eq!(widget.adapter.as_deref(), Some("antd-select"));
    assert_eq!(widget.field_type, FieldType::State);
    assert_eq!(widget.value, "SP");
    assert!(!widget.filled);
    assert!(report.outcomes[1..].iter().all(|o| o.filled));
}

#[tokio::test]
async fn filler_consults_a_forced_oracle_per_field() {
    let page = page_with([NodeSnapshot::new("textarea").attr("name", "sobre")]);
    let oracle = Arc::new(MockOracle::answering("full-name"));
    let filler = FormFiller::new(Arc::new(FieldDetector::with_defaults()))
        .with_oracle(oracle.clone(), true);

    let report = filler.fill_page(&page).await;
    assert_eq!(report.outcomes[0].value, "Maria Silva");
    assert_eq!(report.outcomes[0].source, ValueSource::Oracle);
    assert_eq!(oracle.generate_calls(), 1);
}

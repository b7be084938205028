use form_sense::dom::{NodeSnapshot, Page};

pub const URL: &str = "https://example.test/cadastro";

pub fn page_with(children: impl IntoIterator<Item = NodeSnapshot>) -> Page {
    Page::from_snapshot(URL, &NodeSnapshot::new("body").children(children))
}

pub fn input(input_type: &str, name: &str) -> NodeSnapshot {
    NodeSnapshot::new("input")
        .attr("type", input_type)
        .attr("name", name)
}

/// `<div><label for=id>text</label><input id=id ...></div>`
pub fn labelled(id: &str, label: &str, control: NodeSnapshot) -> NodeSnapshot {
    NodeSnapshot::new("div").children([
        NodeSnapshot::new("label").attr("for", id).text(label),
        control.attr("id", id),
    ])
}

pub fn select(name: &str, options: &[(&str, &str)]) -> NodeSnapshot {
    NodeSnapshot::new("select")
        .attr("name", name)
        .children(options.iter().map(|(value, text)| {
            NodeSnapshot::new("option").attr("value", value).text(text)
        }))
}

/// antd Select preceded by a caption span.
pub fn antd_select(caption: &str) -> NodeSnapshot {
    NodeSnapshot::new("div").children([
        NodeSnapshot::new("span").text(caption),
        NodeSnapshot::new("div").class("ant-select ant-select-single").child(
            NodeSnapshot::new("div").class("ant-select-selector").children([
                NodeSnapshot::new("span")
                    .class("ant-select-selection-search")
                    .child(NodeSnapshot::new("input").attr("type", "search")),
                NodeSnapshot::new("span")
                    .class("ant-select-selection-placeholder")
                    .text("Selecione"),
            ]),
        ),
    ])
}

/// Portal dropdown antd renders after the selector is pressed.
pub fn antd_dropdown(options: &[&str]) -> NodeSnapshot {
    NodeSnapshot::new("div")
        .class("ant-select-dropdown")
        .children(options.iter().map(|text| {
            NodeSnapshot::new("div")
                .class("ant-select-item ant-select-item-option")
                .attr("title", text)
                .child(
                    NodeSnapshot::new("div")
                        .class("ant-select-item-option-content")
                        .text(text),
                )
        }))
}

/// Hidden source `<select>` plus the select2 container that replaces it.
pub fn select2_widget(id: &str, label: &str, options: &[(&str, &str)]) -> NodeSnapshot {
    NodeSnapshot::new("div").children([
        NodeSnapshot::new("label").attr("for", id).text(label),
        select(id, options)
            .attr("id", id)
            .class("select2-hidden-accessible"),
        NodeSnapshot::new("span")
            .class("select2 select2-container select2-container--default")
            .child(
                NodeSnapshot::new("span").class("selection").child(
                    NodeSnapshot::new("span")
                        .class("select2-selection select2-selection--single")
                        .attr("role", "combobox")
                        .child(
                            NodeSnapshot::new("span")
                                .class("select2-selection__rendered")
                                .text("Selecione"),
                        ),
                ),
            ),
    ])
}

/// Plain registration form used across suites: email, CPF, phone, notes.
pub fn registration_form() -> Vec<NodeSnapshot> {
    vec![
        labelled("email", "E-mail", input("email", "email")),
        labelled("cpf", "CPF", input("text", "cpf")),
        labelled("fone", "Telefone", input("text", "telefone")),
        labelled(
            "obs",
            "Observações",
            NodeSnapshot::new("textarea").attr("name", "observacoes"),
        ),
    ]
}

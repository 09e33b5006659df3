use llmdeck::context::{ContextAccumulator, ContextItem, Snippet};

#[test]
fn test_fragments_dedupe_but_snippets_do_not() {
    let mut context = ContextAccumulator::new();
    assert!(context.add_fragment("/x"));
    assert!(!context.add_fragment("/x"));
    context.add_snippet("code", "b.lua", "lua");
    context.add_snippet("code", "b.lua", "lua");

    assert_eq!(context.fragments(), ["/x".to_string()]);
    assert_eq!(context.snippets().len(), 2);
}

#[test]
fn test_render_order_is_input_snippets_fragments() {
    let mut context = ContextAccumulator::new();
    context.add_fragment("/a.txt");
    context.add_snippet("code", "b.lua", "lua");

    let prompt = context.render_prompt("hi");
    let input = prompt.find("hi").expect("input");
    let snippets = prompt.find("Snippets:").expect("snippets");
    let fragments = prompt.find("Fragments:").expect("fragments");
    assert!(input < snippets && snippets < fragments);
    assert!(prompt.contains("```lua\ncode\n```"));
    assert!(prompt.ends_with("- /a.txt"));
}

#[test]
fn test_snippet_text_is_trimmed_on_insert() {
    let mut context = ContextAccumulator::new();
    context.add(ContextItem::Snippet(Snippet {
        filepath: "f.rs".into(),
        filetype: "rust".into(),
        text: "\n\n  fn main() {}\n\n".into(),
    }));
    assert_eq!(context.snippets()[0].text, "fn main() {}");
}

#[test]
fn test_reset_clears_every_kind() {
    let mut context = ContextAccumulator::new();
    context.add_fragment("a");
    context.add_snippet("s", "p", "text");
    context.add_tool("t");
    context.add_function("f");
    context.reset();
    assert!(context.is_empty());
    assert_eq!(context.render_prompt("only"), "only");
}

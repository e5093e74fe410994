//! End-to-end tests of the validator facade.

use super::*;

fn check(source: &str) -> (ValidatedUnit, Vec<DiagnosticCode>) {
    check_with_subsets(source, &["lsl"])
}

fn check_with_subsets(source: &str, subsets: &[&str]) -> (ValidatedUnit, Vec<DiagnosticCode>) {
    let provider = LibraryProvider::embedded(subsets);
    let (unit, handler) =
        validate_standalone(std::path::PathBuf::new(), source, &provider, &ValidatorConfig::new());
    let codes = handler.emitted_codes();
    (unit, codes)
}

#[test]
fn minimal_valid_script() {
    let (unit, codes) = check("default { state_entry() { llOwnerSay(\"hi\"); } }");
    assert!(codes.is_empty());
    assert!(!unit.has_errors());
    let script = unit.script.expect("syntax tree");
    assert!(script.default_state.is_some());
    assert_eq!(script.default_state.unwrap().handlers.len(), 1);
    assert!(script.states.is_empty());
}

#[test]
fn missing_default_state() {
    let (unit, codes) = check("state foo { state_entry() {} }");
    assert!(unit.has_errors());
    assert!(codes.contains(&DiagnosticCode::MissingDefaultState));
}

#[test]
fn named_states_validate_cleanly() {
    let (unit, codes) = check(
        "default { touch_start(integer n) { state armed; } }\n\
         state armed { state_entry() { llOwnerSay(\"armed\"); state default; } }",
    );
    assert!(codes.is_empty(), "unexpected diagnostics: {:?}", codes);
    assert!(!unit.has_errors());
    let script = unit.script.expect("syntax tree");
    assert_eq!(script.states.len(), 1);
    assert_eq!(script.states[0].name.name, "armed");
}

#[test]
fn redefined_library_constant() {
    let (unit, codes) = check("integer PI = 3;\ndefault { state_entry() {} }");
    assert_eq!(codes, vec![DiagnosticCode::RedefinedStandardLibraryConstant]);
    // the tree survives the error
    let script = unit.script.expect("syntax tree");
    assert_eq!(script.globals().count(), 1);
}

#[test]
fn overload_with_no_conversion_for_key() {
    let xml = r#"<LSLLibraryData>
        <LibraryFunction Name="f" ReturnType="void" Subsets="lsl">
            <Parameter Name="a" Type="integer"/>
        </LibraryFunction>
        <LibraryFunction Name="f" ReturnType="void" Subsets="lsl">
            <Parameter Name="a" Type="float"/>
        </LibraryFunction>
        <SupportedEventHandler Name="state_entry" Subsets="lsl"/>
    </LSLLibraryData>"#;
    let provider = LibraryProvider::from_xml(xml, &["lsl"], FilterMode::Live).unwrap();
    let (unit, handler) = validate_standalone(
        std::path::PathBuf::new(),
        "default { state_entry() { key k; f(k); } }",
        &provider,
        &ValidatorConfig::new(),
    );
    assert!(unit.has_errors());
    assert_eq!(handler.emitted_codes(), vec![DiagnosticCode::NoSuitableLibraryFunctionOverloadFound]);
}

#[test]
fn dead_code_after_return_is_a_warning() {
    let (unit, codes) = check("integer g() { return 1; llOwnerSay(\"x\"); }\ndefault { state_entry() {} }");
    assert!(!unit.has_errors());
    assert_eq!(unit.warnings, 1);
    assert_eq!(codes, vec![DiagnosticCode::DeadCodeAfterReturnPath]);
}

#[test]
fn not_all_code_paths_return() {
    let (_, codes) = check("integer g(integer x) { if (x > 0) return 1; }\ndefault { state_entry() {} }");
    assert_eq!(codes, vec![DiagnosticCode::NotAllCodePathsReturnAValue]);
}

#[test]
fn negated_vector_literal_in_global_initializer() {
    let (_, codes) = check("vector V = -<1,2,3>;\ndefault { state_entry() {} }");
    assert_eq!(codes, vec![DiagnosticCode::NegateOperationOnVectorLiteralInStaticContext]);
}

#[test]
fn component_access_on_library_constant() {
    let (_, codes) = check("default { state_entry() { float x = ZERO_VECTOR.x; } }");
    assert_eq!(codes, vec![DiagnosticCode::TupleComponentAccessOnLibraryConstant]);
}

#[test]
fn grammar_error_yields_no_tree() {
    let (unit, codes) = check("default {");
    assert!(unit.has_errors());
    assert!(unit.script.is_none());
    assert_eq!(codes, vec![DiagnosticCode::GrammarLevelParserSyntaxError]);
}

#[test]
fn invalid_string_escape() {
    let (unit, codes) = check("default { state_entry() { llOwnerSay(\"bad \\q escape\"); } }");
    assert!(unit.has_errors());
    assert!(codes.contains(&DiagnosticCode::InvalidStringEscapeCode));
}

#[test]
fn comments_are_collected_in_order() {
    let source = "// header\ndefault { state_entry() { /* body */ llOwnerSay(\"hi\"); } } // trailing";
    let (unit, _) = check(source);
    let texts: Vec<&str> = unit.comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["// header", "/* body */", "// trailing"]);
    assert!(unit.comments.windows(2).all(|w| w[0].span.start < w[1].span.start));
}

#[test]
fn comment_extraction_can_be_disabled() {
    let provider = LibraryProvider::embedded(&["lsl"]);
    let config = ValidatorConfig::new().extract_comments(false);
    let (unit, _) = validate_standalone(
        std::path::PathBuf::new(),
        "// hello\ndefault { state_entry() {} }",
        &provider,
        &config,
    );
    assert!(unit.comments.is_empty());
}

#[test]
fn os_functions_require_their_subset() {
    let source = "default { state_entry() { osGetGridName(); } }";
    let (_, codes) = check(source);
    assert_eq!(codes, vec![DiagnosticCode::CallToUndefinedFunction]);
    let (unit, codes) = check_with_subsets(source, &["lsl", "ossl"]);
    assert!(codes.is_empty());
    assert!(!unit.has_errors());
}

#[test]
fn pretty_printed_source_revalidates_identically() {
    let source = "integer counter = 0;\n\
                  float half(integer x) { return x / 2.0; }\n\
                  default {\n\
                      touch_start(integer total) {\n\
                          counter += total;\n\
                          if (counter > 10) llOwnerSay((string)counter + \" / \" + (string)((integer)half(counter)));\n\
                          else llOwnerSay(\"low\");\n\
                      }\n\
                  }";
    let (first, codes) = check(source);
    assert!(codes.is_empty());
    let printed = first.script.expect("syntax tree").to_string();
    let (second, codes) = check(&printed);
    assert!(codes.is_empty(), "reprinted source failed: {:?}\n{}", codes, printed);
    assert_eq!(printed, second.script.expect("syntax tree").to_string());
}

#[test]
fn diagnostics_are_deterministic_and_source_ordered() {
    let source = "integer x = llAbs(1);\n\
                  default { state_entry() { integer y = \"s\"; undefined_fn(); } }";
    let (_, first) = check(source);
    let (_, second) = check(source);
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            DiagnosticCode::CallToFunctionInStaticContext,
            DiagnosticCode::TypeMismatchInVariableDeclaration,
            DiagnosticCode::CallToUndefinedFunction,
        ]
    );
}

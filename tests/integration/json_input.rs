//! Integration tests: syntax trees handed over as JSON by an external parser

use leixing::check_source_json;
use leixing::util::diagnostic::{DiagnosticRenderer, Severity};

/// `var a: Int = "x"` at line 2, the initializer at column 16
const MISMATCH: &str = r#"[
  {
    "kind": {"expr": {
      "kind": {"var": {
        "name": "a",
        "type_expr": {"kind": {"name": ["Int"]}},
        "init": {
          "kind": {"literal": {"kind": "string", "value": "x"}},
          "span": {"start": {"line": 2, "column": 16}, "end": {"line": 2, "column": 19}}
        }
      }},
      "span": {"start": {"line": 2, "column": 3}, "end": {"line": 2, "column": 19}}
    }},
    "span": {"start": {"line": 2, "column": 3}, "end": {"line": 2, "column": 19}}
  }
]"#;

#[test]
fn test_empty_program_is_ok() {
    let outcome = check_source_json("empty.lx", "[]").unwrap();
    assert!(outcome.is_ok());
    assert_eq!(outcome.typed.map(|t| t.len()), Some(0));
}

#[test]
fn test_diagnostic_carries_location() {
    let outcome = check_source_json("main.lx", MISMATCH).unwrap();
    assert!(!outcome.is_ok());
    assert_eq!(outcome.diagnostics.len(), 1);

    let diagnostic = outcome.diagnostics.iter().next().unwrap();
    assert_eq!(diagnostic.severity, Severity::Failure);
    assert_eq!(diagnostic.code, "E2001");
    assert_eq!(&*diagnostic.location.file, "main.lx");
    assert_eq!(diagnostic.location.span.start.line, 2);

    let rendered = DiagnosticRenderer::new().render(diagnostic);
    assert!(
        rendered.starts_with("main.lx:2:16: failure[E2001]: type `\"x\"` cannot be assigned to type `Int`"),
        "{}",
        rendered
    );
}

#[test]
fn test_class_declaration_from_json() {
    let json = r#"[
      {"kind": {"namespace": {
        "kind": "class",
        "name": "Point",
        "body": [
          {"kind": {"instance_var": {"name": "x", "type_expr": {"kind": {"name": ["Int"]}}}}},
          {"kind": {"method": {
            "name": "x",
            "return_type": {"kind": {"name": ["Int"]}},
            "body": [{"kind": {"expr": {"kind": {"instance_var": "x"}}}}]
          }}}
        ]
      }}}
    ]"#;
    let outcome = check_source_json("point.lx", json).unwrap();
    assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    assert!(outcome.is_ok());
}

#[test]
fn test_malformed_json_is_an_error() {
    let err = check_source_json("broken.lx", r#"[{"kind": 1}]"#).unwrap_err();
    assert!(format!("{:#}", err).contains("invalid syntax tree for `broken.lx`"));
}
